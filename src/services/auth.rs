use lines_common::{AuthPayload, OtpChallenge, TokenPair, UserProfile, UserRole};
use serde::Serialize;
use serde_json::{Value, json};

use super::{decode, field_from};
use crate::errors::ApiError;
use crate::http::{HttpClient, RequestOptions};

/// First step of sign-up. The account is only created once the emailed
/// code is verified.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
}

/// Wire calls under `/auth`. Session bookkeeping lives in
/// [`AuthProvider`](crate::session::AuthProvider).
#[derive(Clone)]
pub struct AuthService {
    http: HttpClient,
}

impl AuthService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn request_otp(&self, request: &RegistrationRequest) -> Result<OtpChallenge, ApiError> {
        let opts = RequestOptions::new().json(request)?;
        let raw = self.http.post("/auth/register/request-otp", opts).await?;
        Ok(challenge_or_default(raw.optional_data()?, &request.email))
    }

    /// Verify the code and create the account. The response carries the
    /// new user and a token pair.
    pub async fn verify_otp_and_register(
        &self,
        email: &str,
        otp: &str,
        role: UserRole,
    ) -> Result<AuthPayload, ApiError> {
        let opts = RequestOptions::new().json(&json!({ "email": email, "otp": otp, "role": role }))?;
        self.http.post("/auth/register/verify-otp", opts).await?.data()
    }

    pub async fn resend_otp(&self, email: &str) -> Result<OtpChallenge, ApiError> {
        let opts = RequestOptions::new().json(&json!({ "email": email }))?;
        let raw = self.http.post("/auth/register/resend-otp", opts).await?;
        Ok(challenge_or_default(raw.optional_data()?, email))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError> {
        let opts = RequestOptions::new().json(&json!({ "email": email, "password": password }))?;
        self.http.post("/auth/login", opts).await?.data()
    }

    /// Exchange a refresh token for a new pair. The HTTP client refreshes on
    /// its own after a 401; this is for explicit rotation.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let opts = RequestOptions::new().json(&json!({ "refreshToken": refresh_token }))?;
        let mut data: Value = self.http.post("/auth/refresh", opts).await?.data()?;
        if let Some(map) = data.as_object_mut() {
            map.entry("refreshToken")
                .or_insert_with(|| Value::String(refresh_token.to_string()));
        }
        decode(data)
    }

    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<Option<String>, ApiError> {
        let opts = RequestOptions::new().json(&json!({ "refreshToken": refresh_token }))?;
        self.http.post("/auth/logout", opts).await?.ack()
    }

    pub async fn logout_all(&self) -> Result<Option<String>, ApiError> {
        self.http.post("/auth/logout-all", RequestOptions::new()).await?.ack()
    }

    pub async fn me(&self) -> Result<UserProfile, ApiError> {
        let data: Value = self.http.get_data("/auth/me", RequestOptions::new()).await?;
        field_from(data, "user")
    }

    pub async fn change_password(&self, current: &str, new: &str) -> Result<Option<String>, ApiError> {
        let opts = RequestOptions::new()
            .json(&json!({ "currentPassword": current, "newPassword": new }))?;
        self.http.put("/auth/change-password", opts).await?.ack()
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<OtpChallenge, ApiError> {
        let opts = RequestOptions::new().json(&json!({ "email": email }))?;
        let raw = self.http.post("/auth/password/request-reset", opts).await?;
        Ok(challenge_or_default(raw.optional_data()?, email))
    }

    pub async fn verify_password_reset_otp(
        &self,
        email: &str,
        otp: &str,
    ) -> Result<Option<String>, ApiError> {
        let opts = RequestOptions::new().json(&json!({ "email": email, "otp": otp }))?;
        self.http.post("/auth/password/verify-otp", opts).await?.ack()
    }

    pub async fn reset_password(&self, email: &str, new_password: &str) -> Result<Option<String>, ApiError> {
        let opts = RequestOptions::new()
            .json(&json!({ "email": email, "newPassword": new_password }))?;
        self.http.post("/auth/password/reset", opts).await?.ack()
    }
}

/// Servers that only acknowledge an OTP request get the default window.
fn challenge_or_default(challenge: Option<OtpChallenge>, email: &str) -> OtpChallenge {
    let mut challenge = challenge.unwrap_or_else(|| OtpChallenge {
        email: String::new(),
        expires_in_secs: 600,
    });
    if challenge.email.is_empty() {
        challenge.email = email.to_string();
    }
    challenge
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_request_wire_format() {
        let req = RegistrationRequest {
            email: "a@b.co".into(),
            full_name: "Ada".into(),
            password: "Secret123!".into(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["fullName"], "Ada");
    }

    #[test]
    fn test_challenge_defaults_to_ten_minutes() {
        let challenge = challenge_or_default(None, "a@b.co");
        assert_eq!(challenge.expires_in_secs, 600);
        assert_eq!(challenge.email, "a@b.co");
    }
}
