use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport envelope used by every backend response:
/// `{"success": bool, "data": ..., "message": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    /// Field-level validation messages, present on 4xx validation failures.
    #[serde(default)]
    pub errors: Vec<FieldError>,
}

fn default_success() -> bool {
    true
}

/// A single field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Why an envelope could not be unwrapped into its payload.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EnvelopeError {
    #[error("{message}")]
    Rejected {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("Response envelope carried no data")]
    MissingData,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: Vec::new(),
        }
    }

    /// Unwrap the payload, turning `success: false` into a rejection that
    /// carries the server message verbatim.
    pub fn into_data(self) -> Result<T, EnvelopeError> {
        if !self.success {
            return Err(EnvelopeError::Rejected {
                message: self
                    .message
                    .unwrap_or_else(|| "Request was rejected".to_string()),
                errors: self.errors,
            });
        }
        self.data.ok_or(EnvelopeError::MissingData)
    }
}

impl Envelope<serde_json::Value> {
    /// Unwrap for endpoints whose payload is optional (acknowledgements).
    pub fn into_ack(self) -> Result<Option<String>, EnvelopeError> {
        if !self.success {
            return Err(EnvelopeError::Rejected {
                message: self
                    .message
                    .unwrap_or_else(|| "Request was rejected".to_string()),
                errors: self.errors,
            });
        }
        Ok(self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_unwraps_data() {
        let json = r#"{"success":true,"data":{"n":3},"message":"ok"}"#;
        let env: Envelope<serde_json::Value> = serde_json::from_str(json).unwrap();
        assert_eq!(env.into_data().unwrap()["n"], 3);
    }

    #[test]
    fn test_missing_success_flag_defaults_to_true() {
        let env: Envelope<u32> = serde_json::from_str(r#"{"data":7}"#).unwrap();
        assert_eq!(env.into_data().unwrap(), 7);
    }

    #[test]
    fn test_failed_envelope_keeps_message_verbatim() {
        let json = r#"{"success":false,"message":"Invalid email or password"}"#;
        let env: Envelope<serde_json::Value> = serde_json::from_str(json).unwrap();
        match env.into_data() {
            Err(EnvelopeError::Rejected { message, errors }) => {
                assert_eq!(message, "Invalid email or password");
                assert!(errors.is_empty());
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }

    #[test]
    fn test_field_errors_are_carried() {
        let json = r#"{"success":false,"message":"Validation failed",
            "errors":[{"field":"email","message":"Email already registered"}]}"#;
        let env: Envelope<serde_json::Value> = serde_json::from_str(json).unwrap();
        let err = env.into_data().unwrap_err();
        match err {
            EnvelopeError::Rejected { errors, .. } => {
                assert_eq!(errors[0].field, "email");
            }
            _ => panic!("Expected Rejected"),
        }
    }

    #[test]
    fn test_success_without_data_is_missing_data() {
        let env: Envelope<u32> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert_eq!(env.into_data(), Err(EnvelopeError::MissingData));
    }

    #[test]
    fn test_ack_returns_message() {
        let env: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"success":true,"message":"OTP sent"}"#).unwrap();
        assert_eq!(env.into_ack().unwrap().as_deref(), Some("OTP sent"));
    }
}
