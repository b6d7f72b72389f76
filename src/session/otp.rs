//! Countdown shown while a registration OTP is outstanding.
//!
//! The server owns expiry; this only drives the "expires in mm:ss" display
//! and is reset whenever a code is (re)sent.

use std::time::Duration;

use tokio::time::Instant;

pub const OTP_LENGTH: usize = 6;

/// A new code may be requested once this much of the window has passed.
pub const RESEND_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct OtpCountdown {
    email: String,
    issued_at: Instant,
    validity: Duration,
}

impl OtpCountdown {
    pub fn start(email: impl Into<String>, validity: Duration) -> Self {
        Self {
            email: email.into(),
            issued_at: Instant::now(),
            validity,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Restart the window after a resend.
    pub fn restart(&mut self, validity: Duration) {
        self.issued_at = Instant::now();
        self.validity = validity;
    }

    pub fn remaining(&self) -> Duration {
        self.validity.saturating_sub(self.issued_at.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    pub fn can_resend(&self) -> bool {
        self.issued_at.elapsed() >= RESEND_COOLDOWN
    }

    /// `mm:ss` of the remaining time.
    pub fn display(&self) -> String {
        let secs = self.remaining().as_secs();
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}

/// Keep only digits, capped at the code length.
pub fn sanitize_otp_input(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit())
        .take(OTP_LENGTH)
        .collect()
}

pub fn is_complete_otp(code: &str) -> bool {
    code.len() == OTP_LENGTH && code.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_countdown_runs_down_and_restarts() {
        let mut countdown = OtpCountdown::start("a@b.co", Duration::from_secs(600));
        assert_eq!(countdown.display(), "10:00");
        assert!(!countdown.can_resend());

        tokio::time::advance(Duration::from_secs(75)).await;
        assert_eq!(countdown.display(), "8:45");
        assert!(!countdown.is_expired());
        assert!(countdown.can_resend());

        tokio::time::advance(Duration::from_secs(600)).await;
        assert!(countdown.is_expired());
        assert_eq!(countdown.display(), "0:00");

        countdown.restart(Duration::from_secs(300));
        assert_eq!(countdown.display(), "5:00");
        assert_eq!(countdown.email(), "a@b.co");
    }

    #[test]
    fn test_sanitize_otp_input() {
        assert_eq!(sanitize_otp_input("12a3-45 678"), "123456");
        assert_eq!(sanitize_otp_input("abc"), "");
    }

    #[test]
    fn test_is_complete_otp() {
        assert!(is_complete_otp("012345"));
        assert!(!is_complete_otp("12345"));
        assert!(!is_complete_otp("12345x"));
    }
}
