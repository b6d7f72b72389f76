//! Form validation for the sign-in, sign-up and profile forms.
//!
//! Rules run in a fixed order per field and stop at the first failure, so
//! each field reports at most one message.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

static LOWERCASE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]").unwrap());
static UPPERCASE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z]").unwrap());
static DIGIT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").unwrap());
static SPECIAL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[!@#$%^&*(),.?":{}|<>]"#).unwrap());

const MIN_PASSWORD_LENGTH: usize = 8;

/// Checks for one form field.
#[derive(Debug, Clone, Default)]
pub struct FieldRule {
    label: Option<String>,
    required: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<(Regex, Option<String>)>,
    email: bool,
    confirm: Option<(String, Option<String>)>,
}

impl FieldRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    /// Value must match `pattern`; `message` replaces the generic one.
    pub fn pattern(mut self, pattern: Regex, message: Option<&str>) -> Self {
        self.pattern = Some((pattern, message.map(str::to_string)));
        self
    }

    pub fn email(mut self) -> Self {
        self.email = true;
        self
    }

    /// Value must equal the field named `other`.
    pub fn confirm(mut self, other: impl Into<String>, other_label: Option<&str>) -> Self {
        self.confirm = Some((other.into(), other_label.map(str::to_string)));
        self
    }

    fn check(&self, field: &str, value: &str, data: &BTreeMap<String, String>) -> Option<String> {
        let label = self.label.as_deref().unwrap_or(field);
        let present = !value.is_empty();
        let length = value.chars().count();

        if self.required && value.trim().is_empty() {
            return Some(format!("{} is required", label));
        }
        if present && let Some(min) = self.min_length.filter(|min| length < *min) {
            return Some(format!("{} must be at least {} characters", label, min));
        }
        if present && let Some(max) = self.max_length.filter(|max| length > *max) {
            return Some(format!("{} must be no more than {} characters", label, max));
        }
        if present
            && let Some((pattern, message)) = &self.pattern
            && !pattern.is_match(value)
        {
            return Some(
                message
                    .clone()
                    .unwrap_or_else(|| format!("{} format is invalid", label)),
            );
        }
        if present && self.email && !validate_email(value) {
            return Some("Please enter a valid email address".to_string());
        }
        if let Some((other, other_label)) = &self.confirm
            && data.get(other).map(String::as_str).unwrap_or_default() != value
        {
            let other_label = other_label.as_deref().unwrap_or(other);
            return Some(format!("{} must match {}", label, other_label));
        }
        None
    }
}

/// Outcome of [`validate_form`]: field name to message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: BTreeMap<String, String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }
}

/// Run `rules` against `data`. Missing fields are treated as empty.
pub fn validate_form(data: &BTreeMap<String, String>, rules: &[(&str, FieldRule)]) -> ValidationResult {
    let errors = rules
        .iter()
        .filter_map(|(field, rule)| {
            let value = data.get(*field).map(String::as_str).unwrap_or_default();
            rule.check(field, value, data)
                .map(|message| (field.to_string(), message))
        })
        .collect();
    ValidationResult { errors }
}

pub fn validate_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Which password rules a candidate satisfies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordRules {
    pub min_length: bool,
    pub has_lowercase: bool,
    pub has_uppercase: bool,
    pub has_digit: bool,
    pub has_special: bool,
}

impl PasswordRules {
    fn passed(&self) -> usize {
        [
            self.min_length,
            self.has_lowercase,
            self.has_uppercase,
            self.has_digit,
            self.has_special,
        ]
        .into_iter()
        .filter(|ok| *ok)
        .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PasswordStrength {
    pub rules: PasswordRules,
    /// Fraction of rules passed, 0.0 to 1.0.
    pub strength: f32,
    /// At least eight characters and three of the five rules.
    pub is_valid: bool,
}

pub fn validate_password(password: &str) -> PasswordStrength {
    let rules = PasswordRules {
        min_length: password.chars().count() >= MIN_PASSWORD_LENGTH,
        has_lowercase: LOWERCASE_REGEX.is_match(password),
        has_uppercase: UPPERCASE_REGEX.is_match(password),
        has_digit: DIGIT_REGEX.is_match(password),
        has_special: SPECIAL_REGEX.is_match(password),
    };
    let passed = rules.passed();
    PasswordStrength {
        rules,
        strength: passed as f32 / 5.0,
        is_valid: rules.min_length && passed >= 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn signup_rules() -> Vec<(&'static str, FieldRule)> {
        vec![
            ("fullName", FieldRule::new().label("Full name").required().min_length(2).max_length(50)),
            ("email", FieldRule::new().label("Email").required().email()),
            (
                "confirmPassword",
                FieldRule::new()
                    .label("Confirm password")
                    .required()
                    .confirm("password", Some("Password")),
            ),
        ]
    }

    #[test]
    fn test_required_fields_report_label() {
        let result = validate_form(&form(&[]), &signup_rules());
        assert!(!result.is_valid());
        assert_eq!(result.error("fullName"), Some("Full name is required"));
        assert_eq!(result.error("email"), Some("Email is required"));
    }

    #[test]
    fn test_length_and_email_messages() {
        let data = form(&[
            ("fullName", "A"),
            ("email", "not-an-email"),
            ("password", "Secret123!"),
            ("confirmPassword", "Secret123?"),
        ]);
        let result = validate_form(&data, &signup_rules());
        assert_eq!(result.error("fullName"), Some("Full name must be at least 2 characters"));
        assert_eq!(result.error("email"), Some("Please enter a valid email address"));
        assert_eq!(result.error("confirmPassword"), Some("Confirm password must match Password"));
    }

    #[test]
    fn test_valid_form_passes() {
        let data = form(&[
            ("fullName", "Ada Lovelace"),
            ("email", "ada@example.com"),
            ("password", "Secret123!"),
            ("confirmPassword", "Secret123!"),
        ]);
        assert!(validate_form(&data, &signup_rules()).is_valid());
    }

    #[test]
    fn test_max_length_and_pattern() {
        let rules = vec![
            ("bio", FieldRule::new().label("Bio").max_length(5)),
            ("otp", FieldRule::new().label("Code").pattern(Regex::new(r"^\d{6}$").unwrap(), None)),
        ];
        let result = validate_form(&form(&[("bio", "too long"), ("otp", "12ab")]), &rules);
        assert_eq!(result.error("bio"), Some("Bio must be no more than 5 characters"));
        assert_eq!(result.error("otp"), Some("Code format is invalid"));
    }

    #[test]
    fn test_password_strength() {
        let weak = validate_password("abc");
        assert!(!weak.is_valid);
        assert!((weak.strength - 0.2).abs() < f32::EPSILON);

        let long_but_plain = validate_password("abcdefgh");
        assert!(!long_but_plain.is_valid);

        let ok = validate_password("abcdefg1");
        assert!(ok.is_valid);
        assert!((ok.strength - 0.6).abs() < 1e-6);

        let strong = validate_password("Secret123!");
        assert!(strong.rules.has_special);
        assert!((strong.strength - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_email_check() {
        assert!(validate_email("a@b.co"));
        assert!(!validate_email("a b@c.io"));
        assert!(!validate_email("a@b"));
    }
}
