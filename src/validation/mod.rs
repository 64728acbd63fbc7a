//! Field Validation
//!
//! Stateless, pattern-based validation of wizard fields. A declarative rule
//! table maps field names to a [`FieldRule`]; fields with no rule always
//! validate clean so that optional, step-specific fields need no entry.

mod attachment;

pub use attachment::{
    AttachmentPolicy, AttachmentRejection, DEFAULT_ALLOWED_MIME_TYPES, DEFAULT_MAX_ATTACHMENT_BYTES,
};

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;
use wizard_types::FieldValue;

// =============================================================================
// PATTERNS
// =============================================================================

/// PAN style tax id: 5 letters, 4 digits, 1 letter
static TAX_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").expect("tax id pattern"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

static POSTAL_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6}$").expect("postal code pattern"));

const NATIONAL_ID_DIGITS: usize = 12;
const PHONE_DIGITS: usize = 10;
const MIN_NAME_LEN: usize = 3;
const MIN_ADDRESS_LEN: usize = 10;

// =============================================================================
// RULES
// =============================================================================

/// Validation rule applied to a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRule {
    /// PAN style identity number, case-insensitive
    TaxId,
    /// Aadhaar style 12 digit number, whitespace ignored
    NationalId,
    /// 10 digit mobile number, separators ignored
    Phone,
    Email,
    /// Person name, at least 3 characters
    PersonName,
    /// Postal address, at least 10 characters
    Address,
    /// 6 digit PIN code
    PostalCode,
    /// Amount that parses as a number greater than zero
    PositiveAmount,
    /// `YYYY-MM-DD`, not in the future
    Date,
    /// Any non-empty value
    Required,
    /// Declaration checkbox that must be ticked
    Consent,
}

/// Built-in rule table shared by all service forms.
const BUILTIN_RULES: &[(&str, FieldRule)] = &[
    ("pan", FieldRule::TaxId),
    ("pan_number", FieldRule::TaxId),
    ("aadhaar", FieldRule::NationalId),
    ("aadhaar_number", FieldRule::NationalId),
    ("phone", FieldRule::Phone),
    ("mobile", FieldRule::Phone),
    ("email", FieldRule::Email),
    ("name", FieldRule::PersonName),
    ("full_name", FieldRule::PersonName),
    ("father_name", FieldRule::PersonName),
    ("nominee_name", FieldRule::PersonName),
    ("address", FieldRule::Address),
    ("permanent_address", FieldRule::Address),
    ("correspondence_address", FieldRule::Address),
    ("pincode", FieldRule::PostalCode),
    ("postal_code", FieldRule::PostalCode),
    ("amount", FieldRule::PositiveAmount),
    ("annual_income", FieldRule::PositiveAmount),
    ("withdrawal_amount", FieldRule::PositiveAmount),
    ("date_of_birth", FieldRule::Date),
    ("declaration", FieldRule::Consent),
];

impl FieldRule {
    /// Check a value against this rule. `None` means the field is absent.
    pub fn check(self, value: Option<&FieldValue>) -> Option<String> {
        match self {
            FieldRule::Required => {
                let present = match value {
                    Some(FieldValue::Attachment(_)) | Some(FieldValue::Flag(_)) => true,
                    Some(v) => v.as_raw().is_some_and(|s| !s.trim().is_empty()),
                    None => false,
                };
                (!present).then(|| "This field is required".to_string())
            }
            FieldRule::Consent => match value {
                Some(FieldValue::Flag(true)) => None,
                _ => Some("Please accept the declaration to continue".to_string()),
            },
            FieldRule::Date => check_date(value),
            rule => {
                let raw = value.and_then(FieldValue::as_raw).unwrap_or_default();
                rule.check_text(&raw)
            }
        }
    }

    fn check_text(self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        match self {
            FieldRule::TaxId => {
                if trimmed.is_empty() {
                    Some("PAN number is required".into())
                } else if !TAX_ID_RE.is_match(&trimmed.to_uppercase()) {
                    Some("Enter a valid PAN (e.g. ABCDE1234F)".into())
                } else {
                    None
                }
            }
            FieldRule::NationalId => {
                let digits: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
                if digits.is_empty() {
                    Some("Aadhaar number is required".into())
                } else if digits.len() != NATIONAL_ID_DIGITS
                    || !digits.chars().all(|c| c.is_ascii_digit())
                {
                    Some("Aadhaar number must be 12 digits".into())
                } else {
                    None
                }
            }
            FieldRule::Phone => {
                let digits = digits_only(raw);
                if trimmed.is_empty() {
                    Some("Mobile number is required".into())
                } else if digits.len() != PHONE_DIGITS {
                    Some("Enter a valid 10-digit mobile number".into())
                } else {
                    None
                }
            }
            FieldRule::Email => {
                if trimmed.is_empty() {
                    Some("Email is required".into())
                } else if !EMAIL_RE.is_match(trimmed) {
                    Some("Enter a valid email address".into())
                } else {
                    None
                }
            }
            FieldRule::PersonName => min_len(trimmed, MIN_NAME_LEN, "Name"),
            FieldRule::Address => min_len(trimmed, MIN_ADDRESS_LEN, "Address"),
            FieldRule::PostalCode => {
                if trimmed.is_empty() {
                    Some("PIN code is required".into())
                } else if !POSTAL_CODE_RE.is_match(trimmed) {
                    Some("PIN code must be 6 digits".into())
                } else {
                    None
                }
            }
            FieldRule::PositiveAmount => {
                let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
                if cleaned.is_empty() {
                    return Some("Amount is required".into());
                }
                match Decimal::from_str(&cleaned) {
                    Ok(amount) if amount > Decimal::ZERO => None,
                    Ok(_) => Some("Amount must be greater than zero".into()),
                    Err(_) => Some("Enter a valid amount".into()),
                }
            }
            FieldRule::Date | FieldRule::Required | FieldRule::Consent => None,
        }
    }

    /// Canonical form of a raw value under this rule
    pub fn normalize(self, raw: &str) -> String {
        match self {
            FieldRule::TaxId => raw.trim().to_uppercase(),
            FieldRule::NationalId => raw.chars().filter(|c| !c.is_whitespace()).collect(),
            FieldRule::Phone => digits_only(raw),
            FieldRule::PositiveAmount => raw.trim().chars().filter(|c| *c != ',').collect(),
            _ => raw.trim().to_string(),
        }
    }
}

fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn min_len(trimmed: &str, min: usize, label: &str) -> Option<String> {
    if trimmed.is_empty() {
        Some(format!("{label} is required"))
    } else if trimmed.chars().count() < min {
        Some(format!("{label} must be at least {min} characters"))
    } else {
        None
    }
}

fn check_date(value: Option<&FieldValue>) -> Option<String> {
    let date = match value {
        Some(FieldValue::Date(d)) => *d,
        Some(FieldValue::Text(s)) if !s.trim().is_empty() => {
            match chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
                Ok(d) => d,
                Err(_) => return Some("Use YYYY-MM-DD format".into()),
            }
        }
        _ => return Some("Date is required".into()),
    };
    if date > chrono::Utc::now().date_naive() {
        Some("Date cannot be in the future".into())
    } else {
        None
    }
}

// =============================================================================
// VALIDATOR
// =============================================================================

/// Maps field names to rules and validates values against them.
#[derive(Debug, Clone)]
pub struct FieldValidator {
    rules: HashMap<String, FieldRule>,
}

impl Default for FieldValidator {
    fn default() -> Self {
        Self {
            rules: BUILTIN_RULES
                .iter()
                .map(|(name, rule)| (name.to_string(), *rule))
                .collect(),
        }
    }
}

impl FieldValidator {
    /// Validator with no rules at all
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Add or override rules on top of the current table
    pub fn with_rules<I, K>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldRule)>,
        K: Into<String>,
    {
        self.rules
            .extend(rules.into_iter().map(|(k, r)| (k.into(), r)));
        self
    }

    /// Rule for a field, if any
    pub fn rule_for(&self, field: &str) -> Option<FieldRule> {
        self.rules.get(field).copied()
    }

    /// Validate a field value. `None` means valid; fields without a rule are
    /// always valid.
    pub fn validate(&self, field: &str, value: Option<&FieldValue>) -> Option<String> {
        self.rule_for(field)?.check(value)
    }

    /// Validate a raw text input
    pub fn validate_raw(&self, field: &str, raw: &str) -> Option<String> {
        self.validate(field, Some(&FieldValue::text(raw)))
    }

    /// Canonical form of a raw value (upper-cased PAN, digits-only phone...)
    pub fn normalize(&self, field: &str, raw: &str) -> String {
        match self.rule_for(field) {
            Some(rule) => rule.normalize(raw),
            None => raw.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v() -> FieldValidator {
        FieldValidator::default()
    }

    #[test]
    fn test_tax_id_case_normalized() {
        assert_eq!(v().validate_raw("pan_number", "abcde1234f"), None);
        assert_eq!(v().normalize("pan_number", " abcde1234f "), "ABCDE1234F");
    }

    #[test]
    fn test_tax_id_four_letters_rejected() {
        assert!(v().validate_raw("pan_number", "ABCD1234F").is_some());
        assert!(v().validate_raw("pan", "").is_some());
    }

    #[test]
    fn test_phone_strips_separators() {
        assert_eq!(v().validate_raw("phone", "98-765 43210"), None);
        assert_eq!(v().normalize("phone", "98-765 43210"), "9876543210");
        assert!(v().validate_raw("phone", "987654321").is_some());
    }

    #[test]
    fn test_national_id_whitespace() {
        assert_eq!(v().validate_raw("aadhaar_number", "1234 5678 9012"), None);
        assert!(v().validate_raw("aadhaar_number", "1234 5678 901").is_some());
        assert!(v().validate_raw("aadhaar_number", "1234 5678 901a").is_some());
    }

    #[test]
    fn test_email_shape() {
        assert_eq!(v().validate_raw("email", "asha@example.in"), None);
        assert!(v().validate_raw("email", "asha@example").is_some());
        assert!(v().validate_raw("email", "asha example.in").is_some());
    }

    #[test]
    fn test_name_and_address_thresholds() {
        assert!(v().validate_raw("full_name", "   ").is_some());
        assert!(v().validate_raw("full_name", "Al").is_some());
        assert_eq!(v().validate_raw("full_name", "Ali"), None);
        assert!(v().validate_raw("address", "12 MG Rd").is_some());
        assert_eq!(v().validate_raw("address", "12 MG Road, Pune"), None);
    }

    #[test]
    fn test_postal_code() {
        assert_eq!(v().validate_raw("pincode", "411001"), None);
        assert!(v().validate_raw("pincode", "41100").is_some());
    }

    #[test]
    fn test_amount_positive() {
        assert_eq!(v().validate_raw("amount", "1,50,000"), None);
        assert_eq!(v().validate_raw("amount", "0.5"), None);
        assert!(v().validate_raw("amount", "0").is_some());
        assert!(v().validate_raw("amount", "-10").is_some());
        assert!(v().validate_raw("amount", "ten").is_some());
    }

    #[test]
    fn test_unknown_field_always_valid() {
        assert_eq!(v().validate_raw("favourite_colour", ""), None);
        assert_eq!(v().validate("favourite_colour", None), None);
    }

    #[test]
    fn test_absent_value_fails_rule() {
        assert!(v().validate("email", None).is_some());
    }

    #[test]
    fn test_consent_requires_true() {
        assert!(v().validate("declaration", Some(&FieldValue::Flag(false))).is_some());
        assert_eq!(v().validate("declaration", Some(&FieldValue::Flag(true))), None);
    }

    #[test]
    fn test_date_rule() {
        assert_eq!(v().validate_raw("date_of_birth", "1990-04-12"), None);
        assert!(v().validate_raw("date_of_birth", "12/04/1990").is_some());
        assert!(v().validate_raw("date_of_birth", "2999-01-01").is_some());
    }

    #[test]
    fn test_override_rules() {
        let validator = FieldValidator::empty().with_rules([("uan", FieldRule::Required)]);
        assert!(validator.validate_raw("uan", " ").is_some());
        assert_eq!(validator.validate_raw("pan", "x"), None);
    }
}
