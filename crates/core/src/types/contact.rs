//! Shopper contact details used to prefill the hosted payment form.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing contact fields.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// Email is empty, too long, or not `local@domain`.
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    /// Phone number is not 7-15 digits with an optional leading `+`.
    #[error("invalid phone number: {0}")]
    InvalidPhone(String),
}

/// An email address with a minimal structural check.
///
/// Must be at most 254 characters and contain a non-empty local part and
/// domain separated by a single `@`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse an `Email` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::InvalidEmail`] if the input is empty, too
    /// long, or does not split into exactly one non-empty local part and
    /// domain.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        let valid = s.len() <= Self::MAX_LENGTH
            && matches!(
                s.split_once('@'),
                Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@')
            );

        if valid {
            Ok(Self(s.to_owned()))
        } else {
            Err(ContactError::InvalidEmail(s.to_owned()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A phone number normalized to digits with an optional leading `+`.
///
/// Spaces, dashes and parentheses are stripped before validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Phone(String);

impl Phone {
    /// Parse and normalize a phone number.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::InvalidPhone`] unless the number has 7 to 15
    /// digits after stripping separators.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let trimmed = s.trim();
        let (plus, rest) = trimmed
            .strip_prefix('+')
            .map_or(("", trimmed), |rest| ("+", rest));

        let digits: String = rest
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
            .collect();

        if (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
            Ok(Self(format!("{plus}{digits}")))
        } else {
            Err(ContactError::InvalidPhone(s.to_owned()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Phone {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Phone> for String {
    fn from(phone: Phone) -> Self {
        phone.0
    }
}

/// Contact details handed to the hosted payment UI as prefill.
///
/// Every field is optional; the gateway asks for whatever is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Phone>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_email_parse() {
        assert!(Email::parse("user@example.com").is_ok());
        assert!(Email::parse(" a@b.c ").is_ok());
        assert!(Email::parse("").is_err());
        assert!(Email::parse("no-at-symbol").is_err());
        assert!(Email::parse("@domain.com").is_err());
        assert!(Email::parse("user@").is_err());
        assert!(Email::parse("a@b@c").is_err());
    }

    #[test]
    fn test_phone_normalizes_separators() {
        let phone = Phone::parse("+91 98765-43210").unwrap();
        assert_eq!(phone.as_str(), "+919876543210");

        let phone = Phone::parse("(022) 2345 6789").unwrap();
        assert_eq!(phone.as_str(), "02223456789");
    }

    #[test]
    fn test_phone_rejects_short_or_alpha() {
        assert!(Phone::parse("12345").is_err());
        assert!(Phone::parse("98765abcde").is_err());
    }

    #[test]
    fn test_contact_deserialize_validates() {
        let ok: Contact =
            serde_json::from_str(r#"{"name":"Asha","email":"asha@example.com"}"#).unwrap();
        assert_eq!(ok.email.unwrap().as_str(), "asha@example.com");
        assert!(ok.contact.is_none());

        let bad = serde_json::from_str::<Contact>(r#"{"email":"nope"}"#);
        assert!(bad.is_err());
    }
}
