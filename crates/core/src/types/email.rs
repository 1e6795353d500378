//! Account email address.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why an email address was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email is required")]
    Empty,
    #[error("email must be at most {max} characters")]
    TooLong { max: usize },
    /// Not of the form `local@domain` with both sides non-empty.
    #[error("email must look like name@domain")]
    Malformed,
}

/// An email address used to sign up and sign in.
///
/// Only the shape is checked here; the auth service decides whether the
/// address is deliverable.
///
/// ```
/// use atelier_core::Email;
///
/// assert_eq!(Email::parse(" lea@atelier.fr ").unwrap().as_str(), "lea@atelier.fr");
/// assert!(Email::parse("lea@").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Parse a trimmed `local@domain` address.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError`] when the input is blank, longer than
    /// [`Self::MAX_LENGTH`], or missing either side of the `@`.
    pub fn parse(input: &str) -> Result<Self, EmailError> {
        let address = input.trim();
        if address.is_empty() {
            return Err(EmailError::Empty);
        }
        if address.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        match address.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
                Ok(Self(address.to_owned()))
            }
            _ => Err(EmailError::Malformed),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_and_trims() {
        let email = Email::parse("  camille.martin+atelier@example.fr\n").unwrap();
        assert_eq!(email.as_str(), "camille.martin+atelier@example.fr");
        assert_eq!(email.to_string(), email.as_str());
    }

    #[test]
    fn test_rejects_blank_and_oversized() {
        assert_eq!(Email::parse(" "), Err(EmailError::Empty));
        let long = format!("{}@example.fr", "a".repeat(250));
        assert_eq!(Email::parse(&long), Err(EmailError::TooLong { max: 254 }));
    }

    #[test]
    fn test_rejects_missing_side() {
        for input in ["camille", "@example.fr", "camille@"] {
            assert_eq!(Email::parse(input), Err(EmailError::Malformed), "{input}");
        }
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let email = Email::parse("lea@example.fr").unwrap();
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"lea@example.fr\"");
    }
}
