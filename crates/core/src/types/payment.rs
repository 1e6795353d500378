//! Card-format validation for the checkout card sub-form.
//!
//! This is format checking only. There is no Luhn checksum and no payment
//! authorization; the storefront does not talk to a payment gateway.

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing [`CardDetails`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CardError {
    /// One of number, expiry or CVV is blank.
    #[error("card number, expiry and CVV are required")]
    MissingFields,
    /// Number is not 13-19 digits once separators are removed.
    #[error("card number must be {min}-{max} digits")]
    InvalidNumber {
        /// Minimum digit count.
        min: usize,
        /// Maximum digit count.
        max: usize,
    },
    /// Expiry is not `MM/YY` or `MM/YYYY`.
    #[error("expiry must be MM/YY or MM/YYYY")]
    InvalidExpiry,
    /// CVV is shorter than 3 digits or not numeric.
    #[error("CVV must be at least 3 digits")]
    InvalidCvv,
}

/// Card fields that passed format validation.
///
/// Never persisted: only the payment method tag is written to the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    number: String,
    expiry_month: u8,
    expiry_year: u16,
}

impl CardDetails {
    /// Minimum card number length in digits.
    pub const MIN_DIGITS: usize = 13;
    /// Maximum card number length in digits.
    pub const MAX_DIGITS: usize = 19;
    /// Minimum CVV length in digits.
    pub const MIN_CVV_DIGITS: usize = 3;

    /// Validate raw card form input.
    ///
    /// Spaces and dashes in the number are treated as separators.
    ///
    /// # Errors
    ///
    /// Returns [`CardError`] naming the first field that fails, in the order
    /// presence, number, expiry, CVV.
    pub fn parse(number: &str, expiry: &str, cvv: &str) -> Result<Self, CardError> {
        let (number, expiry, cvv) = (number.trim(), expiry.trim(), cvv.trim());
        if number.is_empty() || expiry.is_empty() || cvv.is_empty() {
            return Err(CardError::MissingFields);
        }

        let digits: String = number
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len())
            || !digits.chars().all(|c| c.is_ascii_digit())
        {
            return Err(CardError::InvalidNumber {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
            });
        }

        let (expiry_month, expiry_year) = parse_expiry(expiry).ok_or(CardError::InvalidExpiry)?;

        if cvv.len() < Self::MIN_CVV_DIGITS || !cvv.chars().all(|c| c.is_ascii_digit())
        {
            return Err(CardError::InvalidCvv);
        }

        Ok(Self {
            number: digits,
            expiry_month,
            expiry_year,
        })
    }

    /// Last four digits, for confirmations and logs.
    #[must_use]
    pub fn last4(&self) -> &str {
        let start = self.number.len().saturating_sub(4);
        self.number.get(start..).unwrap_or_default()
    }

    /// Expiry as `(month, year)`, the year as typed (`28` or `2028`).
    #[must_use]
    pub const fn expiry(&self) -> (u8, u16) {
        (self.expiry_month, self.expiry_year)
    }
}

/// Parse `MM/YY` or `MM/YYYY` (month 01-12). Dates are not compared.
fn parse_expiry(expiry: &str) -> Option<(u8, u16)> {
    let (month, year) = expiry.split_once('/')?;
    let (month, year) = (month.trim(), year.trim());
    if month.len() != 2 || !matches!(year.len(), 2 | 4) {
        return None;
    }
    if !month.chars().chain(year.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let month: u8 = month.parse().ok()?;
    let year: u16 = year.parse().ok()?;
    (1..=12).contains(&month).then_some((month, year))
}
