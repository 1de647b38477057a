use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError};

/// Signed money amount represented as **integer minor units**.
///
/// Use this type for **all** monetary values in the engine (balances, amounts,
/// adjustment deltas) to avoid floating-point drift. How many decimal digits a
/// minor unit carries depends on the currency (0 for JPY, 2 for EUR, 8 for
/// BTC), so parsing and formatting take the precision as input instead of
/// hard-coding cents.
///
/// The value is signed:
/// - positive = income / increase
/// - negative = expense / decrease
///
/// # Examples
///
/// ```rust
/// use engine::Amount;
///
/// let amount = Amount::new(12_34);
/// assert_eq!(amount.minor(), 1234);
/// assert_eq!(amount.format(2), "12.34");
/// ```
///
/// Parsing from user input (accepts `.` or `,` as decimal separator; digits
/// beyond the precision round half-up):
///
/// ```rust
/// use engine::Amount;
///
/// assert_eq!(Amount::parse("10", 2).unwrap().minor(), 1000);
/// assert_eq!(Amount::parse("10,5", 2).unwrap().minor(), 1050);
/// assert_eq!(Amount::parse("0.123456785", 8).unwrap().minor(), 12345679);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Amount(i64);

/// Largest per-currency precision the engine supports (BTC-style).
pub const MAX_MINOR_UNITS: u8 = 8;

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Creates a new amount from integer minor units.
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// Parses a decimal string into minor units at the given precision.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading
    /// `+`/`-`. Fraction digits beyond `minor_units` round half-up (so a BTC
    /// input of `0.123456785` becomes `12345679` at 8 digits).
    pub fn parse(s: &str, minor_units: u8) -> Result<Self, EngineError> {
        let empty = || EngineError::InvalidAmount("empty amount".to_string());
        let invalid = || EngineError::InvalidAmount("invalid amount".to_string());
        let overflow = || EngineError::InvalidAmount("amount too large".to_string());

        if minor_units > MAX_MINOR_UNITS {
            return Err(EngineError::InvalidAmount(format!(
                "unsupported precision: {minor_units}"
            )));
        }

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(empty());
        }

        let (sign, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (-1i64, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (1i64, stripped)
        } else {
            (1i64, trimmed)
        };

        let rest = rest.trim();
        if rest.is_empty() {
            return Err(empty());
        }

        let rest = rest.replace(',', ".");
        let mut parts = rest.split('.');
        let whole_str = parts.next().ok_or_else(invalid)?;
        let frac_str = parts.next().unwrap_or("");
        if parts.next().is_some() {
            return Err(invalid());
        }

        if whole_str.is_empty() && frac_str.is_empty() {
            return Err(invalid());
        }
        if !whole_str.chars().all(|c| c.is_ascii_digit())
            || !frac_str.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: i64 = if whole_str.is_empty() {
            0
        } else {
            whole_str.parse().map_err(|_| invalid())?
        };

        let scale = pow10(minor_units);
        let mut frac: i64 = 0;
        let mut round_up = false;
        for (index, c) in frac_str.chars().enumerate() {
            let digit = i64::from(c as u8 - b'0');
            if index < usize::from(minor_units) {
                frac = frac * 10 + digit;
            } else {
                if index == usize::from(minor_units) && digit >= 5 {
                    round_up = true;
                }
                // Remaining digits only matter through the first dropped one.
            }
        }
        // Scale short fractions up to the full precision.
        let missing = usize::from(minor_units).saturating_sub(frac_str.len());
        for _ in 0..missing {
            frac *= 10;
        }
        if round_up {
            frac += 1;
        }

        let total = whole
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(overflow)?;

        let signed = if sign < 0 {
            total.checked_neg().ok_or_else(overflow)?
        } else {
            total
        };

        Ok(Amount(signed))
    }

    /// Formats the amount as a plain decimal string at the given precision.
    #[must_use]
    pub fn format(self, minor_units: u8) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        if minor_units == 0 {
            return format!("{sign}{abs}");
        }
        let scale = pow10(minor_units) as u64;
        let whole = abs / scale;
        let frac = abs % scale;
        format!(
            "{sign}{whole}.{frac:0width$}",
            width = usize::from(minor_units)
        )
    }

    /// Formats the amount followed by the currency symbol, e.g. `85.00 €` or
    /// `0.12345679 BTC`.
    #[must_use]
    pub fn display_with(self, currency: &Currency) -> String {
        format!("{} {}", self.format(currency.minor_units()), currency.symbol())
    }
}

pub(crate) fn pow10(digits: u8) -> i64 {
    10i64.pow(u32::from(digits))
}

impl fmt::Display for Amount {
    /// Displays the raw minor-unit count; use [`Amount::format`] for
    /// currency-aware output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Amount> for i64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        self.0 -= rhs.0;
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Self::Output {
        Amount(-self.0)
    }
}
