//! Cross-currency conversion.
//!
//! A cross-currency transfer carries a triple (source amount, exchange rate,
//! destination amount). Exactly one of the three is "last edited" by the
//! caller and drives recomputation of the dependent field:
//!
//! - edited destination amount → the rate is recomputed
//! - edited amount or rate → the destination amount is recomputed
//!
//! [`derive_third_value`] is pure; tracking *which* field changed most
//! recently is caller state, not conversion state. All arithmetic is integer
//! fixed-point (i128 intermediates, half-up rounding), matching the
//! minor-unit representation used everywhere else in the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Amount, Currency, EngineError, money::pow10};

/// Fraction digits of an exchange rate: rates are stored as integer
/// **micro-units** (`0.850000` ⇄ `850000`).
pub const RATE_SCALE: i64 = 1_000_000;

/// A recomputed rate only replaces the stored one when it moves by more than
/// this many micro-units, so rounding noise from rapid bidirectional edits
/// does not flicker the stored value.
pub const RATE_EPSILON_MICRO: i64 = 1;

/// Exchange rate as integer micro-units (6 fraction digits).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Rate(i64);

impl Rate {
    /// Creates a rate from integer micro-units.
    #[must_use]
    pub const fn new(micros: i64) -> Self {
        Self(micros)
    }

    /// Returns the raw micro-unit value.
    #[must_use]
    pub const fn micros(self) -> i64 {
        self.0
    }

    /// Returns `true` if the rate is usable for conversion.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Parses a decimal rate string, rounding beyond 6 fraction digits.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        Amount::parse(s, 6).map(|amount| Rate(amount.minor()))
    }
}

impl fmt::Display for Rate {
    /// Always renders the full 6 fraction digits, e.g. `0.900000`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Amount::new(self.0).format(6))
    }
}

/// Which member of the (amount, rate, destination amount) triple the user
/// edited last.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditedField {
    Amount,
    Rate,
    DestinationAmount,
}

/// The (source amount, exchange rate, destination amount) triple of a
/// transfer form. `rate` and `destination_amount` are absent for
/// same-currency transfers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConversionTriple {
    pub amount: Amount,
    pub rate: Option<Rate>,
    pub destination_amount: Option<Amount>,
}

/// Converts a source amount to the destination currency's minor units.
pub fn convert_amount(
    amount: Amount,
    rate: Rate,
    source: &Currency,
    destination: &Currency,
) -> Result<Amount, EngineError> {
    let numerator = i128::from(amount.minor())
        * i128::from(rate.micros())
        * i128::from(pow10(destination.minor_units()));
    let denominator = i128::from(pow10(source.minor_units())) * i128::from(RATE_SCALE);
    let minor = i64::try_from(div_round_half_up(numerator, denominator))
        .map_err(|_| EngineError::InvalidAmount("amount too large".to_string()))?;
    Ok(Amount::new(minor))
}

/// Derives the exchange rate implied by a pair of amounts.
pub fn rate_from_amounts(
    amount: Amount,
    destination_amount: Amount,
    source: &Currency,
    destination: &Currency,
) -> Result<Rate, EngineError> {
    if !amount.is_positive() {
        return Err(EngineError::InvalidAmount(
            "amount must be > 0".to_string(),
        ));
    }
    let numerator = i128::from(destination_amount.minor())
        * i128::from(pow10(source.minor_units()))
        * i128::from(RATE_SCALE);
    let denominator =
        i128::from(amount.minor()) * i128::from(pow10(destination.minor_units()));
    let micros = i64::try_from(div_round_half_up(numerator, denominator))
        .map_err(|_| EngineError::InvalidAmount("rate too large".to_string()))?;
    Ok(Rate::new(micros))
}

/// Checks that a stored triple reconciles: the destination amount must match
/// `amount × rate` within one destination minor unit (rounding slack).
pub fn reconciles(
    amount: Amount,
    rate: Rate,
    destination_amount: Amount,
    source: &Currency,
    destination: &Currency,
) -> Result<bool, EngineError> {
    let expected = convert_amount(amount, rate, source, destination)?;
    Ok((expected.minor() - destination_amount.minor()).abs() <= 1)
}

/// Recomputes the dependent member of the triple from whichever field was
/// edited last.
///
/// Same-currency pairs bypass derivation entirely: the destination amount
/// mirrors the source amount and the rate is cleared. Otherwise the dependent
/// field is recomputed at the destination currency's precision, and a
/// recomputed rate only overwrites the stored one when the delta exceeds
/// [`RATE_EPSILON_MICRO`].
pub fn derive_third_value(
    triple: &ConversionTriple,
    edited: EditedField,
    source: &Currency,
    destination: &Currency,
) -> Result<ConversionTriple, EngineError> {
    if !triple.amount.is_positive() {
        return Err(EngineError::InvalidAmount(
            "amount must be > 0".to_string(),
        ));
    }

    if source == destination {
        return Ok(ConversionTriple {
            amount: triple.amount,
            rate: None,
            destination_amount: Some(triple.amount),
        });
    }

    match edited {
        EditedField::Amount | EditedField::Rate => {
            let rate = triple.rate.ok_or_else(|| {
                EngineError::InvalidAmount("exchange rate required".to_string())
            })?;
            if !rate.is_positive() {
                return Err(EngineError::InvalidAmount(
                    "exchange rate must be > 0".to_string(),
                ));
            }
            let destination_amount = convert_amount(triple.amount, rate, source, destination)?;
            Ok(ConversionTriple {
                amount: triple.amount,
                rate: Some(rate),
                destination_amount: Some(destination_amount),
            })
        }
        EditedField::DestinationAmount => {
            let destination_amount = triple.destination_amount.ok_or_else(|| {
                EngineError::InvalidAmount("destination amount required".to_string())
            })?;
            if !destination_amount.is_positive() {
                return Err(EngineError::InvalidAmount(
                    "destination amount must be > 0".to_string(),
                ));
            }
            let recomputed = rate_from_amounts(triple.amount, destination_amount, source, destination)?;
            let rate = match triple.rate {
                Some(stored) if (recomputed.micros() - stored.micros()).abs() <= RATE_EPSILON_MICRO => {
                    stored
                }
                _ => recomputed,
            };
            Ok(ConversionTriple {
                amount: triple.amount,
                rate: Some(rate),
                destination_amount: Some(destination_amount),
            })
        }
    }
}

fn div_round_half_up(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator.div_euclid(denominator);
    let remainder = numerator.rem_euclid(denominator);
    if remainder * 2 >= denominator {
        quotient + 1
    } else {
        quotient
    }
}
