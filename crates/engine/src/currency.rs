use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Reference data for a single currency: display symbol and how many decimal
/// digits its minor unit uses.
struct CurrencyInfo {
    code: &'static str,
    symbol: &'static str,
    minor_units: u8,
}

/// Built-in currency table. Codes not listed here are still accepted and fall
/// back to 2 fraction digits with the code itself as symbol.
const CURRENCIES: &[CurrencyInfo] = &[
    CurrencyInfo { code: "USD", symbol: "$", minor_units: 2 },
    CurrencyInfo { code: "EUR", symbol: "€", minor_units: 2 },
    CurrencyInfo { code: "GBP", symbol: "£", minor_units: 2 },
    CurrencyInfo { code: "CHF", symbol: "CHF", minor_units: 2 },
    CurrencyInfo { code: "JPY", symbol: "¥", minor_units: 0 },
    CurrencyInfo { code: "KRW", symbol: "₩", minor_units: 0 },
    CurrencyInfo { code: "CNY", symbol: "¥", minor_units: 2 },
    CurrencyInfo { code: "INR", symbol: "₹", minor_units: 2 },
    CurrencyInfo { code: "PLN", symbol: "zł", minor_units: 2 },
    CurrencyInfo { code: "CZK", symbol: "Kč", minor_units: 2 },
    CurrencyInfo { code: "SEK", symbol: "kr", minor_units: 2 },
    CurrencyInfo { code: "NOK", symbol: "kr", minor_units: 2 },
    CurrencyInfo { code: "DKK", symbol: "kr", minor_units: 2 },
    CurrencyInfo { code: "UAH", symbol: "₴", minor_units: 2 },
    CurrencyInfo { code: "TRY", symbol: "₺", minor_units: 2 },
    CurrencyInfo { code: "BHD", symbol: ".د.ب", minor_units: 3 },
    CurrencyInfo { code: "KWD", symbol: "د.ك", minor_units: 3 },
    CurrencyInfo { code: "BTC", symbol: "BTC", minor_units: 8 },
    CurrencyInfo { code: "ETH", symbol: "ETH", minor_units: 8 },
];

/// Fraction digits used for codes the table does not know.
const DEFAULT_MINOR_UNITS: u8 = 2;

/// ISO-like currency code attached to accounts and money values.
///
/// ## Minor units
///
/// The engine stores monetary values as an `i64` number of **minor units**
/// (see `Amount`). `minor_units()` returns how many decimal digits are used
/// when converting between:
/// - major units (human input/output, e.g. `10.50 EUR`)
/// - minor units (stored integers, e.g. `1050`)
///
/// The count varies per currency: JPY has 0, EUR has 2, BTC has 8. Unknown
/// codes default to 2 and display with the code itself as symbol.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Canonical currency code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Display symbol, falling back to the code for unknown currencies.
    #[must_use]
    pub fn symbol(&self) -> &str {
        self.info().map_or(self.code(), |info| info.symbol)
    }

    /// Number of fraction digits used when formatting/parsing amounts.
    #[must_use]
    pub fn minor_units(&self) -> u8 {
        self.info().map_or(DEFAULT_MINOR_UNITS, |info| info.minor_units)
    }

    fn info(&self) -> Option<&'static CurrencyInfo> {
        CURRENCIES.iter().find(|info| info.code == self.0)
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = EngineError;

    /// Normalizes a code to uppercase ASCII. Codes must be 2-6 ASCII
    /// letters; anything else is rejected rather than silently stored.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let code = value.trim().to_ascii_uppercase();
        if !(2..=6).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(EngineError::CurrencyMismatch(format!(
                "invalid currency code: {value}"
            )));
        }
        Ok(Currency(code))
    }
}
