//! Money type in integer minor units with currency.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Ledger amounts are whole minor units (cents for USD, yen for JPY);
//! only exchange rates carry fractional precision (`rust_decimal::Decimal`).

use serde::{Deserialize, Serialize};

/// Represents a monetary amount with currency.
///
/// The amount is signed: ledger CREDIT legs are positive, DEBIT legs negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// The amount in the smallest currency unit (e.g., cents).
    pub amount: i64,
    /// ISO 4217 currency code.
    pub currency: Currency,
}

/// ISO 4217 currency codes supported by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US Dollar
    Usd,
    /// Euro
    Eur,
    /// Pound Sterling
    Gbp,
    /// Canadian Dollar
    Cad,
    /// Australian Dollar
    Aud,
    /// New Zealand Dollar
    Nzd,
    /// Swiss Franc
    Chf,
    /// Swedish Krona
    Sek,
    /// Danish Krone
    Dkk,
    /// Norwegian Krone
    Nok,
    /// Mexican Peso
    Mxn,
    /// Brazilian Real
    Brl,
    /// Indian Rupee
    Inr,
    /// Indonesian Rupiah
    Idr,
    /// Singapore Dollar
    Sgd,
    /// Japanese Yen
    Jpy,
    /// South Korean Won
    Krw,
}

impl Currency {
    /// Returns the ISO 4217 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Cad => "CAD",
            Self::Aud => "AUD",
            Self::Nzd => "NZD",
            Self::Chf => "CHF",
            Self::Sek => "SEK",
            Self::Dkk => "DKK",
            Self::Nok => "NOK",
            Self::Mxn => "MXN",
            Self::Brl => "BRL",
            Self::Inr => "INR",
            Self::Idr => "IDR",
            Self::Sgd => "SGD",
            Self::Jpy => "JPY",
            Self::Krw => "KRW",
        }
    }

    /// Number of decimal places of the minor unit (ISO 4217 exponent).
    #[must_use]
    pub const fn decimal_places(self) -> u32 {
        match self {
            Self::Jpy | Self::Krw => 0,
            _ => 2,
        }
    }
}

impl Money {
    /// Creates a new Money instance.
    #[must_use]
    pub const fn new(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates a zero amount in the specified currency.
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self {
            amount: 0,
            currency,
        }
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Returns true if the amount is negative.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.amount < 0
    }

    /// Returns the same amount with the opposite sign.
    #[must_use]
    pub const fn negated(self) -> Self {
        Self {
            amount: -self.amount,
            currency: self.currency,
        }
    }

    /// Adds two amounts of the same currency.
    ///
    /// Returns `None` on currency mismatch or overflow.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        if self.currency != other.currency {
            return None;
        }
        self.amount
            .checked_add(other.amount)
            .map(|amount| Self::new(amount, self.currency))
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let places = self.currency.decimal_places();
        if places == 0 {
            return write!(f, "{} {}", self.amount, self.currency);
        }
        let scale = 10_i64.pow(places);
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        let scale_abs = scale.unsigned_abs();
        write!(
            f,
            "{sign}{}.{:0width$} {}",
            abs / scale_abs,
            abs % scale_abs,
            self.currency,
            width = places as usize
        )
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            "CAD" => Ok(Self::Cad),
            "AUD" => Ok(Self::Aud),
            "NZD" => Ok(Self::Nzd),
            "CHF" => Ok(Self::Chf),
            "SEK" => Ok(Self::Sek),
            "DKK" => Ok(Self::Dkk),
            "NOK" => Ok(Self::Nok),
            "MXN" => Ok(Self::Mxn),
            "BRL" => Ok(Self::Brl),
            "INR" => Ok(Self::Inr),
            "IDR" => Ok(Self::Idr),
            "SGD" => Ok(Self::Sgd),
            "JPY" => Ok(Self::Jpy),
            "KRW" => Ok(Self::Krw),
            _ => Err(format!("Unknown currency: {s}")),
        }
    }
}
