//! Fixed-point money values
//!
//! `Money` pairs an exact decimal amount with a currency. Amounts are kept at
//! two decimal places; anything finer is rejected on construction, and the
//! only rounding path is [`Money::rounded`], which uses banker's rounding
//! (half to even). Arithmetic between different currencies is an error.

use crate::types::BankError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// ISO 4217 currencies supported by the bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    /// Three-letter currency code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            other => Err(BankError::parse(format!("Unknown currency '{}'", other))),
        }
    }
}

/// An exact amount of a single currency
///
/// Deserialization goes through [`Money::new`], so sub-cent amounts are
/// rejected there as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMoney")]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

#[derive(Deserialize)]
struct RawMoney {
    amount: Decimal,
    currency: Currency,
}

impl TryFrom<RawMoney> for Money {
    type Error = BankError;

    fn try_from(raw: RawMoney) -> Result<Self, Self::Error> {
        Money::new(raw.amount, raw.currency)
    }
}

impl Money {
    /// Number of decimal places every amount is kept at
    pub const SCALE: u32 = 2;

    /// Create a money value, rejecting amounts finer than a cent
    ///
    /// # Arguments
    ///
    /// * `amount` - Exact amount; may be negative (balances can be)
    /// * `currency` - Currency of the amount
    ///
    /// # Returns
    ///
    /// * `Ok(Money)` stored at two decimal places
    /// * `Err(BankError::InvalidAmount)` if the amount needs more than two decimals
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, BankError> {
        if amount.normalize().scale() > Self::SCALE {
            return Err(BankError::invalid_amount(
                amount,
                "more than two decimal places",
            ));
        }
        Ok(Self::at_scale(amount, currency))
    }

    /// Create a money value from an arbitrary-precision amount, rounding
    /// half to even at two decimals
    pub fn rounded(amount: Decimal, currency: Currency) -> Self {
        let amount =
            amount.round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointNearestEven);
        Self::at_scale(amount, currency)
    }

    /// Zero in the given currency
    pub fn zero(currency: Currency) -> Self {
        Self::at_scale(Decimal::ZERO, currency)
    }

    fn at_scale(mut amount: Decimal, currency: Currency) -> Self {
        amount.rescale(Self::SCALE);
        Self { amount, currency }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    /// Same amount with the sign flipped
    pub fn negate(&self) -> Self {
        Self::at_scale(-self.amount, self.currency)
    }

    pub fn abs(&self) -> Self {
        Self::at_scale(self.amount.abs(), self.currency)
    }

    /// Sum of two values of the same currency
    pub fn checked_add(&self, other: &Money) -> Result<Money, BankError> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| BankError::arithmetic_overflow("add"))?;
        Ok(Self::at_scale(amount, self.currency))
    }

    /// Difference of two values of the same currency
    pub fn checked_sub(&self, other: &Money) -> Result<Money, BankError> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or_else(|| BankError::arithmetic_overflow("subtract"))?;
        Ok(Self::at_scale(amount, self.currency))
    }

    /// Order two values of the same currency
    pub fn compare(&self, other: &Money) -> Result<Ordering, BankError> {
        self.ensure_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    /// Multiply by a rate and round half to even to the cent
    pub fn apply_rate(&self, rate: Decimal) -> Result<Money, BankError> {
        let product = self
            .amount
            .checked_mul(rate)
            .ok_or_else(|| BankError::arithmetic_overflow("apply rate"))?;
        Ok(Self::rounded(product, self.currency))
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), BankError> {
        if self.currency != other.currency {
            return Err(BankError::currency_mismatch(self.currency, other.currency));
        }
        Ok(())
    }
}

impl PartialOrd for Money {
    /// Values of different currencies are unordered
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.currency != other.currency {
            return None;
        }
        Some(self.amount.cmp(&other.amount))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.2}", self.currency, self.amount)
    }
}
