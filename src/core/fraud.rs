//! Default fraud policy
//!
//! Two rules, either of which flags an operation:
//!
//! - **Amount**: the proposed amount exceeds `average_multiplier` times the
//!   average magnitude of the account's entries in the look-back window
//!   (only once the window holds at least `min_history` entries)
//! - **Burst**: `burst_limit` or more entries fall within `burst_window` of now
//!   (disabled unless `burst_limit` is set)

use super::traits::FraudPolicy;
use crate::types::{Account, Money, Transaction};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

/// Tunables of the default fraud policy
#[derive(Debug, Clone, PartialEq)]
pub struct FraudConfig {
    /// History window handed to the policy
    pub lookback: Duration,
    /// Entries required before the amount rule applies
    pub min_history: usize,
    /// Multiple of the average amount above which an operation is flagged
    pub average_multiplier: Decimal,
    /// Entries within `burst_window` that trip the burst rule
    pub burst_limit: Option<usize>,
    pub burst_window: Duration,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            lookback: Duration::days(30),
            min_history: 1,
            average_multiplier: Decimal::from(10),
            burst_limit: None,
            burst_window: Duration::seconds(1),
        }
    }
}

/// Rule based fraud detector
#[derive(Debug, Clone, Default)]
pub struct FraudDetector {
    config: FraudConfig,
}

impl FraudDetector {
    pub fn new(config: FraudConfig) -> Self {
        Self { config }
    }

    fn exceeds_average(&self, history: &[Transaction], amount: &Money) -> bool {
        if history.is_empty() || history.len() < self.config.min_history {
            return false;
        }

        let total = history
            .iter()
            .map(|entry| entry.amount.amount().abs())
            .fold(Decimal::ZERO, |acc, value| acc.saturating_add(value));
        let average = total / Decimal::from(history.len());

        match average.checked_mul(self.config.average_multiplier) {
            Some(threshold) => amount.amount().abs() > threshold,
            None => false,
        }
    }

    fn is_burst(&self, history: &[Transaction], now: DateTime<Utc>) -> bool {
        let Some(limit) = self.config.burst_limit else {
            return false;
        };
        let since = now - self.config.burst_window;
        let recent = history
            .iter()
            .filter(|entry| entry.timestamp > since && entry.timestamp <= now)
            .count();
        recent >= limit
    }
}

impl FraudPolicy for FraudDetector {
    fn lookback(&self) -> Duration {
        self.config.lookback
    }

    fn evaluate(
        &self,
        _account: &Account,
        history: &[Transaction],
        amount: &Money,
        now: DateTime<Utc>,
    ) -> bool {
        self.exceeds_average(history, amount) || self.is_burst(history, now)
    }
}
