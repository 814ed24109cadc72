//! Account types
//!
//! An [`Account`] is an immutable snapshot: balance changes and freezes build a
//! new value which the engine then persists. Variant specific rules live in
//! [`AccountTerms`] and are exposed through a small capability set
//! (penalty rule, interest rate and period, overdraft floor) so the engine
//! never matches on the variant itself.

use crate::types::{BankError, Currency, Money};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account number, unique across all account variants
pub type AccountNumber = u64;

/// Account holder identifier
pub type HolderId = u64;

/// Lifecycle status of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Frozen,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Frozen => "FROZEN",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(AccountStatus::Active),
            "FROZEN" => Ok(AccountStatus::Frozen),
            other => Err(BankError::parse(format!("Unknown account status '{}'", other))),
        }
    }
}

/// Account variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountKind {
    Checking,
    Savings,
    Student,
    CreditCard,
}

impl AccountKind {
    /// Order in which the variant stores are searched when resolving a number
    pub const RESOLUTION_ORDER: [AccountKind; 4] = [
        AccountKind::Checking,
        AccountKind::Savings,
        AccountKind::Student,
        AccountKind::CreditCard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Checking => "checking",
            AccountKind::Savings => "savings",
            AccountKind::Student => "student",
            AccountKind::CreditCard => "credit-card",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "checking" => Ok(AccountKind::Checking),
            "savings" => Ok(AccountKind::Savings),
            "student" => Ok(AccountKind::Student),
            "credit-card" | "creditcard" => Ok(AccountKind::CreditCard),
            other => Err(BankError::parse(format!("Unknown account kind '{}'", other))),
        }
    }
}

/// How often interest accrues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestPeriod {
    Monthly,
    Yearly,
}

impl InterestPeriod {
    pub fn months(&self) -> u32 {
        match self {
            InterestPeriod::Monthly => 1,
            InterestPeriod::Yearly => 12,
        }
    }

    /// Rate to apply for one period given an annual rate
    ///
    /// Monthly rates are the annual rate divided by twelve, rounded half to
    /// even at the annual rate's scale (never fewer than four places).
    pub fn period_rate(&self, annual_rate: Decimal) -> Decimal {
        match self {
            InterestPeriod::Yearly => annual_rate,
            InterestPeriod::Monthly => {
                let scale = annual_rate.scale().max(4);
                (annual_rate / Decimal::from(12))
                    .round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven)
            }
        }
    }
}

impl FromStr for InterestPeriod {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(InterestPeriod::Monthly),
            "yearly" => Ok(InterestPeriod::Yearly),
            other => Err(BankError::parse(format!("Unknown interest period '{}'", other))),
        }
    }
}

/// Minimum-balance rule: falling below `minimum_balance` costs `penalty_fee`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PenaltyRule {
    pub minimum_balance: Money,
    pub penalty_fee: Money,
}

/// Variant specific terms of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AccountTerms {
    Checking {
        minimum_balance: Money,
        penalty_fee: Money,
    },
    Savings {
        minimum_balance: Money,
        penalty_fee: Money,
        interest_rate: Decimal,
    },
    Student,
    CreditCard {
        credit_limit: Money,
        interest_rate: Decimal,
    },
}

impl AccountTerms {
    pub fn kind(&self) -> AccountKind {
        match self {
            AccountTerms::Checking { .. } => AccountKind::Checking,
            AccountTerms::Savings { .. } => AccountKind::Savings,
            AccountTerms::Student => AccountKind::Student,
            AccountTerms::CreditCard { .. } => AccountKind::CreditCard,
        }
    }

    /// Money amounts carried by the terms, used for currency and sign checks
    pub fn amounts(&self) -> Vec<Money> {
        match self {
            AccountTerms::Checking {
                minimum_balance,
                penalty_fee,
            }
            | AccountTerms::Savings {
                minimum_balance,
                penalty_fee,
                ..
            } => vec![*minimum_balance, *penalty_fee],
            AccountTerms::Student => Vec::new(),
            AccountTerms::CreditCard { credit_limit, .. } => vec![*credit_limit],
        }
    }
}

/// Snapshot of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub number: AccountNumber,
    pub balance: Money,
    pub status: AccountStatus,
    pub open_date: NaiveDate,
    pub primary_holder: HolderId,
    pub secondary_holder: Option<HolderId>,
    pub secret_key: String,
    pub terms: AccountTerms,
}

impl Account {
    pub fn kind(&self) -> AccountKind {
        self.terms.kind()
    }

    pub fn currency(&self) -> Currency {
        self.balance.currency()
    }

    pub fn is_frozen(&self) -> bool {
        self.status == AccountStatus::Frozen
    }

    /// Copy of this account with a new balance
    pub fn with_balance(&self, balance: Money) -> Account {
        Account {
            balance,
            ..self.clone()
        }
    }

    /// Copy of this account in the FROZEN status
    pub fn frozen(&self) -> Account {
        Account {
            status: AccountStatus::Frozen,
            ..self.clone()
        }
    }

    /// Minimum-balance rule, for variants that have one
    pub fn penalty_rule(&self) -> Option<PenaltyRule> {
        match self.terms {
            AccountTerms::Checking {
                minimum_balance,
                penalty_fee,
            }
            | AccountTerms::Savings {
                minimum_balance,
                penalty_fee,
                ..
            } => Some(PenaltyRule {
                minimum_balance,
                penalty_fee,
            }),
            AccountTerms::Student | AccountTerms::CreditCard { .. } => None,
        }
    }

    pub fn interest_rate(&self) -> Option<Decimal> {
        match self.terms {
            AccountTerms::Savings { interest_rate, .. }
            | AccountTerms::CreditCard { interest_rate, .. } => Some(interest_rate),
            AccountTerms::Checking { .. } | AccountTerms::Student => None,
        }
    }

    /// Savings accrue yearly, credit cards monthly
    pub fn interest_period(&self) -> Option<InterestPeriod> {
        match self.terms {
            AccountTerms::Savings { .. } => Some(InterestPeriod::Yearly),
            AccountTerms::CreditCard { .. } => Some(InterestPeriod::Monthly),
            AccountTerms::Checking { .. } | AccountTerms::Student => None,
        }
    }

    /// Lowest balance a debit may leave behind
    pub fn overdraft_floor(&self) -> Money {
        match self.terms {
            AccountTerms::CreditCard { credit_limit, .. } => credit_limit.negate(),
            _ => Money::zero(self.currency()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::Usd).unwrap()
    }

    fn account(terms: AccountTerms) -> Account {
        Account {
            number: 1,
            balance: usd(dec!(1000)),
            status: AccountStatus::Active,
            open_date: NaiveDate::from_ymd_opt(2011, 1, 1).unwrap(),
            primary_holder: 1,
            secondary_holder: None,
            secret_key: "secret".to_string(),
            terms,
        }
    }

    #[test]
    fn test_snapshots_do_not_mutate_original() {
        let original = account(AccountTerms::Student);
        let updated = original.with_balance(usd(dec!(5)));
        let frozen = original.frozen();

        assert_eq!(original.balance.amount(), dec!(1000));
        assert_eq!(original.status, AccountStatus::Active);
        assert_eq!(updated.balance.amount(), dec!(5));
        assert!(frozen.is_frozen());
    }

    #[rstest]
    #[case::checking(
        AccountTerms::Checking { minimum_balance: usd(dec!(250)), penalty_fee: usd(dec!(40)) },
        true, None, dec!(0)
    )]
    #[case::savings(
        AccountTerms::Savings { minimum_balance: usd(dec!(100)), penalty_fee: usd(dec!(10)), interest_rate: dec!(0.0025) },
        true, Some(InterestPeriod::Yearly), dec!(0)
    )]
    #[case::student(AccountTerms::Student, false, None, dec!(0))]
    #[case::credit_card(
        AccountTerms::CreditCard { credit_limit: usd(dec!(500)), interest_rate: dec!(0.2) },
        false, Some(InterestPeriod::Monthly), dec!(-500)
    )]
    fn test_capabilities(
        #[case] terms: AccountTerms,
        #[case] has_penalty: bool,
        #[case] period: Option<InterestPeriod>,
        #[case] floor: Decimal,
    ) {
        let account = account(terms);
        assert_eq!(account.penalty_rule().is_some(), has_penalty);
        assert_eq!(account.interest_period(), period);
        assert_eq!(account.interest_rate().is_some(), period.is_some());
        assert_eq!(account.overdraft_floor().amount(), floor);
    }

    #[rstest]
    #[case::yearly(InterestPeriod::Yearly, dec!(0.2), dec!(0.2))]
    #[case::monthly(InterestPeriod::Monthly, dec!(0.12), dec!(0.0100))]
    #[case::monthly_rounds_half_even(InterestPeriod::Monthly, dec!(0.0006), dec!(0.0000))]
    #[case::monthly_keeps_finer_scale(InterestPeriod::Monthly, dec!(0.123456), dec!(0.010288))]
    fn test_period_rate(
        #[case] period: InterestPeriod,
        #[case] annual: Decimal,
        #[case] expected: Decimal,
    ) {
        assert_eq!(period.period_rate(annual), expected);
    }

    #[rstest]
    #[case("checking", AccountKind::Checking)]
    #[case("Savings", AccountKind::Savings)]
    #[case("student", AccountKind::Student)]
    #[case("credit_card", AccountKind::CreditCard)]
    #[case("credit-card", AccountKind::CreditCard)]
    fn test_kind_parsing(#[case] input: &str, #[case] expected: AccountKind) {
        assert_eq!(input.parse::<AccountKind>().unwrap(), expected);
    }

    #[test]
    fn test_resolution_order() {
        assert_eq!(
            AccountKind::RESOLUTION_ORDER,
            [
                AccountKind::Checking,
                AccountKind::Savings,
                AccountKind::Student,
                AccountKind::CreditCard
            ]
        );
    }
}
