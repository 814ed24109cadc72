use crate::types::{AccountNumber, BankError, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transaction log entry identifier
pub type TransactionId = u64;

/// Kind of balance-affecting event recorded in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Credit,
    Debit,
    TransferDebit,
    TransferCredit,
    InterestCredit,
    InterestDebit,
    PenaltyFee,
}

impl TransactionType {
    /// Entry types written by interest accrual
    pub const INTEREST: [TransactionType; 2] =
        [TransactionType::InterestCredit, TransactionType::InterestDebit];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "CREDIT",
            TransactionType::Debit => "DEBIT",
            TransactionType::TransferDebit => "TRANSFER_DEBIT",
            TransactionType::TransferCredit => "TRANSFER_CREDIT",
            TransactionType::InterestCredit => "INTEREST_CREDIT",
            TransactionType::InterestDebit => "INTEREST_DEBIT",
            TransactionType::PenaltyFee => "PENALTY_FEE",
        }
    }

    /// Human readable label used in entry descriptions
    pub fn label(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
            TransactionType::TransferDebit => "transfer debit",
            TransactionType::TransferCredit => "transfer credit",
            TransactionType::InterestCredit => "interest credit",
            TransactionType::InterestDebit => "interest debit",
            TransactionType::PenaltyFee => "penalty fee",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREDIT" => Ok(TransactionType::Credit),
            "DEBIT" => Ok(TransactionType::Debit),
            "TRANSFER_DEBIT" => Ok(TransactionType::TransferDebit),
            "TRANSFER_CREDIT" => Ok(TransactionType::TransferCredit),
            "INTEREST_CREDIT" => Ok(TransactionType::InterestCredit),
            "INTEREST_DEBIT" => Ok(TransactionType::InterestDebit),
            "PENALTY_FEE" => Ok(TransactionType::PenaltyFee),
            other => Err(BankError::parse(format!(
                "Unknown transaction type '{}'",
                other
            ))),
        }
    }
}

/// Log entry that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub account_number: AccountNumber,
    pub name: String,
    /// Signed amount: positive for money in, negative for money out
    pub amount: Money,
    pub balance_after: Money,
    pub kind: TransactionType,
    pub timestamp: DateTime<Utc>,
}

impl NewTransaction {
    /// Attach the id assigned by the store
    pub fn with_id(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            account_number: self.account_number,
            name: self.name,
            amount: self.amount,
            balance_after: self.balance_after,
            kind: self.kind,
            timestamp: self.timestamp,
        }
    }
}

/// Immutable, persisted log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_number: AccountNumber,
    pub name: String,
    pub amount: Money,
    pub balance_after: Money,
    pub kind: TransactionType,
    pub timestamp: DateTime<Utc>,
}

/// A request read from a batch input file
///
/// Amounts are unsigned magnitudes; the engine decides the sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Credit {
        account: AccountNumber,
        amount: Money,
    },
    Debit {
        account: AccountNumber,
        amount: Money,
    },
    Transfer {
        from: AccountNumber,
        to: AccountNumber,
        amount: Money,
    },
    Interest {
        account: AccountNumber,
    },
}

impl Operation {
    /// Every account the operation reads or writes
    pub fn accounts(&self) -> Vec<AccountNumber> {
        match self {
            Operation::Credit { account, .. }
            | Operation::Debit { account, .. }
            | Operation::Interest { account } => vec![*account],
            Operation::Transfer { from, to, .. } => vec![*from, *to],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Credit { .. } => "credit",
            Operation::Debit { .. } => "debit",
            Operation::Transfer { .. } => "transfer",
            Operation::Interest { .. } => "interest",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Currency;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(TransactionType::Credit)]
    #[case(TransactionType::TransferDebit)]
    #[case(TransactionType::InterestDebit)]
    #[case(TransactionType::PenaltyFee)]
    fn test_type_names_parse_back(#[case] kind: TransactionType) {
        assert_eq!(kind.as_str().parse::<TransactionType>().unwrap(), kind);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!("REFUND".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_operation_accounts() {
        let amount = Money::new(dec!(1), Currency::Usd).unwrap();
        let transfer = Operation::Transfer {
            from: 1,
            to: 2,
            amount,
        };
        assert_eq!(transfer.accounts(), vec![1, 2]);
        assert_eq!(Operation::Interest { account: 5 }.accounts(), vec![5]);
    }
}
