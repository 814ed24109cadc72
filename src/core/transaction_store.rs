//! Transaction log module
//!
//! This module provides the `TransactionLog` extension trait, implemented for
//! every [`Ledger`]. It builds log entries from account snapshots so that each
//! entry carries the balance the account was left with, and it answers the
//! history questions the engine asks (time ranges, last interest payment).

use super::traits::Ledger;
use crate::types::{
    Account, AccountNumber, BankError, Money, NewTransaction, Transaction, TransactionType,
};
use chrono::{DateTime, Utc};

/// Description of a log entry
///
/// Transfers name the other account; everything else is the amount followed
/// by the entry type, e.g. `USD 250.00 credit`.
pub fn entry_name(kind: TransactionType, amount: &Money, counterparty: Option<AccountNumber>) -> String {
    let magnitude = amount.abs();
    match (kind, counterparty) {
        (TransactionType::TransferDebit, Some(other)) => {
            format!("{} transfer to account {}", magnitude, other)
        }
        (TransactionType::TransferCredit, Some(other)) => {
            format!("{} transfer from account {}", magnitude, other)
        }
        _ => format!("{} {}", magnitude, kind.label()),
    }
}

/// Append-only log operations
pub trait TransactionLog {
    /// Record a balance-affecting event against `account`
    ///
    /// # Arguments
    ///
    /// * `account` - Snapshot after the event; its balance becomes the entry's balance
    /// * `kind` - Entry type
    /// * `amount` - Signed amount, negative for money leaving the account
    /// * `counterparty` - Other account of a transfer
    /// * `timestamp` - Time of the event
    fn record(
        &mut self,
        account: &Account,
        kind: TransactionType,
        amount: Money,
        counterparty: Option<AccountNumber>,
        timestamp: DateTime<Utc>,
    ) -> Result<Transaction, BankError>;

    /// Entries of an account within an inclusive time range, oldest first
    fn history(
        &self,
        number: AccountNumber,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, BankError>;

    /// Most recent INTEREST_CREDIT or INTEREST_DEBIT entry of an account
    fn last_interest_payment(
        &self,
        number: AccountNumber,
    ) -> Result<Option<Transaction>, BankError>;
}

impl<L: Ledger + ?Sized> TransactionLog for L {
    fn record(
        &mut self,
        account: &Account,
        kind: TransactionType,
        amount: Money,
        counterparty: Option<AccountNumber>,
        timestamp: DateTime<Utc>,
    ) -> Result<Transaction, BankError> {
        self.append_transaction(NewTransaction {
            account_number: account.number,
            name: entry_name(kind, &amount, counterparty),
            amount,
            balance_after: account.balance,
            kind,
            timestamp,
        })
    }

    fn history(
        &self,
        number: AccountNumber,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, BankError> {
        if start > end {
            return Ok(Vec::new());
        }
        self.transactions_between(number, start, end)
    }

    fn last_interest_payment(
        &self,
        number: AccountNumber,
    ) -> Result<Option<Transaction>, BankError> {
        self.latest_transaction_of(number, &TransactionType::INTEREST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::Storage;
    use crate::store::MemoryStorage;
    use crate::types::{AccountStatus, AccountTerms, Currency};
    use chrono::{Duration, NaiveDate, TimeZone};
    use rstest::rstest;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::Usd).unwrap()
    }

    fn student(number: AccountNumber) -> Account {
        Account {
            number,
            balance: usd(dec!(100)),
            status: AccountStatus::Active,
            open_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            primary_holder: 1,
            secondary_holder: None,
            secret_key: "key".to_string(),
            terms: AccountTerms::Student,
        }
    }

    #[rstest]
    #[case::credit(TransactionType::Credit, dec!(250), None, "USD 250.00 credit")]
    #[case::debit(TransactionType::Debit, dec!(-12.5), None, "USD 12.50 debit")]
    #[case::transfer_out(TransactionType::TransferDebit, dec!(-250), Some(2), "USD 250.00 transfer to account 2")]
    #[case::transfer_in(TransactionType::TransferCredit, dec!(250), Some(1), "USD 250.00 transfer from account 1")]
    #[case::penalty(TransactionType::PenaltyFee, dec!(-10), None, "USD 10.00 penalty fee")]
    fn test_entry_name(
        #[case] kind: TransactionType,
        #[case] amount: Decimal,
        #[case] counterparty: Option<AccountNumber>,
        #[case] expected: &str,
    ) {
        assert_eq!(entry_name(kind, &usd(amount), counterparty), expected);
    }

    #[test]
    fn test_record_snapshots_balance() {
        let storage = MemoryStorage::new();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let account = student(1).with_balance(usd(dec!(350)));

        let entry = storage
            .atomically(|ledger| {
                ledger.record(&account, TransactionType::Credit, usd(dec!(250)), None, at)
            })
            .unwrap();

        assert_eq!(entry.balance_after.amount(), dec!(350));
        assert_eq!(entry.amount.amount(), dec!(250));
        assert_eq!(entry.timestamp, at);
        assert_eq!(entry.name, "USD 250.00 credit");
    }

    #[test]
    fn test_history_range_is_inclusive_and_ordered() {
        let storage = MemoryStorage::new();
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let account = student(1);

        let entries = storage
            .atomically(|ledger| {
                for hours in [5, 0, 10] {
                    ledger.record(
                        &account,
                        TransactionType::Credit,
                        usd(dec!(1)),
                        None,
                        start + Duration::hours(hours),
                    )?;
                }
                ledger.history(1, start, start + Duration::hours(5))
            })
            .unwrap();

        let offsets: Vec<i64> = entries
            .iter()
            .map(|e| (e.timestamp - start).num_hours())
            .collect();
        assert_eq!(offsets, vec![0, 5]);
    }

    #[test]
    fn test_history_with_inverted_range_is_empty() {
        let storage = MemoryStorage::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let entries = storage
            .atomically(|ledger| ledger.history(1, now, now - Duration::days(1)))
            .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_last_interest_payment_ignores_other_types() {
        let storage = MemoryStorage::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let account = student(1);

        let last = storage
            .atomically(|ledger| {
                ledger.record(&account, TransactionType::InterestCredit, usd(dec!(1)), None, start)?;
                ledger.record(
                    &account,
                    TransactionType::InterestDebit,
                    usd(dec!(-1)),
                    None,
                    start + Duration::days(30),
                )?;
                ledger.record(
                    &account,
                    TransactionType::Credit,
                    usd(dec!(5)),
                    None,
                    start + Duration::days(60),
                )?;
                ledger.last_interest_payment(1)
            })
            .unwrap()
            .unwrap();

        assert_eq!(last.kind, TransactionType::InterestDebit);
        assert_eq!(last.timestamp, start + Duration::days(30));
    }
}
