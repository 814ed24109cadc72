//! CSV format handling for batch operations and report output
//!
//! This module centralizes all CSV format concerns, providing:
//! - OperationRecord structure for deserialization
//! - Conversion from CSV records to [`Operation`]s
//! - Account and transaction log serialization
//!
//! Input columns: `type, account, counterparty, amount, currency`. The
//! `counterparty` column is only read for transfers; `currency` may be left
//! empty, in which case the configured default currency applies.

use crate::types::{Account, AccountNumber, BankError, Currency, Money, Operation, Transaction};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct OperationRecord {
    #[serde(rename = "type")]
    pub op_type: String,
    pub account: AccountNumber,
    #[serde(default)]
    pub counterparty: Option<AccountNumber>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Convert an OperationRecord to an Operation
///
/// # Arguments
///
/// * `record` - The deserialized CSV record
/// * `default_currency` - Currency used when the record leaves it empty
///
/// # Returns
///
/// * `Ok(Operation)` - Successfully converted record
/// * `Err(BankError::Parse)` - Unknown type, missing counterparty, or bad amount
pub fn convert_operation_record(
    record: OperationRecord,
    default_currency: Currency,
) -> Result<Operation, BankError> {
    let currency = match record.currency.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Currency::from_str(code)?,
        _ => default_currency,
    };

    let amount = match record.amount.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => {
            let value = Decimal::from_str(text).map_err(|_| {
                BankError::parse(format!(
                    "Invalid amount '{}' for account {}",
                    text, record.account
                ))
            })?;
            Some(Money::new(value, currency)?)
        }
        _ => None,
    };

    let require_amount = |amount: Option<Money>| {
        amount.ok_or_else(|| {
            BankError::parse(format!(
                "{} on account {} requires an amount",
                record.op_type, record.account
            ))
        })
    };

    match record.op_type.trim().to_lowercase().as_str() {
        "credit" => Ok(Operation::Credit {
            account: record.account,
            amount: require_amount(amount)?,
        }),
        "debit" => Ok(Operation::Debit {
            account: record.account,
            amount: require_amount(amount)?,
        }),
        "transfer" => {
            let to = record.counterparty.ok_or_else(|| {
                BankError::parse(format!(
                    "transfer from account {} requires a counterparty",
                    record.account
                ))
            })?;
            Ok(Operation::Transfer {
                from: record.account,
                to,
                amount: require_amount(amount)?,
            })
        }
        "interest" => Ok(Operation::Interest {
            account: record.account,
        }),
        other => Err(BankError::parse(format!(
            "Invalid operation type: '{}' for account {}",
            other, record.account
        ))),
    }
}

/// Write account states to CSV format
///
/// Columns: account, kind, balance, currency, status. Accounts are sorted by
/// number for deterministic output.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), BankError> {
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(["account", "kind", "balance", "currency", "status"])?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.number);

    for account in sorted_accounts {
        writer.write_record(&[
            account.number.to_string(),
            account.kind().to_string(),
            format!("{:.2}", account.balance.amount()),
            account.currency().to_string(),
            account.status.as_str().to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write log entries to CSV format, in the order given
pub fn write_transactions_csv(
    entries: &[Transaction],
    output: &mut dyn Write,
) -> Result<(), BankError> {
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record([
        "id",
        "account",
        "timestamp",
        "type",
        "amount",
        "balance",
        "currency",
        "name",
    ])?;

    for entry in entries {
        writer.write_record(&[
            entry.id.to_string(),
            entry.account_number.to_string(),
            entry.timestamp.to_rfc3339(),
            entry.kind.as_str().to_string(),
            format!("{:.2}", entry.amount.amount()),
            format!("{:.2}", entry.balance_after.amount()),
            entry.amount.currency().to_string(),
            entry.name.clone(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
