//! Transaction processing engine
//!
//! This module provides the TransactionEngine that orchestrates credit, debit,
//! transfer, interest accrual and penalty enforcement on top of a [`Storage`].
//!
//! Every operation follows the same shape:
//!
//! 1. Take the per-account locks of every account involved (ascending order)
//! 2. Open one storage unit of work, retried on transient failures
//! 3. Resolve the accounts, run the fraud and status gates
//! 4. Build the new snapshots, apply any minimum-balance penalty
//! 5. Persist the snapshots and append the log entries
//!
//! A fraud signal is the one denial that changes state: the account is frozen
//! and the freeze is committed before `FraudDenied` is returned.

use super::account_manager::AccountManager;
use super::clock::SystemClock;
use super::fraud::{FraudConfig, FraudDetector};
use super::locks::AccountLocks;
use super::retry::RetryPolicy;
use super::traits::{Clock, FraudPolicy, Ledger, Storage};
use super::transaction_store::TransactionLog;
use crate::types::{
    hash_key, Account, AccountHolder, AccountNumber, BankError, Currency, InterestPeriod, Money,
    NewAccountHolder, Operation, ThirdParty, Transaction, TransactionType,
};
use chrono::{DateTime, Months, NaiveDate, Utc};
use log::{debug, warn};
use std::cmp::Ordering;
use std::sync::Arc;

/// Engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Currency assumed for amounts that do not name one (batch input, CLI)
    pub currency: Currency,
    pub retry: RetryPolicy,
    pub fraud: FraudConfig,
}

/// Result of a unit of work that may have been denied after committing a freeze
enum Outcome<T> {
    Completed(T),
    Denied(BankError),
}

/// A signed balance change of one account
#[derive(Debug, Clone, Copy)]
struct Movement {
    kind: TransactionType,
    amount: Money,
    counterparty: Option<AccountNumber>,
}

/// Transaction processing engine
///
/// The engine is `Send + Sync`; share it behind an `Arc` to process
/// operations from several threads. Operations on the same account are
/// serialized, operations on different accounts run in parallel as far as the
/// storage allows.
pub struct TransactionEngine<S: Storage> {
    storage: Arc<S>,
    fraud: Arc<dyn FraudPolicy>,
    clock: Arc<dyn Clock>,
    locks: AccountLocks,
    retry: RetryPolicy,
    currency: Currency,
}

impl<S: Storage> TransactionEngine<S> {
    /// Create an engine over `storage` with the default fraud detector and
    /// the system clock
    ///
    /// # Arguments
    ///
    /// * `storage` - Shared storage adapter
    /// * `config` - Retry and fraud settings
    pub fn new(storage: Arc<S>, config: EngineConfig) -> Self {
        Self {
            storage,
            fraud: Arc::new(FraudDetector::new(config.fraud)),
            clock: Arc::new(SystemClock),
            locks: AccountLocks::new(),
            retry: config.retry,
            currency: config.currency,
        }
    }

    /// Replace the fraud policy
    pub fn with_fraud_policy(mut self, fraud: Arc<dyn FraudPolicy>) -> Self {
        self.fraud = fraud;
        self
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Currency assumed for amounts read without one
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Credit `amount` to an account
    ///
    /// # Returns
    ///
    /// The CREDIT log entry
    ///
    /// # Errors
    ///
    /// - `AccountNotFound` / `AmbiguousAccount` if the number does not resolve
    /// - `CurrencyMismatch` if the amount is in another currency
    /// - `FraudDenied` if the fraud policy flagged the credit (account now frozen)
    /// - `AccountFrozen` if the account was already frozen
    pub fn credit(&self, number: AccountNumber, amount: Money) -> Result<Transaction, BankError> {
        validate_amount(&amount)?;
        let movement = Movement {
            kind: TransactionType::Credit,
            amount,
            counterparty: None,
        };

        let entry = self.run("credit", &[number], |ledger, now| {
            let account = ledger.resolve_account(number)?;
            self.apply_movement(ledger, account, movement, now)
        })?;

        debug!("Credited {} to account {}", amount, number);
        Ok(entry)
    }

    /// Debit `amount` from an account
    ///
    /// Fails with `InsufficientFunds` if the balance would drop below the
    /// variant's overdraft floor; otherwise the same errors as [`Self::credit`].
    pub fn debit(&self, number: AccountNumber, amount: Money) -> Result<Transaction, BankError> {
        validate_amount(&amount)?;
        let movement = Movement {
            kind: TransactionType::Debit,
            amount: amount.negate(),
            counterparty: None,
        };

        let entry = self.run("debit", &[number], |ledger, now| {
            let account = ledger.resolve_account(number)?;
            self.apply_movement(ledger, account, movement, now)
        })?;

        debug!("Debited {} from account {}", amount, number);
        Ok(entry)
    }

    /// Move `amount` from one account to another, all or nothing
    ///
    /// Both accounts pass the fraud and status gates before either balance
    /// changes. Both log entries share one timestamp.
    ///
    /// # Returns
    ///
    /// The TRANSFER_DEBIT and TRANSFER_CREDIT entries, in that order
    pub fn transfer(
        &self,
        from: AccountNumber,
        to: AccountNumber,
        amount: Money,
    ) -> Result<(Transaction, Transaction), BankError> {
        validate_amount(&amount)?;
        if from == to {
            return Err(BankError::SelfTransfer { account: from });
        }

        let entries = self.run("transfer", &[from, to], |ledger, now| {
            let debit_account = ledger.resolve_account(from)?;
            let credit_account = ledger.resolve_account(to)?;
            ensure_currency(&debit_account, &amount)?;
            ensure_currency(&credit_account, &amount)?;

            let mut flagged = Vec::new();
            for account in [&credit_account, &debit_account] {
                if self.is_fraudulent(ledger, account, &amount, now)? {
                    flagged.push(account.number);
                    if !account.is_frozen() {
                        ledger.save_account(&account.frozen())?;
                    }
                }
            }
            if let Some(account) = flagged.first() {
                return Ok(Outcome::Denied(BankError::FraudDenied { account: *account }));
            }

            ensure_active(&debit_account)?;
            ensure_active(&credit_account)?;

            let debit_leg = Movement {
                kind: TransactionType::TransferDebit,
                amount: amount.negate(),
                counterparty: Some(to),
            };
            let credit_leg = Movement {
                kind: TransactionType::TransferCredit,
                amount,
                counterparty: Some(from),
            };

            let debited = move_balance(&debit_account, &debit_leg)?;
            let credited = move_balance(&credit_account, &credit_leg)?;

            let debit_entry = self.commit_movement(ledger, &debit_account, debited, debit_leg, now)?;
            let credit_entry =
                self.commit_movement(ledger, &credit_account, credited, credit_leg, now)?;
            Ok(Outcome::Completed((debit_entry, credit_entry)))
        })?;

        debug!("Transferred {} from account {} to account {}", amount, from, to);
        Ok(entries)
    }

    /// Accrue monthly interest if a month has passed since the last payment
    ///
    /// # Returns
    ///
    /// * `Ok(Some(entry))` - Interest was paid (INTEREST_CREDIT) or charged (INTEREST_DEBIT)
    /// * `Ok(None)` - Not due, no interest rate, or nothing to accrue
    pub fn apply_interest_monthly(
        &self,
        number: AccountNumber,
    ) -> Result<Option<Transaction>, BankError> {
        self.accrue_interest(number, Some(InterestPeriod::Monthly))
    }

    /// Accrue yearly interest if a year has passed since the last payment
    pub fn apply_interest_yearly(
        &self,
        number: AccountNumber,
    ) -> Result<Option<Transaction>, BankError> {
        self.accrue_interest(number, Some(InterestPeriod::Yearly))
    }

    /// Accrue interest on the account's own schedule
    /// (savings yearly, credit cards monthly)
    pub fn apply_interest(&self, number: AccountNumber) -> Result<Option<Transaction>, BankError> {
        self.accrue_interest(number, None)
    }

    /// Accrue due interest on every interest-bearing account
    ///
    /// Each account is handled in its own unit of work; one failure does not
    /// stop the sweep.
    pub fn sweep_interest(
        &self,
    ) -> Result<Vec<(AccountNumber, Result<Option<Transaction>, BankError>)>, BankError> {
        let accounts = self.accounts()?;
        Ok(accounts
            .into_iter()
            .filter(|account| account.interest_period().is_some())
            .map(|account| (account.number, self.apply_interest(account.number)))
            .collect())
    }

    fn accrue_interest(
        &self,
        number: AccountNumber,
        period: Option<InterestPeriod>,
    ) -> Result<Option<Transaction>, BankError> {
        let entry = self.run("interest", &[number], |ledger, now| {
            let account = ledger.resolve_account(number)?;
            let (Some(rate), Some(period)) = (
                account.interest_rate(),
                period.or_else(|| account.interest_period()),
            ) else {
                return Ok(Outcome::Completed(None));
            };

            if !interest_due(ledger, &account, period, now)? {
                return Ok(Outcome::Completed(None));
            }

            let interest = account.balance.apply_rate(period.period_rate(rate))?;
            if interest.is_zero() {
                return Ok(Outcome::Completed(None));
            }

            let kind = if interest.is_positive() {
                TransactionType::InterestCredit
            } else {
                TransactionType::InterestDebit
            };
            let movement = Movement {
                kind,
                amount: interest,
                counterparty: None,
            };
            Ok(match self.apply_movement(ledger, account, movement, now)? {
                Outcome::Completed(entry) => Outcome::Completed(Some(entry)),
                Outcome::Denied(e) => Outcome::Denied(e),
            })
        })?;

        if let Some(entry) = &entry {
            debug!("Accrued {} on account {}", entry.amount, number);
        }
        Ok(entry)
    }

    /// Current snapshot of an account
    pub fn account(&self, number: AccountNumber) -> Result<Account, BankError> {
        self.retry.run("account lookup", || {
            self.storage.atomically(|ledger| ledger.resolve_account(number))
        })
    }

    /// Every account across all variants, ordered by number
    pub fn accounts(&self) -> Result<Vec<Account>, BankError> {
        self.retry.run("account listing", || {
            self.storage.atomically(|ledger| ledger.all_accounts())
        })
    }

    /// Log entries of an account with `start <= timestamp <= end`, oldest first
    ///
    /// An empty range is an empty result, not an error.
    pub fn transactions_between(
        &self,
        number: AccountNumber,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, BankError> {
        self.retry.run("history", || {
            self.storage.atomically(|ledger| {
                ledger.resolve_account(number)?;
                ledger.history(number, start, end)
            })
        })
    }

    /// Log entries of an account for whole days, `from` through `to`
    ///
    /// # Errors
    ///
    /// `NoTransactionsInRange` if no entry falls within the days
    pub fn statement(
        &self,
        number: AccountNumber,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Transaction>, BankError> {
        let start = from
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| BankError::parse(format!("invalid start date {}", from)))?
            .and_utc();
        let end = to
            .and_hms_micro_opt(23, 59, 59, 999_999)
            .ok_or_else(|| BankError::parse(format!("invalid end date {}", to)))?
            .and_utc();

        let entries = self.transactions_between(number, start, end)?;
        if entries.is_empty() {
            return Err(BankError::NoTransactionsInRange {
                account: number,
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(entries)
    }

    /// Register an account holder
    pub fn add_holder(&self, holder: NewAccountHolder) -> Result<AccountHolder, BankError> {
        let holder = self.retry.run("add holder", || {
            let holder = holder.clone();
            self.storage.atomically(move |ledger| ledger.insert_holder(holder))
        })?;
        debug!("Registered account holder {} ({})", holder.id, holder.login_id);
        Ok(holder)
    }

    /// Register a third party; only the digest of `key` is stored
    pub fn register_third_party(&self, name: &str, key: &str) -> Result<ThirdParty, BankError> {
        let hashed_key = hash_key(key);
        let party = self.retry.run("register third party", || {
            self.storage
                .atomically(|ledger| ledger.insert_third_party(name, &hashed_key))
        })?;
        debug!("Registered third party {} ({})", party.id, party.name);
        Ok(party)
    }

    /// Open a new account
    ///
    /// # Errors
    ///
    /// - `HolderNotFound` if a referenced holder does not exist
    /// - `CurrencyMismatch` if the terms use another currency than the balance
    /// - `InvalidAmount` if a limit, fee, rate or the opening balance is out of range
    /// - `DuplicateAccountNumber` if any variant store already uses the number
    pub fn open_account(&self, account: Account) -> Result<Account, BankError> {
        validate_terms(&account)?;

        self.run("open account", &[account.number], |ledger, _now| {
            for holder in std::iter::once(account.primary_holder).chain(account.secondary_holder) {
                if ledger.find_holder(holder)?.is_none() {
                    return Err(BankError::HolderNotFound { holder });
                }
            }
            ledger.open_account(&account)?;
            Ok(Outcome::Completed(()))
        })?;

        debug!("Opened {} account {}", account.kind(), account.number);
        Ok(account)
    }

    /// Execute a batch operation
    ///
    /// # Returns
    ///
    /// The log entries written by the operation (none for interest that was not due)
    pub fn execute(&self, operation: &Operation) -> Result<Vec<Transaction>, BankError> {
        match operation {
            Operation::Credit { account, amount } => self.credit(*account, *amount).map(|e| vec![e]),
            Operation::Debit { account, amount } => self.debit(*account, *amount).map(|e| vec![e]),
            Operation::Transfer { from, to, amount } => self
                .transfer(*from, *to, *amount)
                .map(|(debit, credit)| vec![debit, credit]),
            Operation::Interest { account } => {
                self.apply_interest(*account).map(|e| e.into_iter().collect())
            }
        }
    }

    /// Run one unit of work under the account locks, with retries
    fn run<T>(
        &self,
        operation: &str,
        accounts: &[AccountNumber],
        step: impl Fn(&mut dyn Ledger, DateTime<Utc>) -> Result<Outcome<T>, BankError>,
    ) -> Result<T, BankError> {
        self.locks.with_locked(accounts, || {
            let outcome = self.retry.run(operation, || {
                let now = self.clock.now();
                self.storage.atomically(|ledger| step(ledger, now))
            });

            match outcome {
                Ok(Outcome::Completed(value)) => Ok(value),
                Ok(Outcome::Denied(e)) | Err(e) => {
                    warn!("{} on {:?} denied: {}", operation, accounts, e);
                    Err(e)
                }
            }
        })
    }

    /// Gate and apply a single-account movement
    fn apply_movement(
        &self,
        ledger: &mut dyn Ledger,
        account: Account,
        movement: Movement,
        now: DateTime<Utc>,
    ) -> Result<Outcome<Transaction>, BankError> {
        ensure_currency(&account, &movement.amount)?;

        if self.is_fraudulent(ledger, &account, &movement.amount.abs(), now)? {
            if !account.is_frozen() {
                ledger.save_account(&account.frozen())?;
            }
            return Ok(Outcome::Denied(BankError::FraudDenied {
                account: account.number,
            }));
        }
        ensure_active(&account)?;

        let moved = move_balance(&account, &movement)?;
        let entry = self.commit_movement(ledger, &account, moved, movement, now)?;
        Ok(Outcome::Completed(entry))
    }

    /// Apply the penalty rule, persist the account and write its log entries
    fn commit_movement(
        &self,
        ledger: &mut dyn Ledger,
        before: &Account,
        moved: Account,
        movement: Movement,
        now: DateTime<Utc>,
    ) -> Result<Transaction, BankError> {
        let penalty = penalty_due(before, &moved)?;
        let settled = match penalty {
            Some(fee) => moved.with_balance(moved.balance.checked_sub(&fee)?),
            None => moved.clone(),
        };

        ledger.save_account(&settled)?;
        let entry = ledger.record(
            &moved,
            movement.kind,
            movement.amount,
            movement.counterparty,
            now,
        )?;

        if let Some(fee) = penalty {
            ledger.record(&settled, TransactionType::PenaltyFee, fee.negate(), None, now)?;
            debug!(
                "Account {} fell below its minimum balance; charged {}",
                settled.number, fee
            );
        }
        Ok(entry)
    }

    fn is_fraudulent(
        &self,
        ledger: &dyn Ledger,
        account: &Account,
        amount: &Money,
        now: DateTime<Utc>,
    ) -> Result<bool, BankError> {
        let history = ledger.history(account.number, now - self.fraud.lookback(), now)?;
        Ok(self.fraud.evaluate(account, &history, amount, now))
    }
}

fn validate_amount(amount: &Money) -> Result<(), BankError> {
    if amount.is_negative() {
        return Err(BankError::invalid_amount(amount, "must not be negative"));
    }
    Ok(())
}

fn validate_terms(account: &Account) -> Result<(), BankError> {
    for amount in account.terms.amounts() {
        if amount.currency() != account.currency() {
            return Err(BankError::currency_mismatch(
                account.currency(),
                amount.currency(),
            ));
        }
        validate_amount(&amount)?;
    }
    if let Some(rate) = account.interest_rate() {
        if rate.is_sign_negative() && !rate.is_zero() {
            return Err(BankError::invalid_amount(rate, "interest rate must not be negative"));
        }
    }
    if account.balance.compare(&account.overdraft_floor())? == Ordering::Less {
        return Err(BankError::invalid_amount(
            account.balance,
            "opening balance is below the account's floor",
        ));
    }
    Ok(())
}

fn ensure_currency(account: &Account, amount: &Money) -> Result<(), BankError> {
    if account.currency() != amount.currency() {
        return Err(BankError::currency_mismatch(
            account.currency(),
            amount.currency(),
        ));
    }
    Ok(())
}

fn ensure_active(account: &Account) -> Result<(), BankError> {
    if account.is_frozen() {
        return Err(BankError::AccountFrozen {
            account: account.number,
        });
    }
    Ok(())
}

/// New snapshot after applying a signed movement, enforcing the overdraft floor
///
/// Interest charged by the bank is not held to the floor.
fn move_balance(account: &Account, movement: &Movement) -> Result<Account, BankError> {
    let balance = account.balance.checked_add(&movement.amount)?;
    if movement.amount.is_negative()
        && movement.kind != TransactionType::InterestDebit
        && balance.compare(&account.overdraft_floor())? == Ordering::Less
    {
        return Err(BankError::insufficient_funds(
            account.number,
            account.balance,
            movement.amount.abs(),
        ));
    }
    Ok(account.with_balance(balance))
}

/// Fee owed when a movement takes the balance from at-or-above the minimum to
/// below it
fn penalty_due(before: &Account, after: &Account) -> Result<Option<Money>, BankError> {
    let Some(rule) = after.penalty_rule() else {
        return Ok(None);
    };
    let was_above = before.balance.compare(&rule.minimum_balance)? != Ordering::Less;
    let now_below = after.balance.compare(&rule.minimum_balance)? == Ordering::Less;
    Ok((was_above && now_below).then_some(rule.penalty_fee))
}

/// Whether a full period has passed since the last interest payment, or since
/// opening if interest was never paid
fn interest_due(
    ledger: &dyn Ledger,
    account: &Account,
    period: InterestPeriod,
    now: DateTime<Utc>,
) -> Result<bool, BankError> {
    let cutoff = now
        .date_naive()
        .checked_sub_months(Months::new(period.months()))
        .ok_or_else(|| BankError::arithmetic_overflow("interest period"))?;

    Ok(match ledger.last_interest_payment(account.number)? {
        Some(last) => last.timestamp.date_naive() < cutoff,
        None => account.open_date < cutoff,
    })
}
