//! Account management module
//!
//! This module provides the `AccountManager` extension trait, implemented for
//! every [`Ledger`]. It owns the polymorphic view over the per-variant stores:
//!
//! - Resolving an account number to whichever variant holds it
//! - Saving a snapshot back to the one store that holds it
//! - Opening accounts while keeping numbers unique across all stores
//!
//! Stores are searched in [`AccountKind::RESOLUTION_ORDER`]. A number found in
//! more than one store is never silently resolved to the first match.

use super::traits::Ledger;
use crate::types::{Account, AccountKind, AccountNumber, BankError};

/// Polymorphic account operations over the per-variant stores
pub trait AccountManager {
    /// Find the store holding `number`, if any
    ///
    /// # Returns
    ///
    /// * `Ok(Some(account))` - Exactly one store holds the number
    /// * `Ok(None)` - No store holds the number
    /// * `Err(BankError::AmbiguousAccount)` - More than one store holds it
    fn locate_account(&self, number: AccountNumber) -> Result<Option<Account>, BankError>;

    /// Resolve an account number to its current snapshot
    ///
    /// # Errors
    ///
    /// * `AccountNotFound` if no variant store holds the number
    /// * `AmbiguousAccount` if more than one does
    fn resolve_account(&self, number: AccountNumber) -> Result<Account, BankError>;

    /// Persist a snapshot to the store currently holding its number
    ///
    /// Fails with a storage error if the number lives in a store of a
    /// different variant than the snapshot.
    fn save_account(&mut self, account: &Account) -> Result<(), BankError>;

    /// Add a new account, rejecting numbers already used by any variant
    fn open_account(&mut self, account: &Account) -> Result<(), BankError>;

    /// Every account across all variants, ordered by number
    fn all_accounts(&self) -> Result<Vec<Account>, BankError>;
}

impl<L: Ledger + ?Sized> AccountManager for L {
    fn locate_account(&self, number: AccountNumber) -> Result<Option<Account>, BankError> {
        let mut found: Option<Account> = None;

        for kind in AccountKind::RESOLUTION_ORDER {
            if let Some(account) = self.find_account(kind, number)? {
                if let Some(first) = &found {
                    return Err(BankError::AmbiguousAccount {
                        account: number,
                        first: first.kind().to_string(),
                        second: kind.to_string(),
                    });
                }
                found = Some(account);
            }
        }

        Ok(found)
    }

    fn resolve_account(&self, number: AccountNumber) -> Result<Account, BankError> {
        self.locate_account(number)?
            .ok_or_else(|| BankError::account_not_found(number))
    }

    fn save_account(&mut self, account: &Account) -> Result<(), BankError> {
        let stored = self.resolve_account(account.number)?;
        if stored.kind() != account.kind() {
            return Err(BankError::storage(format!(
                "account {} is stored as {} but was saved as {}",
                account.number,
                stored.kind(),
                account.kind()
            )));
        }
        self.update_account(account)
    }

    fn open_account(&mut self, account: &Account) -> Result<(), BankError> {
        if self.locate_account(account.number)?.is_some() {
            return Err(BankError::DuplicateAccountNumber {
                account: account.number,
            });
        }
        self.insert_account(account)
    }

    fn all_accounts(&self) -> Result<Vec<Account>, BankError> {
        let mut accounts = Vec::new();
        for kind in AccountKind::RESOLUTION_ORDER {
            accounts.extend(self.list_accounts(kind)?);
        }
        accounts.sort_by_key(|account| account.number);
        Ok(accounts)
    }
}
