//! In-memory storage adapter
//!
//! State lives behind a single mutex; a unit of work holds the mutex for its
//! whole duration. Writes are staged in a [`MemoryLedger`] overlay and only
//! applied to the shared state when the unit of work returns `Ok`, so a failed
//! unit of work leaves no trace.

use crate::core::traits::{Ledger, Storage};
use crate::types::{
    Account, AccountHolder, AccountKind, AccountNumber, BankError, HolderId, NewAccountHolder,
    NewTransaction, ThirdParty, Transaction, TransactionType,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<AccountKind, BTreeMap<AccountNumber, Account>>,
    transactions: HashMap<AccountNumber, Vec<Transaction>>,
    holders: BTreeMap<HolderId, AccountHolder>,
    third_parties: Vec<ThirdParty>,
    next_transaction_id: u64,
    next_holder_id: u64,
    next_third_party_id: u64,
}

/// Storage backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn atomically<T, F>(&self, work: F) -> Result<T, BankError>
    where
        F: FnOnce(&mut dyn Ledger) -> Result<T, BankError>,
    {
        let mut state = self
            .state
            .lock()
            .map_err(|_| BankError::storage("memory store lock poisoned"))?;

        let mut ledger = MemoryLedger::new(&state);
        let result = work(&mut ledger)?;
        let changes = ledger.into_changes();

        changes.apply(&mut state);
        Ok(result)
    }
}

/// Writes staged by one unit of work
#[derive(Debug, Default)]
struct Changes {
    accounts: HashMap<(AccountKind, AccountNumber), Account>,
    transactions: Vec<Transaction>,
    holders: Vec<AccountHolder>,
    third_parties: Vec<ThirdParty>,
    next_transaction_id: u64,
    next_holder_id: u64,
    next_third_party_id: u64,
}

impl Changes {
    fn apply(self, state: &mut MemoryState) {
        for ((kind, number), account) in self.accounts {
            state.accounts.entry(kind).or_default().insert(number, account);
        }
        for entry in self.transactions {
            state
                .transactions
                .entry(entry.account_number)
                .or_default()
                .push(entry);
        }
        for holder in self.holders {
            state.holders.insert(holder.id, holder);
        }
        state.third_parties.extend(self.third_parties);
        state.next_transaction_id = self.next_transaction_id;
        state.next_holder_id = self.next_holder_id;
        state.next_third_party_id = self.next_third_party_id;
    }
}

/// Read-through overlay over the committed state
struct MemoryLedger<'a> {
    base: &'a MemoryState,
    staged: Changes,
}

impl<'a> MemoryLedger<'a> {
    fn new(base: &'a MemoryState) -> Self {
        Self {
            base,
            staged: Changes {
                next_transaction_id: base.next_transaction_id,
                next_holder_id: base.next_holder_id,
                next_third_party_id: base.next_third_party_id,
                ..Changes::default()
            },
        }
    }

    fn into_changes(self) -> Changes {
        self.staged
    }

    fn entries_of(&self, number: AccountNumber) -> impl Iterator<Item = &Transaction> {
        self.base
            .transactions
            .get(&number)
            .into_iter()
            .flatten()
            .chain(
                self.staged
                    .transactions
                    .iter()
                    .filter(move |entry| entry.account_number == number),
            )
    }
}

impl Ledger for MemoryLedger<'_> {
    fn find_account(
        &self,
        kind: AccountKind,
        number: AccountNumber,
    ) -> Result<Option<Account>, BankError> {
        if let Some(account) = self.staged.accounts.get(&(kind, number)) {
            return Ok(Some(account.clone()));
        }
        Ok(self
            .base
            .accounts
            .get(&kind)
            .and_then(|store| store.get(&number))
            .cloned())
    }

    fn insert_account(&mut self, account: &Account) -> Result<(), BankError> {
        if self.find_account(account.kind(), account.number)?.is_some() {
            return Err(BankError::DuplicateAccountNumber {
                account: account.number,
            });
        }
        self.staged
            .accounts
            .insert((account.kind(), account.number), account.clone());
        Ok(())
    }

    fn update_account(&mut self, account: &Account) -> Result<(), BankError> {
        if self.find_account(account.kind(), account.number)?.is_none() {
            return Err(BankError::storage(format!(
                "no {} account {} to update",
                account.kind(),
                account.number
            )));
        }
        self.staged
            .accounts
            .insert((account.kind(), account.number), account.clone());
        Ok(())
    }

    fn list_accounts(&self, kind: AccountKind) -> Result<Vec<Account>, BankError> {
        let mut merged: BTreeMap<AccountNumber, Account> = self
            .base
            .accounts
            .get(&kind)
            .cloned()
            .unwrap_or_default();
        for ((staged_kind, number), account) in &self.staged.accounts {
            if *staged_kind == kind {
                merged.insert(*number, account.clone());
            }
        }
        Ok(merged.into_values().collect())
    }

    fn append_transaction(&mut self, entry: NewTransaction) -> Result<Transaction, BankError> {
        self.staged.next_transaction_id += 1;
        let transaction = entry.with_id(self.staged.next_transaction_id);
        self.staged.transactions.push(transaction.clone());
        Ok(transaction)
    }

    fn transactions_between(
        &self,
        number: AccountNumber,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, BankError> {
        let mut entries: Vec<Transaction> = self
            .entries_of(number)
            .filter(|entry| entry.timestamp >= start && entry.timestamp <= end)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| (entry.timestamp, entry.id));
        Ok(entries)
    }

    fn latest_transaction_of(
        &self,
        number: AccountNumber,
        kinds: &[TransactionType],
    ) -> Result<Option<Transaction>, BankError> {
        Ok(self
            .entries_of(number)
            .filter(|entry| kinds.contains(&entry.kind))
            .max_by_key(|entry| (entry.timestamp, entry.id))
            .cloned())
    }

    fn find_holder(&self, id: HolderId) -> Result<Option<AccountHolder>, BankError> {
        if let Some(holder) = self.staged.holders.iter().find(|h| h.id == id) {
            return Ok(Some(holder.clone()));
        }
        Ok(self.base.holders.get(&id).cloned())
    }

    fn insert_holder(&mut self, holder: NewAccountHolder) -> Result<AccountHolder, BankError> {
        let taken = self
            .base
            .holders
            .values()
            .chain(self.staged.holders.iter())
            .any(|existing| existing.login_id == holder.login_id);
        if taken {
            return Err(BankError::DuplicateLogin {
                login_id: holder.login_id,
            });
        }

        self.staged.next_holder_id += 1;
        let holder = AccountHolder {
            id: self.staged.next_holder_id,
            name: holder.name,
            login_id: holder.login_id,
            date_of_birth: holder.date_of_birth,
            address: holder.address,
        };
        self.staged.holders.push(holder.clone());
        Ok(holder)
    }

    fn find_third_party(&self, hashed_key: &str) -> Result<Option<ThirdParty>, BankError> {
        Ok(self
            .base
            .third_parties
            .iter()
            .chain(self.staged.third_parties.iter())
            .find(|party| party.hashed_key == hashed_key)
            .cloned())
    }

    fn insert_third_party(
        &mut self,
        name: &str,
        hashed_key: &str,
    ) -> Result<ThirdParty, BankError> {
        if self.find_third_party(hashed_key)?.is_some() {
            return Err(BankError::invalid_credential("Hashed key already registered"));
        }
        self.staged.next_third_party_id += 1;
        let party = ThirdParty {
            id: self.staged.next_third_party_id,
            name: name.to_string(),
            hashed_key: hashed_key.to_string(),
        };
        self.staged.third_parties.push(party.clone());
        Ok(party)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{hash_key, AccountStatus, AccountTerms, Address, Currency, Money};
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn student(number: AccountNumber) -> Account {
        Account {
            number,
            balance: Money::new(dec!(10), Currency::Usd).unwrap(),
            status: AccountStatus::Active,
            open_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            primary_holder: 1,
            secondary_holder: None,
            secret_key: "key".to_string(),
            terms: AccountTerms::Student,
        }
    }

    fn entry(number: AccountNumber) -> NewTransaction {
        let amount = Money::new(dec!(1), Currency::Usd).unwrap();
        NewTransaction {
            account_number: number,
            name: "USD 1.00 credit".to_string(),
            amount,
            balance_after: amount,
            kind: TransactionType::Credit,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_failed_unit_of_work_is_discarded() {
        let storage = MemoryStorage::new();

        let result: Result<(), BankError> = storage.atomically(|ledger| {
            ledger.insert_account(&student(1))?;
            ledger.append_transaction(entry(1))?;
            Err(BankError::AccountFrozen { account: 1 })
        });
        assert!(result.is_err());

        let (account, entries) = storage
            .atomically(|ledger| {
                let account = ledger.find_account(AccountKind::Student, 1)?;
                let entries = ledger.transactions_between(
                    1,
                    DateTime::<Utc>::MIN_UTC,
                    DateTime::<Utc>::MAX_UTC,
                )?;
                Ok((account, entries))
            })
            .unwrap();
        assert!(account.is_none());
        assert!(entries.is_empty());
    }

    #[test]
    fn test_writes_are_visible_within_and_after_commit() {
        let storage = MemoryStorage::new();

        let seen_inside = storage
            .atomically(|ledger| {
                ledger.insert_account(&student(1))?;
                ledger.update_account(&student(1).frozen())?;
                ledger.find_account(AccountKind::Student, 1)
            })
            .unwrap();
        assert_eq!(seen_inside.map(|a| a.status), Some(AccountStatus::Frozen));

        let listed = storage
            .atomically(|ledger| ledger.list_accounts(AccountKind::Student))
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].is_frozen());
    }

    #[test]
    fn test_ids_are_sequential_across_units_of_work() {
        let storage = MemoryStorage::new();
        let first = storage
            .atomically(|ledger| ledger.append_transaction(entry(1)))
            .unwrap();
        let _rolled_back: Result<(), BankError> = storage.atomically(|ledger| {
            ledger.append_transaction(entry(1))?;
            Err(BankError::storage("abort"))
        });
        let second = storage
            .atomically(|ledger| ledger.append_transaction(entry(2)))
            .unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[test]
    fn test_update_of_missing_account_fails() {
        let storage = MemoryStorage::new();
        let result = storage.atomically(|ledger| ledger.update_account(&student(3)));
        assert!(matches!(result, Err(BankError::Storage { .. })));
    }

    #[test]
    fn test_holders_and_third_parties() {
        let storage = MemoryStorage::new();
        let (holder, party) = storage
            .atomically(|ledger| {
                let holder = ledger.insert_holder(NewAccountHolder {
                    name: "Ada".to_string(),
                    login_id: "ada".to_string(),
                    date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
                    address: Address::default(),
                })?;
                let party = ledger.insert_third_party("acme", &hash_key("k"))?;
                Ok((holder, party))
            })
            .unwrap();

        let (found_holder, found_party, duplicate) = storage
            .atomically(|ledger| {
                let duplicate = ledger.insert_third_party("other", &hash_key("k")).is_err();
                Ok((
                    ledger.find_holder(holder.id)?,
                    ledger.find_third_party(&hash_key("k"))?,
                    duplicate,
                ))
            })
            .unwrap();

        assert_eq!(found_holder, Some(holder));
        assert_eq!(found_party, Some(party));
        assert!(duplicate);
    }

    #[test]
    fn test_login_id_is_unique() {
        let storage = MemoryStorage::new();
        let ada = || NewAccountHolder {
            name: "Ada".to_string(),
            login_id: "ada".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
            address: Address::default(),
        };

        storage.atomically(|ledger| ledger.insert_holder(ada())).unwrap();
        let committed = storage.atomically(|ledger| ledger.insert_holder(ada()));
        let staged = MemoryStorage::new().atomically(|ledger| {
            ledger.insert_holder(ada())?;
            ledger.insert_holder(ada())
        });

        let expected = Err(BankError::DuplicateLogin {
            login_id: "ada".to_string(),
        });
        assert_eq!(committed, expected);
        assert_eq!(staged, expected);
    }
}
