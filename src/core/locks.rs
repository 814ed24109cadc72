//! Per-account lock table
//!
//! Operations on the same account are serialized by a mutex per account
//! number held in a `DashMap`. Multi-account operations acquire their locks in
//! ascending account-number order so two transfers in opposite directions
//! cannot deadlock. An entry is dropped once no caller holds or waits for it,
//! so the table only grows with the number of accounts in use at once.

use crate::types::AccountNumber;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Table of per-account mutexes, created on first use
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: DashMap<AccountNumber, Arc<Mutex<()>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, number: AccountNumber) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(number).or_default().value())
    }

    /// Run `f` while holding the locks of every account in `numbers`
    ///
    /// Duplicates are ignored. A poisoned lock is taken over: the data it
    /// guards lives in storage, which rolled back the panicking unit of work.
    pub fn with_locked<T>(&self, numbers: &[AccountNumber], f: impl FnOnce() -> T) -> T {
        let mut ordered = numbers.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let handles: Vec<Arc<Mutex<()>>> = ordered.iter().map(|n| self.handle(*n)).collect();
        let guards: Vec<MutexGuard<'_, ()>> = handles
            .iter()
            .map(|handle| handle.lock().unwrap_or_else(PoisonError::into_inner))
            .collect();

        let result = f();

        drop(guards);
        drop(handles);
        for number in &ordered {
            self.locks
                .remove_if(number, |_, lock| Arc::strong_count(lock) == 1);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_same_account_is_serialized() {
        let locks = Arc::new(AccountLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    locks.with_locked(&[1], || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(2));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_opposite_transfers_do_not_deadlock() {
        let locks = Arc::new(AccountLocks::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let locks = Arc::clone(&locks);
                thread::spawn(move || {
                    let pair = if i % 2 == 0 { [1, 2] } else { [2, 1] };
                    for _ in 0..100 {
                        locks.with_locked(&pair, || ());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_duplicate_numbers_lock_once() {
        let locks = AccountLocks::new();
        assert_eq!(locks.with_locked(&[4, 4], || 7), 7);
    }

    #[test]
    fn test_idle_entries_are_released() {
        let locks = AccountLocks::new();

        let held_inside = locks.with_locked(&[1, 2], || locks.locks.len());
        for number in 3..100 {
            locks.with_locked(&[number], || ());
        }

        assert_eq!(held_inside, 2);
        assert!(locks.locks.is_empty());
    }
}
