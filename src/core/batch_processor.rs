//! Batch processing with account-based partitioning
//!
//! This module provides the `BatchProcessor`, which applies a batch of
//! operations concurrently while keeping the input order of every account.
//!
//! # Design
//!
//! A batch is split into partitions such that any two operations touching a
//! common account land in the same partition. A transfer links the partitions
//! of both its accounts, so `transfer 1→2` followed by `debit 2` stays ordered
//! even though the debit only names account 2. Partitions run in parallel on
//! the tokio blocking pool; operations within a partition run in input order.
//!
//! ```text
//! BatchProcessor
//!     └── Arc<TransactionEngine<S>>  (shared, Send + Sync)
//! ```

use super::engine::TransactionEngine;
use super::traits::Storage;
use crate::types::{AccountNumber, BankError, Operation, Transaction};
use log::{error, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// Result of processing a single operation
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub operation: Operation,
    /// Log entries written, or the reason the operation was rejected
    pub result: Result<Vec<Transaction>, BankError>,
}

/// Operations sharing at least one account, transitively
#[derive(Debug, Default)]
struct Partition {
    accounts: Vec<AccountNumber>,
    operations: Vec<(usize, Operation)>,
}

/// Batch processor with account-based partitioning
pub struct BatchProcessor<S: Storage> {
    engine: Arc<TransactionEngine<S>>,
}

impl<S: Storage> Clone for BatchProcessor<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<S: Storage + 'static> BatchProcessor<S> {
    /// Create a new BatchProcessor
    ///
    /// # Arguments
    ///
    /// * `engine` - Arc-wrapped engine shared by every partition
    pub fn new(engine: Arc<TransactionEngine<S>>) -> Self {
        Self { engine }
    }

    /// Split a batch into independent partitions
    ///
    /// # Returns
    ///
    /// Partitions in order of their first operation. Within a partition the
    /// operations keep their input order.
    ///
    /// # Guarantees
    ///
    /// - Each operation appears in exactly one partition
    /// - Operations touching a common account share a partition
    pub fn partition_by_account(&self, batch: Vec<Operation>) -> Vec<Vec<Operation>> {
        let mut owner: HashMap<AccountNumber, usize> = HashMap::new();
        let mut partitions: Vec<Option<Partition>> = Vec::new();

        for (seq, operation) in batch.into_iter().enumerate() {
            let accounts = operation.accounts();

            let mut linked: Vec<usize> = accounts
                .iter()
                .filter_map(|account| owner.get(account).copied())
                .collect();
            linked.sort_unstable();
            linked.dedup();

            let target = match linked.first() {
                Some(&first) => first,
                None => {
                    partitions.push(Some(Partition::default()));
                    partitions.len() - 1
                }
            };

            for &other in linked.iter().skip(1) {
                let Some(merged) = partitions[other].take() else {
                    continue;
                };
                for account in &merged.accounts {
                    owner.insert(*account, target);
                }
                if let Some(partition) = partitions[target].as_mut() {
                    partition.accounts.extend(merged.accounts);
                    partition.operations.extend(merged.operations);
                }
            }

            if let Some(partition) = partitions[target].as_mut() {
                for account in accounts {
                    if owner.insert(account, target).is_none() {
                        partition.accounts.push(account);
                    }
                }
                partition.operations.push((seq, operation));
            }
        }

        partitions
            .into_iter()
            .flatten()
            .map(|mut partition| {
                partition.operations.sort_by_key(|(seq, _)| *seq);
                partition
                    .operations
                    .into_iter()
                    .map(|(_, operation)| operation)
                    .collect()
            })
            .collect()
    }

    /// Apply the operations of one partition sequentially
    ///
    /// Failures are recorded in the results and do not stop the partition.
    pub fn process_partition(&self, operations: Vec<Operation>) -> Vec<ProcessingResult> {
        operations
            .into_iter()
            .map(|operation| {
                let result = self.engine.execute(&operation);
                if let Err(e) = &result {
                    warn!("{} on {:?} rejected: {}", operation.name(), operation.accounts(), e);
                }
                ProcessingResult { operation, result }
            })
            .collect()
    }

    /// Process a batch with account-based partitioning
    ///
    /// # Returns
    ///
    /// One result per operation. Results are grouped by partition, so they may
    /// be in a different order than the input.
    pub async fn process_batch(&self, batch: Vec<Operation>) -> Vec<ProcessingResult> {
        let mut tasks = Vec::new();
        for partition in self.partition_by_account(batch) {
            let processor = self.clone();
            tasks.push(tokio::task::spawn_blocking(move || {
                processor.process_partition(partition)
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(partition_results) => results.extend(partition_results),
                Err(e) => error!("Partition task failed: {}", e),
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::EngineConfig;
    use crate::store::MemoryStorage;
    use crate::types::{
        Account, AccountStatus, AccountTerms, Address, Currency, Money, NewAccountHolder,
    };
    use chrono::NaiveDate;
    use rstest::rstest;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::Usd).unwrap()
    }

    fn processor() -> BatchProcessor<MemoryStorage> {
        let engine = TransactionEngine::new(Arc::new(MemoryStorage::new()), EngineConfig::default());
        engine
            .add_holder(NewAccountHolder {
                name: "Ada".to_string(),
                login_id: "ada".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                address: Address::default(),
            })
            .unwrap();
        for number in 1..=4 {
            engine
                .open_account(Account {
                    number,
                    balance: usd(dec!(100)),
                    status: AccountStatus::Active,
                    open_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                    primary_holder: 1,
                    secondary_holder: None,
                    secret_key: String::new(),
                    terms: AccountTerms::Student,
                })
                .unwrap();
        }
        BatchProcessor::new(Arc::new(engine))
    }

    fn credit(account: AccountNumber) -> Operation {
        Operation::Credit {
            account,
            amount: usd(dec!(1)),
        }
    }

    fn transfer(from: AccountNumber, to: AccountNumber) -> Operation {
        Operation::Transfer {
            from,
            to,
            amount: usd(dec!(1)),
        }
    }

    #[rstest]
    #[case::empty(vec![], vec![])]
    #[case::independent(
        vec![credit(1), credit(2), credit(1)],
        vec![vec![credit(1), credit(1)], vec![credit(2)]]
    )]
    #[case::transfer_links_accounts(
        vec![credit(1), credit(2), transfer(1, 2), credit(3)],
        vec![vec![credit(1), credit(2), transfer(1, 2)], vec![credit(3)]]
    )]
    #[case::late_link_keeps_order(
        vec![credit(2), credit(1), credit(3), transfer(3, 2), credit(4)],
        vec![vec![credit(2), credit(3), transfer(3, 2)], vec![credit(1)], vec![credit(4)]]
    )]
    fn test_partition_by_account(
        #[case] batch: Vec<Operation>,
        #[case] expected: Vec<Vec<Operation>>,
    ) {
        assert_eq!(processor().partition_by_account(batch), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_process_batch_preserves_per_account_order() {
        let processor = processor();
        let batch = vec![
            Operation::Transfer {
                from: 1,
                to: 2,
                amount: usd(dec!(50)),
            },
            Operation::Debit {
                account: 2,
                amount: usd(dec!(150)),
            },
            credit(3),
            Operation::Debit {
                account: 4,
                amount: usd(dec!(500)),
            },
        ];

        let results = processor.process_batch(batch).await;

        assert_eq!(results.len(), 4);
        let failures: Vec<_> = results
            .iter()
            .filter(|r| r.result.is_err())
            .map(|r| r.operation.accounts())
            .collect();
        assert_eq!(failures, vec![vec![4]]);

        let engine = &processor.engine;
        assert_eq!(engine.account(1).unwrap().balance.amount(), dec!(50));
        assert_eq!(engine.account(2).unwrap().balance.amount(), dec!(0));
        assert_eq!(engine.account(3).unwrap().balance.amount(), dec!(101));
        assert_eq!(engine.account(4).unwrap().balance.amount(), dec!(100));
    }
}
