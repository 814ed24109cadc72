//! Concurrency and atomicity properties of the engine over SQLite

use banking_engine::core::{EngineConfig, RetryPolicy, TransactionEngine};
use banking_engine::store::SqliteStorage;
use banking_engine::types::{
    Account, AccountNumber, AccountStatus, AccountTerms, Address, Currency, Money,
    NewAccountHolder, Transaction, TransactionType,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn usd(amount: Decimal) -> Money {
    Money::new(amount, Currency::Usd).unwrap()
}

fn engine_at(path: &Path) -> TransactionEngine<SqliteStorage> {
    let config = EngineConfig {
        retry: RetryPolicy {
            max_attempts: 10,
            backoff: Duration::from_millis(5),
        },
        ..EngineConfig::default()
    };
    TransactionEngine::new(Arc::new(SqliteStorage::open(path).unwrap()), config)
}

fn seed(engine: &TransactionEngine<SqliteStorage>, accounts: &[(AccountNumber, AccountTerms)]) {
    engine
        .add_holder(NewAccountHolder {
            name: "Ada Lovelace".to_string(),
            login_id: "ada".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 12, 10).unwrap(),
            address: Address::default(),
        })
        .unwrap();
    for (number, terms) in accounts {
        engine
            .open_account(Account {
                number: *number,
                balance: usd(dec!(1000)),
                status: AccountStatus::Active,
                open_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                primary_holder: 1,
                secondary_holder: None,
                secret_key: String::new(),
                terms: *terms,
            })
            .unwrap();
    }
}

fn full_history(engine: &TransactionEngine<SqliteStorage>, number: AccountNumber) -> Vec<Transaction> {
    engine
        .statement(
            number,
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2100, 1, 1).unwrap(),
        )
        .unwrap()
}

#[test]
fn test_concurrent_transfers_conserve_money() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(engine_at(&dir.path().join("bank.db")));
    let numbers: Vec<AccountNumber> = (1..=4).collect();
    let accounts: Vec<_> = numbers.iter().map(|n| (*n, AccountTerms::Student)).collect();
    seed(&engine, &accounts);

    let handles: Vec<_> = (0..4u64)
        .map(|worker| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for round in 0..25u64 {
                    let from = (worker + round) % 4 + 1;
                    let to = if round % 2 == 0 { from % 4 + 1 } else { (from + 2) % 4 + 1 };
                    engine.transfer(from, to, usd(dec!(1))).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut total = Decimal::ZERO;
    let mut entries = 0;
    for number in numbers {
        let account = engine.account(number).unwrap();
        total += account.balance.amount();

        let log = full_history(&engine, number);
        let last = log.last().unwrap();
        assert_eq!(last.balance_after, account.balance);
        entries += log.len();
    }

    assert_eq!(total, dec!(4000));
    assert_eq!(entries, 4 * 25 * 2);
}

#[test]
fn test_concurrent_interest_is_paid_once() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(engine_at(&dir.path().join("bank.db")));
    seed(
        &engine,
        &[(
            1,
            AccountTerms::Savings {
                minimum_balance: usd(dec!(100)),
                penalty_fee: usd(dec!(10)),
                interest_rate: dec!(0.0025),
            },
        )],
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.apply_interest_yearly(1).unwrap())
        })
        .collect();
    let paid = handles
        .into_iter()
        .filter_map(|handle| handle.join().unwrap())
        .count();

    assert_eq!(paid, 1);
    assert_eq!(engine.account(1).unwrap().balance.amount(), dec!(1002.50));
}

#[test]
fn test_two_connections_serialize_on_one_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bank.db");
    let first = Arc::new(engine_at(&path));
    seed(&first, &[(1, AccountTerms::Student)]);
    let second = Arc::new(engine_at(&path));

    let handles: Vec<_> = [first.clone(), second]
        .into_iter()
        .map(|engine| {
            thread::spawn(move || {
                for _ in 0..20 {
                    engine.credit(1, usd(dec!(1))).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(first.account(1).unwrap().balance.amount(), dec!(1040));
    let log = full_history(&first, 1);
    assert_eq!(log.len(), 40);
    assert!(log.iter().all(|entry| entry.kind == TransactionType::Credit));
}
