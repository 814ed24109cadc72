//! End-to-end integration tests
//!
//! Each test opens a fresh SQLite bank with the same five accounts, applies
//! tests/fixtures/{name}/input.csv through a processing strategy and compares
//! the written account states with expected.csv.
//!
//! | account | kind        | balance | terms                               |
//! |---------|-------------|---------|-------------------------------------|
//! | 1       | checking    | 1000    | minimum 250, fee 40                 |
//! | 2       | savings     | 2000    | minimum 100, fee 10, rate 0.0025    |
//! | 3       | student     | 100     |                                     |
//! | 4       | credit-card | 0       | limit 500, rate 0.12                |
//! | 5       | savings     | 1000    | minimum 100, fee 10, rate 0.0025    |
//!
//! Each fixture is run twice: once with the sync strategy and once with the
//! async strategy.

#[cfg(test)]
mod tests {
    use banking_engine::cli::StrategyType;
    use banking_engine::core::{EngineConfig, TransactionEngine};
    use banking_engine::store::SqliteStorage;
    use banking_engine::strategy::{create_strategy, BatchConfig};
    use banking_engine::types::{
        Account, AccountStatus, AccountTerms, Address, Currency, Money, NewAccountHolder,
    };
    use chrono::NaiveDate;
    use rstest::rstest;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::Usd).unwrap()
    }

    fn open_bank(dir: &TempDir) -> Arc<TransactionEngine<SqliteStorage>> {
        let storage = Arc::new(SqliteStorage::open(&dir.path().join("bank.db")).unwrap());
        let engine = TransactionEngine::new(storage, EngineConfig::default());

        engine
            .add_holder(NewAccountHolder {
                name: "Ada Lovelace".to_string(),
                login_id: "ada".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(1990, 12, 10).unwrap(),
                address: Address::default(),
            })
            .unwrap();

        let savings = AccountTerms::Savings {
            minimum_balance: usd(dec!(100)),
            penalty_fee: usd(dec!(10)),
            interest_rate: dec!(0.0025),
        };
        let accounts = [
            (
                1,
                dec!(1000),
                AccountTerms::Checking {
                    minimum_balance: usd(dec!(250)),
                    penalty_fee: usd(dec!(40)),
                },
            ),
            (2, dec!(2000), savings),
            (3, dec!(100), AccountTerms::Student),
            (
                4,
                dec!(0),
                AccountTerms::CreditCard {
                    credit_limit: usd(dec!(500)),
                    interest_rate: dec!(0.12),
                },
            ),
            (5, dec!(1000), savings),
        ];

        for (number, balance, terms) in accounts {
            engine
                .open_account(Account {
                    number,
                    balance: usd(balance),
                    status: AccountStatus::Active,
                    open_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                    primary_holder: 1,
                    secondary_holder: None,
                    secret_key: format!("secret-{}", number),
                    terms,
                })
                .unwrap();
        }

        Arc::new(engine)
    }

    /// Run a fixture by processing input.csv and comparing with expected.csv
    ///
    /// # Panics
    ///
    /// Panics if the fixture files cannot be read or the output differs
    fn run_test_fixture(fixture_name: &str, strategy_type: StrategyType) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );

        let dir = TempDir::new().expect("Failed to create temp dir");
        let strategy = create_strategy(
            strategy_type,
            Some(BatchConfig::new(2, 4)),
            open_bank(&dir),
        );

        let mut output = Vec::new();
        strategy
            .process(Path::new(&input_path), &mut output)
            .unwrap_or_else(|e| panic!("Failed to process operations: {}", e));

        let actual_output = String::from_utf8(output).expect("Output is not UTF-8");
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (strategy: {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, strategy_type, actual_output, expected_output
        );
    }

    #[rstest]
    #[case("happy_path")]
    #[case("minimum_balance_penalty")]
    #[case("fraud_freeze")]
    #[case("insufficient_funds")]
    #[case("malformed_data")]
    #[case("interest_accrual")]
    fn test_fixtures(
        #[case] fixture: &str,
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        run_test_fixture(fixture, strategy);
    }

    #[rstest]
    fn test_state_survives_reopen(
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        let dir = TempDir::new().unwrap();
        let engine = open_bank(&dir);
        let strategy = create_strategy(strategy, None, engine);
        strategy
            .process(Path::new("tests/fixtures/happy_path/input.csv"), &mut std::io::sink())
            .unwrap();
        drop(strategy);

        let storage = Arc::new(SqliteStorage::open(&dir.path().join("bank.db")).unwrap());
        let reopened = TransactionEngine::new(storage, EngineConfig::default());

        assert_eq!(reopened.account(2).unwrap().balance.amount(), dec!(2250));
        let statement = reopened
            .statement(
                1,
                NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2100, 1, 1).unwrap(),
            )
            .unwrap();
        assert_eq!(statement.len(), 2);
    }
}
