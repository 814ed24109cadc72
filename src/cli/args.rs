use crate::core::{EngineConfig, RetryPolicy};
use crate::strategy::BatchConfig;
use crate::types::{
    AccountKind, AccountNumber, AccountTerms, BankError, Caller, Currency, HolderId,
    InterestPeriod, Money, Role,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

/// Operate the bank: accounts, transfers, interest and batch files
#[derive(Parser, Debug)]
#[command(name = "bank")]
#[command(about = "Operate the bank: accounts, transfers, interest and batch files", long_about = None)]
pub struct CliArgs {
    /// SQLite database file
    #[arg(
        long,
        env = "BANK_DATABASE",
        value_name = "PATH",
        default_value = "bank.db",
        global = true
    )]
    pub database: PathBuf,

    /// Login id of the caller; without it the command runs as the operator
    #[arg(long, value_name = "ID", global = true)]
    pub login: Option<String>,

    /// Role of the caller: admin, holder or third-party
    #[arg(long, value_name = "ROLE", default_value = "holder", global = true)]
    pub role: Role,

    /// Shared key of a third-party caller
    #[arg(long, value_name = "KEY", global = true)]
    pub key: Option<String>,

    /// Secret key of the account, required from third-party callers
    #[arg(long = "account-secret", value_name = "SECRET", global = true)]
    pub account_secret: Option<String>,

    /// How often a unit of work is retried when the database is busy
    #[arg(long = "max-retries", value_name = "COUNT", default_value_t = 2, global = true)]
    pub max_retries: u32,

    /// Currency of amounts given on the command line or in batch files
    #[arg(long, value_name = "CODE", default_value = "USD", global = true)]
    pub currency: Currency,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database schema
    Init,

    /// Register an account holder
    AddHolder(HolderArgs),

    /// Open an account
    Open(OpenArgs),

    /// Register a third party and its shared key
    RegisterThirdParty {
        #[arg(long)]
        name: String,
        #[arg(long)]
        key: String,
    },

    /// Credit an account
    Credit {
        account: AccountNumber,
        amount: Decimal,
    },

    /// Debit an account
    Debit {
        account: AccountNumber,
        amount: Decimal,
    },

    /// Move funds between two accounts
    Transfer {
        from: AccountNumber,
        to: AccountNumber,
        amount: Decimal,
    },

    /// Print the log entries of an account for whole days
    History {
        account: AccountNumber,
        #[arg(long, value_name = "YYYY-MM-DD")]
        from: NaiveDate,
        #[arg(long, value_name = "YYYY-MM-DD")]
        to: NaiveDate,
    },

    /// Accrue interest on one account if it is due
    Interest {
        account: AccountNumber,
        /// monthly or yearly; defaults to the account's own schedule
        #[arg(long)]
        period: Option<InterestPeriod>,
    },

    /// Accrue due interest on every interest-bearing account
    SweepInterest,

    /// Print the current state of an account
    Balance { account: AccountNumber },

    /// Apply a CSV file of operations
    Process(ProcessArgs),
}

#[derive(Args, Debug)]
pub struct HolderArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long = "login-id")]
    pub login_id: String,
    #[arg(long = "birth-date", value_name = "YYYY-MM-DD")]
    pub birth_date: NaiveDate,
    #[arg(long, default_value = "")]
    pub street: String,
    #[arg(long, default_value = "")]
    pub city: String,
    #[arg(long = "postal-code", default_value = "")]
    pub postal_code: String,
}

#[derive(Args, Debug)]
pub struct OpenArgs {
    #[arg(long)]
    pub number: AccountNumber,
    /// checking, savings, student or credit-card
    #[arg(long)]
    pub kind: AccountKind,
    #[arg(long, default_value = "0")]
    pub balance: Decimal,
    #[arg(long)]
    pub holder: HolderId,
    #[arg(long = "secondary-holder")]
    pub secondary_holder: Option<HolderId>,
    #[arg(long = "secret-key")]
    pub secret_key: String,
    /// Opening date; defaults to today
    #[arg(long = "open-date", value_name = "YYYY-MM-DD")]
    pub open_date: Option<NaiveDate>,
    #[arg(long = "minimum-balance")]
    pub minimum_balance: Option<Decimal>,
    #[arg(long = "penalty-fee")]
    pub penalty_fee: Option<Decimal>,
    #[arg(long = "interest-rate")]
    pub interest_rate: Option<Decimal>,
    #[arg(long = "credit-limit")]
    pub credit_limit: Option<Decimal>,
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Input CSV file with columns type, account, counterparty, amount[, currency]
    #[arg(value_name = "INPUT")]
    pub input_file: PathBuf,

    /// Processing strategy: 'sync' or 'async'
    #[arg(long = "strategy", value_name = "STRATEGY", default_value = "async")]
    pub strategy: StrategyType,

    /// Number of operations per batch (async mode only)
    #[arg(long = "batch-size", value_name = "SIZE")]
    pub batch_size: Option<usize>,

    /// Maximum number of partitions applied concurrently (async mode only)
    #[arg(long = "max-concurrent", value_name = "COUNT")]
    pub max_concurrent_batches: Option<usize>,
}

/// Available processing strategies for batch files
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Engine settings derived from the global flags
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            currency: self.currency,
            retry: RetryPolicy {
                max_attempts: self.max_retries.saturating_add(1),
                ..RetryPolicy::default()
            },
            ..EngineConfig::default()
        }
    }

    /// The caller described by `--login`, `--role` and `--key`
    ///
    /// # Returns
    ///
    /// The operator (an administrator) when no login is given
    ///
    /// # Errors
    ///
    /// `InvalidCredential` if a third-party caller gives no key
    pub fn caller(&self) -> Result<Caller, BankError> {
        let Some(login) = self.login.as_deref() else {
            return Ok(Caller::admin("operator"));
        };

        match self.role {
            Role::Admin => Ok(Caller::admin(login)),
            Role::AccountHolder => Ok(Caller::holder(login)),
            Role::ThirdParty => {
                let key = self
                    .key
                    .as_deref()
                    .ok_or_else(|| BankError::invalid_credential("Third parties must give --key"))?;
                Ok(Caller::third_party(login, key))
            }
        }
    }

    /// Amount in the configured currency
    pub fn money(&self, amount: Decimal) -> Result<Money, BankError> {
        Money::new(amount, self.currency)
    }
}

impl OpenArgs {
    /// Variant terms from the per-kind flags
    ///
    /// # Errors
    ///
    /// `Parse` if a flag the kind needs is missing
    pub fn terms(&self, currency: Currency) -> Result<AccountTerms, BankError> {
        let required = |value: Option<Decimal>, flag: &str| {
            value.ok_or_else(|| {
                BankError::parse(format!("--{} is required for {} accounts", flag, self.kind))
            })
        };
        let money = |value: Option<Decimal>, flag: &str| {
            required(value, flag).and_then(|amount| Money::new(amount, currency))
        };

        Ok(match self.kind {
            AccountKind::Checking => AccountTerms::Checking {
                minimum_balance: money(self.minimum_balance, "minimum-balance")?,
                penalty_fee: money(self.penalty_fee, "penalty-fee")?,
            },
            AccountKind::Savings => AccountTerms::Savings {
                minimum_balance: money(self.minimum_balance, "minimum-balance")?,
                penalty_fee: money(self.penalty_fee, "penalty-fee")?,
                interest_rate: required(self.interest_rate, "interest-rate")?,
            },
            AccountKind::Student => AccountTerms::Student,
            AccountKind::CreditCard => AccountTerms::CreditCard {
                credit_limit: money(self.credit_limit, "credit-limit")?,
                interest_rate: required(self.interest_rate, "interest-rate")?,
            },
        })
    }
}

impl ProcessArgs {
    /// Create a BatchConfig from the process flags, falling back to defaults
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn process_args(args: &[&str]) -> ProcessArgs {
        match CliArgs::try_parse_from(args).unwrap().command {
            Command::Process(process) => process,
            other => panic!("Expected process command, got {:?}", other),
        }
    }

    #[rstest]
    #[case::default_strategy(&["bank", "process", "ops.csv"], StrategyType::Async)]
    #[case::explicit_sync(&["bank", "process", "--strategy", "sync", "ops.csv"], StrategyType::Sync)]
    #[case::explicit_async(&["bank", "process", "--strategy", "async", "ops.csv"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategyType) {
        assert_eq!(process_args(args).strategy, expected);
    }

    #[rstest]
    #[case::all_defaults(&["bank", "process", "ops.csv"], 1000, num_cpus::get())]
    #[case::custom_batch_size(&["bank", "process", "--batch-size", "2000", "ops.csv"], 2000, num_cpus::get())]
    #[case::custom_max_concurrent(&["bank", "process", "--max-concurrent", "8", "ops.csv"], 1000, 8)]
    #[case::zero_batch_size(&["bank", "process", "--batch-size", "0", "ops.csv"], 1000, num_cpus::get())]
    #[case::zero_max_concurrent(&["bank", "process", "--max-concurrent", "0", "ops.csv"], 1000, num_cpus::get())]
    fn test_batch_config_conversion(
        #[case] args: &[&str],
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = process_args(args).to_batch_config();

        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_max_concurrent);
    }

    #[rstest]
    #[case::operator(&["bank", "balance", "1"], Caller::admin("operator"))]
    #[case::holder(&["bank", "--login", "ada", "balance", "1"], Caller::holder("ada"))]
    #[case::admin(&["bank", "balance", "1", "--login", "root", "--role", "admin"], Caller::admin("root"))]
    #[case::third_party(
        &["bank", "--login", "acme", "--role", "third-party", "--key", "k", "balance", "1"],
        Caller::third_party("acme", "k")
    )]
    fn test_caller(#[case] args: &[&str], #[case] expected: Caller) {
        assert_eq!(CliArgs::try_parse_from(args).unwrap().caller(), Ok(expected));
    }

    #[test]
    fn test_third_party_without_key() {
        let args =
            CliArgs::try_parse_from(["bank", "--login", "acme", "--role", "third-party", "balance", "1"])
                .unwrap();
        assert!(matches!(
            args.caller(),
            Err(BankError::InvalidCredential { .. })
        ));
    }

    #[test]
    fn test_engine_config_from_flags() {
        let args =
            CliArgs::try_parse_from(["bank", "--max-retries", "0", "--currency", "eur", "init"])
                .unwrap();
        let config = args.to_engine_config();

        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.currency, Currency::Eur);
    }

    #[test]
    fn test_transfer_parsing() {
        let args = CliArgs::try_parse_from(["bank", "transfer", "1", "2", "250.00"]).unwrap();
        match args.command {
            Command::Transfer { from, to, amount } => {
                assert_eq!((from, to, amount), (1, 2, dec!(250)));
            }
            other => panic!("Expected transfer, got {:?}", other),
        }
    }

    #[rstest]
    #[case::savings(
        &["--kind", "savings", "--minimum-balance", "100", "--penalty-fee", "10", "--interest-rate", "0.0025"],
        true
    )]
    #[case::savings_without_rate(&["--kind", "savings", "--minimum-balance", "100", "--penalty-fee", "10"], false)]
    #[case::student(&["--kind", "student"], true)]
    #[case::credit_card(&["--kind", "credit-card", "--credit-limit", "500", "--interest-rate", "0.2"], true)]
    #[case::checking_without_fee(&["--kind", "checking", "--minimum-balance", "250"], false)]
    fn test_open_terms(#[case] flags: &[&str], #[case] valid: bool) {
        let mut args = vec!["bank", "open", "--number", "1", "--holder", "1", "--secret-key", "s"];
        args.extend_from_slice(flags);

        let open = match CliArgs::try_parse_from(args).unwrap().command {
            Command::Open(open) => open,
            other => panic!("Expected open command, got {:?}", other),
        };
        assert_eq!(open.terms(Currency::Usd).is_ok(), valid);
    }
}
