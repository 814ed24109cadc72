//! Command-line interface
//!
//! `parse_args` reads the arguments; `run` opens the database, builds the
//! engine and the authorizer, checks the caller and executes one command.
//! Results are written as CSV (accounts, log entries) or a short line of text.

mod args;

pub use args::{CliArgs, Command, HolderArgs, OpenArgs, ProcessArgs, StrategyType};

use crate::core::{verify_secret_key, Authorizer, StaticIdentity, TransactionEngine};
use crate::io::{write_accounts_csv, write_transactions_csv};
use crate::store::SqliteStorage;
use crate::strategy;
use crate::types::{
    hash_key, Account, AccountNumber, AccountStatus, Address, BankError, Caller, InterestPeriod,
    NewAccountHolder, Role,
};
use chrono::Utc;
use clap::Parser;
use log::{info, warn};
use std::io::Write;
use std::sync::Arc;

/// Parse command-line arguments using clap
///
/// On invalid arguments or `--help`, clap prints the message and exits.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// Execute the parsed command against the database named by `--database`
///
/// # Arguments
///
/// * `args` - Parsed command line
/// * `output` - Receives the command's CSV or text output
///
/// # Errors
///
/// Any engine, authorization, storage or I/O error of the command
pub fn run(args: CliArgs, output: &mut dyn Write) -> Result<(), BankError> {
    let config = args.to_engine_config();
    let storage = Arc::new(SqliteStorage::open(&args.database)?);
    let engine = Arc::new(TransactionEngine::new(Arc::clone(&storage), config.clone()));

    let caller = args.caller()?;
    let gate = Gate {
        authorizer: Authorizer::new(
            storage,
            Arc::new(StaticIdentity::new(Some(caller.clone()))),
            config.retry,
        ),
        engine: Arc::clone(&engine),
        caller,
        account_secret: args.account_secret.clone(),
    };

    match &args.command {
        Command::Init => {
            gate.require_admin()?;
            info!("Database ready at {}", args.database.display());
            writeln!(output, "Database ready at {}", args.database.display())?;
        }
        Command::AddHolder(holder) => {
            gate.require_admin()?;
            let holder = engine.add_holder(NewAccountHolder {
                name: holder.name.clone(),
                login_id: holder.login_id.clone(),
                date_of_birth: holder.birth_date,
                address: Address {
                    street: holder.street.clone(),
                    city: holder.city.clone(),
                    postal_code: holder.postal_code.clone(),
                },
            })?;
            writeln!(output, "Holder {} registered as {}", holder.id, holder.login_id)?;
        }
        Command::Open(open) => {
            gate.require_admin()?;
            let account = engine.open_account(Account {
                number: open.number,
                balance: args.money(open.balance)?,
                status: AccountStatus::Active,
                open_date: open.open_date.unwrap_or_else(|| Utc::now().date_naive()),
                primary_holder: open.holder,
                secondary_holder: open.secondary_holder,
                secret_key: open.secret_key.clone(),
                terms: open.terms(args.currency)?,
            })?;
            write_accounts_csv(&[account], output)?;
        }
        Command::RegisterThirdParty { name, key } => {
            gate.require_admin()?;
            let party = engine.register_third_party(name, key)?;
            writeln!(output, "Third party {} registered as {}", party.id, party.name)?;
        }
        Command::Credit { account, amount } => {
            gate.require_access(*account)?;
            let entry = engine.credit(*account, args.money(*amount)?)?;
            write_transactions_csv(&[entry], output)?;
        }
        Command::Debit { account, amount } => {
            gate.require_access(*account)?;
            let entry = engine.debit(*account, args.money(*amount)?)?;
            write_transactions_csv(&[entry], output)?;
        }
        Command::Transfer { from, to, amount } => {
            gate.require_access(*from)?;
            let (debit, credit) = engine.transfer(*from, *to, args.money(*amount)?)?;
            write_transactions_csv(&[debit, credit], output)?;
        }
        Command::History { account, from, to } => {
            gate.require_access(*account)?;
            let entries = engine.statement(*account, *from, *to)?;
            write_transactions_csv(&entries, output)?;
        }
        Command::Interest { account, period } => {
            gate.require_access(*account)?;
            let entry = match period {
                Some(InterestPeriod::Monthly) => engine.apply_interest_monthly(*account)?,
                Some(InterestPeriod::Yearly) => engine.apply_interest_yearly(*account)?,
                None => engine.apply_interest(*account)?,
            };
            match entry {
                Some(entry) => write_transactions_csv(&[entry], output)?,
                None => writeln!(output, "No interest due for account {}", account)?,
            }
        }
        Command::SweepInterest => {
            gate.require_admin()?;
            let mut entries = Vec::new();
            for (number, result) in engine.sweep_interest()? {
                match result {
                    Ok(Some(entry)) => entries.push(entry),
                    Ok(None) => {}
                    Err(e) => warn!("Interest on account {} failed: {}", number, e),
                }
            }
            info!("Interest sweep wrote {} entries", entries.len());
            write_transactions_csv(&entries, output)?;
        }
        Command::Balance { account } => {
            gate.require_access(*account)?;
            write_accounts_csv(&[engine.account(*account)?], output)?;
        }
        Command::Process(process) => {
            gate.require_admin()?;
            let config = match process.strategy {
                StrategyType::Async => Some(process.to_batch_config()),
                StrategyType::Sync => None,
            };
            strategy::create_strategy(process.strategy, config, engine)
                .process(&process.input_file, output)?;
        }
    }

    Ok(())
}

/// Authorization checks for one invocation
struct Gate {
    authorizer: Authorizer<SqliteStorage>,
    engine: Arc<TransactionEngine<SqliteStorage>>,
    caller: Caller,
    account_secret: Option<String>,
}

impl Gate {
    fn require_admin(&self) -> Result<(), BankError> {
        if self.caller.role != Role::Admin {
            return Err(BankError::invalid_credential(
                "This command requires an administrator",
            ));
        }
        Ok(())
    }

    /// Holders and administrators go through the holder check; third parties
    /// must present a registered key and the account's secret key
    fn require_access(&self, number: AccountNumber) -> Result<(), BankError> {
        if self.caller.role != Role::ThirdParty {
            self.authorizer.check_authentication(number)?;
            return Ok(());
        }

        let hashed_key = self.caller.hashed_key.clone().unwrap_or_else(|| hash_key(""));
        if !self.authorizer.verify_third_party(&hashed_key)? {
            return Err(BankError::invalid_credential("Third-party key does not match"));
        }

        let secret = self
            .account_secret
            .as_deref()
            .ok_or_else(|| BankError::invalid_credential("Third parties must give --account-secret"))?;
        verify_secret_key(secret, &self.engine.account(number)?)
    }
}
