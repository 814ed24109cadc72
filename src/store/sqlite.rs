//! SQLite storage adapter
//!
//! One table per account variant plus the transaction log, holders and third
//! parties. Decimals are stored as TEXT to stay exact, dates as ISO-8601 TEXT
//! and log timestamps as INTEGER microseconds since the epoch.
//!
//! Every unit of work runs inside `BEGIN IMMEDIATE`, so the write lock is
//! taken up front; a BUSY or LOCKED answer surfaces as a transient
//! [`BankError::Storage`] that the engine may retry.

use crate::core::traits::{Ledger, Storage};
use crate::types::{
    Account, AccountHolder, AccountKind, AccountNumber, AccountStatus, AccountTerms, Address,
    BankError, Currency, HolderId, Money, NewAccountHolder, NewTransaction, ThirdParty,
    Transaction, TransactionType,
};
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

const COMMON_COLUMNS: &str = "number, balance, currency, status, open_date, primary_holder, \
                              secondary_holder, secret_key";

/// Storage backed by a SQLite database
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self, BankError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_millis(250))?;
        Self::from_connection(conn)
    }

    /// Fresh private in-memory database
    pub fn in_memory() -> Result<Self, BankError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, BankError> {
        setup_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl Storage for SqliteStorage {
    fn atomically<T, F>(&self, work: F) -> Result<T, BankError>
    where
        F: FnOnce(&mut dyn Ledger) -> Result<T, BankError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| BankError::storage("sqlite connection lock poisoned"))?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = {
            let mut ledger = SqliteLedger { conn: &tx };
            work(&mut ledger)?
        };
        tx.commit()?;
        Ok(result)
    }
}

/// Create all tables and indexes if they are missing
pub fn setup_schema(conn: &Connection) -> Result<(), BankError> {
    for kind in AccountKind::RESOLUTION_ORDER {
        let extra = terms_columns(kind)
            .iter()
            .map(|column| format!(",\n            {} TEXT NOT NULL", column))
            .collect::<String>();
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
            number INTEGER PRIMARY KEY,
            balance TEXT NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL,
            open_date TEXT NOT NULL,
            primary_holder INTEGER NOT NULL,
            secondary_holder INTEGER,
            secret_key TEXT NOT NULL{}
        )",
                table_for(kind),
                extra
            ),
            [],
        )?;
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_number INTEGER NOT NULL,
            name TEXT NOT NULL,
            amount TEXT NOT NULL,
            balance_after TEXT NOT NULL,
            currency TEXT NOT NULL,
            kind TEXT NOT NULL,
            timestamp INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_account_time
            ON transactions(account_number, timestamp)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS account_holders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            login_id TEXT NOT NULL UNIQUE,
            date_of_birth TEXT NOT NULL,
            street TEXT NOT NULL,
            city TEXT NOT NULL,
            postal_code TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS third_parties (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            hashed_key TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    info!("Database schema ready");
    Ok(())
}

fn table_for(kind: AccountKind) -> &'static str {
    match kind {
        AccountKind::Checking => "checking_accounts",
        AccountKind::Savings => "savings_accounts",
        AccountKind::Student => "student_accounts",
        AccountKind::CreditCard => "credit_cards",
    }
}

fn terms_columns(kind: AccountKind) -> &'static [&'static str] {
    match kind {
        AccountKind::Checking => &["minimum_balance", "penalty_fee"],
        AccountKind::Savings => &["minimum_balance", "penalty_fee", "interest_rate"],
        AccountKind::Student => &[],
        AccountKind::CreditCard => &["credit_limit", "interest_rate"],
    }
}

fn terms_values(terms: &AccountTerms) -> Vec<Value> {
    let text = |d: Decimal| Value::Text(d.to_string());
    match terms {
        AccountTerms::Checking {
            minimum_balance,
            penalty_fee,
        } => vec![text(minimum_balance.amount()), text(penalty_fee.amount())],
        AccountTerms::Savings {
            minimum_balance,
            penalty_fee,
            interest_rate,
        } => vec![
            text(minimum_balance.amount()),
            text(penalty_fee.amount()),
            text(*interest_rate),
        ],
        AccountTerms::Student => Vec::new(),
        AccountTerms::CreditCard {
            credit_limit,
            interest_rate,
        } => vec![text(credit_limit.amount()), text(*interest_rate)],
    }
}

fn to_sql_int(value: u64) -> Result<i64, BankError> {
    i64::try_from(value).map_err(|_| BankError::storage(format!("{} exceeds the integer range", value)))
}

fn from_sql_int(value: i64) -> Result<u64, BankError> {
    u64::try_from(value).map_err(|_| BankError::storage(format!("negative identifier {}", value)))
}

fn parse_decimal(text: &str) -> Result<Decimal, BankError> {
    Decimal::from_str(text)
        .map_err(|e| BankError::storage(format!("bad decimal '{}' in database: {}", text, e)))
}

fn parse_money(text: &str, currency: Currency) -> Result<Money, BankError> {
    Money::new(parse_decimal(text)?, currency)
}

fn parse_date(text: &str) -> Result<NaiveDate, BankError> {
    NaiveDate::from_str(text)
        .map_err(|e| BankError::storage(format!("bad date '{}' in database: {}", text, e)))
}

fn to_micros(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp_micros()
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>, BankError> {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| BankError::storage(format!("bad timestamp {} in database", micros)))
}

/// Raw account row as read from any variant table
struct AccountRow {
    number: i64,
    balance: String,
    currency: String,
    status: String,
    open_date: String,
    primary_holder: i64,
    secondary_holder: Option<i64>,
    secret_key: String,
    terms: Vec<String>,
}

impl AccountRow {
    fn read(row: &rusqlite::Row<'_>, kind: AccountKind) -> rusqlite::Result<Self> {
        let mut terms = Vec::new();
        for column in terms_columns(kind) {
            terms.push(row.get::<_, String>(*column)?);
        }
        Ok(Self {
            number: row.get("number")?,
            balance: row.get("balance")?,
            currency: row.get("currency")?,
            status: row.get("status")?,
            open_date: row.get("open_date")?,
            primary_holder: row.get("primary_holder")?,
            secondary_holder: row.get("secondary_holder")?,
            secret_key: row.get("secret_key")?,
            terms,
        })
    }

    fn into_account(self, kind: AccountKind) -> Result<Account, BankError> {
        let currency = Currency::from_str(&self.currency)?;
        let term = |index: usize| -> Result<&str, BankError> {
            self.terms
                .get(index)
                .map(String::as_str)
                .ok_or_else(|| BankError::storage("missing account terms column"))
        };

        let terms = match kind {
            AccountKind::Checking => AccountTerms::Checking {
                minimum_balance: parse_money(term(0)?, currency)?,
                penalty_fee: parse_money(term(1)?, currency)?,
            },
            AccountKind::Savings => AccountTerms::Savings {
                minimum_balance: parse_money(term(0)?, currency)?,
                penalty_fee: parse_money(term(1)?, currency)?,
                interest_rate: parse_decimal(term(2)?)?,
            },
            AccountKind::Student => AccountTerms::Student,
            AccountKind::CreditCard => AccountTerms::CreditCard {
                credit_limit: parse_money(term(0)?, currency)?,
                interest_rate: parse_decimal(term(1)?)?,
            },
        };

        Ok(Account {
            number: from_sql_int(self.number)?,
            balance: parse_money(&self.balance, currency)?,
            status: AccountStatus::from_str(&self.status)?,
            open_date: parse_date(&self.open_date)?,
            primary_holder: from_sql_int(self.primary_holder)?,
            secondary_holder: self.secondary_holder.map(from_sql_int).transpose()?,
            secret_key: self.secret_key,
            terms,
        })
    }
}

/// Raw transaction row
struct TransactionRow {
    id: i64,
    account_number: i64,
    name: String,
    amount: String,
    balance_after: String,
    currency: String,
    kind: String,
    timestamp: i64,
}

const TRANSACTION_COLUMNS: &str =
    "id, account_number, name, amount, balance_after, currency, kind, timestamp";

impl TransactionRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            account_number: row.get(1)?,
            name: row.get(2)?,
            amount: row.get(3)?,
            balance_after: row.get(4)?,
            currency: row.get(5)?,
            kind: row.get(6)?,
            timestamp: row.get(7)?,
        })
    }

    fn into_transaction(self) -> Result<Transaction, BankError> {
        let currency = Currency::from_str(&self.currency)?;
        Ok(Transaction {
            id: from_sql_int(self.id)?,
            account_number: from_sql_int(self.account_number)?,
            name: self.name,
            amount: parse_money(&self.amount, currency)?,
            balance_after: parse_money(&self.balance_after, currency)?,
            kind: TransactionType::from_str(&self.kind)?,
            timestamp: from_micros(self.timestamp)?,
        })
    }
}

/// Ledger over an open SQLite transaction
struct SqliteLedger<'a> {
    conn: &'a Connection,
}

impl SqliteLedger<'_> {
    fn account_values(account: &Account) -> Result<Vec<Value>, BankError> {
        let mut values = vec![
            Value::Integer(to_sql_int(account.number)?),
            Value::Text(account.balance.amount().to_string()),
            Value::Text(account.currency().code().to_string()),
            Value::Text(account.status.as_str().to_string()),
            Value::Text(account.open_date.to_string()),
            Value::Integer(to_sql_int(account.primary_holder)?),
            match account.secondary_holder {
                Some(holder) => Value::Integer(to_sql_int(holder)?),
                None => Value::Null,
            },
            Value::Text(account.secret_key.clone()),
        ];
        values.extend(terms_values(&account.terms));
        Ok(values)
    }

    fn query_transactions(
        &self,
        sql: &str,
        values: Vec<Value>,
    ) -> Result<Vec<Transaction>, BankError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), TransactionRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }
}

impl Ledger for SqliteLedger<'_> {
    fn find_account(
        &self,
        kind: AccountKind,
        number: AccountNumber,
    ) -> Result<Option<Account>, BankError> {
        let sql = format!("SELECT * FROM {} WHERE number = ?1", table_for(kind));
        let row = self
            .conn
            .query_row(&sql, params![to_sql_int(number)?], |row| {
                AccountRow::read(row, kind)
            })
            .optional()?;
        row.map(|row| row.into_account(kind)).transpose()
    }

    fn insert_account(&mut self, account: &Account) -> Result<(), BankError> {
        let kind = account.kind();
        let columns = terms_columns(kind)
            .iter()
            .fold(COMMON_COLUMNS.to_string(), |acc, column| {
                format!("{}, {}", acc, column)
            });
        let values = Self::account_values(account)?;
        let placeholders = (1..=values.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table_for(kind),
            columns,
            placeholders
        );
        match self.conn.execute(&sql, params_from_iter(values.iter())) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(BankError::DuplicateAccountNumber {
                    account: account.number,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update_account(&mut self, account: &Account) -> Result<(), BankError> {
        let kind = account.kind();
        let mut columns: Vec<&str> = COMMON_COLUMNS.split(", ").map(str::trim).collect();
        columns.extend(terms_columns(kind));
        let values = Self::account_values(account)?;

        // Column 1 is the key; the rest are assigned from their positional parameter
        let assignments = columns
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, column)| format!("{} = ?{}", column, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE number = ?1",
            table_for(kind),
            assignments
        );

        let changed = self.conn.execute(&sql, params_from_iter(values.iter()))?;
        if changed == 0 {
            return Err(BankError::storage(format!(
                "no {} account {} to update",
                kind, account.number
            )));
        }
        Ok(())
    }

    fn list_accounts(&self, kind: AccountKind) -> Result<Vec<Account>, BankError> {
        let sql = format!("SELECT * FROM {} ORDER BY number", table_for(kind));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| AccountRow::read(row, kind))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(|row| row.into_account(kind)).collect()
    }

    fn append_transaction(&mut self, entry: NewTransaction) -> Result<Transaction, BankError> {
        self.conn.execute(
            "INSERT INTO transactions
                (account_number, name, amount, balance_after, currency, kind, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                to_sql_int(entry.account_number)?,
                entry.name,
                entry.amount.amount().to_string(),
                entry.balance_after.amount().to_string(),
                entry.amount.currency().code(),
                entry.kind.as_str(),
                to_micros(entry.timestamp),
            ],
        )?;
        let id = from_sql_int(self.conn.last_insert_rowid())?;
        Ok(entry.with_id(id))
    }

    fn transactions_between(
        &self,
        number: AccountNumber,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, BankError> {
        self.query_transactions(
            &format!(
                "SELECT {} FROM transactions
                 WHERE account_number = ?1 AND timestamp >= ?2 AND timestamp <= ?3
                 ORDER BY timestamp, id",
                TRANSACTION_COLUMNS
            ),
            vec![
                Value::Integer(to_sql_int(number)?),
                Value::Integer(to_micros(start)),
                Value::Integer(to_micros(end)),
            ],
        )
    }

    fn latest_transaction_of(
        &self,
        number: AccountNumber,
        kinds: &[TransactionType],
    ) -> Result<Option<Transaction>, BankError> {
        if kinds.is_empty() {
            return Ok(None);
        }
        let placeholders = (0..kinds.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let mut values = vec![Value::Integer(to_sql_int(number)?)];
        values.extend(kinds.iter().map(|kind| Value::Text(kind.as_str().to_string())));

        let mut entries = self.query_transactions(
            &format!(
                "SELECT {} FROM transactions
                 WHERE account_number = ?1 AND kind IN ({})
                 ORDER BY timestamp DESC, id DESC
                 LIMIT 1",
                TRANSACTION_COLUMNS, placeholders
            ),
            values,
        )?;
        Ok(entries.pop())
    }

    fn find_holder(&self, id: HolderId) -> Result<Option<AccountHolder>, BankError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, login_id, date_of_birth, street, city, postal_code
                 FROM account_holders WHERE id = ?1",
                params![to_sql_int(id)?],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        Address {
                            street: row.get(4)?,
                            city: row.get(5)?,
                            postal_code: row.get(6)?,
                        },
                    ))
                },
            )
            .optional()?;

        row.map(|(id, name, login_id, date_of_birth, address)| {
            Ok(AccountHolder {
                id: from_sql_int(id)?,
                name,
                login_id,
                date_of_birth: parse_date(&date_of_birth)?,
                address,
            })
        })
        .transpose()
    }

    fn insert_holder(&mut self, holder: NewAccountHolder) -> Result<AccountHolder, BankError> {
        let taken = self
            .conn
            .query_row(
                "SELECT 1 FROM account_holders WHERE login_id = ?1",
                params![holder.login_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if taken {
            return Err(BankError::DuplicateLogin {
                login_id: holder.login_id,
            });
        }

        self.conn.execute(
            "INSERT INTO account_holders (name, login_id, date_of_birth, street, city, postal_code)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                holder.name,
                holder.login_id,
                holder.date_of_birth.to_string(),
                holder.address.street,
                holder.address.city,
                holder.address.postal_code,
            ],
        )?;
        Ok(AccountHolder {
            id: from_sql_int(self.conn.last_insert_rowid())?,
            name: holder.name,
            login_id: holder.login_id,
            date_of_birth: holder.date_of_birth,
            address: holder.address,
        })
    }

    fn find_third_party(&self, hashed_key: &str) -> Result<Option<ThirdParty>, BankError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, hashed_key FROM third_parties WHERE hashed_key = ?1",
                params![hashed_key],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, name, hashed_key)| {
            Ok(ThirdParty {
                id: from_sql_int(id)?,
                name,
                hashed_key,
            })
        })
        .transpose()
    }

    fn insert_third_party(
        &mut self,
        name: &str,
        hashed_key: &str,
    ) -> Result<ThirdParty, BankError> {
        if self.find_third_party(hashed_key)?.is_some() {
            return Err(BankError::invalid_credential("Hashed key already registered"));
        }
        self.conn.execute(
            "INSERT INTO third_parties (name, hashed_key) VALUES (?1, ?2)",
            params![name, hashed_key],
        )?;
        Ok(ThirdParty {
            id: from_sql_int(self.conn.last_insert_rowid())?,
            name: name.to_string(),
            hashed_key: hashed_key.to_string(),
        })
    }
}
