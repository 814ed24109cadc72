//! Account holders, third parties and callers
//!
//! Holders own accounts (as primary or secondary holder). Third parties are
//! external services identified only by the SHA-256 digest of their shared
//! key; the plain key is never stored.

use crate::types::{BankError, HolderId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;

/// Third party identifier
pub type ThirdPartyId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub postal_code: String,
}

/// A registered account holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountHolder {
    pub id: HolderId,
    pub name: String,
    pub login_id: String,
    pub date_of_birth: NaiveDate,
    pub address: Address,
}

/// Holder registration request; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccountHolder {
    pub name: String,
    pub login_id: String,
    pub date_of_birth: NaiveDate,
    pub address: Address,
}

/// A registered third party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThirdParty {
    pub id: ThirdPartyId,
    pub name: String,
    pub hashed_key: String,
}

/// Role of an authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    AccountHolder,
    ThirdParty,
}

impl FromStr for Role {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "admin" => Ok(Role::Admin),
            "holder" | "account-holder" => Ok(Role::AccountHolder),
            "third-party" | "thirdparty" => Ok(Role::ThirdParty),
            other => Err(BankError::parse(format!("Unknown role '{}'", other))),
        }
    }
}

/// The authenticated principal behind a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub login_id: String,
    pub role: Role,
    /// Digest of the caller's third-party key, if it presented one
    pub hashed_key: Option<String>,
}

impl Caller {
    pub fn admin(login_id: &str) -> Self {
        Self {
            login_id: login_id.to_string(),
            role: Role::Admin,
            hashed_key: None,
        }
    }

    pub fn holder(login_id: &str) -> Self {
        Self {
            login_id: login_id.to_string(),
            role: Role::AccountHolder,
            hashed_key: None,
        }
    }

    /// Third-party caller presenting its plain shared key
    pub fn third_party(login_id: &str, key: &str) -> Self {
        Self {
            login_id: login_id.to_string(),
            role: Role::ThirdParty,
            hashed_key: Some(hash_key(key)),
        }
    }
}

/// Lowercase hex SHA-256 digest of a shared key
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}
