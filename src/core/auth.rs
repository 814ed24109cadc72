//! Access checks for account-scoped requests
//!
//! - Administrators may act on any account
//! - Account holders only on accounts where they are primary or secondary holder
//! - Third parties must present a registered shared key

use super::account_manager::AccountManager;
use super::retry::RetryPolicy;
use super::traits::{IdentityProvider, Storage};
use crate::types::{Account, AccountNumber, BankError, Caller, Role};
use std::sync::Arc;

/// Identity provider returning a fixed caller
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    caller: Option<Caller>,
}

impl StaticIdentity {
    pub fn new(caller: Option<Caller>) -> Self {
        Self { caller }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_caller(&self) -> Option<Caller> {
        self.caller.clone()
    }
}

pub struct Authorizer<S: Storage> {
    storage: Arc<S>,
    identity: Arc<dyn IdentityProvider>,
    retry: RetryPolicy,
}

impl<S: Storage> Authorizer<S> {
    pub fn new(storage: Arc<S>, identity: Arc<dyn IdentityProvider>, retry: RetryPolicy) -> Self {
        Self {
            storage,
            identity,
            retry,
        }
    }

    /// Check that the current caller may act on an account
    ///
    /// # Errors
    ///
    /// `Unauthorized` if there is no caller or the caller is neither an
    /// administrator nor a holder of the account
    pub fn check_authentication(&self, number: AccountNumber) -> Result<bool, BankError> {
        let caller = self
            .identity
            .current_caller()
            .ok_or(BankError::Unauthorized { account: number })?;
        self.authorize(number, &caller)
    }

    /// Check that `caller` may act on an account
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The caller is an administrator or a holder of the account
    /// * `Err(Unauthorized)` - Otherwise
    pub fn authorize(&self, number: AccountNumber, caller: &Caller) -> Result<bool, BankError> {
        if caller.role == Role::Admin {
            return Ok(true);
        }

        let holder_logins = self.retry.run("authorize", || {
            self.storage.atomically(|ledger| {
                let account = ledger.resolve_account(number)?;
                let mut logins = Vec::new();
                for id in std::iter::once(account.primary_holder).chain(account.secondary_holder) {
                    if let Some(holder) = ledger.find_holder(id)? {
                        logins.push(holder.login_id);
                    }
                }
                Ok(logins)
            })
        })?;

        if holder_logins.iter().any(|login| *login == caller.login_id) {
            Ok(true)
        } else {
            Err(BankError::Unauthorized { account: number })
        }
    }

    /// Check the current caller against a registered third-party key
    ///
    /// # Returns
    ///
    /// * `Ok(false)` - No caller
    /// * `Ok(true)` - Administrator, or a third party presenting the same key
    ///
    /// # Errors
    ///
    /// `InvalidCredential` if the key is not registered or the caller is an
    /// account holder
    pub fn verify_third_party(&self, hashed_key: &str) -> Result<bool, BankError> {
        let registered = self
            .retry
            .run("verify third party", || {
                self.storage
                    .atomically(|ledger| ledger.find_third_party(hashed_key))
            })?
            .ok_or_else(|| BankError::invalid_credential("Unknown third-party key"))?;

        let Some(caller) = self.identity.current_caller() else {
            return Ok(false);
        };

        match caller.role {
            Role::Admin => Ok(true),
            Role::ThirdParty => {
                Ok(caller.hashed_key.as_deref() == Some(registered.hashed_key.as_str()))
            }
            Role::AccountHolder => Err(BankError::invalid_credential(
                "Only third parties may present a shared key",
            )),
        }
    }
}

/// Check a presented secret against the account's secret key
pub fn verify_secret_key(secret: &str, account: &Account) -> Result<(), BankError> {
    if secret != account.secret_key {
        return Err(BankError::invalid_credential("Secret key does not match"));
    }
    Ok(())
}
