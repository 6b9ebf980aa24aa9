//! In-process registry of linked account feeds.
//!
//! A user's event set is the concatenation of the feeds of every account the
//! user linked, pulled in account order.

use crate::sync::event_source::{EventSource, FetchError};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

/// Registration and linking errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountRegistryError {
    #[error("account email is invalid: {0}")]
    InvalidAccountEmail(String),
    #[error("account already registered: {0}")]
    DuplicateAccount(String),
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("user id is invalid: {0:?}")]
    InvalidUserId(String),
}

/// Raw event feed of one linked calendar/email account.
pub trait AccountFeed: Send + Sync {
    fn account_email(&self) -> &str;
    fn pull(&self) -> Result<Vec<Value>, FetchError>;
}

/// Feed over a fixed list of provider records.
#[derive(Debug, Clone)]
pub struct StaticAccountFeed {
    account_email: String,
    records: Vec<Value>,
}

impl StaticAccountFeed {
    pub fn new(account_email: impl Into<String>, records: Vec<Value>) -> Self {
        Self {
            account_email: account_email.into(),
            records,
        }
    }
}

impl AccountFeed for StaticAccountFeed {
    fn account_email(&self) -> &str {
        &self.account_email
    }

    fn pull(&self) -> Result<Vec<Value>, FetchError> {
        Ok(self.records.clone())
    }
}

/// Account feeds plus the per-user links to them.
#[derive(Default)]
pub struct AccountRegistry {
    feeds: BTreeMap<String, Arc<dyn AccountFeed>>,
    links: BTreeMap<String, BTreeSet<String>>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one account feed.
    pub fn register(&mut self, feed: Arc<dyn AccountFeed>) -> Result<(), AccountRegistryError> {
        let account_email = normalize_email(feed.account_email())?;
        if self.feeds.contains_key(&account_email) {
            return Err(AccountRegistryError::DuplicateAccount(account_email));
        }

        self.feeds.insert(account_email, feed);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    /// Links a registered account to a user. Linking twice is a no-op.
    pub fn link(&mut self, user_id: &str, account_email: &str) -> Result<(), AccountRegistryError> {
        let user_id = normalize_user_id(user_id)?;
        let account_email = normalize_email(account_email)?;
        if !self.feeds.contains_key(&account_email) {
            return Err(AccountRegistryError::AccountNotFound(account_email));
        }

        self.links.entry(user_id).or_default().insert(account_email);
        Ok(())
    }

    /// Removes one link; returns whether it existed.
    pub fn unlink(&mut self, user_id: &str, account_email: &str) -> bool {
        let Ok(account_email) = normalize_email(account_email) else {
            return false;
        };
        self.links
            .get_mut(user_id.trim())
            .is_some_and(|accounts| accounts.remove(&account_email))
    }

    /// Returns the sorted accounts linked to `user_id`.
    pub fn linked_accounts(&self, user_id: &str) -> Vec<String> {
        self.links
            .get(user_id.trim())
            .map(|accounts| accounts.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl EventSource for AccountRegistry {
    fn fetch_events(&self, user_id: &str) -> Result<Value, FetchError> {
        let mut records = Vec::new();
        for account_email in self.linked_accounts(user_id) {
            let Some(feed) = self.feeds.get(&account_email) else {
                continue;
            };
            for mut record in feed.pull()? {
                stamp_account(&mut record, &account_email);
                records.push(record);
            }
        }
        Ok(Value::Array(records))
    }
}

/// Fills in the source account on records that do not name one.
fn stamp_account(record: &mut Value, account_email: &str) {
    if let Value::Object(fields) = record {
        if !fields.contains_key("accountEmail") && !fields.contains_key("email") {
            fields.insert(
                "accountEmail".to_string(),
                Value::String(account_email.to_string()),
            );
        }
    }
}

fn normalize_email(value: &str) -> Result<String, AccountRegistryError> {
    let normalized = value.trim().to_ascii_lowercase();
    let well_formed = match normalized.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !normalized.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if well_formed {
        Ok(normalized)
    } else {
        Err(AccountRegistryError::InvalidAccountEmail(value.to_string()))
    }
}

fn normalize_user_id(value: &str) -> Result<String, AccountRegistryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AccountRegistryError::InvalidUserId(value.to_string()));
    }
    Ok(trimmed.to_string())
}
