//! Local accounts and the persistence boundary
//!
//! The auth core never owns account data. It reads it through the
//! [`AccountDirectory`] trait, which the surrounding service implements
//! against its store. [`MemoryAccountDirectory`] backs local development and
//! tests.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Parent account; owns a family and its children
    Parent,
    /// Child account inside a family
    Child,
    /// Administrative account
    Admin,
}

impl Role {
    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Child => "child",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parent" => Ok(Self::Parent),
            "child" => Ok(Self::Child),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Account record as stored by the persistence collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalAccount {
    /// Internal account id
    pub id: String,
    /// Linked identity id (`sub`)
    pub identity_id: String,
    /// Disabled accounts are refused at authentication
    pub active: bool,
    /// Account role
    pub role: Role,
    /// Family (tenant) the account belongs to, if any
    pub family_id: Option<String>,
}

impl LocalAccount {
    /// Active account with no family
    pub fn new(id: impl Into<String>, identity_id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            identity_id: identity_id.into(),
            active: true,
            role,
            family_id: None,
        }
    }

    /// Place the account in a family
    #[must_use]
    pub fn in_family(mut self, family_id: impl Into<String>) -> Self {
        self.family_id = Some(family_id.into());
        self
    }

    /// Mark the account inactive
    #[must_use]
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Persistence lookup failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// No such record
    #[error("not found")]
    NotFound,

    /// The ownership edge does not exist
    #[error("not owned")]
    NotOwned,

    /// The store could not answer
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of accounts and ownership edges
#[async_trait]
pub trait AccountDirectory: Send + Sync + fmt::Debug {
    /// Account linked to `identity_id`
    ///
    /// # Errors
    ///
    /// [`DirectoryError::NotFound`] when no account is linked.
    async fn find_by_identity(&self, identity_id: &str) -> Result<LocalAccount, DirectoryError>;

    /// Confirm `parent_account_id` owns `child_account_id`
    ///
    /// # Errors
    ///
    /// Any error means the edge is not confirmed.
    async fn verify_parent_of_child(
        &self,
        parent_account_id: &str,
        child_account_id: &str,
    ) -> Result<(), DirectoryError>;

    /// Confirm `family_id` owns `word_set_id`
    ///
    /// # Errors
    ///
    /// Any error means the edge is not confirmed.
    async fn verify_family_owns_word_set(
        &self,
        family_id: &str,
        word_set_id: &str,
    ) -> Result<(), DirectoryError>;
}

/// In-memory [`AccountDirectory`]
#[derive(Debug, Default)]
pub struct MemoryAccountDirectory {
    /// identity id -> account
    accounts: DashMap<String, LocalAccount>,
    /// parent account id -> child account ids
    children: DashMap<String, HashSet<String>>,
    /// word set id -> owning family id
    word_sets: DashMap<String, String>,
}

impl MemoryAccountDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account
    pub fn insert_account(&self, account: LocalAccount) {
        self.accounts.insert(account.identity_id.clone(), account);
    }

    /// Record that `parent_account_id` owns `child_account_id`
    pub fn link_child(&self, parent_account_id: impl Into<String>, child_account_id: impl Into<String>) {
        self.children
            .entry(parent_account_id.into())
            .or_default()
            .insert(child_account_id.into());
    }

    /// Record that `family_id` owns `word_set_id`
    pub fn assign_word_set(&self, word_set_id: impl Into<String>, family_id: impl Into<String>) {
        self.word_sets.insert(word_set_id.into(), family_id.into());
    }

    /// Number of stored accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether no accounts are stored
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountDirectory for MemoryAccountDirectory {
    async fn find_by_identity(&self, identity_id: &str) -> Result<LocalAccount, DirectoryError> {
        self.accounts
            .get(identity_id)
            .map(|entry| entry.value().clone())
            .ok_or(DirectoryError::NotFound)
    }

    async fn verify_parent_of_child(
        &self,
        parent_account_id: &str,
        child_account_id: &str,
    ) -> Result<(), DirectoryError> {
        let children = self
            .children
            .get(parent_account_id)
            .ok_or(DirectoryError::NotFound)?;
        if children.contains(child_account_id) {
            Ok(())
        } else {
            Err(DirectoryError::NotOwned)
        }
    }

    async fn verify_family_owns_word_set(
        &self,
        family_id: &str,
        word_set_id: &str,
    ) -> Result<(), DirectoryError> {
        let owner = self
            .word_sets
            .get(word_set_id)
            .ok_or(DirectoryError::NotFound)?;
        if owner.value() == family_id {
            Ok(())
        } else {
            Err(DirectoryError::NotOwned)
        }
    }
}
