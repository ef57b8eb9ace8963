//! User to group resolution.
//!
//! The grant option check needs the grantor's groups. Where they come from
//! (a directory service, the OS, a static file) is up to the host, behind the
//! [`GroupMapping`] trait.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use crate::error::StoreResult;

/// Resolves the groups a user belongs to.
#[async_trait]
pub trait GroupMapping: Send + Sync {
    /// Get the groups of `user`. Unknown users have no groups.
    async fn groups_for(&self, user: &str) -> StoreResult<HashSet<String>>;
}

/// Group mapping backed by a fixed table, usually taken from configuration.
///
/// # Example
///
/// ```
/// use warden_store::StaticGroupMapping;
///
/// let mapping = StaticGroupMapping::new().with_user("Alice", ["Admins"]);
/// assert!(mapping.contains_user("alice"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticGroupMapping {
    users: HashMap<String, HashSet<String>>,
}

impl StaticGroupMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a user to groups table.
    pub fn from_map(users: &HashMap<String, Vec<String>>) -> Self {
        users
            .iter()
            .fold(Self::new(), |mapping, (user, groups)| mapping.with_user(user, groups))
    }

    /// Add groups for a user. Names are trimmed and lower-cased.
    pub fn with_user<I, S>(mut self, user: &str, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.users
            .entry(user.trim().to_lowercase())
            .or_default()
            .extend(groups.into_iter().map(|group| group.as_ref().trim().to_lowercase()));
        self
    }

    /// Check if the user has an entry.
    pub fn contains_user(&self, user: &str) -> bool {
        self.users.contains_key(&user.trim().to_lowercase())
    }
}

#[async_trait]
impl GroupMapping for StaticGroupMapping {
    async fn groups_for(&self, user: &str) -> StoreResult<HashSet<String>> {
        Ok(self
            .users
            .get(&user.trim().to_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}
