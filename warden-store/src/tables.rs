//! # Tables
//!
//! The fully materialized state of the store: roles, groups, privilege
//! records and the two association tables that link them.
//!
//! Associations are explicit `(role, group)` and `(role, privilege)` rows, so
//! adding or removing one association never touches another. A transaction
//! works on its own copy of [`Tables`] and either replaces the live state on
//! commit or is discarded.
//!
//! Role and group names are trimmed and lower-cased at this boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use warden_model::EncodedPath;

use crate::error::{StoreError, StoreResult};

/// Normalize a role or group name.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalize a set of role or group names.
pub fn normalize_names<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| normalize_name(name.as_ref()))
        .collect()
}

/// Identifier of a persisted privilege record.
pub type PrivilegeId = u64;

/// A role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRow {
    /// Normalized role name
    pub name: String,
    /// When the role was created
    pub created_at: DateTime<Utc>,
}

/// A group. Groups are created on first association and never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRow {
    /// Normalized group name
    pub name: String,
    /// When the group was first associated with a role
    pub created_at: DateTime<Utc>,
}

/// The fields that make two privilege records the same privilege.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrivilegeKey {
    /// Component name
    pub component: String,
    /// Service name
    pub service: String,
    /// Resolved action name
    pub action: String,
    /// Scope label
    pub scope: String,
    /// Grant option as requested
    pub grant_option: Option<bool>,
    /// Hierarchy tag and resource slots
    pub path: EncodedPath,
}

impl PrivilegeKey {
    /// Copy of this key with another action.
    pub fn with_action(&self, action: &str) -> Self {
        Self {
            action: action.to_string(),
            ..self.clone()
        }
    }
}

/// A persisted privilege.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeRecord {
    /// Identity fields
    #[serde(flatten)]
    pub key: PrivilegeKey,
    /// Principal that first granted the privilege
    pub grantor: String,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

/// Every table of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tables {
    roles: BTreeMap<String, RoleRow>,
    groups: BTreeMap<String, GroupRow>,
    role_groups: BTreeSet<(String, String)>,
    privileges: BTreeMap<PrivilegeId, PrivilegeRecord>,
    role_privileges: BTreeSet<(String, PrivilegeId)>,
    next_privilege_id: PrivilegeId,
}

impl Tables {
    /// Create empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Roles and groups
    // ------------------------------------------------------------------

    /// Check if a role exists.
    pub fn role_exists(&self, role: &str) -> bool {
        self.roles.contains_key(&normalize_name(role))
    }

    /// Get a role.
    pub fn role(&self, role: &str) -> Option<&RoleRow> {
        self.roles.get(&normalize_name(role))
    }

    /// Fail with `NoSuchObject` unless the role exists.
    pub fn require_role(&self, role: &str) -> StoreResult<String> {
        let name = normalize_name(role);
        if self.roles.contains_key(&name) {
            Ok(name)
        } else {
            Err(StoreError::NoSuchObject(format!("role {}", name)))
        }
    }

    /// Create a role.
    pub fn create_role(&mut self, role: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let name = normalize_name(role);
        if name.is_empty() {
            return Err(StoreError::InvalidInput("role name must not be blank".to_string()));
        }
        if self.roles.contains_key(&name) {
            return Err(StoreError::AlreadyExists(format!("role {}", name)));
        }
        self.roles.insert(
            name.clone(),
            RoleRow {
                name,
                created_at: now,
            },
        );
        Ok(())
    }

    /// Drop a role with its group and privilege associations.
    ///
    /// Privilege records left without roles are pruned by the caller.
    pub fn drop_role(&mut self, role: &str) -> StoreResult<()> {
        let name = self.require_role(role)?;
        self.roles.remove(&name);
        self.role_groups.retain(|(r, _)| *r != name);
        self.role_privileges.retain(|(r, _)| *r != name);
        Ok(())
    }

    /// Associate groups with a role, creating groups that do not exist yet.
    pub fn add_groups_to_role<I, S>(&mut self, role: &str, groups: I, now: DateTime<Utc>) -> StoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let role = self.require_role(role)?;
        for group in normalize_names(groups) {
            self.groups.entry(group.clone()).or_insert_with(|| GroupRow {
                name: group.clone(),
                created_at: now,
            });
            self.role_groups.insert((role.clone(), group));
        }
        Ok(())
    }

    /// Detach groups from a role.
    ///
    /// Fails with `NoSuchObject` if the role or any of the groups does not
    /// exist; nothing is detached in that case.
    pub fn remove_groups_from_role<I, S>(&mut self, role: &str, groups: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let role = self.require_role(role)?;
        let groups = normalize_names(groups);
        if let Some(missing) = groups.iter().find(|group| !self.groups.contains_key(*group)) {
            return Err(StoreError::NoSuchObject(format!("group {}", missing)));
        }
        for group in groups {
            self.role_groups.remove(&(role.clone(), group));
        }
        Ok(())
    }

    /// Roles associated with any of `groups`.
    pub fn roles_for_groups<I, S>(&self, groups: I) -> HashSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let groups = normalize_names(groups);
        self.role_groups
            .iter()
            .filter(|(_, group)| groups.contains(group))
            .map(|(role, _)| role.clone())
            .collect()
    }

    /// Groups associated with any of `roles`.
    pub fn groups_for_roles<I, S>(&self, roles: I) -> HashSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roles = normalize_names(roles);
        self.role_groups
            .iter()
            .filter(|(role, _)| roles.contains(role))
            .map(|(_, group)| group.clone())
            .collect()
    }

    /// Number of roles.
    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    // ------------------------------------------------------------------
    // Privileges
    // ------------------------------------------------------------------

    /// Find the record with exactly this key.
    pub fn find_privilege(&self, key: &PrivilegeKey) -> Option<PrivilegeId> {
        self.privileges
            .iter()
            .find(|(_, record)| record.key == *key)
            .map(|(id, _)| *id)
    }

    /// Get a record.
    pub fn privilege(&self, id: PrivilegeId) -> Option<&PrivilegeRecord> {
        self.privileges.get(&id)
    }

    /// Iterate over every record.
    pub fn privileges(&self) -> impl Iterator<Item = (PrivilegeId, &PrivilegeRecord)> {
        self.privileges.iter().map(|(id, record)| (*id, record))
    }

    /// Number of records.
    pub fn privilege_count(&self) -> usize {
        self.privileges.len()
    }

    /// Find the record with this key or insert a new one.
    pub fn find_or_insert_privilege(
        &mut self,
        key: PrivilegeKey,
        grantor: &str,
        now: DateTime<Utc>,
    ) -> PrivilegeId {
        if let Some(id) = self.find_privilege(&key) {
            return id;
        }
        self.next_privilege_id += 1;
        let id = self.next_privilege_id;
        self.privileges.insert(
            id,
            PrivilegeRecord {
                key,
                grantor: grantor.to_string(),
                created_at: now,
            },
        );
        id
    }

    /// Check if the role holds the record.
    pub fn role_holds(&self, role: &str, id: PrivilegeId) -> bool {
        self.role_privileges.contains(&(normalize_name(role), id))
    }

    /// Attach a record to a role.
    pub fn attach(&mut self, role: &str, id: PrivilegeId) {
        self.role_privileges.insert((normalize_name(role), id));
    }

    /// Detach a record from a role. Returns true if it was attached.
    pub fn detach(&mut self, role: &str, id: PrivilegeId) -> bool {
        self.role_privileges.remove(&(normalize_name(role), id))
    }

    /// Roles holding the record.
    pub fn roles_of(&self, id: PrivilegeId) -> Vec<String> {
        self.role_privileges
            .iter()
            .filter(|(_, held)| *held == id)
            .map(|(role, _)| role.clone())
            .collect()
    }

    /// Records held by any of `roles`.
    pub fn privileges_of_roles(&self, roles: &BTreeSet<String>) -> BTreeSet<PrivilegeId> {
        self.role_privileges
            .iter()
            .filter(|(role, _)| roles.contains(role))
            .map(|(_, id)| *id)
            .collect()
    }

    /// Delete records no role holds. Returns how many were deleted.
    pub fn prune_orphans(&mut self) -> usize {
        let held: HashSet<PrivilegeId> = self.role_privileges.iter().map(|(_, id)| *id).collect();
        let before = self.privileges.len();
        self.privileges.retain(|id, _| held.contains(id));
        before - self.privileges.len()
    }
}
