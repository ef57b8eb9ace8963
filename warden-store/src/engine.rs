//! # Privilege Engine
//!
//! Grant, revoke, drop and rename over the tables of one transaction.
//!
//! ## Compound actions
//!
//! A role never holds both `all` and one of its members on the same path:
//!
//! - granting `all` detaches the role from the member-action records of that
//!   path;
//! - granting a member when the role already holds `all` is a no-op;
//! - revoking a member from an `all` record detaches the role and re-grants
//!   the remaining members individually.
//!
//! ## Included-by set
//!
//! Revoke, drop, rename and the provider query all work on the records a
//! target "includes": same component and service, same grant option when the
//! target specifies one, and a resource path that starts with the target's
//! path. That is the target record itself plus everything scoped beneath it.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;
use warden_model::{
    Action, ActionRegistry, Authorizable, HierarchyRegistry, PrivilegeDescriptor, ALL_ACTION,
};

use crate::error::{StoreError, StoreResult};
use crate::tables::{PrivilegeId, PrivilegeKey, PrivilegeRecord, Tables};

/// Record filter used to compute an included-by set.
#[derive(Debug, Clone)]
struct PartialFilter {
    component: String,
    service: String,
    grant_option: Option<bool>,
    steps: Vec<Authorizable>,
}

impl PartialFilter {
    fn from_descriptor(descriptor: &PrivilegeDescriptor) -> Self {
        Self {
            component: descriptor.component().to_string(),
            service: descriptor.service().to_string(),
            grant_option: descriptor.grant_option(),
            steps: descriptor.authorizables().to_vec(),
        }
    }
}

/// Privilege operations bound to the component registries.
#[derive(Debug, Clone, Copy)]
pub struct PrivilegeEngine<'a> {
    actions: &'a ActionRegistry,
    hierarchies: &'a HierarchyRegistry,
}

impl<'a> PrivilegeEngine<'a> {
    /// Create an engine over the given registries.
    pub fn new(actions: &'a ActionRegistry, hierarchies: &'a HierarchyRegistry) -> Self {
        Self {
            actions,
            hierarchies,
        }
    }

    /// Get the action registry.
    pub fn actions(&self) -> &'a ActionRegistry {
        self.actions
    }

    /// Get the hierarchy registry.
    pub fn hierarchies(&self) -> &'a HierarchyRegistry {
        self.hierarchies
    }

    /// Resolve the action and encode the path of a descriptor.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for unknown components or actions, `Unsupported` when the
    /// path does not fit a registered hierarchy.
    pub fn to_key(&self, descriptor: &PrivilegeDescriptor) -> StoreResult<PrivilegeKey> {
        let action = self
            .actions
            .resolve(descriptor.component(), descriptor.action())?;
        let path = self
            .hierarchies
            .encode(descriptor.component(), descriptor.authorizables())?;

        Ok(PrivilegeKey {
            component: descriptor.component().to_string(),
            service: descriptor.service().to_string(),
            action: action.name().to_string(),
            scope: descriptor.scope().to_string(),
            grant_option: descriptor.grant_option(),
            path,
        })
    }

    /// Turn a record back into a descriptor.
    pub fn to_descriptor(&self, record: &PrivilegeRecord) -> StoreResult<PrivilegeDescriptor> {
        let key = &record.key;
        let steps = self.hierarchies.decode(&key.component, &key.path)?;
        Ok(PrivilegeDescriptor::builder()
            .component(key.component.as_str())
            .service(key.service.as_str())
            .action(key.action.as_str())
            .scope(key.scope.as_str())
            .maybe_grant_option(key.grant_option)
            .authorizables(steps)
            .build()?)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Grant a privilege to a role.
    pub fn grant(
        &self,
        tables: &mut Tables,
        role: &str,
        descriptor: &PrivilegeDescriptor,
        grantor: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let role = tables.require_role(role)?;
        let key = self.to_key(descriptor)?;
        self.grant_role_partial(tables, &role, key, grantor, now)
    }

    /// Revoke a privilege, and everything it includes, from a role.
    pub fn revoke(
        &self,
        tables: &mut Tables,
        role: &str,
        descriptor: &PrivilegeDescriptor,
        grantor: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let role = tables.require_role(role)?;
        let target = self.to_key(descriptor)?;
        let target_action = self.actions.resolve(&target.component, &target.action)?;

        let roles = BTreeSet::from([role.clone()]);
        let filter = PartialFilter::from_descriptor(descriptor);
        for id in self.included_by(tables, &filter, Some(&roles))? {
            self.revoke_role_partial(tables, &role, target_action, id, grantor, now)?;
        }
        Ok(())
    }

    /// Remove a privilege, and everything it includes, from every role.
    ///
    /// A blank action drops every action.
    pub fn drop(
        &self,
        tables: &mut Tables,
        descriptor: &PrivilegeDescriptor,
        requestor: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let component = descriptor.component();
        let action_name = if descriptor.action().trim().is_empty() {
            ALL_ACTION
        } else {
            descriptor.action()
        };
        let target_action = self.actions.resolve(component, action_name)?;
        self.hierarchies.encode(component, descriptor.authorizables())?;

        let filter = PartialFilter::from_descriptor(descriptor);
        for (id, role) in self.held_by_any(tables, &filter)? {
            self.revoke_role_partial(tables, &role, target_action, id, requestor, now)?;
        }
        Ok(())
    }

    /// Move every privilege under `old_steps` to `new_steps`.
    ///
    /// The leading steps of each affected path are replaced position by
    /// position; deeper steps, action, scope, grant option and roles carry
    /// over.
    pub fn rename(
        &self,
        tables: &mut Tables,
        component: &str,
        service: &str,
        old_steps: &[Authorizable],
        new_steps: &[Authorizable],
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        if old_steps.len() != new_steps.len() {
            return Err(StoreError::InvalidInput(format!(
                "rename needs paths of equal length, got {} and {}",
                old_steps.len(),
                new_steps.len()
            )));
        }
        let component = component.trim().to_lowercase();
        let old_steps = lowercase_steps(old_steps);
        let new_steps = lowercase_steps(new_steps);
        self.hierarchies.encode(&component, &old_steps)?;
        self.hierarchies.encode(&component, &new_steps)?;
        let all = self.actions.all_action(&component)?.to_action();

        let filter = PartialFilter {
            component: component.clone(),
            service: service.trim().to_lowercase(),
            grant_option: None,
            steps: old_steps,
        };
        for (id, role) in self.held_by_any(tables, &filter)? {
            let Some(record) = tables.privilege(id).cloned() else {
                continue;
            };
            let mut steps = self.hierarchies.decode(&component, &record.key.path)?;
            for (step, replacement) in steps.iter_mut().zip(&new_steps) {
                *step = replacement.clone();
            }
            let renamed = PrivilegeKey {
                path: self.hierarchies.encode(&component, &steps)?,
                ..record.key.clone()
            };

            debug!(role = %role, privilege_id = id, "Moving privilege to renamed path");
            self.revoke_role_partial(tables, &role, &all, id, &record.grantor, now)?;
            self.grant_role_partial(tables, &role, renamed, &record.grantor, now)?;
        }
        Ok(())
    }

    fn grant_role_partial(
        &self,
        tables: &mut Tables,
        role: &str,
        key: PrivilegeKey,
        grantor: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let all = self.actions.all_action(&key.component)?;
        let requested = self.actions.resolve(&key.component, &key.action)?;

        if *requested == all.to_action() {
            for member in all.actions() {
                if let Some(id) = tables.find_privilege(&key.with_action(member.name())) {
                    if tables.detach(role, id) {
                        debug!(role = %role, action = %member, "Retracting action covered by all");
                    }
                }
            }
        } else if let Some(id) = tables.find_privilege(&key.with_action(all.name())) {
            if tables.role_holds(role, id) {
                debug!(role = %role, action = %requested, "Role already holds all, grant skipped");
                return Ok(());
            }
        }

        let id = tables.find_or_insert_privilege(key, grantor, now);
        tables.attach(role, id);
        Ok(())
    }

    fn revoke_role_partial(
        &self,
        tables: &mut Tables,
        role: &str,
        target: &Action,
        id: PrivilegeId,
        grantor: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let Some(record) = tables.privilege(id).cloned() else {
            return Ok(());
        };
        let component = record.key.component.as_str();
        let all = self.actions.all_action(component)?;
        let held = self.actions.resolve(component, &record.key.action)?;

        if *target == all.to_action() {
            tables.detach(role, id);
        } else if *held == all.to_action() {
            tables.detach(role, id);
            for left in all.left_actions(target) {
                debug!(role = %role, action = %left, "Re-granting action left over from all");
                let left_id =
                    tables.find_or_insert_privilege(record.key.with_action(left.name()), grantor, now);
                tables.attach(role, left_id);
            }
        } else if held == target {
            tables.detach(role, id);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    fn included_by(
        &self,
        tables: &Tables,
        filter: &PartialFilter,
        roles: Option<&BTreeSet<String>>,
    ) -> StoreResult<Vec<PrivilegeId>> {
        let candidates: Vec<(PrivilegeId, &PrivilegeRecord)> = match roles {
            Some(roles) => tables
                .privileges_of_roles(roles)
                .into_iter()
                .filter_map(|id| tables.privilege(id).map(|record| (id, record)))
                .collect(),
            None => tables.privileges().collect(),
        };

        let mut included = Vec::new();
        for (id, record) in candidates {
            let key = &record.key;
            if key.component != filter.component || key.service != filter.service {
                continue;
            }
            if filter.grant_option.is_some() && key.grant_option != filter.grant_option {
                continue;
            }
            let steps = self.hierarchies.decode(&key.component, &key.path)?;
            if steps.starts_with(&filter.steps) {
                included.push(id);
            }
        }
        Ok(included)
    }

    /// Snapshot of every (record, role) pair in the included-by set.
    fn held_by_any(
        &self,
        tables: &Tables,
        filter: &PartialFilter,
    ) -> StoreResult<Vec<(PrivilegeId, String)>> {
        Ok(self
            .included_by(tables, filter, None)?
            .into_iter()
            .flat_map(|id| tables.roles_of(id).into_iter().map(move |role| (id, role)))
            .collect())
    }

    /// Every privilege held by any of `roles`.
    pub fn privileges_for_roles(
        &self,
        tables: &Tables,
        roles: &BTreeSet<String>,
    ) -> StoreResult<HashSet<PrivilegeDescriptor>> {
        tables
            .privileges_of_roles(roles)
            .into_iter()
            .filter_map(|id| tables.privilege(id))
            .map(|record| self.to_descriptor(record))
            .collect()
    }

    /// Privileges of a service at or beneath `steps`.
    ///
    /// `roles` restricts the result to privileges those roles hold; `None`
    /// means every role.
    pub fn privileges_for_provider(
        &self,
        tables: &Tables,
        component: &str,
        service: &str,
        roles: Option<&BTreeSet<String>>,
        steps: &[Authorizable],
    ) -> StoreResult<HashSet<PrivilegeDescriptor>> {
        let filter = PartialFilter {
            component: component.trim().to_lowercase(),
            service: service.trim().to_lowercase(),
            grant_option: None,
            steps: lowercase_steps(steps),
        };
        self.included_by(tables, &filter, roles)?
            .into_iter()
            .filter_map(|id| tables.privilege(id))
            .map(|record| self.to_descriptor(record))
            .collect()
    }
}

/// Steps with lower-cased names, as they are stored.
pub(crate) fn lowercase_steps(steps: &[Authorizable]) -> Vec<Authorizable> {
    steps
        .iter()
        .map(|step| Authorizable::new(step.type_name(), step.name().to_lowercase()))
        .collect()
}
