//! # Privilege Store
//!
//! The operation-level interface consumed by the RPC layer.
//!
//! Every mutation runs in one write transaction. On failure the transaction
//! is rolled back and the error is returned as is. On success the commit and
//! the sequence increment happen under one lock, so sequence ids totally
//! order commits, and a [`StoreEvent`] is published with the resulting
//! [`CommitContext`]. A failed publish is logged and never undoes a commit.
//!
//! Queries run in their own read transaction and do not touch the sequence.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warden_model::{Authorizable, PrivilegeDescriptor};
//! use warden_store::{PrivilegeStore, StoreConfig};
//!
//! async fn grant_example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PrivilegeStore::from_config(&StoreConfig::from_env()?).await?;
//!
//!     store.create_role("analysts", "admin").await?;
//!     store.add_groups_to_role("analysts", ["analytics"], "admin").await?;
//!
//!     let query = PrivilegeDescriptor::builder()
//!         .component("solr")
//!         .service("service1")
//!         .action("query")
//!         .scope("collection")
//!         .authorizables(vec![Authorizable::new("Collection", "logs")])
//!         .build()?;
//!     let commit = store.grant_privilege("analysts", &query, "admin").await?;
//!     println!("granted at {}", commit);
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn, Instrument};
use uuid::Uuid;
use warden_events::{CommitContext, EventBus, StoreEvent};
use warden_model::{ActionRegistry, Authorizable, HierarchyRegistry, PrivilegeDescriptor};

use crate::backend::{JsonFileBackend, MemoryBackend, StoreBackend};
use crate::config::StoreConfig;
use crate::engine::{lowercase_steps, PrivilegeEngine};
use crate::error::{StoreError, StoreResult};
use crate::grant_option::{check_grant_option, require_grantor};
use crate::groups::{GroupMapping, StaticGroupMapping};
use crate::tables::{normalize_name, normalize_names, Tables};

/// Default wait for a transaction.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transactional store of roles, groups and privileges.
pub struct PrivilegeStore {
    backend: Arc<dyn StoreBackend>,
    actions: Arc<ActionRegistry>,
    hierarchies: Arc<HierarchyRegistry>,
    admin_groups: HashSet<String>,
    group_mapping: Arc<dyn GroupMapping>,
    events: Option<Arc<dyn EventBus>>,
    server_uuid: Uuid,
    sequence: Arc<Mutex<u64>>,
}

impl std::fmt::Debug for PrivilegeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivilegeStore")
            .field("server_uuid", &self.server_uuid)
            .field("admin_groups", &self.admin_groups)
            .field("events", &self.events.is_some())
            .finish()
    }
}

/// Builder for [`PrivilegeStore`].
pub struct PrivilegeStoreBuilder {
    actions: Arc<ActionRegistry>,
    hierarchies: Arc<HierarchyRegistry>,
    backend: Option<Arc<dyn StoreBackend>>,
    admin_groups: HashSet<String>,
    group_mapping: Option<Arc<dyn GroupMapping>>,
    events: Option<Arc<dyn EventBus>>,
}

impl PrivilegeStoreBuilder {
    /// Use another backend. Defaults to an empty [`MemoryBackend`].
    pub fn backend(mut self, backend: Arc<dyn StoreBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the groups whose members bypass the grant option check.
    pub fn admin_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.admin_groups = normalize_names(groups).into_iter().collect();
        self
    }

    /// Set how grantors are resolved to groups. Defaults to no groups.
    pub fn group_mapping(mut self, mapping: Arc<dyn GroupMapping>) -> Self {
        self.group_mapping = Some(mapping);
        self
    }

    /// Publish committed changes to `bus`.
    pub fn event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Build the store.
    pub fn build(self) -> PrivilegeStore {
        let server_uuid = Uuid::new_v4();
        info!(server_uuid = %server_uuid, admin_groups = self.admin_groups.len(), "Privilege store ready");

        PrivilegeStore {
            backend: self
                .backend
                .unwrap_or_else(|| Arc::new(MemoryBackend::new(DEFAULT_TIMEOUT))),
            actions: self.actions,
            hierarchies: self.hierarchies,
            admin_groups: self.admin_groups,
            group_mapping: self
                .group_mapping
                .unwrap_or_else(|| Arc::new(StaticGroupMapping::new())),
            events: self.events,
            server_uuid,
            sequence: Arc::new(Mutex::new(0)),
        }
    }
}

impl PrivilegeStore {
    /// Start building a store over the given registries.
    pub fn builder(actions: ActionRegistry, hierarchies: HierarchyRegistry) -> PrivilegeStoreBuilder {
        PrivilegeStoreBuilder {
            actions: Arc::new(actions),
            hierarchies: Arc::new(hierarchies),
            backend: None,
            admin_groups: HashSet::new(),
            group_mapping: None,
            events: None,
        }
    }

    /// Build a store from configuration.
    ///
    /// Uses a [`JsonFileBackend`] when `store_path` is set, memory otherwise,
    /// and the configured static user to group mapping.
    pub async fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        let (actions, hierarchies) = config.build_registry()?;
        let backend: Arc<dyn StoreBackend> = match &config.store_path {
            Some(path) => Arc::new(JsonFileBackend::open(path.clone(), config.timeout()).await?),
            None => Arc::new(MemoryBackend::new(config.timeout())),
        };

        Ok(Self::builder(actions, hierarchies)
            .backend(backend)
            .admin_groups(&config.admin_groups)
            .group_mapping(Arc::new(StaticGroupMapping::from_map(&config.user_groups)))
            .build())
    }

    /// Get the id of this store instance.
    pub fn server_uuid(&self) -> Uuid {
        self.server_uuid
    }

    /// Get the sequence id of the last commit, 0 before the first.
    pub async fn last_sequence_id(&self) -> u64 {
        *self.sequence.lock().await
    }

    fn engine(&self) -> PrivilegeEngine<'_> {
        PrivilegeEngine::new(&self.actions, &self.hierarchies)
    }

    async fn grantor_groups(&self, grantor: &str) -> HashSet<String> {
        match self.group_mapping.groups_for(grantor).await {
            Ok(groups) => groups,
            Err(e) => {
                warn!(grantor = %grantor, error = %e, "Group lookup failed, grantor has no groups");
                HashSet::new()
            }
        }
    }

    async fn mutate<F>(&self, operation: &'static str, requestor: &str, change: F) -> StoreResult<CommitContext>
    where
        F: FnOnce(&mut Tables, &PrivilegeEngine<'_>, DateTime<Utc>) -> StoreResult<StoreEvent> + Send,
    {
        let mut tx = self.backend.begin_write().await?;
        let engine = self.engine();

        let event = match change(tx.tables_mut(), &engine, Utc::now()) {
            Ok(event) => event,
            Err(e) => {
                warn!(operation, requestor = %requestor, error = %e, "Rolling back");
                tx.rollback();
                return Err(e);
            }
        };

        let pruned = tx.tables_mut().prune_orphans();
        if pruned > 0 {
            debug!(operation, pruned, "Pruned privileges held by no role");
        }

        // Commit, sequence and notification run on their own task so a
        // cancelled caller cannot split them.
        let sequence = self.sequence.clone();
        let server_uuid = self.server_uuid;
        let events = self.events.clone();
        let requestor = requestor.to_string();
        let committing = tokio::spawn(
            async move {
                let commit = {
                    let mut sequence = sequence.lock_owned().await;
                    if let Err(e) = tx.commit().await {
                        warn!(operation, requestor = %requestor, error = %e, "Commit failed");
                        return Err(e);
                    }
                    *sequence += 1;
                    CommitContext::new(server_uuid, *sequence)
                };
                info!(operation, requestor = %requestor, sequence_id = commit.sequence_id, "Committed");

                Self::notify(events, event, commit, &requestor).await;
                Ok(commit)
            }
            .in_current_span(),
        );

        committing
            .await
            .map_err(|e| StoreError::StoreUnavailable(format!("commit task failed: {}", e)))?
    }

    async fn notify(events: Option<Arc<dyn EventBus>>, event: StoreEvent, commit: CommitContext, requestor: &str) {
        let Some(bus) = events else {
            return;
        };
        let published = match event.to_event(commit, requestor) {
            Ok(event) => bus.publish(event).await,
            Err(e) => Err(e),
        };
        if let Err(e) = published {
            warn!(commit = %commit, error = %e, "Failed to publish change notification");
        }
    }

    // ------------------------------------------------------------------
    // Roles and groups
    // ------------------------------------------------------------------

    /// Create a role.
    #[instrument(skip(self))]
    pub async fn create_role(&self, role: &str, requestor: &str) -> StoreResult<CommitContext> {
        let role = normalize_name(role);
        self.mutate("create_role", requestor, |tables, _, now| {
            tables.create_role(&role, now)?;
            Ok(StoreEvent::RoleCreated { role: role.clone() })
        })
        .await
    }

    /// Drop a role with its group and privilege associations.
    #[instrument(skip(self))]
    pub async fn drop_role(&self, role: &str, requestor: &str) -> StoreResult<CommitContext> {
        let role = normalize_name(role);
        self.mutate("drop_role", requestor, |tables, _, _| {
            tables.drop_role(&role)?;
            Ok(StoreEvent::RoleDropped { role: role.clone() })
        })
        .await
    }

    /// Associate groups with a role.
    #[instrument(skip(self, groups))]
    pub async fn add_groups_to_role<I, S>(&self, role: &str, groups: I, requestor: &str) -> StoreResult<CommitContext>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let role = normalize_name(role);
        let groups: Vec<String> = normalize_names(groups).into_iter().collect();
        self.mutate("add_groups_to_role", requestor, |tables, _, now| {
            tables.add_groups_to_role(&role, &groups, now)?;
            Ok(StoreEvent::GroupsAdded {
                role: role.clone(),
                groups: groups.clone(),
            })
        })
        .await
    }

    /// Detach groups from a role.
    #[instrument(skip(self, groups))]
    pub async fn remove_groups_from_role<I, S>(
        &self,
        role: &str,
        groups: I,
        requestor: &str,
    ) -> StoreResult<CommitContext>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let role = normalize_name(role);
        let groups: Vec<String> = normalize_names(groups).into_iter().collect();
        self.mutate("remove_groups_from_role", requestor, |tables, _, _| {
            tables.remove_groups_from_role(&role, &groups)?;
            Ok(StoreEvent::GroupsRemoved {
                role: role.clone(),
                groups: groups.clone(),
            })
        })
        .await
    }

    // ------------------------------------------------------------------
    // Privileges
    // ------------------------------------------------------------------

    /// Grant a privilege to a role.
    ///
    /// # Errors
    ///
    /// `NoSuchObject` when the role does not exist, `GrantDenied` when the
    /// grantor holds no privilege with the grant option covering the request.
    #[instrument(skip(self, privilege), fields(privilege = %privilege))]
    pub async fn grant_privilege(
        &self,
        role: &str,
        privilege: &PrivilegeDescriptor,
        grantor: &str,
    ) -> StoreResult<CommitContext> {
        require_grantor(grantor)?;
        let grantor_groups = self.grantor_groups(grantor).await;
        let role = normalize_name(role);

        self.mutate("grant_privilege", grantor, |tables, engine, now| {
            tables.require_role(&role)?;
            check_grant_option(tables, engine, &self.admin_groups, privilege, grantor, &grantor_groups)?;
            engine.grant(tables, &role, privilege, grantor, now)?;
            Ok(StoreEvent::PrivilegeGranted {
                role: role.clone(),
                privilege: privilege.clone(),
            })
        })
        .await
    }

    /// Revoke a privilege, and every privilege beneath it, from a role.
    ///
    /// # Errors
    ///
    /// Same as [`grant_privilege`](Self::grant_privilege).
    #[instrument(skip(self, privilege), fields(privilege = %privilege))]
    pub async fn revoke_privilege(
        &self,
        role: &str,
        privilege: &PrivilegeDescriptor,
        grantor: &str,
    ) -> StoreResult<CommitContext> {
        require_grantor(grantor)?;
        let grantor_groups = self.grantor_groups(grantor).await;
        let role = normalize_name(role);

        self.mutate("revoke_privilege", grantor, |tables, engine, now| {
            tables.require_role(&role)?;
            check_grant_option(tables, engine, &self.admin_groups, privilege, grantor, &grantor_groups)?;
            engine.revoke(tables, &role, privilege, grantor, now)?;
            Ok(StoreEvent::PrivilegeRevoked {
                role: role.clone(),
                privilege: privilege.clone(),
            })
        })
        .await
    }

    /// Remove a privilege, and every privilege beneath it, from every role.
    #[instrument(skip(self, privilege), fields(privilege = %privilege))]
    pub async fn drop_privilege(&self, privilege: &PrivilegeDescriptor, requestor: &str) -> StoreResult<CommitContext> {
        self.mutate("drop_privilege", requestor, |tables, engine, now| {
            engine.drop(tables, privilege, requestor, now)?;
            Ok(StoreEvent::PrivilegeDropped {
                privilege: privilege.clone(),
            })
        })
        .await
    }

    /// Move every privilege under `old_path` to `new_path`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the paths differ in length.
    #[instrument(skip(self, old_path, new_path))]
    pub async fn rename_privilege(
        &self,
        component: &str,
        service: &str,
        old_path: &[Authorizable],
        new_path: &[Authorizable],
        requestor: &str,
    ) -> StoreResult<CommitContext> {
        self.mutate("rename_privilege", requestor, |tables, engine, now| {
            engine.rename(tables, component, service, old_path, new_path, now)?;
            Ok(StoreEvent::PrivilegeRenamed {
                component: component.trim().to_lowercase(),
                service: service.trim().to_lowercase(),
                old_path: lowercase_steps(old_path),
                new_path: lowercase_steps(new_path),
            })
        })
        .await
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Roles associated with any of `groups`.
    #[instrument(skip_all)]
    pub async fn roles_for_groups<I, S>(&self, groups: I) -> StoreResult<HashSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let groups = normalize_names(groups);
        let tx = self.backend.begin_read().await?;
        Ok(tx.tables().roles_for_groups(&groups))
    }

    /// Groups associated with any of `roles`.
    #[instrument(skip_all)]
    pub async fn groups_for_roles<I, S>(&self, roles: I) -> StoreResult<HashSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roles = normalize_names(roles);
        let tx = self.backend.begin_read().await?;
        Ok(tx.tables().groups_for_roles(&roles))
    }

    /// Every privilege held by any of `roles`.
    #[instrument(skip_all)]
    pub async fn privileges_for_roles<I, S>(&self, roles: I) -> StoreResult<HashSet<PrivilegeDescriptor>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roles = normalize_names(roles);
        let tx = self.backend.begin_read().await?;
        self.engine().privileges_for_roles(tx.tables(), &roles)
    }

    /// Privileges of a service at or beneath `path`, held by `roles` or by
    /// the roles of `groups`.
    ///
    /// With no roles and no groups, privileges of every role are returned.
    /// Names that match no existing role are ignored.
    #[instrument(skip(self, roles, groups, path))]
    pub async fn privileges_for_provider<R, G, S, T>(
        &self,
        component: &str,
        service: &str,
        roles: R,
        groups: G,
        path: &[Authorizable],
    ) -> StoreResult<HashSet<PrivilegeDescriptor>>
    where
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
        G: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let roles = normalize_names(roles);
        let groups = normalize_names(groups);
        let tx = self.backend.begin_read().await?;
        let tables = tx.tables();

        let filter = if roles.is_empty() && groups.is_empty() {
            None
        } else {
            let mut resolved: BTreeSet<String> = roles
                .into_iter()
                .filter(|role| tables.role_exists(role))
                .collect();
            resolved.extend(tables.roles_for_groups(&groups));
            if resolved.is_empty() {
                return Ok(HashSet::new());
            }
            Some(resolved)
        };

        self.engine()
            .privileges_for_provider(tables, component, service, filter.as_ref(), path)
    }
}
