//! Shared fixture for the store integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use warden_events::MemoryEventBus;
use warden_store::{
    Authorizable, MemoryBackend, PrivilegeDescriptor, PrivilegeStore, StaticGroupMapping, StoreBackend,
    StoreConfig,
};

/// Admin user, member of the admin group.
pub const ADMIN_USER: &str = "solr";
/// Admin group.
pub const ADMIN_GROUP: &str = "solr_admins";
/// User whose group holds privileges with the grant option.
pub const GRANT_OPTION_USER: &str = "user_grant_option";
/// Group of [`GRANT_OPTION_USER`].
pub const GRANT_OPTION_GROUP: &str = "group_grant_option";
/// User whose group holds privileges without the grant option.
pub const NO_GRANT_OPTION_USER: &str = "user_no_grant_option";
/// Group of [`NO_GRANT_OPTION_USER`].
pub const NO_GRANT_OPTION_GROUP: &str = "group_no_grant_option";

pub const COMPONENT: &str = "solr";
pub const SERVICE: &str = "service1";

/// Test fixture: a store over the search component with an event bus.
pub struct TestFixture {
    /// Store under test.
    pub store: PrivilegeStore,
    /// Bus receiving the store's notifications.
    pub bus: Arc<MemoryEventBus>,
}

impl TestFixture {
    /// Create a fixture over an empty in-memory backend.
    pub fn new() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new(Duration::from_secs(5))))
    }

    /// Create a fixture over `backend`.
    pub fn with_backend(backend: Arc<dyn StoreBackend>) -> Self {
        let (actions, hierarchies) = StoreConfig::default().build_registry().unwrap();
        let mapping = StaticGroupMapping::new()
            .with_user(ADMIN_USER, [ADMIN_GROUP])
            .with_user(GRANT_OPTION_USER, [GRANT_OPTION_GROUP])
            .with_user(NO_GRANT_OPTION_USER, [NO_GRANT_OPTION_GROUP]);
        let bus = Arc::new(MemoryEventBus::new());

        let store = PrivilegeStore::builder(actions, hierarchies)
            .backend(backend)
            .admin_groups([ADMIN_GROUP])
            .group_mapping(Arc::new(mapping))
            .event_bus(bus.clone())
            .build();

        Self { store, bus }
    }

    /// Create roles as the admin user.
    pub async fn create_roles(&self, roles: &[&str]) {
        for role in roles {
            self.store.create_role(role, ADMIN_USER).await.unwrap();
        }
    }
}

/// Privilege on `steps`, scoped at the deepest step type.
pub fn privilege(action: &str, steps: &[(&str, &str)]) -> PrivilegeDescriptor {
    let scope = steps.last().map(|(type_name, _)| *type_name).unwrap_or("service");
    PrivilegeDescriptor::builder()
        .component(COMPONENT)
        .service(SERVICE)
        .action(action)
        .scope(scope)
        .authorizables(steps.iter().map(|(t, n)| Authorizable::new(*t, *n)).collect())
        .build()
        .unwrap()
}

/// Privilege on one collection.
pub fn collection(action: &str, name: &str) -> PrivilegeDescriptor {
    privilege(action, &[("Collection", name)])
}

/// Privilege on one field of a collection.
pub fn field(action: &str, collection: &str, field: &str) -> PrivilegeDescriptor {
    privilege(action, &[("Collection", collection), ("Field", field)])
}
