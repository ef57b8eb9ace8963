//! # Warden Model
//!
//! The generic privilege model shared by every component that delegates its
//! authorization decisions to Warden.
//!
//! ## Overview
//!
//! The warden-model crate handles:
//! - **Actions**: Per-component action vocabularies, including the compound `all` action
//! - **Hierarchies**: Valid resource type sequences and fixed-slot path encoding
//! - **Privileges**: The canonical, case-normalized privilege descriptor
//! - **Implication**: Deciding whether a held privilege covers a requested one
//!
//! Everything here is synchronous and free of I/O. The registries are plain
//! values built once at startup and passed by reference to the store.
//!
//! ## Usage
//!
//! ```rust
//! use warden_model::{
//!     implies, ActionRegistry, Authorizable, ComponentActions, HierarchyRegistry,
//!     PrivilegeDescriptor,
//! };
//!
//! let actions = ActionRegistry::new().with(
//!     ComponentActions::builder("solr")
//!         .action("query")
//!         .action("update")
//!         .compound("all", ["query", "update"])
//!         .build()
//!         .unwrap(),
//! );
//! let hierarchies = HierarchyRegistry::new().with("solr", ["Collection", "Field"]);
//!
//! let held = PrivilegeDescriptor::builder()
//!     .component("solr")
//!     .service("service1")
//!     .action("all")
//!     .scope("collection")
//!     .authorizables(vec![Authorizable::new("Collection", "c1")])
//!     .build()
//!     .unwrap();
//! let requested = held.with_action("query");
//!
//! assert!(implies(&actions, &held, &requested));
//! assert_eq!(hierarchies.tag_for("solr", held.authorizables()).unwrap(), 1);
//! ```
//!
//! ## Wildcards
//!
//! A resource name of `*` or `all` (any case) matches every name at its
//! depth, on either side of an implication check.

pub mod actions;
pub mod error;
pub mod hierarchy;
pub mod implication;
pub mod privilege;

// Re-export main types
pub use actions::{Action, ActionRegistry, ComponentActions, ComponentActionsBuilder, CompoundAction, ALL_ACTION};
pub use error::{ModelError, ModelResult};
pub use hierarchy::{
    is_storable_name, EncodedPath, HierarchyRegistry, ResourceSlots, MAX_DEPTH, NULL_SLOT, UNSET_HIERARCHY_TAG,
};
pub use implication::{implies, is_wildcard, ALL_RESOURCES};
pub use privilege::{Authorizable, PrivilegeDescriptor, PrivilegeDescriptorBuilder};
