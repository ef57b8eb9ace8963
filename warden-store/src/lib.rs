//! # Warden Store
//!
//! Transactional role, group and privilege store.
//!
//! ## Overview
//!
//! The warden-store crate handles:
//! - **Roles and Groups**: Case-insensitive roles and their many-to-many group associations
//! - **Privilege Engine**: Grant, revoke, drop and rename with compound-action expansion
//! - **Grant Option**: Delegated granting for grantors outside the admin groups
//! - **Backends**: All-or-nothing transactions over memory or a JSON file
//! - **Store Facade**: Commit sequencing and change notifications
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warden_store::{PrivilegeStore, StoreConfig};
//!
//! async fn roles_example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PrivilegeStore::from_config(&StoreConfig::default()).await?;
//!
//!     let commit = store.create_role("Analysts", "admin").await?;
//!     assert_eq!(commit.sequence_id, 1);
//!
//!     store.add_groups_to_role("analysts", ["analytics"], "admin").await?;
//!     let roles = store.roles_for_groups(["ANALYTICS"]).await?;
//!     assert!(roles.contains("analysts"));
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! Every error except `StoreUnavailable` is an expected outcome and reaches
//! the caller unchanged. Whatever the error, a failed mutation leaves the
//! store as it was.

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod grant_option;
pub mod groups;
pub mod store;
pub mod tables;

// Re-export main types
pub use backend::{JsonFileBackend, MemoryBackend, ReadTransaction, StoreBackend, WriteTransaction};
pub use config::{ComponentConfig, ConfigError, StoreConfig};
pub use engine::PrivilegeEngine;
pub use error::{StoreError, StoreResult};
pub use grant_option::{check_grant_option, require_grantor};
pub use groups::{GroupMapping, StaticGroupMapping};
pub use store::{PrivilegeStore, PrivilegeStoreBuilder, DEFAULT_TIMEOUT};
pub use tables::{normalize_name, PrivilegeKey, PrivilegeRecord, Tables};

// Re-export the model and commit types used in the API
pub use warden_events::CommitContext;
pub use warden_model::{Authorizable, PrivilegeDescriptor};
