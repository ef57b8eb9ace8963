//! # Warden Events
//!
//! Change notifications for the Warden privilege store.
//!
//! ## Overview
//!
//! The warden-events crate handles:
//! - **Commit Context**: The `(server_uuid, sequence_id)` pair identifying a commit
//! - **Event Types**: Typed store changes and the envelope they travel in
//! - **Event Bus**: Publish/subscribe messaging for notification consumers
//! - **Event Handlers**: Async processing of committed changes
//!
//! Events are published only after the change is committed. A failing
//! handler or an unreachable subscriber never rolls a change back.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warden_events::{CommitContext, EventBus, MemoryEventBus, StoreEvent};
//! use uuid::Uuid;
//!
//! async fn notify_example() {
//!     let bus = MemoryEventBus::new();
//!     let mut sub = bus.subscribe("privilege.#").await.unwrap();
//!
//!     let commit = CommitContext::new(Uuid::new_v4(), 1);
//!     let event = StoreEvent::RoleCreated { role: "analysts".to_string() }
//!         .to_event(commit, "admin")
//!         .unwrap();
//!     bus.publish(event).await.unwrap();
//!
//!     while let Ok(event) = sub.recv().await {
//!         println!("{} at {}", event.event_type, event.commit);
//!     }
//! }
//! ```
//!
//! ## Topic Patterns
//!
//! Topics are structured as `{entity}.{verb}`:
//! - `role.created`, `role.dropped`
//! - `group.added`, `group.removed`
//! - `privilege.granted`, `privilege.revoked`, `privilege.dropped`, `privilege.renamed`
//!
//! Wildcards:
//! - `*` matches exactly one segment
//! - `#` matches zero or more segments

pub mod bus;
pub mod types;

// Re-export main types
pub use bus::{EventBus, EventBusError, EventBusResult, EventBusStats, EventHandler, MemoryEventBus, Subscription};
pub use types::{CommitContext, Event, StoreEvent};
