//! Event types for store change notifications
//!
//! This module defines the commit context stamped on every committed
//! mutation, the typed change events, and the envelope they are published in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use warden_model::{Authorizable, PrivilegeDescriptor};

use crate::bus::{EventBusError, EventBusResult};

/// Identity of one committed mutation.
///
/// `server_uuid` is fixed for the lifetime of a store instance and
/// `sequence_id` increases by exactly one per commit, so the pair orders
/// every change made through that instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitContext {
    /// Store instance that made the commit
    pub server_uuid: Uuid,
    /// Commit sequence number within that instance
    pub sequence_id: u64,
}

impl CommitContext {
    /// Create a commit context.
    pub fn new(server_uuid: Uuid, sequence_id: u64) -> Self {
        Self {
            server_uuid,
            sequence_id,
        }
    }
}

impl fmt::Display for CommitContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.server_uuid, self.sequence_id)
    }
}

/// Change notification envelope.
///
/// All store events are wrapped in this envelope which carries the commit
/// context and the principal that requested the change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID
    pub id: Uuid,

    /// Event type (e.g., "role.created", "privilege.granted")
    pub event_type: String,

    /// Commit that produced the event
    pub commit: CommitContext,

    /// Principal that requested the mutation
    pub requestor: String,

    /// Timestamp when event was created
    pub timestamp: DateTime<Utc>,

    /// Event version for schema evolution
    pub version: u32,

    /// Event payload
    pub payload: serde_json::Value,
}

impl Event {
    /// Create a new event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The event type string
    /// * `commit` - The commit that produced the event
    /// * `requestor` - The principal that requested the change
    /// * `payload` - The event payload
    pub fn new(
        event_type: impl Into<String>,
        commit: CommitContext,
        requestor: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            commit,
            requestor: requestor.into(),
            timestamp: Utc::now(),
            version: 1,
            payload,
        }
    }

    /// Get the topic for this event.
    ///
    /// Topics are structured as: `{entity}.{verb}`
    pub fn topic(&self) -> &str {
        &self.event_type
    }

    /// Parse the payload into a specific type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// A committed change to the privilege store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// Role was created
    RoleCreated { role: String },
    /// Role was dropped, with its group and privilege associations
    RoleDropped { role: String },
    /// Groups were associated with a role
    GroupsAdded { role: String, groups: Vec<String> },
    /// Groups were detached from a role
    GroupsRemoved { role: String, groups: Vec<String> },
    /// Privilege was granted to a role
    PrivilegeGranted {
        role: String,
        privilege: PrivilegeDescriptor,
    },
    /// Privilege was revoked from a role
    PrivilegeRevoked {
        role: String,
        privilege: PrivilegeDescriptor,
    },
    /// Privilege was removed from every role
    PrivilegeDropped { privilege: PrivilegeDescriptor },
    /// Resource path was renamed in every privilege under it
    PrivilegeRenamed {
        component: String,
        service: String,
        old_path: Vec<Authorizable>,
        new_path: Vec<Authorizable>,
    },
}

impl StoreEvent {
    /// Get the event type string.
    pub fn event_type(&self) -> &'static str {
        match self {
            StoreEvent::RoleCreated { .. } => "role.created",
            StoreEvent::RoleDropped { .. } => "role.dropped",
            StoreEvent::GroupsAdded { .. } => "group.added",
            StoreEvent::GroupsRemoved { .. } => "group.removed",
            StoreEvent::PrivilegeGranted { .. } => "privilege.granted",
            StoreEvent::PrivilegeRevoked { .. } => "privilege.revoked",
            StoreEvent::PrivilegeDropped { .. } => "privilege.dropped",
            StoreEvent::PrivilegeRenamed { .. } => "privilege.renamed",
        }
    }

    /// Convert to a generic event for `commit`.
    pub fn to_event(&self, commit: CommitContext, requestor: &str) -> EventBusResult<Event> {
        let payload = serde_json::to_value(self)
            .map_err(|e| EventBusError::SerializationError(e.to_string()))?;
        Ok(Event::new(self.event_type(), commit, requestor, payload))
    }
}
