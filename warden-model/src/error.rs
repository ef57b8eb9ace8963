//! Error types for the privilege model
//!
//! These errors come from resolving actions and hierarchies against the
//! registries, and from building descriptors.

use thiserror::Error;

/// Privilege model error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// No action vocabulary or hierarchy is registered for the component
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    /// The action is not part of the component's vocabulary
    #[error("Unknown action '{action}' for component {component}")]
    UnknownAction {
        /// Component the action was resolved against
        component: String,
        /// Requested action name
        action: String,
    },

    /// The resource types do not form a registered hierarchy
    #[error("Invalid hierarchy for component {component}: [{types}]")]
    InvalidHierarchy {
        /// Component the path was checked against
        component: String,
        /// Comma separated resource type names
        types: String,
    },

    /// More resource steps than the fixed slot count
    #[error("Resource path has {0} steps, at most {max} are supported", max = crate::hierarchy::MAX_DEPTH)]
    TooDeep(usize),

    /// A resource step has a blank name or the unused slot marker
    #[error("Invalid name for resource type {0}")]
    InvalidResourceName(String),

    /// A required descriptor field was not supplied
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A component vocabulary was registered without the ALL compound action
    #[error("Component {0} does not define the ALL action")]
    MissingAllAction(String),

    /// The same action name was registered twice for one component
    #[error("Duplicate action '{action}' for component {component}")]
    DuplicateAction {
        /// Component being registered
        component: String,
        /// Duplicated action name
        action: String,
    },
}

/// Result type for privilege model operations.
pub type ModelResult<T> = Result<T, ModelError>;

impl ModelError {
    /// Check if the error means the resource path itself cannot be represented.
    ///
    /// Callers surface these as "unsupported" rather than "invalid input".
    pub fn is_unsupported_resource(&self) -> bool {
        matches!(self, ModelError::InvalidHierarchy { .. } | ModelError::TooDeep(_))
    }
}
