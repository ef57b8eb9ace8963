//! # Privileges
//!
//! The canonical privilege descriptor shared by the store, the implication
//! engine and the client adapters.
//!
//! A privilege combines a component, a service, an action, a scope label and
//! an ordered resource path. All names are compared case-insensitively; the
//! builder lower-cases them so derived equality is enough.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{ModelError, ModelResult};
use crate::hierarchy::{is_storable_name, MAX_DEPTH};

/// One step of a resource path: a resource type and a resource name.
///
/// Equality and hashing ignore case on both parts.
///
/// # Example
///
/// ```
/// use warden_model::Authorizable;
///
/// assert_eq!(Authorizable::new("Collection", "Coll1"), Authorizable::new("COLLECTION", "coll1"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authorizable {
    type_name: String,
    name: String,
}

impl Authorizable {
    /// Create a resource step.
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    /// Get the resource type name (e.g. `Collection`).
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Get the resource name (e.g. `coll1`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if this step has the same resource type as `other`.
    pub fn same_type(&self, other: &Authorizable) -> bool {
        self.type_name.eq_ignore_ascii_case(&other.type_name)
    }

    fn lowercased(&self) -> Self {
        Self {
            type_name: self.type_name.clone(),
            name: self.name.to_lowercase(),
        }
    }
}

impl PartialEq for Authorizable {
    fn eq(&self, other: &Self) -> bool {
        self.same_type(other) && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for Authorizable {}

impl Hash for Authorizable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name.to_lowercase().hash(state);
        self.name.to_lowercase().hash(state);
    }
}

impl fmt::Display for Authorizable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.type_name, self.name)
    }
}

/// Canonical, immutable description of one privilege.
///
/// # Example
///
/// ```
/// use warden_model::{Authorizable, PrivilegeDescriptor};
///
/// let privilege = PrivilegeDescriptor::builder()
///     .component("SOLR")
///     .service("service1")
///     .action("Query")
///     .scope("COLLECTION")
///     .authorizables(vec![Authorizable::new("Collection", "Coll1")])
///     .build()
///     .unwrap();
///
/// assert_eq!(privilege.component(), "solr");
/// assert_eq!(privilege.action(), "query");
/// assert_eq!(privilege.authorizables()[0].name(), "coll1");
/// assert_eq!(privilege.grant_option(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDescriptor")]
pub struct PrivilegeDescriptor {
    component: String,
    service: String,
    action: String,
    scope: String,
    grant_option: Option<bool>,
    authorizables: Vec<Authorizable>,
}

impl PrivilegeDescriptor {
    /// Start building a descriptor.
    pub fn builder() -> PrivilegeDescriptorBuilder {
        PrivilegeDescriptorBuilder::default()
    }

    /// Start a builder pre-filled with this descriptor's fields.
    pub fn to_builder(&self) -> PrivilegeDescriptorBuilder {
        PrivilegeDescriptorBuilder {
            component: Some(self.component.clone()),
            service: Some(self.service.clone()),
            action: Some(self.action.clone()),
            scope: Some(self.scope.clone()),
            grant_option: self.grant_option,
            authorizables: Some(self.authorizables.clone()),
        }
    }

    /// Get the component name.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Get the service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Get the action name.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Get the scope label.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Get the grant option; `None` means "unspecified".
    pub fn grant_option(&self) -> Option<bool> {
        self.grant_option
    }

    /// Get the resource path.
    pub fn authorizables(&self) -> &[Authorizable] {
        &self.authorizables
    }

    /// Copy of this descriptor with another action.
    pub fn with_action(&self, action: impl AsRef<str>) -> Self {
        Self {
            action: action.as_ref().to_lowercase(),
            ..self.clone()
        }
    }
}

impl fmt::Display for PrivilegeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self.authorizables.iter().map(ToString::to_string).collect();
        write!(
            f,
            "{}/{} [{}] scope={} action={}",
            self.component,
            self.service,
            path.join("->"),
            self.scope,
            self.action
        )?;
        if let Some(grant_option) = self.grant_option {
            write!(f, " grant_option={}", grant_option)?;
        }
        Ok(())
    }
}

// Deserialized descriptors go through the builder so they are normalized.
#[derive(Deserialize)]
struct RawDescriptor {
    component: String,
    service: String,
    action: String,
    scope: String,
    #[serde(default)]
    grant_option: Option<bool>,
    authorizables: Vec<Authorizable>,
}

impl TryFrom<RawDescriptor> for PrivilegeDescriptor {
    type Error = ModelError;

    fn try_from(raw: RawDescriptor) -> ModelResult<Self> {
        PrivilegeDescriptor::builder()
            .component(raw.component)
            .service(raw.service)
            .action(raw.action)
            .scope(raw.scope)
            .maybe_grant_option(raw.grant_option)
            .authorizables(raw.authorizables)
            .build()
    }
}

/// Builder for [`PrivilegeDescriptor`].
#[derive(Debug, Clone, Default)]
pub struct PrivilegeDescriptorBuilder {
    component: Option<String>,
    service: Option<String>,
    action: Option<String>,
    scope: Option<String>,
    grant_option: Option<bool>,
    authorizables: Option<Vec<Authorizable>>,
}

impl PrivilegeDescriptorBuilder {
    /// Set the component.
    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Set the service.
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Set the action.
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Set the scope label.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set an explicit grant option.
    pub fn grant_option(mut self, grant_option: bool) -> Self {
        self.grant_option = Some(grant_option);
        self
    }

    /// Set the grant option as tri-state.
    pub fn maybe_grant_option(mut self, grant_option: Option<bool>) -> Self {
        self.grant_option = grant_option;
        self
    }

    /// Set the resource path.
    pub fn authorizables(mut self, authorizables: Vec<Authorizable>) -> Self {
        self.authorizables = Some(authorizables);
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// `MissingField` when component, service, action, scope or the resource
    /// path was never set; `TooDeep` when the path exceeds the slot count;
    /// `InvalidResourceName` when a step name is blank or the unused slot
    /// marker.
    pub fn build(self) -> ModelResult<PrivilegeDescriptor> {
        let component = self.component.ok_or(ModelError::MissingField("component"))?;
        let service = self.service.ok_or(ModelError::MissingField("service"))?;
        let action = self.action.ok_or(ModelError::MissingField("action"))?;
        let scope = self.scope.ok_or(ModelError::MissingField("scope"))?;
        let authorizables = self
            .authorizables
            .ok_or(ModelError::MissingField("authorizables"))?;

        if authorizables.len() > MAX_DEPTH {
            return Err(ModelError::TooDeep(authorizables.len()));
        }
        if let Some(step) = authorizables.iter().find(|step| !is_storable_name(step.name())) {
            return Err(ModelError::InvalidResourceName(step.type_name().to_string()));
        }

        Ok(PrivilegeDescriptor {
            component: component.to_lowercase(),
            service: service.to_lowercase(),
            action: action.to_lowercase(),
            scope: scope.to_lowercase(),
            grant_option: self.grant_option,
            authorizables: authorizables.iter().map(Authorizable::lowercased).collect(),
        })
    }
}
