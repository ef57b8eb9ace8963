//! Store configuration.
//!
//! Provides the admin groups, store timeout and location, the per-component
//! action vocabularies and resource hierarchies, and the static user to group
//! mapping. Configuration is loaded from an optional JSON file and overridden
//! by environment variables, with defaults suitable for local development.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use warden_model::{ActionRegistry, ComponentActions, HierarchyRegistry, ModelError, ALL_ACTION, MAX_DEPTH};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },

    /// Configuration file could not be read.
    #[error("Failed to read configuration file {path}: {message}")]
    ReadFile {
        /// File path.
        path: String,
        /// Error message.
        message: String,
    },

    /// Configuration file is not valid JSON for this schema.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// A component vocabulary could not be registered.
    #[error("Invalid component model: {0}")]
    Model(#[from] ModelError),
}

impl ConfigError {
    fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Action vocabulary and resource hierarchies of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Component name (e.g. "solr").
    pub name: String,

    /// Base action names.
    pub actions: Vec<String>,

    /// Members of the ALL action. Empty means every base action.
    #[serde(default)]
    pub all_actions: Vec<String>,

    /// Valid resource type sequences, in tag order.
    pub hierarchies: Vec<Vec<String>>,
}

impl ComponentConfig {
    /// Search component: `query`, `update` over `[Collection, Field]`.
    pub fn search() -> Self {
        Self {
            name: "solr".to_string(),
            actions: vec!["query".to_string(), "update".to_string()],
            all_actions: Vec::new(),
            hierarchies: vec![vec!["Collection".to_string(), "Field".to_string()]],
        }
    }

    fn to_actions(&self) -> Result<ComponentActions, ConfigError> {
        let members = if self.all_actions.is_empty() {
            &self.actions
        } else {
            &self.all_actions
        };
        let builder = self
            .actions
            .iter()
            .fold(ComponentActions::builder(&self.name), |builder, action| {
                builder.action(action)
            });
        Ok(builder.compound(ALL_ACTION, members).build()?)
    }
}

/// Privilege store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Groups whose members bypass the grant option check.
    #[serde(default)]
    pub admin_groups: Vec<String>,

    /// Maximum wait for a store transaction, in seconds.
    pub store_timeout_secs: u64,

    /// JSON snapshot file; `None` keeps the store in memory only.
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// Component models.
    pub components: Vec<ComponentConfig>,

    /// Static user to groups mapping.
    #[serde(default)]
    pub user_groups: HashMap<String, Vec<String>>,
}

impl Default for StoreConfig {
    /// Returns an in-memory configuration with the search component.
    fn default() -> Self {
        Self {
            admin_groups: Vec::new(),
            store_timeout_secs: 30,
            store_path: None,
            components: vec![ComponentConfig::search()],
            user_groups: HashMap::new(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `WARDEN_CONFIG`: JSON file with a full configuration (default: built-in defaults)
    /// - `WARDEN_ADMIN_GROUPS`: Comma separated admin groups
    /// - `WARDEN_STORE_TIMEOUT_SECS`: Transaction timeout in seconds (default: 30)
    /// - `WARDEN_STORE_PATH`: JSON snapshot file for the store
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("WARDEN_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        if let Ok(groups) = std::env::var("WARDEN_ADMIN_GROUPS") {
            config.admin_groups = groups
                .split(',')
                .map(str::trim)
                .filter(|group| !group.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(timeout) = std::env::var("WARDEN_STORE_TIMEOUT_SECS") {
            config.store_timeout_secs = timeout.parse().map_err(|_| {
                ConfigError::invalid("WARDEN_STORE_TIMEOUT_SECS", format!("not a number: {}", timeout))
            })?;
        }
        if let Ok(path) = std::env::var("WARDEN_STORE_PATH") {
            config.store_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&raw)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Get the store timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Admin groups, trimmed and lower-cased.
    pub fn admin_group_set(&self) -> HashSet<String> {
        self.admin_groups
            .iter()
            .map(|group| group.trim().to_lowercase())
            .collect()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_timeout_secs == 0 {
            return Err(ConfigError::invalid("store_timeout_secs", "must be greater than zero"));
        }
        if self.admin_groups.iter().any(|group| group.trim().is_empty()) {
            return Err(ConfigError::invalid("admin_groups", "group names must not be blank"));
        }
        if self.components.is_empty() {
            return Err(ConfigError::invalid("components", "at least one component is required"));
        }

        let mut seen = HashSet::new();
        for component in &self.components {
            let key = format!("components.{}", component.name);
            if component.name.trim().is_empty() {
                return Err(ConfigError::invalid("components", "component name must not be blank"));
            }
            if !seen.insert(component.name.trim().to_lowercase()) {
                return Err(ConfigError::invalid(key, "component declared twice"));
            }
            if component.actions.is_empty() {
                return Err(ConfigError::invalid(key, "no actions declared"));
            }
            if component.hierarchies.is_empty() {
                return Err(ConfigError::invalid(key, "no resource hierarchy declared"));
            }
            for hierarchy in &component.hierarchies {
                if hierarchy.is_empty() || hierarchy.len() > MAX_DEPTH {
                    return Err(ConfigError::invalid(
                        key,
                        format!("hierarchy must have 1 to {} resource types", MAX_DEPTH),
                    ));
                }
            }
            component.to_actions()?;
        }
        Ok(())
    }

    /// Build the action and hierarchy registries for every component.
    pub fn build_registry(&self) -> Result<(ActionRegistry, HierarchyRegistry), ConfigError> {
        self.validate()?;

        let mut actions = ActionRegistry::new();
        let mut hierarchies = HierarchyRegistry::new();
        for component in &self.components {
            actions.register(component.to_actions()?);
            for types in &component.hierarchies {
                hierarchies.register(&component.name, types.iter().cloned());
            }
        }
        Ok((actions, hierarchies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.store_timeout_secs, 30);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.store_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_build_registry() {
        let (actions, hierarchies) = StoreConfig::default().build_registry().unwrap();

        let all = actions.all_action("solr").unwrap();
        assert_eq!(all.actions().len(), 2);
        assert_eq!(
            hierarchies.hierarchy_for("solr", 1).unwrap(),
            &["Collection".to_string(), "Field".to_string()]
        );
    }

    #[test]
    fn test_from_json() {
        let config = StoreConfig::from_json(
            r#"{
                "admin_groups": ["Admins "],
                "store_timeout_secs": 5,
                "components": [{
                    "name": "sqoop",
                    "actions": ["read", "write"],
                    "hierarchies": [["Server", "Connector"], ["Server", "Link"], ["Server", "Job"]]
                }],
                "user_groups": {"alice": ["admins"]}
            }"#,
        )
        .unwrap();

        assert_eq!(config.admin_group_set(), HashSet::from(["admins".to_string()]));
        let (actions, hierarchies) = config.build_registry().unwrap();
        assert!(actions.contains("sqoop"));
        assert_eq!(hierarchies.hierarchy_for("sqoop", 3).unwrap()[1], "Job");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = StoreConfig::default();
        config.store_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = StoreConfig::default();
        config.components[0].all_actions = vec!["delete".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::Model(_))));

        let mut config = StoreConfig::default();
        config.components[0].hierarchies = vec![vec!["a", "b", "c", "d", "e"]
            .into_iter()
            .map(String::from)
            .collect()];
        assert!(config.validate().is_err());

        let mut config = StoreConfig::default();
        config.components.push(ComponentConfig::search());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            StoreConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
