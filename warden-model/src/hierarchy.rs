//! # Resource Hierarchies
//!
//! Each component declares the ordered resource type sequences it accepts
//! (for a search component: `[Collection, Field]`). A resource path is valid
//! when its types are a prefix of one registered sequence, and that sequence's
//! position becomes the path's *hierarchy tag*.
//!
//! Paths are persisted in a fixed number of name slots. The tag is what lets
//! a record's slots be turned back into typed steps.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ModelError, ModelResult};
use crate::privilege::Authorizable;

/// Maximum number of resource steps in a path.
pub const MAX_DEPTH: usize = 4;

/// Marker stored in unused resource slots.
pub const NULL_SLOT: &str = "__NULL__";

/// Hierarchy tag of a path with no resource steps.
pub const UNSET_HIERARCHY_TAG: u32 = 0;

/// Check that `name` can occupy a slot: not blank and not [`NULL_SLOT`].
pub fn is_storable_name(name: &str) -> bool {
    !name.trim().is_empty() && !name.eq_ignore_ascii_case(NULL_SLOT)
}

/// Fixed array of resource names, unused positions hold [`NULL_SLOT`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceSlots([String; MAX_DEPTH]);

impl ResourceSlots {
    /// Slots with every position unused.
    pub fn empty() -> Self {
        Self(std::array::from_fn(|_| NULL_SLOT.to_string()))
    }

    /// Get the name at `index`, or `None` if the slot is unused.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0
            .get(index)
            .map(String::as_str)
            .filter(|name| *name != NULL_SLOT)
    }

    /// Names up to the first unused slot.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str).take_while(|name| *name != NULL_SLOT)
    }

    /// Number of used leading slots.
    pub fn depth(&self) -> usize {
        self.names().count()
    }

    fn set(&mut self, index: usize, step: &Authorizable) -> ModelResult<()> {
        if !is_storable_name(step.name()) {
            return Err(ModelError::InvalidResourceName(step.type_name().to_string()));
        }
        self.0[index] = step.name().to_string();
        Ok(())
    }
}

impl Default for ResourceSlots {
    fn default() -> Self {
        Self::empty()
    }
}

/// A resource path in persisted form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodedPath {
    /// Hierarchy tag of the path.
    pub tag: u32,
    /// Resource names.
    pub slots: ResourceSlots,
}

/// Registry of valid resource type sequences, per component.
///
/// # Example
///
/// ```
/// use warden_model::{Authorizable, HierarchyRegistry};
///
/// let registry = HierarchyRegistry::new().with("solr", ["Collection", "Field"]);
///
/// let steps = vec![Authorizable::new("Collection", "coll1")];
/// let encoded = registry.encode("solr", &steps).unwrap();
/// assert_eq!(encoded.tag, 1);
/// assert_eq!(registry.decode("solr", &encoded).unwrap(), steps);
/// ```
#[derive(Debug, Clone, Default)]
pub struct HierarchyRegistry {
    hierarchies: HashMap<String, Vec<Vec<String>>>,
}

impl HierarchyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a type sequence for `component` and return its tag.
    pub fn register<I, S>(&mut self, component: &str, types: I) -> u32
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sequences = self
            .hierarchies
            .entry(component.trim().to_lowercase())
            .or_default();
        sequences.push(types.into_iter().map(Into::into).collect());
        sequences.len() as u32
    }

    /// Append a type sequence for `component` (builder style).
    pub fn with<I, S>(mut self, component: &str, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register(component, types);
        self
    }

    fn sequences(&self, component: &str) -> ModelResult<&[Vec<String>]> {
        self.hierarchies
            .get(&component.trim().to_lowercase())
            .map(Vec::as_slice)
            .ok_or_else(|| ModelError::UnknownComponent(component.to_string()))
    }

    /// Find the tag of the first sequence whose leading types match `steps`.
    ///
    /// An empty path has tag [`UNSET_HIERARCHY_TAG`].
    ///
    /// # Errors
    ///
    /// `UnknownComponent` if nothing is registered for the component,
    /// `InvalidHierarchy` if no sequence matches.
    pub fn tag_for(&self, component: &str, steps: &[Authorizable]) -> ModelResult<u32> {
        let sequences = self.sequences(component)?;
        if steps.is_empty() {
            return Ok(UNSET_HIERARCHY_TAG);
        }

        sequences
            .iter()
            .position(|types| {
                types.len() >= steps.len()
                    && steps
                        .iter()
                        .zip(types)
                        .all(|(step, type_name)| step.type_name().eq_ignore_ascii_case(type_name))
            })
            .map(|index| index as u32 + 1)
            .ok_or_else(|| ModelError::InvalidHierarchy {
                component: component.to_string(),
                types: steps
                    .iter()
                    .map(Authorizable::type_name)
                    .collect::<Vec<_>>()
                    .join(","),
            })
    }

    /// Get the type sequence registered under `tag`.
    pub fn hierarchy_for(&self, component: &str, tag: u32) -> ModelResult<&[String]> {
        let sequences = self.sequences(component)?;
        if tag == UNSET_HIERARCHY_TAG {
            return Ok(&[]);
        }
        sequences
            .get(tag as usize - 1)
            .map(Vec::as_slice)
            .ok_or_else(|| ModelError::InvalidHierarchy {
                component: component.to_string(),
                types: format!("tag {}", tag),
            })
    }

    /// Encode a resource path into its tag and slots.
    ///
    /// # Errors
    ///
    /// `TooDeep` beyond [`MAX_DEPTH`] steps, `InvalidResourceName` for a step
    /// that could not be told apart from an unused slot.
    pub fn encode(&self, component: &str, steps: &[Authorizable]) -> ModelResult<EncodedPath> {
        if steps.len() > MAX_DEPTH {
            return Err(ModelError::TooDeep(steps.len()));
        }
        let tag = self.tag_for(component, steps)?;
        let mut slots = ResourceSlots::empty();
        for (index, step) in steps.iter().enumerate() {
            slots.set(index, step)?;
        }
        Ok(EncodedPath { tag, slots })
    }

    /// Decode slots back into typed steps, stopping at the first unused slot.
    pub fn decode(&self, component: &str, path: &EncodedPath) -> ModelResult<Vec<Authorizable>> {
        let types = self.hierarchy_for(component, path.tag)?;
        Ok(path
            .slots
            .names()
            .zip(types)
            .map(|(name, type_name)| Authorizable::new(type_name.as_str(), name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> HierarchyRegistry {
        HierarchyRegistry::new().with("SOLR", ["Collection", "Field"])
    }

    #[test]
    fn test_search_hierarchy() {
        let registry = registry();
        assert_eq!(
            registry.hierarchy_for("solr", 1).unwrap(),
            &["Collection".to_string(), "Field".to_string()]
        );

        let mut steps = vec![Authorizable::new("Collection", "")];
        assert_eq!(registry.tag_for("solr", &steps).unwrap(), 1);
        steps.push(Authorizable::new("Field", ""));
        assert_eq!(registry.tag_for("solr", &steps).unwrap(), 1);
    }

    #[test]
    fn test_invalid_hierarchy() {
        let steps = vec![Authorizable::new("notCollection", "")];
        assert!(matches!(
            registry().tag_for("solr", &steps),
            Err(ModelError::InvalidHierarchy { .. })
        ));

        let steps = vec![Authorizable::new("Field", "f1")];
        assert!(registry().tag_for("solr", &steps).is_err());
    }

    #[test]
    fn test_unknown_component() {
        assert_eq!(
            registry().tag_for("sqoop", &[]).unwrap_err(),
            ModelError::UnknownComponent("sqoop".to_string())
        );
    }

    #[test]
    fn test_second_sequence_gets_next_tag() {
        let registry = HierarchyRegistry::new()
            .with("sqoop", ["Server", "Connector"])
            .with("sqoop", ["Server", "Link"])
            .with("sqoop", ["Server", "Job"]);

        let steps = vec![Authorizable::new("Server", "s1"), Authorizable::new("job", "j1")];
        assert_eq!(registry.tag_for("sqoop", &steps).unwrap(), 3);

        // Prefix of every sequence resolves to the first.
        let steps = vec![Authorizable::new("Server", "s1")];
        assert_eq!(registry.tag_for("sqoop", &steps).unwrap(), 1);
    }

    #[test]
    fn test_encode_pads_with_null_marker() {
        let steps = vec![
            Authorizable::new("Collection", "coll1"),
            Authorizable::new("Field", "field1"),
        ];
        let encoded = registry().encode("solr", &steps).unwrap();

        assert_eq!(encoded.tag, 1);
        assert_eq!(encoded.slots.get(0), Some("coll1"));
        assert_eq!(encoded.slots.get(1), Some("field1"));
        assert_eq!(encoded.slots.get(2), None);
        assert_eq!(encoded.slots.depth(), 2);
        assert_eq!(registry().decode("solr", &encoded).unwrap(), steps);
    }

    #[test]
    fn test_empty_path() {
        let encoded = registry().encode("solr", &[]).unwrap();
        assert_eq!(encoded.tag, UNSET_HIERARCHY_TAG);
        assert_eq!(encoded.slots, ResourceSlots::empty());
        assert!(registry().decode("solr", &encoded).unwrap().is_empty());
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let steps = vec![Authorizable::new("Collection", ""), Authorizable::new("Field", "f1")];
        assert_eq!(
            registry().encode("solr", &steps).unwrap_err(),
            ModelError::InvalidResourceName("Collection".to_string())
        );

        let steps = vec![Authorizable::new("Collection", "  ")];
        assert!(registry().encode("solr", &steps).is_err());

        let steps = vec![Authorizable::new("Collection", "c1"), Authorizable::new("Field", NULL_SLOT)];
        assert_eq!(
            registry().encode("solr", &steps).unwrap_err(),
            ModelError::InvalidResourceName("Field".to_string())
        );
    }

    #[test]
    fn test_encode_too_deep() {
        let steps: Vec<_> = (0..5).map(|i| Authorizable::new("Collection", format!("c{}", i))).collect();
        assert_eq!(registry().encode("solr", &steps).unwrap_err(), ModelError::TooDeep(5));
    }
}
