//! # Actions
//!
//! Defines the actions that can be granted on resources, and the
//! per-component registry that resolves action names.
//!
//! Every component owns its own vocabulary. A vocabulary always contains a
//! compound action named `all` that aggregates the component's base actions;
//! the grant and revoke algorithms depend on it.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{ModelError, ModelResult};

/// Name of the compound action every component must define.
pub const ALL_ACTION: &str = "all";

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// An action that can be granted on a resource.
///
/// Actions are either base actions (`query`, `update`) or compound actions
/// that stand for a fixed set of other actions (`all`). Two actions are
/// equal when their names match case-insensitively.
///
/// # Example
///
/// ```
/// use warden_model::actions::Action;
///
/// assert_eq!(Action::base("QUERY"), Action::base("query"));
/// assert_eq!(Action::base("Query").name(), "query");
/// ```
#[derive(Debug, Clone)]
pub enum Action {
    /// A single, indivisible action.
    Base(String),
    /// A named set of other actions.
    Compound(CompoundAction),
}

impl Action {
    /// Create a base action. The name is lower-cased.
    pub fn base(name: impl AsRef<str>) -> Self {
        Action::Base(normalize(name.as_ref()))
    }

    /// Get the (lower-cased) action name.
    pub fn name(&self) -> &str {
        match self {
            Action::Base(name) => name,
            Action::Compound(compound) => compound.name(),
        }
    }

    /// Check if this is a compound action.
    pub fn is_compound(&self) -> bool {
        matches!(self, Action::Compound(_))
    }

    /// Get the compound action, if this is one.
    pub fn as_compound(&self) -> Option<&CompoundAction> {
        match self {
            Action::Compound(compound) => Some(compound),
            Action::Base(_) => None,
        }
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for Action {}

impl Hash for Action {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An action that aggregates a fixed, ordered list of member actions.
///
/// The member list is fixed when the action is built.
#[derive(Debug, Clone)]
pub struct CompoundAction {
    name: String,
    actions: Vec<Action>,
}

impl CompoundAction {
    /// Create a compound action from its members.
    pub fn new(name: impl AsRef<str>, actions: Vec<Action>) -> Self {
        Self {
            name: normalize(name.as_ref()),
            actions,
        }
    }

    /// Get the (lower-cased) action name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the member actions in registration order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Check if `action` is one of the members.
    pub fn includes(&self, action: &Action) -> bool {
        self.actions.iter().any(|member| member == action)
    }

    /// Every member except `excluded`.
    ///
    /// Used by revoke to rebuild the privileges left over after one member
    /// is revoked from a compound grant.
    ///
    /// # Example
    ///
    /// ```
    /// use warden_model::actions::{Action, CompoundAction};
    ///
    /// let all = CompoundAction::new("all", vec![Action::base("query"), Action::base("update")]);
    /// assert_eq!(all.left_actions(&Action::base("QUERY")), vec![Action::base("update")]);
    /// ```
    pub fn left_actions(&self, excluded: &Action) -> Vec<Action> {
        self.actions
            .iter()
            .filter(|member| *member != excluded)
            .cloned()
            .collect()
    }

    /// Wrap this compound action as an [`Action`].
    pub fn to_action(&self) -> Action {
        Action::Compound(self.clone())
    }
}

/// The action vocabulary of one component.
///
/// # Example
///
/// ```
/// use warden_model::actions::ComponentActions;
///
/// let solr = ComponentActions::builder("solr")
///     .action("query")
///     .action("update")
///     .compound("all", ["query", "update"])
///     .build()
///     .unwrap();
///
/// assert!(solr.resolve("QUERY").is_some());
/// assert_eq!(solr.all_action().actions().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ComponentActions {
    component: String,
    actions: HashMap<String, Action>,
    all: CompoundAction,
}

impl ComponentActions {
    /// Start building the vocabulary of `component`.
    pub fn builder(component: impl AsRef<str>) -> ComponentActionsBuilder {
        ComponentActionsBuilder {
            component: normalize(component.as_ref()),
            base: Vec::new(),
            compounds: Vec::new(),
        }
    }

    /// Get the (lower-cased) component name.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Resolve an action name, case-insensitively.
    pub fn resolve(&self, name: &str) -> Option<&Action> {
        self.actions.get(&normalize(name))
    }

    /// Get the component's ALL action.
    pub fn all_action(&self) -> &CompoundAction {
        &self.all
    }

    /// Iterate over every registered action.
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }
}

/// Builder for [`ComponentActions`].
#[derive(Debug, Clone)]
pub struct ComponentActionsBuilder {
    component: String,
    base: Vec<String>,
    compounds: Vec<(String, Vec<String>)>,
}

impl ComponentActionsBuilder {
    /// Register a base action.
    pub fn action(mut self, name: impl AsRef<str>) -> Self {
        self.base.push(normalize(name.as_ref()));
        self
    }

    /// Register a compound action made of previously registered base actions.
    pub fn compound<I, S>(mut self, name: impl AsRef<str>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let members = members
            .into_iter()
            .map(|member| normalize(member.as_ref()))
            .collect();
        self.compounds.push((normalize(name.as_ref()), members));
        self
    }

    /// Validate and build the vocabulary.
    ///
    /// Fails when a name is registered twice, when a compound member is not a
    /// base action of this component, or when there is no `all` compound.
    pub fn build(self) -> ModelResult<ComponentActions> {
        let component = self.component;
        let mut actions: HashMap<String, Action> = HashMap::new();

        for name in self.base {
            if actions.contains_key(&name) {
                return Err(ModelError::DuplicateAction {
                    component: component.clone(),
                    action: name,
                });
            }
            actions.insert(name.clone(), Action::Base(name));
        }

        let mut all = None;
        for (name, members) in self.compounds {
            if actions.contains_key(&name) {
                return Err(ModelError::DuplicateAction {
                    component: component.clone(),
                    action: name,
                });
            }
            let mut resolved = Vec::with_capacity(members.len());
            for member in members {
                match actions.get(&member) {
                    Some(action) if !action.is_compound() => resolved.push(action.clone()),
                    _ => {
                        return Err(ModelError::UnknownAction {
                            component: component.clone(),
                            action: member,
                        })
                    }
                }
            }
            let compound = CompoundAction::new(&name, resolved);
            if name == ALL_ACTION {
                all = Some(compound.clone());
            }
            actions.insert(name, Action::Compound(compound));
        }

        let all = all.ok_or_else(|| ModelError::MissingAllAction(component.clone()))?;

        Ok(ComponentActions {
            component,
            actions,
            all,
        })
    }
}

/// Registry of action vocabularies, one per component.
///
/// Built once at startup and passed by reference to the store.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    components: HashMap<String, ComponentActions>,
}

impl ActionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component vocabulary, replacing any previous one.
    pub fn register(&mut self, actions: ComponentActions) {
        self.components.insert(actions.component().to_string(), actions);
    }

    /// Register a component vocabulary (builder style).
    pub fn with(mut self, actions: ComponentActions) -> Self {
        self.register(actions);
        self
    }

    /// Check if a vocabulary exists for `component`.
    pub fn contains(&self, component: &str) -> bool {
        self.components.contains_key(&normalize(component))
    }

    /// Get the vocabulary of `component`.
    pub fn component(&self, component: &str) -> ModelResult<&ComponentActions> {
        self.components
            .get(&normalize(component))
            .ok_or_else(|| ModelError::UnknownComponent(component.to_string()))
    }

    /// Resolve an action name for `component`.
    ///
    /// # Errors
    ///
    /// `UnknownComponent` if no vocabulary is registered for the component,
    /// `UnknownAction` if the name is not part of it.
    pub fn resolve(&self, component: &str, action: &str) -> ModelResult<&Action> {
        let actions = self.component(component)?;
        actions
            .resolve(action)
            .ok_or_else(|| ModelError::UnknownAction {
                component: actions.component().to_string(),
                action: action.to_string(),
            })
    }

    /// Get the ALL action of `component`.
    pub fn all_action(&self, component: &str) -> ModelResult<&CompoundAction> {
        Ok(self.component(component)?.all_action())
    }
}
