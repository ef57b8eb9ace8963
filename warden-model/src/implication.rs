//! Privilege implication.
//!
//! A held privilege implies a requested one when it covers the same component
//! and service, its action covers the requested action, and its resource path
//! is the same as or an ancestor of the requested path. Wildcard names match
//! any name at their depth.

use crate::actions::{ActionRegistry, ALL_ACTION};
use crate::privilege::PrivilegeDescriptor;

/// Wildcard resource name.
pub const ALL_RESOURCES: &str = "*";

/// Check if a resource name is a wildcard (`*` or `all`, any case).
pub fn is_wildcard(name: &str) -> bool {
    name == ALL_RESOURCES || name.eq_ignore_ascii_case(ALL_ACTION)
}

/// Return true if `persisted` implies `requested`.
///
/// Action names that cannot be resolved for the component never imply
/// anything.
///
/// # Example
///
/// ```
/// use warden_model::{implies, ActionRegistry, Authorizable, ComponentActions, PrivilegeDescriptor};
///
/// let actions = ActionRegistry::new().with(
///     ComponentActions::builder("solr")
///         .action("query")
///         .action("update")
///         .compound("all", ["query", "update"])
///         .build()
///         .unwrap(),
/// );
/// let privilege = |action: &str, steps: Vec<Authorizable>| {
///     PrivilegeDescriptor::builder()
///         .component("solr")
///         .service("service1")
///         .action(action)
///         .scope("collection")
///         .authorizables(steps)
///         .build()
///         .unwrap()
/// };
///
/// let held = privilege("all", vec![Authorizable::new("Collection", "c1")]);
/// let asked = privilege("query", vec![Authorizable::new("Collection", "c1"), Authorizable::new("Field", "f1")]);
/// assert!(implies(&actions, &held, &asked));
/// assert!(!implies(&actions, &asked, &held));
/// ```
pub fn implies(
    actions: &ActionRegistry,
    persisted: &PrivilegeDescriptor,
    requested: &PrivilegeDescriptor,
) -> bool {
    if !persisted.component().eq_ignore_ascii_case(requested.component())
        || !persisted.service().eq_ignore_ascii_case(requested.service())
    {
        return false;
    }

    let component = persisted.component();
    let (all, held, asked) = match (
        actions.all_action(component),
        actions.resolve(component, persisted.action()),
        actions.resolve(component, requested.action()),
    ) {
        (Ok(all), Ok(held), Ok(asked)) => (all.to_action(), held, asked),
        _ => return false,
    };

    if *held != all && (*asked == all || held != asked) {
        return false;
    }

    let held_steps = persisted.authorizables();
    let asked_steps = requested.authorizables();

    for (held_step, asked_step) in held_steps.iter().zip(asked_steps) {
        if !held_step.same_type(asked_step) {
            return false;
        }
        if !held_step.name().eq_ignore_ascii_case(asked_step.name())
            && !is_wildcard(held_step.name())
            && !is_wildcard(asked_step.name())
        {
            return false;
        }
    }

    // A longer held path is narrower unless the extra names are wildcards.
    held_steps
        .iter()
        .skip(asked_steps.len())
        .all(|step| is_wildcard(step.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ComponentActions;
    use crate::privilege::Authorizable;

    const COLLECTION: &str = "collection1";
    const FIELD: &str = "field1";

    fn actions() -> ActionRegistry {
        ActionRegistry::new().with(
            ComponentActions::builder("solr")
                .action("query")
                .action("update")
                .compound("all", ["query", "update"])
                .build()
                .unwrap(),
        )
    }

    fn privilege(action: &str, names: &[&str]) -> PrivilegeDescriptor {
        let types = ["Collection", "Field"];
        let steps = names
            .iter()
            .zip(types)
            .map(|(name, type_name)| Authorizable::new(type_name, *name))
            .collect();
        PrivilegeDescriptor::builder()
            .component("solr")
            .service("service")
            .action(action)
            .scope(if names.len() > 1 { "field" } else { "collection" })
            .authorizables(steps)
            .build()
            .unwrap()
    }

    #[test]
    fn test_equal_authorizables() {
        let actions = actions();
        let held = privilege("query", &[COLLECTION, FIELD]);

        assert!(implies(&actions, &held, &privilege("query", &[COLLECTION, FIELD])));
        assert!(!implies(&actions, &held, &privilege("query", &[COLLECTION, "not_field1"])));
    }

    #[test]
    fn test_wildcard_on_either_side() {
        let actions = actions();
        let request = privilege("query", &[COLLECTION, "not_field1"]);

        assert!(implies(&actions, &privilege("query", &[COLLECTION, "*"]), &request));
        assert!(implies(&actions, &privilege("query", &[COLLECTION, "ALL"]), &request));
        assert!(implies(
            &actions,
            &privilege("query", &[COLLECTION, FIELD]),
            &privilege("query", &[COLLECTION, "*"])
        ));
    }

    #[test]
    fn test_different_depths() {
        let actions = actions();
        let collection = privilege("query", &[COLLECTION]);
        let field = privilege("query", &[COLLECTION, FIELD]);

        assert!(implies(&actions, &collection, &field));
        assert!(implies(&actions, &collection, &collection));
        assert!(!implies(&actions, &field, &collection));
        assert!(implies(&actions, &privilege("query", &[COLLECTION, "*"]), &collection));
    }

    #[test]
    fn test_actions() {
        let actions = actions();
        let request = privilege("query", &[COLLECTION, FIELD]);

        assert!(!implies(&actions, &privilege("update", &[COLLECTION, FIELD]), &request));
        assert!(!implies(&actions, &request, &privilege("all", &[COLLECTION, FIELD])));
        assert!(implies(&actions, &privilege("all", &[COLLECTION, FIELD]), &request));
    }

    #[test]
    fn test_component_and_service_must_match() {
        let actions = actions();
        let held = privilege("all", &[COLLECTION]);
        let other_service = held.to_builder().service("service2").build().unwrap();
        let other_component = held.to_builder().component("sqoop").build().unwrap();

        assert!(!implies(&actions, &held, &other_service));
        assert!(!implies(&actions, &other_component, &other_component));
    }

    #[test]
    fn test_unknown_action_never_implies() {
        let actions = actions();
        let held = privilege("delete", &[COLLECTION]);
        assert!(!implies(&actions, &held, &held));
    }

    #[test]
    fn test_type_mismatch() {
        let actions = actions();
        let held = privilege("query", &[COLLECTION]);
        let request = held
            .to_builder()
            .authorizables(vec![Authorizable::new("Field", COLLECTION)])
            .build()
            .unwrap();
        assert!(!implies(&actions, &held, &request));
    }

    #[test]
    fn test_is_wildcard() {
        assert!(is_wildcard("*"));
        assert!(is_wildcard("ALL"));
        assert!(is_wildcard("all"));
        assert!(!is_wildcard("all1"));
        assert!(!is_wildcard(""));
    }
}
