//! Grant option delegation check.
//!
//! A grantor may grant or revoke a privilege when one of their groups is an
//! admin group, or when a role of their groups holds a privilege with the
//! grant option that implies the requested one.

use std::collections::{BTreeSet, HashSet};
use tracing::debug;
use warden_model::{implies, PrivilegeDescriptor};

use crate::engine::PrivilegeEngine;
use crate::error::{StoreError, StoreResult};
use crate::tables::{normalize_names, Tables};

/// Fail with `InvalidInput` when the grantor is blank.
pub fn require_grantor(grantor: &str) -> StoreResult<()> {
    if grantor.trim().is_empty() {
        return Err(StoreError::InvalidInput("grantor must not be blank".to_string()));
    }
    Ok(())
}

/// Check that `grantor` may grant or revoke `descriptor`.
///
/// `admin_groups` must already be normalized.
///
/// # Errors
///
/// `InvalidInput` for a blank grantor, `GrantDenied` when no privilege with
/// the grant option covers the request.
pub fn check_grant_option(
    tables: &Tables,
    engine: &PrivilegeEngine<'_>,
    admin_groups: &HashSet<String>,
    descriptor: &PrivilegeDescriptor,
    grantor: &str,
    grantor_groups: &HashSet<String>,
) -> StoreResult<()> {
    require_grantor(grantor)?;

    let groups = normalize_names(grantor_groups);
    if groups.iter().any(|group| admin_groups.contains(group)) {
        debug!(grantor = %grantor, "Grantor is in an admin group");
        return Ok(());
    }

    let roles: BTreeSet<String> = tables.roles_for_groups(&groups).into_iter().collect();
    let held = engine.privileges_for_roles(tables, &roles)?;
    let allowed = held.iter().any(|privilege| {
        privilege.grant_option() == Some(true) && implies(engine.actions(), privilege, descriptor)
    });

    if allowed {
        Ok(())
    } else {
        Err(StoreError::GrantDenied(format!(
            "{} has no grant option covering {}",
            grantor, descriptor
        )))
    }
}
