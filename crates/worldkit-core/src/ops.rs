//! The operations the CLI layer consumes: plan a first-time scaffold,
//! plan an update of a detected tree, and apply a plan.

use std::path::Path;

use crate::diff::{diff, MigrationPlan};
use crate::error::SpecError;
use crate::probe::probe;
use crate::registry::SpecRegistry;
use crate::spec::WorldSpec;

/// Plan a first-time scaffold of `spec` at `root`.
///
/// The root is probed first so paths that already exist are never
/// re-created; on an empty root this is equivalent to diffing against an
/// empty state.
pub fn plan_create(spec: &WorldSpec, root: &Path, registry: &SpecRegistry) -> MigrationPlan {
    let state = probe(root, registry);
    diff(spec, &state, registry)
}

/// Plan an update of the tree at `root` to the latest registered version
/// of its detected world type.
///
/// Fails only when no world type can be detected or the detected one is
/// not registered; an up-to-date tree yields a no-op plan instead.
pub fn plan_update(root: &Path, registry: &SpecRegistry) -> Result<MigrationPlan, SpecError> {
    let state = probe(root, registry);
    let world_type =
        state
            .declared_world_type
            .clone()
            .ok_or_else(|| SpecError::UnknownWorldType {
                world_type: format!("(undetected at {})", root.display()),
            })?;
    let spec = registry
        .latest(&world_type)
        .ok_or_else(|| SpecError::UnknownWorldType {
            world_type: world_type.clone(),
        })?;
    Ok(diff(spec, &state, registry))
}
