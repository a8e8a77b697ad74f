use std::collections::BTreeMap;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::SpecError;
use crate::spec::{builtin, load_str, ExpandContext, SpecVersion, WorldSpec};

/// A structural fingerprint for one registered `(world_type, version)`:
/// a tree whose paths include the whole signature is taken to be at least
/// that version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRule {
    pub world_type: String,
    pub version: SpecVersion,
    pub signature: Vec<String>,
}

/// The set of world specifications the engine knows about, keyed by world
/// type and version.
///
/// An explicit value the caller constructs and passes into the prober and
/// differ; there is no ambient "current version" anywhere. Tests and tools
/// that target older spec sets just build a different registry.
#[derive(Debug, Clone, Default)]
pub struct SpecRegistry {
    worlds: IndexMap<String, BTreeMap<SpecVersion, WorldSpec>>,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every bundled world specification.
    pub fn builtin(ctx: &ExpandContext) -> Result<Self, SpecError> {
        let mut registry = Self::new();
        for (label, doc) in builtin::DOCUMENTS {
            let loaded = load_str(doc, label, ctx)?;
            for warning in &loaded.warnings {
                debug!("builtin spec {label}: {warning}");
            }
            registry.register(loaded.spec);
        }
        Ok(registry)
    }

    pub fn register(&mut self, spec: WorldSpec) {
        self.worlds
            .entry(spec.world_type.clone())
            .or_default()
            .insert(spec.spec_version, spec);
    }

    pub fn contains_world(&self, world_type: &str) -> bool {
        self.worlds.contains_key(world_type)
    }

    pub fn get(&self, world_type: &str, version: SpecVersion) -> Option<&WorldSpec> {
        self.worlds.get(world_type)?.get(&version)
    }

    /// The highest registered version of a world type.
    pub fn latest(&self, world_type: &str) -> Option<&WorldSpec> {
        self.worlds
            .get(world_type)?
            .last_key_value()
            .map(|(_, spec)| spec)
    }

    pub fn world_types(&self) -> impl Iterator<Item = &str> {
        self.worlds.keys().map(String::as_str)
    }

    pub fn versions(&self, world_type: &str) -> Vec<SpecVersion> {
        self.worlds
            .get(world_type)
            .map(|v| v.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Whether an automated (additive) migration exists from one registered
    /// version to another. Migrations only move forward.
    pub fn has_migration_path(
        &self,
        world_type: &str,
        from: SpecVersion,
        to: SpecVersion,
    ) -> bool {
        let Some(versions) = self.worlds.get(world_type) else {
            return false;
        };
        versions.contains_key(&from) && versions.contains_key(&to) && from <= to
    }

    /// Signature rules for heuristic detection, highest version first so
    /// the first full match is also the best one.
    ///
    /// The signature of a version is its parent-directory set: an additive
    /// spec history means each version's parents only ever grow, so the
    /// full set appearing together pins the minimum version.
    pub fn signature_rules(&self) -> Vec<SignatureRule> {
        let mut rules: Vec<SignatureRule> = self
            .worlds
            .iter()
            .flat_map(|(world_type, versions)| {
                versions.iter().map(|(version, spec)| SignatureRule {
                    world_type: world_type.clone(),
                    version: *version,
                    signature: spec
                        .parent_directories
                        .iter()
                        .map(|p| p.name.clone())
                        .collect(),
                })
            })
            .collect();
        rules.sort_by(|a, b| {
            b.version
                .cmp(&a.version)
                .then_with(|| a.world_type.cmp(&b.world_type))
        });
        rules
    }

    /// Bound for the prober's tree walk: one level past the deepest path
    /// any registered spec declares.
    pub fn max_probe_depth(&self) -> usize {
        self.worlds
            .values()
            .flat_map(|versions| versions.values())
            .map(WorldSpec::max_depth)
            .max()
            .unwrap_or(3)
            + 1
    }
}
