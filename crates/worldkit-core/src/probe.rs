use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::metadata::{self, DESCRIPTOR_FILE, LOCK_FILE};
use crate::registry::SpecRegistry;
use crate::spec::SpecVersion;

/// How the prober arrived at the declared world type and version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionConfidence {
    /// Root descriptor parsed with both `world_type` and `version`.
    ExactMetadata,
    /// Matched a structural signature rule.
    StructuralHeuristic,
    /// Neither worked. Not an error: the tree may be a fresh target.
    Unknown,
}

/// Snapshot of an existing directory tree. Built fresh on every probe;
/// never cached across calls, the tree may have changed.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectState {
    pub root: PathBuf,
    pub declared_world_type: Option<String>,
    pub declared_version: Option<SpecVersion>,
    pub confidence: DetectionConfidence,
    /// Relative `/`-separated paths present under the root, bounded to the
    /// structural depth of registered specs. Worldkit's own descriptor and
    /// lock files are excluded.
    pub existing_paths: BTreeSet<String>,
}

impl ProjectState {
    /// State for a root with no content at all (or one that does not
    /// exist yet).
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            declared_world_type: None,
            declared_version: None,
            confidence: DetectionConfidence::Unknown,
            existing_paths: BTreeSet::new(),
        }
    }

    pub fn is_empty_tree(&self) -> bool {
        self.existing_paths.is_empty()
    }
}

/// Inspect an existing tree and infer its declared world type and version.
///
/// Detection order: exact root descriptor, then structural signature rules
/// (first full match wins, highest version preferred), then `Unknown`.
/// Never mutates the filesystem. Unreadable entries are skipped with a
/// warning rather than failing the probe.
pub fn probe(root: &Path, registry: &SpecRegistry) -> ProjectState {
    if !root.exists() {
        return ProjectState::empty(root);
    }

    let existing_paths = walk_existing(root, registry.max_probe_depth());

    // Step 1: exact metadata.
    if let Some(descriptor) = metadata::read_descriptor(root) {
        match descriptor.version.parse::<SpecVersion>() {
            Ok(version) if !descriptor.world_type.is_empty() => {
                debug!(
                    world_type = %descriptor.world_type,
                    %version,
                    "probe: exact metadata at {}",
                    root.display()
                );
                return ProjectState {
                    root: root.to_path_buf(),
                    declared_world_type: Some(descriptor.world_type),
                    declared_version: Some(version),
                    confidence: DetectionConfidence::ExactMetadata,
                    existing_paths,
                };
            }
            _ => debug!(
                "probe: descriptor at {} lacks usable world_type/version, \
                 falling back to heuristics",
                root.display()
            ),
        }
    }

    // Step 1b: a root whose own descriptor is gone may still carry one at
    // a parent level the writer stamped.
    let sub_level = existing_paths
        .iter()
        .filter(|p| !p.contains('/'))
        .find_map(|top| {
            let descriptor = metadata::read_descriptor(&root.join(top))?;
            let version = descriptor.version.parse::<SpecVersion>().ok()?;
            (!descriptor.world_type.is_empty()).then(|| (top.clone(), descriptor.world_type, version))
        });
    if let Some((level, world_type, version)) = sub_level {
        debug!(
            %world_type,
            %version,
            "probe: exact metadata at sub-level {level} of {}",
            root.display()
        );
        return ProjectState {
            root: root.to_path_buf(),
            declared_world_type: Some(world_type),
            declared_version: Some(version),
            confidence: DetectionConfidence::ExactMetadata,
            existing_paths,
        };
    }

    // Step 2: structural heuristics, highest version first.
    for rule in registry.signature_rules() {
        let satisfied = rule
            .signature
            .iter()
            .all(|path| existing_paths.contains(path));
        if satisfied && !rule.signature.is_empty() {
            debug!(
                world_type = %rule.world_type,
                version = %rule.version,
                "probe: structural signature matched at {}",
                root.display()
            );
            return ProjectState {
                root: root.to_path_buf(),
                declared_world_type: Some(rule.world_type),
                declared_version: Some(rule.version),
                confidence: DetectionConfidence::StructuralHeuristic,
                existing_paths,
            };
        }
    }

    // Step 3: unknown.
    ProjectState {
        root: root.to_path_buf(),
        declared_world_type: None,
        declared_version: None,
        confidence: DetectionConfidence::Unknown,
        existing_paths,
    }
}

fn walk_existing(root: &Path, max_depth: usize) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(max_depth) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("probe: skipping unreadable entry under {}: {e}", root.display());
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy();
        if name == DESCRIPTOR_FILE || name == LOCK_FILE {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        paths.insert(rel);
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{write_descriptor, Descriptor};
    use crate::spec::ExpandContext;
    use std::fs;
    use tempfile::TempDir;

    fn registry() -> SpecRegistry {
        let ctx = ExpandContext {
            user: "ada".into(),
            date: "2026-08-25".into(),
            timestamp: "2026-08-25T12:00:00+00:00".into(),
            project: Some("apollo".into()),
            extra: Default::default(),
        };
        SpecRegistry::builtin(&ctx).unwrap()
    }

    #[test]
    fn test_probe_missing_root_is_empty_unknown() {
        let tmp = TempDir::new().unwrap();
        let state = probe(&tmp.path().join("nope"), &registry());
        assert_eq!(state.confidence, DetectionConfidence::Unknown);
        assert!(state.is_empty_tree());
    }

    #[test]
    fn test_probe_exact_metadata_wins() {
        let tmp = TempDir::new().unwrap();
        // Structure says JOURNAL_WORLD, descriptor says otherwise; the
        // descriptor is authoritative.
        for dir in ["01_daily", "02_topics", "03_archive"] {
            fs::create_dir(tmp.path().join(dir)).unwrap();
        }
        write_descriptor(tmp.path(), &Descriptor::new("RESEARCH_WORLD", "1.1.0")).unwrap();

        let state = probe(tmp.path(), &registry());
        assert_eq!(state.confidence, DetectionConfidence::ExactMetadata);
        assert_eq!(state.declared_world_type.as_deref(), Some("RESEARCH_WORLD"));
        assert_eq!(state.declared_version, Some(SpecVersion::new(1, 1, 0)));
    }

    #[test]
    fn test_probe_heuristic_prefers_highest_satisfied_version() {
        let tmp = TempDir::new().unwrap();
        for dir in [
            "01_daily",
            "02_topics",
            "03_archive",
            "04_attachments",
            "05_templates",
            "06_reviews",
            "07_inbox",
        ] {
            fs::create_dir(tmp.path().join(dir)).unwrap();
        }

        let state = probe(tmp.path(), &registry());
        assert_eq!(state.confidence, DetectionConfidence::StructuralHeuristic);
        assert_eq!(state.declared_world_type.as_deref(), Some("JOURNAL_WORLD"));
        assert_eq!(state.declared_version, Some(SpecVersion::new(1, 0, 21)));
    }

    #[test]
    fn test_probe_heuristic_older_structure() {
        let tmp = TempDir::new().unwrap();
        for dir in ["01_daily", "02_topics", "03_archive"] {
            fs::create_dir(tmp.path().join(dir)).unwrap();
        }

        let state = probe(tmp.path(), &registry());
        assert_eq!(state.confidence, DetectionConfidence::StructuralHeuristic);
        assert_eq!(state.declared_version, Some(SpecVersion::new(1, 0, 20)));
    }

    #[test]
    fn test_probe_unknown_structure() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("random_stuff")).unwrap();

        let state = probe(tmp.path(), &registry());
        assert_eq!(state.confidence, DetectionConfidence::Unknown);
        assert!(state.declared_world_type.is_none());
        assert!(state.existing_paths.contains("random_stuff"));
    }

    #[test]
    fn test_probe_excludes_worldkit_files() {
        let tmp = TempDir::new().unwrap();
        write_descriptor(tmp.path(), &Descriptor::new("JOURNAL_WORLD", "1.0.20")).unwrap();
        fs::write(tmp.path().join(LOCK_FILE), "").unwrap();

        let state = probe(tmp.path(), &registry());
        assert!(state.is_empty_tree());
    }

    #[test]
    fn test_probe_sub_level_descriptor_when_root_missing() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("01_daily")).unwrap();
        write_descriptor(
            &tmp.path().join("01_daily"),
            &Descriptor::new("JOURNAL_WORLD", "1.0.20"),
        )
        .unwrap();

        let state = probe(tmp.path(), &registry());
        assert_eq!(state.confidence, DetectionConfidence::ExactMetadata);
        assert_eq!(state.declared_world_type.as_deref(), Some("JOURNAL_WORLD"));
    }

    #[test]
    fn test_probe_malformed_descriptor_falls_back() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(DESCRIPTOR_FILE),
            "world_type: JOURNAL_WORLD\nversion: not-a-version\n",
        )
        .unwrap();
        for dir in ["01_daily", "02_topics", "03_archive"] {
            fs::create_dir(tmp.path().join(dir)).unwrap();
        }

        let state = probe(tmp.path(), &registry());
        assert_eq!(state.confidence, DetectionConfidence::StructuralHeuristic);
    }
}
