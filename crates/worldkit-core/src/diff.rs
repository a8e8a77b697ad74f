use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::probe::{DetectionConfidence, ProjectState};
use crate::registry::SpecRegistry;
use crate::spec::WorldSpec;
use crate::templates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    CreateDirectory,
    CreateFile,
    WriteMetadata,
}

/// One atomic unit of a migration plan. Only ever creates; there is no
/// removal or overwrite kind, which is the additive-only guarantee at the
/// type level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStep {
    pub kind: StepKind,
    pub relative_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl MigrationStep {
    pub fn dir(relative_path: impl Into<String>) -> Self {
        Self {
            kind: StepKind::CreateDirectory,
            relative_path: relative_path.into(),
            payload: None,
        }
    }

    pub fn file(relative_path: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind: StepKind::CreateFile,
            relative_path: relative_path.into(),
            payload: Some(payload.into()),
        }
    }
}

/// The ordered, additive set of operations that brings a probed tree to a
/// target spec. Directories always precede the files nested under them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationPlan {
    pub root: PathBuf,
    pub world_type: String,
    pub target_version: String,
    pub spec_source: String,
    pub steps: Vec<MigrationStep>,
    /// Human-readable notes for combinations no automated rule covers.
    /// Never blocks the automatable steps above.
    pub manual_warnings: Vec<String>,
    /// True when the probed root held unrecognized content: applying a
    /// fresh scaffold then needs `force` or `backup`.
    pub fresh_conflict: bool,
    /// Structural levels (relative; empty string = root) whose descriptor
    /// the executor should write after the steps succeed.
    pub metadata_levels: Vec<String>,
    /// False only when the tree is already complete and its root
    /// descriptor already names the target; keeps re-planning after an
    /// apply a no-op.
    pub refresh_metadata: bool,
}

impl MigrationPlan {
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty() && !self.refresh_metadata
    }

    pub fn directories(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| s.kind == StepKind::CreateDirectory)
            .map(|s| s.relative_path.clone())
            .collect()
    }

    pub fn files(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| s.kind == StepKind::CreateFile)
            .map(|s| s.relative_path.clone())
            .collect()
    }

    /// The machine-readable report shape consumed by automation.
    pub fn report(&self, dry_run: bool) -> PlanReport {
        PlanReport {
            directories: self.directories(),
            files: self.files(),
            manual_warnings: self.manual_warnings.clone(),
            dry_run,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanReport {
    pub directories: Vec<String>,
    pub files: Vec<String>,
    #[serde(rename = "manualWarnings")]
    pub manual_warnings: Vec<String>,
    #[serde(rename = "dryRun")]
    pub dry_run: bool,
}

/// Compute the additive migration plan from `state` to `spec`.
///
/// Pure function of its inputs: identical inputs produce identical plans,
/// and running it against the post-apply state produces an empty one.
pub fn diff(spec: &WorldSpec, state: &ProjectState, registry: &SpecRegistry) -> MigrationPlan {
    let mut builder = StepBuilder {
        existing: &state.existing_paths,
        seen: BTreeSet::new(),
        steps: Vec::new(),
    };

    for parent in &spec.parent_directories {
        builder.dir_with_ancestors(&parent.name);
        if let Some(rels) = spec.subdirectories.get(&parent.name) {
            for rel in rels {
                builder.dir_with_ancestors(&format!("{}/{rel}", parent.name));
            }
        }
    }
    // Subdirectory groups whose key is not a declared parent still scaffold
    // relative to the root.
    for (parent, rels) in &spec.subdirectories {
        if spec.parent_directories.iter().any(|p| &p.name == parent) {
            continue;
        }
        for rel in rels {
            builder.dir_with_ancestors(&format!("{parent}/{rel}"));
        }
    }
    for file in &spec.required_files {
        builder.file(&file.relative_path, templates::render(&file.template_id, spec));
    }

    let manual_warnings = manual_warnings(spec, state, registry);
    let fresh_conflict =
        state.confidence == DetectionConfidence::Unknown && has_foreign_content(spec, state);

    let descriptor_current = state.confidence == DetectionConfidence::ExactMetadata
        && state.declared_world_type.as_deref() == Some(spec.world_type.as_str())
        && state.declared_version == Some(spec.spec_version);
    let refresh_metadata = !builder.steps.is_empty() || !descriptor_current;

    let mut metadata_levels = vec![String::new()];
    metadata_levels.extend(spec.parent_directories.iter().map(|p| p.name.clone()));

    debug!(
        world_type = %spec.world_type,
        target = %spec.spec_version,
        steps = builder.steps.len(),
        warnings = manual_warnings.len(),
        "computed migration plan for {}",
        state.root.display()
    );

    MigrationPlan {
        root: state.root.clone(),
        world_type: spec.world_type.clone(),
        target_version: spec.spec_version.to_string(),
        spec_source: format!("{}@{}", spec.world_type, spec.spec_version),
        steps: builder.steps,
        manual_warnings,
        fresh_conflict,
        metadata_levels,
        refresh_metadata,
    }
}

fn manual_warnings(
    spec: &WorldSpec,
    state: &ProjectState,
    registry: &SpecRegistry,
) -> Vec<String> {
    let mut warnings = Vec::new();
    match (&state.declared_world_type, state.declared_version) {
        (Some(world_type), declared_version) => {
            let version_label = declared_version
                .map(|v| v.to_string())
                .unwrap_or_else(|| "?".to_string());
            if !registry.contains_world(world_type) {
                warnings.push(format!(
                    "no automated migration rule for detected world type \
                     `{world_type}` (version {version_label}); manual migration required"
                ));
            } else if world_type != &spec.world_type {
                warnings.push(format!(
                    "detected world type `{world_type}` does not match target \
                     `{}`; manual review required",
                    spec.world_type
                ));
            } else if let Some(from) = declared_version {
                if !registry.has_migration_path(world_type, from, spec.spec_version) {
                    warnings.push(format!(
                        "no automated migration path for `{world_type}` from \
                         {from} to {}; manual migration required",
                        spec.spec_version
                    ));
                }
            }
        }
        (None, _) => {
            // Undetected but tree only holds (a subset of) the target
            // layout: that is a fresh or partial scaffold, not a concern.
            if has_foreign_content(spec, state) {
                warnings.push(format!(
                    "destination `{}` contains content that matches no known \
                     world structure; manual review required",
                    state.root.display()
                ));
            }
        }
    }
    warnings
}

/// True when the tree holds top-level entries the spec does not declare.
fn has_foreign_content(spec: &WorldSpec, state: &ProjectState) -> bool {
    let declared_top: BTreeSet<&str> = spec
        .parent_directories
        .iter()
        .map(|p| p.name.split('/').next().unwrap_or(&p.name))
        .chain(
            spec.subdirectories
                .keys()
                .map(|k| k.split('/').next().unwrap_or(k)),
        )
        .chain(
            spec.required_files
                .iter()
                .map(|f| f.relative_path.split('/').next().unwrap_or(&f.relative_path)),
        )
        .collect();
    state.existing_paths.iter().any(|path| {
        let top = path.split('/').next().unwrap_or(path);
        !declared_top.contains(top)
    })
}

struct StepBuilder<'a> {
    existing: &'a BTreeSet<String>,
    seen: BTreeSet<String>,
    steps: Vec<MigrationStep>,
}

impl StepBuilder<'_> {
    /// Emit CreateDirectory for each missing ancestor of `path`, shallowest
    /// first, then for `path` itself.
    fn dir_with_ancestors(&mut self, path: &str) {
        let mut prefix = String::new();
        for component in path.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(component);
            if self.existing.contains(&prefix) || !self.seen.insert(prefix.clone()) {
                continue;
            }
            self.steps.push(MigrationStep::dir(&prefix));
        }
    }

    fn file(&mut self, path: &str, payload: String) {
        if let Some((dir, _)) = path.rsplit_once('/') {
            self.dir_with_ancestors(dir);
        }
        if self.existing.contains(path) || !self.seen.insert(path.to_string()) {
            return;
        }
        self.steps.push(MigrationStep::file(path, payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ExpandContext, ParentDir, RequiredFile, SpecVersion};

    fn ctx() -> ExpandContext {
        ExpandContext {
            user: "ada".into(),
            date: "2026-08-25".into(),
            timestamp: "2026-08-25T12:00:00+00:00".into(),
            project: Some("apollo".into()),
            extra: Default::default(),
        }
    }

    fn simple_spec() -> WorldSpec {
        WorldSpec {
            world_type: "TEST_WORLD".into(),
            spec_version: SpecVersion::new(1, 0, 0),
            parent_directories: vec![ParentDir {
                name: "P".into(),
                description: String::new(),
            }],
            subdirectories: [("P".to_string(), vec!["a".to_string(), "b".to_string()])]
                .into_iter()
                .collect(),
            required_files: Vec::new(),
        }
    }

    fn empty_state() -> ProjectState {
        ProjectState::empty("/tmp/target")
    }

    #[test]
    fn test_empty_root_emits_all_dirs_in_order() {
        let plan = diff(&simple_spec(), &empty_state(), &SpecRegistry::new());
        let paths: Vec<_> = plan.steps.iter().map(|s| s.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["P", "P/a", "P/b"]);
        assert!(plan
            .steps
            .iter()
            .all(|s| s.kind == StepKind::CreateDirectory));
        assert!(plan.manual_warnings.is_empty());
        assert!(!plan.fresh_conflict);
    }

    #[test]
    fn test_existing_paths_are_never_targeted() {
        let mut state = empty_state();
        state.existing_paths.insert("P/a".into());
        let plan = diff(&simple_spec(), &state, &SpecRegistry::new());
        let paths: Vec<_> = plan.steps.iter().map(|s| s.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["P", "P/b"]);
        for step in &plan.steps {
            assert!(!state.existing_paths.contains(&step.relative_path));
        }
    }

    #[test]
    fn test_nested_paths_get_ancestors_first() {
        let mut spec = simple_spec();
        spec.subdirectories =
            [("P".to_string(), vec!["x/y/z".to_string()])].into_iter().collect();
        spec.required_files = vec![RequiredFile {
            relative_path: "P/x/NOTES.md".into(),
            template_id: "readme".into(),
        }];
        let plan = diff(&spec, &empty_state(), &SpecRegistry::new());
        let paths: Vec<_> = plan.steps.iter().map(|s| s.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["P", "P/x", "P/x/y", "P/x/y/z", "P/x/NOTES.md"]);
        assert_eq!(plan.steps.last().unwrap().kind, StepKind::CreateFile);
    }

    #[test]
    fn test_deterministic_byte_identical() {
        let spec = simple_spec();
        let state = empty_state();
        let registry = SpecRegistry::new();
        let a = serde_json::to_vec(&diff(&spec, &state, &registry)).unwrap();
        let b = serde_json::to_vec(&diff(&spec, &state, &registry)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unrecognized_world_type_warns_but_still_plans() {
        let mut state = empty_state();
        state.declared_world_type = Some("LEGACY_WORLD".into());
        state.declared_version = Some(SpecVersion::new(0, 9, 0));
        state.confidence = DetectionConfidence::ExactMetadata;
        state.existing_paths.insert("P".into());

        let plan = diff(&simple_spec(), &state, &SpecRegistry::new());
        assert!(!plan.manual_warnings.is_empty());
        assert!(plan.manual_warnings[0].contains("LEGACY_WORLD"));
        // Path-presence steps still compute
        let paths: Vec<_> = plan.steps.iter().map(|s| s.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["P/a", "P/b"]);
    }

    #[test]
    fn test_unknown_nonempty_tree_warns_and_conflicts() {
        let mut state = empty_state();
        state.existing_paths.insert("something_else".into());
        let plan = diff(&simple_spec(), &state, &SpecRegistry::new());
        assert!(plan.fresh_conflict);
        assert_eq!(plan.manual_warnings.len(), 1);
    }

    #[test]
    fn test_complete_tree_with_current_descriptor_is_noop() {
        let spec = simple_spec();
        let mut state = empty_state();
        for p in ["P", "P/a", "P/b"] {
            state.existing_paths.insert(p.into());
        }
        state.declared_world_type = Some("TEST_WORLD".into());
        state.declared_version = Some(SpecVersion::new(1, 0, 0));
        state.confidence = DetectionConfidence::ExactMetadata;

        let mut registry = SpecRegistry::new();
        registry.register(spec.clone());

        let plan = diff(&spec, &state, &registry);
        assert!(plan.steps.is_empty());
        assert!(plan.is_noop());
    }

    #[test]
    fn test_report_shape() {
        let mut spec = simple_spec();
        spec.required_files = vec![RequiredFile {
            relative_path: "P/README.md".into(),
            template_id: "readme".into(),
        }];
        let plan = diff(&spec, &empty_state(), &SpecRegistry::new());
        let report = plan.report(true);
        assert_eq!(report.directories, vec!["P", "P/a", "P/b"]);
        assert_eq!(report.files, vec!["P/README.md"]);
        assert!(report.dry_run);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("manualWarnings").is_some());
        assert_eq!(json.get("dryRun"), Some(&serde_json::Value::Bool(true)));
    }

    #[test]
    fn test_builtin_journal_upgrade_is_four_directories() {
        let registry = SpecRegistry::builtin(&ctx()).unwrap();
        let v20 = registry
            .get("JOURNAL_WORLD", SpecVersion::new(1, 0, 20))
            .unwrap();
        let v21 = registry
            .get("JOURNAL_WORLD", SpecVersion::new(1, 0, 21))
            .unwrap();

        // Tree fully at 1.0.20
        let mut state = empty_state();
        for path in v20.declared_paths() {
            state.existing_paths.insert(path);
        }
        state.declared_world_type = Some("JOURNAL_WORLD".into());
        state.declared_version = Some(SpecVersion::new(1, 0, 20));
        state.confidence = DetectionConfidence::ExactMetadata;

        let plan = diff(v21, &state, &registry);
        let paths: Vec<_> = plan.steps.iter().map(|s| s.relative_path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["04_attachments", "05_templates", "06_reviews", "07_inbox"]
        );
        assert!(plan
            .steps
            .iter()
            .all(|s| s.kind == StepKind::CreateDirectory));
        assert!(plan.manual_warnings.is_empty());
    }
}
