use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::Utc;
use indexmap::IndexMap;
use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::debug;

use crate::error::SpecError;
use crate::spec::builtin;
use crate::spec::model::{ParentDir, RequiredFile, SpecVersion, WorldSpec};

/// Where a spec document comes from: a bundled world type or a user file.
#[derive(Debug, Clone)]
pub enum SpecSource {
    Builtin(String),
    File(PathBuf),
}

impl SpecSource {
    fn name(&self) -> String {
        match self {
            Self::Builtin(id) => id.clone(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// Non-fatal findings recorded while loading a spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecWarning {
    /// A `${NAME}` token had no binding in the expansion context.
    /// The token is left verbatim in the loaded value.
    UnresolvedVariable { token: String },
}

impl std::fmt::Display for SpecWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedVariable { token } => {
                write!(f, "unresolved variable {token}")
            }
        }
    }
}

/// The closed set of `${NAME}` substitutions available to spec documents:
/// `USER`, `DATE`, `TIMESTAMP`, `PROJECT`, plus caller-supplied extras.
#[derive(Debug, Clone)]
pub struct ExpandContext {
    pub user: String,
    pub date: String,
    pub timestamp: String,
    pub project: Option<String>,
    pub extra: IndexMap<String, String>,
}

impl ExpandContext {
    /// Context for the current user and wall clock.
    pub fn current(project: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            user: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_else(|_| "unknown".to_string()),
            date: now.format("%Y-%m-%d").to_string(),
            timestamp: now.to_rfc3339(),
            project,
            extra: IndexMap::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "USER" => Some(&self.user),
            "DATE" => Some(&self.date),
            "TIMESTAMP" => Some(&self.timestamp),
            "PROJECT" => self.project.as_deref(),
            other => self.extra.get(other).map(String::as_str),
        }
    }
}

/// A validated spec plus any warnings collected while loading it.
#[derive(Debug, Clone)]
pub struct LoadedSpec {
    pub spec: WorldSpec,
    pub warnings: Vec<SpecWarning>,
}

/// Raw document shape. Unknown top-level keys are ignored for forward
/// compatibility; required-field checks happen after parsing so the
/// resulting errors name the field instead of a serde position.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSpec {
    #[serde(default)]
    world_type: Option<String>,
    #[serde(default)]
    spec_version: Option<String>,
    #[serde(default)]
    parent_directories: Option<Vec<ParentDir>>,
    #[serde(default)]
    subdirectories: IndexMap<String, Vec<String>>,
    #[serde(default)]
    required_files: Vec<RequiredFile>,
}

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid token regex"));

fn expand(input: &str, ctx: &ExpandContext, warnings: &mut Vec<SpecWarning>) -> String {
    TOKEN_RE
        .replace_all(input, |caps: &Captures<'_>| match ctx.lookup(&caps[1]) {
            Some(value) => value.to_string(),
            None => {
                let token = caps[0].to_string();
                if !warnings
                    .iter()
                    .any(|w| matches!(w, SpecWarning::UnresolvedVariable { token: t } if *t == token))
                {
                    warnings.push(SpecWarning::UnresolvedVariable {
                        token: token.clone(),
                    });
                }
                token
            }
        })
        .into_owned()
}

/// Parse, expand, and validate a world specification document.
///
/// Pure with respect to the scaffold target: only the spec document itself
/// is read, never the destination tree.
pub fn load(source: &SpecSource, ctx: &ExpandContext) -> Result<LoadedSpec, SpecError> {
    let source_name = source.name();
    let text = match source {
        SpecSource::Builtin(id) => builtin::document(id)
            .ok_or_else(|| SpecError::UnknownWorldType {
                world_type: id.clone(),
            })?
            .to_string(),
        SpecSource::File(path) => {
            std::fs::read_to_string(path).map_err(|source| SpecError::Io {
                path: path.clone(),
                source,
            })?
        }
    };
    let loaded = load_str(&text, &source_name, ctx)?;
    debug!(
        world_type = %loaded.spec.world_type,
        version = %loaded.spec.spec_version,
        warnings = loaded.warnings.len(),
        "loaded spec from {source_name}"
    );
    Ok(loaded)
}

/// Parse a spec document from a string. See [`load`].
pub fn load_str(
    text: &str,
    source_name: &str,
    ctx: &ExpandContext,
) -> Result<LoadedSpec, SpecError> {
    let raw: RawSpec = serde_yaml::from_str(text).map_err(|e| SpecError::Parse {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })?;

    let missing = |field: &'static str| SpecError::MissingField {
        field,
        source_name: source_name.to_string(),
    };
    let world_type = raw
        .world_type
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing("worldType"))?;
    let version_str = raw
        .spec_version
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing("specVersion"))?;
    let parent_directories = raw
        .parent_directories
        .filter(|p| !p.is_empty())
        .ok_or_else(|| missing("parentDirectories"))?;
    let spec_version: SpecVersion = version_str.parse()?;

    let mut warnings = Vec::new();
    let spec = WorldSpec {
        world_type: expand(&world_type, ctx, &mut warnings),
        spec_version,
        parent_directories: parent_directories
            .into_iter()
            .map(|p| ParentDir {
                name: expand(&p.name, ctx, &mut warnings),
                description: expand(&p.description, ctx, &mut warnings),
            })
            .collect(),
        subdirectories: raw
            .subdirectories
            .into_iter()
            .map(|(parent, rels)| {
                (
                    expand(&parent, ctx, &mut warnings),
                    rels.iter()
                        .map(|r| expand(r, ctx, &mut warnings))
                        .collect(),
                )
            })
            .collect(),
        required_files: raw
            .required_files
            .into_iter()
            .map(|f| RequiredFile {
                relative_path: expand(&f.relative_path, ctx, &mut warnings),
                template_id: f.template_id,
            })
            .collect(),
    };
    spec.validate()?;

    Ok(LoadedSpec { spec, warnings })
}
