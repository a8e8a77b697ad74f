use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::SpecError;

/// A semantic-version-like triple, e.g. `1.0.21`.
///
/// Ordering is lexicographic over (major, minor, patch), which is what the
/// prober relies on to prefer the highest version whose structural
/// signature is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpecVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SpecVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for SpecVersion {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| SpecError::InvalidVersion {
            version: s.to_string(),
            reason: reason.to_string(),
        };
        let mut parts = s.trim().split('.');
        let mut next = |name: &str| -> Result<u32, SpecError> {
            parts
                .next()
                .ok_or_else(|| invalid(&format!("missing {name} component")))?
                .parse::<u32>()
                .map_err(|_| invalid(&format!("non-numeric {name} component")))
        };
        let major = next("major")?;
        let minor = next("minor")?;
        let patch = next("patch")?;
        if parts.next().is_some() {
            return Err(invalid("more than three components"));
        }
        Ok(Self::new(major, minor, patch))
    }
}

impl TryFrom<String> for SpecVersion {
    type Error = SpecError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SpecVersion> for String {
    fn from(v: SpecVersion) -> Self {
        v.to_string()
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A top-level directory required by a world layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentDir {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A file the layout requires, rendered from a named template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredFile {
    #[serde(rename = "path")]
    pub relative_path: String,
    #[serde(rename = "template")]
    pub template_id: String,
}

/// The validated, in-memory form of a world specification document.
///
/// `subdirectories` keeps document declaration order (IndexMap) so plan
/// computation is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSpec {
    pub world_type: String,
    pub spec_version: SpecVersion,
    pub parent_directories: Vec<ParentDir>,
    #[serde(default)]
    pub subdirectories: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub required_files: Vec<RequiredFile>,
}

impl WorldSpec {
    /// Every path the spec declares, in declaration order: parent names,
    /// then full subdirectory paths per parent, then required file paths.
    pub fn declared_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        for parent in &self.parent_directories {
            out.push(parent.name.clone());
        }
        for (parent, rels) in &self.subdirectories {
            for rel in rels {
                out.push(format!("{parent}/{rel}"));
            }
        }
        for file in &self.required_files {
            out.push(file.relative_path.clone());
        }
        out
    }

    /// Validate the WorldSpec path invariant: every declared path is
    /// relative, contains no `..`, and is unique within the spec.
    pub fn validate(&self) -> Result<(), SpecError> {
        let mut seen = BTreeSet::new();
        for path in self.declared_paths() {
            validate_rel_path(&path)?;
            if !seen.insert(path.clone()) {
                return Err(SpecError::DuplicatePath { path });
            }
        }
        Ok(())
    }

    /// Number of path components in the deepest declared path.
    pub fn max_depth(&self) -> usize {
        self.declared_paths()
            .iter()
            .map(|p| p.split('/').count())
            .max()
            .unwrap_or(0)
    }
}

/// Reject absolute paths, `..` traversal, and empty components.
pub fn validate_rel_path(path: &str) -> Result<(), SpecError> {
    let unsafe_path = || SpecError::UnsafePath {
        path: path.to_string(),
    };
    if path.is_empty() || path.starts_with('/') || path.starts_with('\\') {
        return Err(unsafe_path());
    }
    // Windows-style drive prefix
    if path.len() >= 2 && path.as_bytes()[1] == b':' {
        return Err(unsafe_path());
    }
    for component in path.split('/') {
        if component.is_empty() || component == ".." || component == "." {
            return Err(unsafe_path());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_with_paths(subdirs: &[(&str, &[&str])], files: &[&str]) -> WorldSpec {
        WorldSpec {
            world_type: "TEST_WORLD".into(),
            spec_version: SpecVersion::new(1, 0, 0),
            parent_directories: subdirs
                .iter()
                .map(|(name, _)| ParentDir {
                    name: (*name).into(),
                    description: String::new(),
                })
                .collect(),
            subdirectories: subdirs
                .iter()
                .map(|(name, rels)| {
                    (
                        (*name).to_string(),
                        rels.iter().map(|r| (*r).to_string()).collect(),
                    )
                })
                .collect(),
            required_files: files
                .iter()
                .map(|p| RequiredFile {
                    relative_path: (*p).into(),
                    template_id: "readme".into(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_version_parse_and_order() {
        let a: SpecVersion = "1.0.20".parse().unwrap();
        let b: SpecVersion = "1.0.21".parse().unwrap();
        let c: SpecVersion = "1.2.0".parse().unwrap();
        assert!(a < b);
        assert!(b < c);
        assert_eq!(b.to_string(), "1.0.21");
    }

    #[test]
    fn test_version_parse_rejects_garbage() {
        assert!("".parse::<SpecVersion>().is_err());
        assert!("1.0".parse::<SpecVersion>().is_err());
        assert!("1.0.x".parse::<SpecVersion>().is_err());
        assert!("1.0.2.3".parse::<SpecVersion>().is_err());
    }

    #[test]
    fn test_declared_paths_order() {
        let spec = spec_with_paths(&[("P", &["a", "b"])], &["P/README.md"]);
        assert_eq!(
            spec.declared_paths(),
            vec!["P", "P/a", "P/b", "P/README.md"]
        );
    }

    #[test]
    fn test_validate_rejects_traversal() {
        let spec = spec_with_paths(&[("P", &["../escape"])], &[]);
        assert!(matches!(
            spec.validate(),
            Err(SpecError::UnsafePath { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let spec = spec_with_paths(&[("P", &["a", "a"])], &[]);
        assert!(matches!(
            spec.validate(),
            Err(SpecError::DuplicatePath { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_absolute() {
        assert!(validate_rel_path("/etc/passwd").is_err());
        assert!(validate_rel_path("C:/windows").is_err());
        assert!(validate_rel_path("ok/nested/path").is_ok());
    }

    #[test]
    fn test_max_depth() {
        let spec = spec_with_paths(&[("P", &["a/b/c"])], &[]);
        assert_eq!(spec.max_depth(), 4);
    }
}
