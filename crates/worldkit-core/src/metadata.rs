use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Descriptor file written at each version-addressable structural level.
pub const DESCRIPTOR_FILE: &str = ".worldkit.yaml";

/// Advisory lock file held for the duration of one apply call.
pub const LOCK_FILE: &str = ".worldkit.lock";

/// Contents of a level descriptor. `world_type` and `version` are the two
/// fields the prober needs; the rest is creation context. Hand-written
/// descriptors carrying only the two core fields still parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub world_type: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub spec_source: String,
}

impl Descriptor {
    pub fn new(world_type: impl Into<String>, version: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            world_type: world_type.into(),
            version: version.into(),
            created_at: Some(now),
            updated_at: Some(now),
            spec_source: String::new(),
        }
    }
}

pub fn descriptor_path(level_dir: &Path) -> PathBuf {
    level_dir.join(DESCRIPTOR_FILE)
}

/// Read the descriptor at a structural level, if one parses.
///
/// Missing or ill-formed descriptors are `None`, never an error: the
/// prober falls through to structural heuristics. serde_yaml accepts both
/// quoted and unquoted scalars, which covers hand-edited files.
pub fn read_descriptor(level_dir: &Path) -> Option<Descriptor> {
    let path = descriptor_path(level_dir);
    let text = fs::read_to_string(&path).ok()?;
    match serde_yaml::from_str(&text) {
        Ok(descriptor) => Some(descriptor),
        Err(e) => {
            debug!("ignoring unparsable descriptor {}: {e}", path.display());
            None
        }
    }
}

/// Write a level descriptor, preserving `created_at` from any previous
/// descriptor at the same level.
///
/// The file is not world-readable by default; descriptors may carry
/// operationally sensitive context. Callers that want wider permissions
/// can relax them afterwards.
pub fn write_descriptor(level_dir: &Path, descriptor: &Descriptor) -> std::io::Result<()> {
    let mut descriptor = descriptor.clone();
    if let Some(previous) = read_descriptor(level_dir) {
        if previous.created_at.is_some() {
            descriptor.created_at = previous.created_at;
        }
    }
    descriptor.updated_at = Some(Utc::now());

    let path = descriptor_path(level_dir);
    let yaml = serde_yaml::to_string(&descriptor)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    fs::write(&path, yaml)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_read_round_trip() {
        let tmp = TempDir::new().unwrap();
        let mut descriptor = Descriptor::new("JOURNAL_WORLD", "1.0.21");
        descriptor.spec_source = "JOURNAL_WORLD@1.0.21".into();

        write_descriptor(tmp.path(), &descriptor).unwrap();
        let loaded = read_descriptor(tmp.path()).unwrap();
        assert_eq!(loaded.world_type, "JOURNAL_WORLD");
        assert_eq!(loaded.version, "1.0.21");
        assert_eq!(loaded.spec_source, "JOURNAL_WORLD@1.0.21");
    }

    #[test]
    fn test_tolerates_quoted_and_unquoted_scalars() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            descriptor_path(tmp.path()),
            "world_type: \"JOURNAL_WORLD\"\nversion: 1.0.20\n",
        )
        .unwrap();
        let loaded = read_descriptor(tmp.path()).unwrap();
        assert_eq!(loaded.world_type, "JOURNAL_WORLD");
        assert_eq!(loaded.version, "1.0.20");

        fs::write(
            descriptor_path(tmp.path()),
            "world_type: JOURNAL_WORLD\nversion: \"1.0.20\"\n",
        )
        .unwrap();
        let loaded = read_descriptor(tmp.path()).unwrap();
        assert_eq!(loaded.version, "1.0.20");
    }

    #[test]
    fn test_missing_and_garbage_are_none() {
        let tmp = TempDir::new().unwrap();
        assert!(read_descriptor(tmp.path()).is_none());

        fs::write(descriptor_path(tmp.path()), ": not yaml [").unwrap();
        assert!(read_descriptor(tmp.path()).is_none());
    }

    #[test]
    fn test_rewrite_preserves_created_at() {
        let tmp = TempDir::new().unwrap();
        let first = Descriptor::new("JOURNAL_WORLD", "1.0.20");
        write_descriptor(tmp.path(), &first).unwrap();
        let created = read_descriptor(tmp.path()).unwrap().created_at.unwrap();

        let second = Descriptor::new("JOURNAL_WORLD", "1.0.21");
        write_descriptor(tmp.path(), &second).unwrap();
        let reloaded = read_descriptor(tmp.path()).unwrap();
        assert_eq!(reloaded.version, "1.0.21");
        assert_eq!(reloaded.created_at.unwrap(), created);
    }

    #[cfg(unix)]
    #[test]
    fn test_descriptor_not_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        write_descriptor(tmp.path(), &Descriptor::new("X", "1.0.0")).unwrap();
        let mode = fs::metadata(descriptor_path(tmp.path()))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o077, 0);
    }
}
