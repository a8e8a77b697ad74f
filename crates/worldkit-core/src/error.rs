use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a world specification.
///
/// Every variant exposes a stable kind string via [`SpecError::kind`] so
/// automation can branch without parsing the human-readable message.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("missing or empty required field `{field}` in spec `{source_name}`")]
    MissingField {
        field: &'static str,
        source_name: String,
    },

    #[error("unsafe path `{path}` in spec (absolute or contains `..`)")]
    UnsafePath { path: String },

    #[error("duplicate path `{path}` declared in spec")]
    DuplicatePath { path: String },

    #[error("invalid spec version `{version}`: {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("failed to parse spec `{source_name}`: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    #[error("unknown world type `{world_type}`")]
    UnknownWorldType { world_type: String },

    #[error("failed to read spec `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SpecError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "missing-field",
            Self::UnsafePath { .. } => "unsafe-path",
            Self::DuplicatePath { .. } => "duplicate-path",
            Self::InvalidVersion { .. } => "invalid-version",
            Self::Parse { .. } => "parse",
            Self::UnknownWorldType { .. } => "unknown-world-type",
            Self::Io { .. } => "io",
        }
    }
}

/// Errors raised while applying a migration plan to the filesystem.
///
/// `StepFailed` is only surfaced after the current transaction has been
/// fully rolled back; the caller never observes a half-applied tree.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("step failed at `{path}`: {source} (transaction rolled back)")]
    StepFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("destination `{path}` contains unrecognized content; pass --force or --backup")]
    Conflict { path: PathBuf },

    #[error("another process holds the lock at `{path}`")]
    LockHeld { path: PathBuf },

    #[error("backup to `{path}` failed: {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error at `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ApplyError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StepFailed { .. } => "step-failed",
            Self::Conflict { .. } => "conflict",
            Self::LockHeld { .. } => "lock-held",
            Self::BackupFailed { .. } => "backup-failed",
            Self::Io { .. } => "io",
        }
    }
}
