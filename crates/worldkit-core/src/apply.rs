use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::diff::{MigrationPlan, StepKind};
use crate::error::ApplyError;
use crate::metadata::{self, Descriptor, LOCK_FILE};
use crate::spec::model::validate_rel_path;

/// Knobs for one apply call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Enumerate and report without touching disk.
    pub dry_run: bool,
    /// On a conflicting root, copy its contents aside to a timestamped
    /// sibling directory before proceeding.
    pub backup: bool,
    /// Proceed past conflicts, permitting file overwrite.
    pub force: bool,
}

/// Tagged outcome the CLI maps to a process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Success,
    SuccessWithManualWarnings,
    ConflictBlocked,
    PartialFailureRolledBack,
    SpecInvalid,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::SpecInvalid => 2,
            Self::ConflictBlocked => 3,
            Self::PartialFailureRolledBack => 4,
            Self::SuccessWithManualWarnings => 5,
        }
    }
}

impl ApplyError {
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Conflict { .. } | Self::LockHeld { .. } => Outcome::ConflictBlocked,
            Self::StepFailed { .. } | Self::BackupFailed { .. } | Self::Io { .. } => {
                Outcome::PartialFailureRolledBack
            }
        }
    }
}

/// What one apply call committed (or, for a dry run, would commit).
#[derive(Debug, Clone, Serialize)]
pub struct TransactionResult {
    pub directories: Vec<String>,
    pub files: Vec<String>,
    #[serde(rename = "manualWarnings")]
    pub manual_warnings: Vec<String>,
    #[serde(rename = "dryRun")]
    pub dry_run: bool,
    pub outcome: Outcome,
}

/// Inverse actions, pushed as steps succeed and executed most-recent-first
/// on failure.
enum Undo {
    RemoveDir(PathBuf),
    RemoveFile(PathBuf),
    RestoreFile(PathBuf, Vec<u8>),
}

struct Transaction {
    rollback_log: Vec<Undo>,
}

impl Transaction {
    fn new() -> Self {
        Self {
            rollback_log: Vec::new(),
        }
    }

    fn unwind(self) {
        for undo in self.rollback_log.into_iter().rev() {
            let outcome = match &undo {
                Undo::RemoveDir(path) => fs::remove_dir(path),
                Undo::RemoveFile(path) => fs::remove_file(path),
                Undo::RestoreFile(path, content) => fs::write(path, content),
            };
            if let Err(e) = outcome {
                let path = match &undo {
                    Undo::RemoveDir(p) | Undo::RemoveFile(p) | Undo::RestoreFile(p, _) => p,
                };
                warn!("rollback: could not undo {}: {e}", path.display());
            }
        }
    }
}

/// Apply a migration plan with all-or-nothing semantics.
///
/// Every path created in this call is removed again if any step fails;
/// paths committed by previous calls are never touched. An advisory lock
/// file at the root guards against concurrent applies from other
/// processes for the duration of the call.
pub fn apply(plan: &MigrationPlan, options: &ApplyOptions) -> Result<TransactionResult, ApplyError> {
    let result = |dry_run: bool| TransactionResult {
        directories: plan.directories(),
        files: plan.files(),
        manual_warnings: plan.manual_warnings.clone(),
        dry_run,
        outcome: if plan.manual_warnings.is_empty() {
            Outcome::Success
        } else {
            Outcome::SuccessWithManualWarnings
        },
    };

    if options.dry_run {
        debug!("dry run: {} steps, no mutation", plan.steps.len());
        return Ok(result(true));
    }
    if plan.is_noop() {
        debug!("plan is a no-op for {}", plan.root.display());
        return Ok(TransactionResult {
            directories: Vec::new(),
            files: Vec::new(),
            ..result(false)
        });
    }
    if plan.fresh_conflict && !options.force && !options.backup {
        return Err(ApplyError::Conflict {
            path: plan.root.clone(),
        });
    }

    let created_root = !plan.root.exists();
    if created_root {
        fs::create_dir_all(&plan.root).map_err(|source| ApplyError::Io {
            path: plan.root.clone(),
            source,
        })?;
    }

    let lock_path = plan.root.join(LOCK_FILE);
    let lock_file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(&lock_path)
        .map_err(|source| ApplyError::Io {
            path: lock_path.clone(),
            source,
        })?;
    if fs2::FileExt::try_lock_exclusive(&lock_file).is_err() {
        return Err(ApplyError::LockHeld { path: lock_path });
    }

    if plan.fresh_conflict && options.backup {
        let backup_path = backup_root(&plan.root)?;
        info!(
            "backed up conflicting content of {} to {}",
            plan.root.display(),
            backup_path.display()
        );
    }

    let mut tx = Transaction::new();
    let run = execute_steps(plan, options, &mut tx).and_then(|_| write_metadata(plan, &mut tx));

    match run {
        Ok(()) => {
            let _ = fs2::FileExt::unlock(&lock_file);
            info!(
                "applied {} steps to {}",
                plan.steps.len(),
                plan.root.display()
            );
            Ok(result(false))
        }
        Err(e) => {
            warn!("apply failed, rolling back: {e}");
            tx.unwind();
            let _ = fs2::FileExt::unlock(&lock_file);
            let _ = fs::remove_file(&lock_path);
            if created_root {
                let _ = fs::remove_dir(&plan.root);
            }
            Err(e)
        }
    }
}

fn execute_steps(
    plan: &MigrationPlan,
    options: &ApplyOptions,
    tx: &mut Transaction,
) -> Result<(), ApplyError> {
    for step in &plan.steps {
        let target = plan.root.join(&step.relative_path);
        let fail = |source: std::io::Error| ApplyError::StepFailed {
            path: target.clone(),
            source,
        };
        if validate_rel_path(&step.relative_path).is_err() {
            return Err(fail(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "unsafe relative path in step",
            )));
        }
        match step.kind {
            StepKind::CreateDirectory => {
                if target.is_dir() {
                    // Raced into existence since the probe; already satisfied.
                    continue;
                }
                if target.exists() {
                    return Err(fail(std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "target exists and is not a directory",
                    )));
                }
                fs::create_dir(&target).map_err(fail)?;
                tx.rollback_log.push(Undo::RemoveDir(target));
            }
            StepKind::CreateFile | StepKind::WriteMetadata => {
                let payload = step.payload.as_deref().unwrap_or_default();
                let overwrite_ok = options.force || step.kind == StepKind::WriteMetadata;
                if target.exists() {
                    if !overwrite_ok {
                        return Err(fail(std::io::Error::new(
                            std::io::ErrorKind::AlreadyExists,
                            "target file already exists",
                        )));
                    }
                    let previous = fs::read(&target).map_err(fail)?;
                    fs::write(&target, payload).map_err(fail)?;
                    tx.rollback_log.push(Undo::RestoreFile(target, previous));
                } else {
                    fs::write(&target, payload).map_err(fail)?;
                    tx.rollback_log.push(Undo::RemoveFile(target));
                }
            }
        }
    }
    Ok(())
}

/// Write descriptors at the root and each parent level so the next probe
/// detects the tree exactly instead of heuristically.
fn write_metadata(plan: &MigrationPlan, tx: &mut Transaction) -> Result<(), ApplyError> {
    if !plan.refresh_metadata {
        return Ok(());
    }
    let descriptor = Descriptor {
        world_type: plan.world_type.clone(),
        version: plan.target_version.clone(),
        created_at: Some(Utc::now()),
        updated_at: None,
        spec_source: plan.spec_source.clone(),
    };
    for level in &plan.metadata_levels {
        let dir = if level.is_empty() {
            plan.root.clone()
        } else {
            plan.root.join(level)
        };
        if !dir.is_dir() {
            continue;
        }
        let path = metadata::descriptor_path(&dir);
        let previous = fs::read(&path).ok();
        metadata::write_descriptor(&dir, &descriptor).map_err(|source| {
            ApplyError::StepFailed {
                path: path.clone(),
                source,
            }
        })?;
        tx.rollback_log.push(match previous {
            Some(content) => Undo::RestoreFile(path, content),
            None => Undo::RemoveFile(path),
        });
    }
    Ok(())
}

/// Copy the root's current contents to `<root>.bak-<timestamp>`.
fn backup_root(root: &Path) -> Result<PathBuf, ApplyError> {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "world".to_string());
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let backup = root
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{name}.bak-{stamp}"));
    copy_tree(root, &backup).map_err(|source| ApplyError::BackupFailed {
        path: backup.clone(),
        source,
    })?;
    Ok(backup)
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy() == LOCK_FILE {
            continue;
        }
        let src = entry.path();
        let dst = to.join(&name);
        if entry.file_type()?.is_dir() {
            copy_tree(&src, &dst)?;
        } else {
            fs::copy(&src, &dst)?;
        }
    }
    Ok(())
}
