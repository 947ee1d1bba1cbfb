use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::disk_info::UsageSnapshot;
use crate::error::DeletionError;
use crate::policy::DeletionPlan;

/// Removes one file. The seam where deletion can fail.
pub trait Remover {
    fn remove(&self, path: &Path) -> Result<(), DeletionError>;
}

/// Deletes from the real filesystem.
pub struct FsRemover;

impl Remover for FsRemover {
    fn remove(&self, path: &Path) -> Result<(), DeletionError> {
        std::fs::remove_file(path)?;
        Ok(())
    }
}

/// What happened to a single planned file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileAction {
    Deleted,
    WouldDelete,
    Failed { reason: String },
    /// Not attempted because the run was interrupted first.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub size_bytes: u64,
    #[serde(flatten)]
    pub action: FileAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    /// Caller asked for a simulation.
    pub dry_run: bool,
    /// Global switch; when off the run is forced to a simulation.
    pub cleanup_enabled: bool,
}

impl ExecuteOptions {
    pub fn effective_dry_run(&self) -> bool {
        self.dry_run || !self.cleanup_enabled
    }
}

/// Aggregate result of applying a plan.
///
/// In a dry run `files_deleted` and `bytes_freed` describe what would have
/// been removed.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub files_deleted: usize,
    pub bytes_freed: u64,
    pub files_failed: Vec<FailedFile>,
    pub files_skipped: usize,
    pub actions: Vec<FileOutcome>,
    pub dry_run: bool,
    pub interrupted: bool,
    pub before: UsageSnapshot,
    /// Usage after deletion; `None` for dry runs.
    pub after: Option<UsageSnapshot>,
}

impl RunOutcome {
    pub fn has_failures(&self) -> bool {
        !self.files_failed.is_empty()
    }
}

/// Apply `plan`, one independent deletion at a time.
///
/// Every planned file ends up in exactly one of deleted, failed, would-delete
/// or (after `cancel` is raised) skipped. A failure on one file never stops
/// the others.
pub fn execute(
    plan: &DeletionPlan,
    opts: ExecuteOptions,
    before: UsageSnapshot,
    remover: &dyn Remover,
    cancel: &AtomicBool,
) -> RunOutcome {
    let dry_run = opts.effective_dry_run();
    if !opts.cleanup_enabled && !opts.dry_run {
        tracing::warn!("cleanup is disabled by configuration, running as dry run");
    }

    let mut outcome = RunOutcome {
        files_deleted: 0,
        bytes_freed: 0,
        files_failed: Vec::new(),
        files_skipped: 0,
        actions: Vec::with_capacity(plan.len()),
        dry_run,
        interrupted: false,
        before,
        after: None,
    };

    for file in plan.files() {
        if cancel.load(Ordering::SeqCst) {
            if !outcome.interrupted {
                tracing::warn!(
                    remaining = plan.len() - outcome.actions.len(),
                    "run interrupted, leaving remaining files untouched"
                );
            }
            outcome.interrupted = true;
            outcome.files_skipped += 1;
            outcome.actions.push(FileOutcome {
                path: file.path.clone(),
                size_bytes: file.size_bytes,
                action: FileAction::Skipped,
            });
            continue;
        }

        let action = if dry_run {
            tracing::debug!(path = %file.path.display(), bytes = file.size_bytes, "would delete");
            outcome.files_deleted += 1;
            outcome.bytes_freed += file.size_bytes;
            FileAction::WouldDelete
        } else {
            match remover.remove(&file.path) {
                Ok(()) => {
                    tracing::debug!(path = %file.path.display(), bytes = file.size_bytes, "deleted");
                    outcome.files_deleted += 1;
                    outcome.bytes_freed += file.size_bytes;
                    FileAction::Deleted
                }
                Err(e) => {
                    tracing::warn!(path = %file.path.display(), error = %e, "failed to delete");
                    let reason = e.to_string();
                    outcome.files_failed.push(FailedFile {
                        path: file.path.clone(),
                        reason: reason.clone(),
                    });
                    FileAction::Failed { reason }
                }
            }
        };

        outcome.actions.push(FileOutcome {
            path: file.path.clone(),
            size_bytes: file.size_bytes,
            action,
        });
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{FileRecord, Inventory};
    use crate::policy::{self, RetentionPolicy};
    use chrono::{Duration, Utc};
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Records every removal; fails for paths in `failing`.
    #[derive(Default)]
    struct FakeRemover {
        failing: HashSet<PathBuf>,
        removed: RefCell<Vec<PathBuf>>,
    }

    impl Remover for FakeRemover {
        fn remove(&self, path: &Path) -> Result<(), DeletionError> {
            if self.failing.contains(path) {
                return Err(DeletionError::PermissionDenied);
            }
            self.removed.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    fn usage() -> UsageSnapshot {
        UsageSnapshot {
            total_bytes: 100,
            used_bytes: 50,
            free_bytes: 50,
        }
    }

    fn three_file_plan() -> DeletionPlan {
        let now = Utc::now();
        let files = ["a.wav", "b.wav", "c.wav"]
            .iter()
            .enumerate()
            .map(|(i, name)| FileRecord {
                path: PathBuf::from(format!("/rec/{name}")),
                size_bytes: 10 * (i as u64 + 1),
                modified_at: now - Duration::days(30 - i as i64),
            })
            .collect();
        let inv = Inventory::from_files(files);
        policy::plan(&inv, now, &RetentionPolicy::time_based(7).unwrap(), &usage())
    }

    fn opts(dry_run: bool, cleanup_enabled: bool) -> ExecuteOptions {
        ExecuteOptions {
            dry_run,
            cleanup_enabled,
        }
    }

    #[test]
    fn deletes_every_planned_file() {
        let remover = FakeRemover::default();
        let out = execute(&three_file_plan(), opts(false, true), usage(), &remover, &AtomicBool::new(false));
        assert!(!out.dry_run);
        assert_eq!(out.files_deleted, 3);
        assert_eq!(out.bytes_freed, 60);
        assert_eq!(remover.removed.borrow().len(), 3);
        assert!(out.actions.iter().all(|a| a.action == FileAction::Deleted));
    }

    #[test]
    fn dry_run_touches_nothing() {
        let remover = FakeRemover::default();
        let out = execute(&three_file_plan(), opts(true, true), usage(), &remover, &AtomicBool::new(false));
        assert!(out.dry_run);
        assert!(remover.removed.borrow().is_empty());
        assert_eq!(out.files_deleted, 3);
        assert_eq!(out.bytes_freed, 60);
        assert!(out.actions.iter().all(|a| a.action == FileAction::WouldDelete));
    }

    #[test]
    fn disabled_cleanup_wins_over_execute_request() {
        let remover = FakeRemover::default();
        let out = execute(&three_file_plan(), opts(false, false), usage(), &remover, &AtomicBool::new(false));
        assert!(out.dry_run);
        assert!(remover.removed.borrow().is_empty());
        assert!(out.after.is_none());
    }

    #[test]
    fn per_file_failures_do_not_abort() {
        let remover = FakeRemover {
            failing: HashSet::from([PathBuf::from("/rec/b.wav")]),
            ..FakeRemover::default()
        };
        let out = execute(&three_file_plan(), opts(false, true), usage(), &remover, &AtomicBool::new(false));
        assert_eq!(out.files_deleted, 2);
        assert_eq!(out.bytes_freed, 40);
        assert!(out.has_failures());
        assert_eq!(
            out.files_failed,
            vec![FailedFile {
                path: PathBuf::from("/rec/b.wav"),
                reason: "permission denied".to_string(),
            }]
        );
        assert_eq!(out.actions.len(), 3);
    }

    #[test]
    fn vanished_files_are_recorded_failures() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone.wav");
        let err = FsRemover.remove(&gone).unwrap_err();
        assert!(matches!(err, DeletionError::Vanished));
    }

    #[test]
    fn cancellation_skips_the_rest() {
        let remover = FakeRemover::default();
        let out = execute(&three_file_plan(), opts(false, true), usage(), &remover, &AtomicBool::new(true));
        assert!(out.interrupted);
        assert_eq!(out.files_deleted, 0);
        assert_eq!(out.files_skipped, 3);
        assert_eq!(out.actions.len(), 3);
    }

    /// Raises the cancel flag after the first successful removal.
    struct CancelAfterFirst<'a> {
        cancel: &'a AtomicBool,
    }

    impl Remover for CancelAfterFirst<'_> {
        fn remove(&self, _path: &Path) -> Result<(), DeletionError> {
            self.cancel.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn interruption_keeps_completed_deletions() {
        let cancel = AtomicBool::new(false);
        let remover = CancelAfterFirst { cancel: &cancel };
        let out = execute(&three_file_plan(), opts(false, true), usage(), &remover, &cancel);
        assert!(out.interrupted);
        assert_eq!(out.files_deleted, 1);
        assert_eq!(out.bytes_freed, 10);
        assert_eq!(out.files_skipped, 2);
        assert_eq!(out.actions[0].action, FileAction::Deleted);
        assert_eq!(out.actions[2].action, FileAction::Skipped);
    }
}
