//! One cleanup run: scan, probe, plan, execute, report.

use std::sync::atomic::AtomicBool;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::disk_info::{self, UsageProbe};
use crate::error::{ConfigError, Result};
use crate::executor::{self, ExecuteOptions, Remover};
use crate::inventory::{self, ScanOptions};
use crate::policy::{self, RetentionPolicy};
use crate::report::{Mode, Report, ReportHeader};

/// What the caller asked for on this invocation.
#[derive(Debug, Clone, Copy)]
pub struct RunRequest {
    pub mode: Mode,
    pub dry_run: bool,
}

pub struct Sweeper<'a> {
    config: &'a Config,
    probe: &'a dyn UsageProbe,
    remover: &'a dyn Remover,
}

impl<'a> Sweeper<'a> {
    pub fn new(config: &'a Config, probe: &'a dyn UsageProbe, remover: &'a dyn Remover) -> Self {
        Self {
            config,
            probe,
            remover,
        }
    }

    fn policy_for(&self, mode: Mode) -> std::result::Result<Option<RetentionPolicy>, ConfigError> {
        match mode {
            Mode::TimeBased => {
                RetentionPolicy::time_based(self.config.time_based.retention_days).map(Some)
            }
            Mode::DiskBased => RetentionPolicy::disk_based(
                self.config.disk_based.threshold_percent,
                self.config.disk_based.target_percent,
            )
            .map(Some),
            Mode::ReportOnly => Ok(None),
        }
    }

    /// Run once.
    ///
    /// Errors are only returned for problems found before anything is
    /// deleted. Per-file failures and interruptions are part of the report.
    pub fn run(&self, request: &RunRequest, now: DateTime<Utc>, cancel: &AtomicBool) -> Result<Report> {
        let clock = Instant::now();
        self.config.validate()?;
        let policy = self.policy_for(request.mode)?;
        let dir = self
            .config
            .recordings_dir
            .as_deref()
            .ok_or(ConfigError::NoDirectory)?;

        tracing::info!(
            mode = request.mode.as_str(),
            dir = %dir.display(),
            dry_run = request.dry_run,
            cleanup_enabled = self.config.cleanup_enabled,
            "starting cleanup run"
        );

        let min_age = i64::try_from(self.config.min_file_age_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .unwrap_or(Duration::MAX);
        let opts = ScanOptions {
            extensions: &self.config.extensions,
            recursive: self.config.recursive,
            min_file_age: min_age,
        };
        let inventory = inventory::scan(dir, &opts, now)?;
        let before = self.probe.probe(dir)?;

        tracing::info!(
            files = inventory.len(),
            bytes = inventory.total_bytes(),
            used_percent = format!("{:.1}", before.used_percent()),
            "inventory and usage captured"
        );

        let threshold_exceeded = match request.mode {
            Mode::DiskBased | Mode::ReportOnly => Some(policy::exceeds_percent(
                &before,
                self.config.disk_based.threshold_percent,
            )),
            Mode::TimeBased => None,
        };

        let header = |finished: DateTime<Utc>| ReportHeader {
            mode: request.mode,
            policy,
            directory: dir.to_path_buf(),
            mount_point: disk_info::mount_point_for(dir),
            cleanup_enabled: self.config.cleanup_enabled,
            started_at: now,
            finished_at: finished,
        };

        let Some(policy) = policy else {
            let finished = now + elapsed(clock);
            return Ok(Report::new(header(finished), &inventory, before, threshold_exceeded, None));
        };

        let plan = policy::plan(&inventory, now, &policy, &before);
        tracing::info!(
            files = plan.len(),
            bytes = plan.expected_bytes(),
            bytes_to_free = plan.bytes_to_free(),
            target_reached = plan.target_reached(),
            "deletion plan built"
        );
        if !plan.target_reached() {
            tracing::warn!("usage target cannot be reached by deleting recordings alone");
        }

        let exec_opts = ExecuteOptions {
            dry_run: request.dry_run,
            cleanup_enabled: self.config.cleanup_enabled,
        };
        let mut outcome = executor::execute(&plan, exec_opts, before, self.remover, cancel);

        if !outcome.dry_run {
            // Deletions already happened, so a failed re-probe must not lose them.
            match self.probe.probe(dir) {
                Ok(after) => outcome.after = Some(after),
                Err(e) => tracing::warn!(error = %e, "could not read usage after cleanup"),
            }
        }

        tracing::info!(
            deleted = outcome.files_deleted,
            bytes_freed = outcome.bytes_freed,
            failed = outcome.files_failed.len(),
            skipped = outcome.files_skipped,
            dry_run = outcome.dry_run,
            "cleanup run complete"
        );

        let finished = now + elapsed(clock);
        Ok(Report::new(
            header(finished),
            &inventory,
            before,
            threshold_exceeded,
            Some((&plan, outcome)),
        ))
    }
}

fn elapsed(clock: Instant) -> Duration {
    Duration::from_std(clock.elapsed()).unwrap_or_else(|_| Duration::zero())
}
