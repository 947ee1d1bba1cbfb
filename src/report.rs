//! Run summary: one serialisable [`Report`] per invocation, rendered either
//! as JSON for the scheduler or as a line-oriented log for humans.

use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use crate::disk_info::UsageSnapshot;
use crate::executor::{FailedFile, FileAction, FileOutcome, RunOutcome};
use crate::inventory::Inventory;
use crate::policy::{DeletionPlan, RetentionPolicy};
use crate::utils::{display_path, format_size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    TimeBased,
    DiskBased,
    ReportOnly,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::TimeBased => "time-based",
            Mode::DiskBased => "disk-based",
            Mode::ReportOnly => "report-only",
        }
    }
}

/// Exit status for runs that stopped before deleting anything.
pub const EXIT_ABORTED: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    CompletedWithFailures,
    Interrupted,
}

impl RunStatus {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::CompletedWithFailures => 2,
            RunStatus::Interrupted => 130,
        }
    }
}

/// Facts about the run known before anything is scanned.
#[derive(Debug, Clone)]
pub struct ReportHeader {
    pub mode: Mode,
    pub policy: Option<RetentionPolicy>,
    pub directory: PathBuf,
    pub mount_point: Option<PathBuf>,
    pub cleanup_enabled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Usage {
    #[serde(flatten)]
    pub snapshot: UsageSnapshot,
    pub used_percent: f64,
}

impl From<UsageSnapshot> for Usage {
    fn from(snapshot: UsageSnapshot) -> Self {
        Self {
            used_percent: snapshot.used_percent(),
            snapshot,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub mode: Mode,
    pub policy: Option<RetentionPolicy>,
    pub directory: PathBuf,
    pub mount_point: Option<PathBuf>,
    pub cleanup_enabled: bool,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    pub files_scanned: usize,
    pub bytes_scanned: u64,
    pub scan_skipped: usize,
    pub scan_too_recent: usize,
    pub oldest_age_days: Option<i64>,
    pub newest_age_days: Option<i64>,

    /// Whether usage is above the disk-pressure threshold; `None` for the
    /// age policy.
    pub threshold_exceeded: Option<bool>,
    pub files_selected: usize,
    pub bytes_selected: u64,
    pub bytes_to_free: Option<u64>,
    pub target_reached: bool,

    pub files_deleted: usize,
    pub bytes_freed: u64,
    pub files_failed: Vec<FailedFile>,
    pub files_skipped: usize,
    pub interrupted: bool,

    pub usage_before: Usage,
    pub usage_after: Option<Usage>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileOutcome>,
}

impl Report {
    /// Summarise a run. `executed` is `None` for report-only runs, which
    /// neither plan nor delete.
    pub fn new(
        header: ReportHeader,
        inventory: &Inventory,
        before: UsageSnapshot,
        threshold_exceeded: Option<bool>,
        executed: Option<(&DeletionPlan, RunOutcome)>,
    ) -> Self {
        let now = header.started_at;
        let mut report = Self {
            mode: header.mode,
            policy: header.policy,
            directory: header.directory,
            mount_point: header.mount_point,
            cleanup_enabled: header.cleanup_enabled,
            dry_run: true,
            started_at: header.started_at,
            finished_at: header.finished_at,
            files_scanned: inventory.len(),
            bytes_scanned: inventory.total_bytes(),
            scan_skipped: inventory.skipped,
            scan_too_recent: inventory.too_recent,
            oldest_age_days: inventory.oldest().map(|f| f.age_days(now)),
            newest_age_days: inventory.newest().map(|f| f.age_days(now)),
            threshold_exceeded,
            files_selected: 0,
            bytes_selected: 0,
            bytes_to_free: None,
            target_reached: true,
            files_deleted: 0,
            bytes_freed: 0,
            files_failed: Vec::new(),
            files_skipped: 0,
            interrupted: false,
            usage_before: before.into(),
            usage_after: None,
            files: Vec::new(),
        };

        if let Some((plan, outcome)) = executed {
            report.dry_run = outcome.dry_run;
            report.files_selected = plan.len();
            report.bytes_selected = plan.expected_bytes();
            report.bytes_to_free = plan.bytes_to_free();
            report.target_reached = plan.target_reached();
            report.files_deleted = outcome.files_deleted;
            report.bytes_freed = outcome.bytes_freed;
            report.files_failed = outcome.files_failed;
            report.files_skipped = outcome.files_skipped;
            report.interrupted = outcome.interrupted;
            report.usage_after = outcome.after.map(Usage::from);
            report.files = outcome.actions;
        }
        report
    }

    pub fn status(&self) -> RunStatus {
        if self.interrupted {
            RunStatus::Interrupted
        } else if !self.files_failed.is_empty() {
            RunStatus::CompletedWithFailures
        } else {
            RunStatus::Completed
        }
    }
}

/// Write the report as a single JSON document.
pub fn render_json(report: &Report, out: &mut dyn Write) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)
}

/// Write the report as a human-readable log.
pub fn render_human(report: &Report, out: &mut dyn Write) -> io::Result<()> {
    let suffix = if report.mode != Mode::ReportOnly && report.dry_run {
        " (dry run)"
    } else {
        ""
    };
    writeln!(
        out,
        "{}",
        format!("=== callsweep {}{suffix} ===", report.mode.as_str())
            .bold()
            .cyan()
    )?;

    row(out, "Directory:", &display_path(&report.directory))?;
    if let Some(mp) = &report.mount_point {
        row(out, "Filesystem:", &mp.display().to_string())?;
    }
    if let Some(policy) = &report.policy {
        row(out, "Policy:", &describe_policy(policy))?;
    }
    row(out, "Usage before:", &describe_usage(&report.usage_before))?;
    row(
        out,
        "Scanned:",
        &format!(
            "{} files, {}",
            report.files_scanned,
            format_size(report.bytes_scanned)
        ),
    )?;
    if report.scan_skipped > 0 || report.scan_too_recent > 0 {
        row(
            out,
            "Not considered:",
            &format!(
                "{} unreadable, {} still being written",
                report.scan_skipped, report.scan_too_recent
            ),
        )?;
    }
    if let (Some(oldest), Some(newest)) = (report.oldest_age_days, report.newest_age_days) {
        row(out, "Age range:", &format!("{newest} to {oldest} days"))?;
    }
    if let Some(exceeded) = report.threshold_exceeded {
        let text = if exceeded { "exceeded".red().to_string() } else { "ok".green().to_string() };
        row(out, "Threshold:", &text)?;
    }

    if report.mode == Mode::ReportOnly {
        return Ok(());
    }

    let mut selected = format!(
        "{} files, {}",
        report.files_selected,
        format_size(report.bytes_selected)
    );
    if let Some(goal) = report.bytes_to_free {
        selected.push_str(&format!(" (goal {})", format_size(goal)));
    }
    row(out, "Selected:", &selected)?;

    for file in &report.files {
        print_file(out, file)?;
    }

    writeln!(out, "  {}", "─".repeat(45).dimmed())?;
    let verb = if report.dry_run { "Would free:" } else { "Freed:" };
    row(
        out,
        verb,
        &format!(
            "{} across {} files",
            format_size(report.bytes_freed),
            report.files_deleted
        ),
    )?;
    if !report.files_failed.is_empty() {
        row(out, "Failed:", &report.files_failed.len().to_string().red().to_string())?;
    }
    if report.files_skipped > 0 {
        row(out, "Not attempted:", &report.files_skipped.to_string())?;
    }
    if let Some(after) = &report.usage_after {
        row(out, "Usage after:", &describe_usage(after))?;
    }

    if !report.target_reached {
        writeln!(
            out,
            "{} {}",
            "Warning:".red().bold(),
            "deleting every recording does not reach the usage target".red()
        )?;
    }
    if report.interrupted {
        writeln!(out, "{} {}", "Warning:".red().bold(), "run was interrupted".red())?;
    }
    if report.dry_run {
        let why = if report.cleanup_enabled {
            "This was a dry run. Nothing was deleted."
        } else {
            "Cleanup is disabled in the configuration. Nothing was deleted."
        };
        writeln!(out, "{}", why.yellow().bold())?;
    }
    Ok(())
}

fn row(out: &mut dyn Write, label: &str, value: &str) -> io::Result<()> {
    writeln!(out, "  {:<17} {}", label.bold(), value)
}

fn print_file(out: &mut dyn Write, file: &FileOutcome) -> io::Result<()> {
    let path = display_path(&file.path);
    let size = format_size(file.size_bytes);
    match &file.action {
        FileAction::Deleted => writeln!(out, "  {} {}  {}", "Deleted".red(), path.dimmed(), size.yellow()),
        FileAction::WouldDelete => writeln!(
            out,
            "  {} {}  {}",
            "Would delete".yellow(),
            path.dimmed(),
            size.yellow()
        ),
        FileAction::Failed { reason } => writeln!(
            out,
            "  {} {}: {}",
            "Failed".red().bold(),
            path.dimmed(),
            reason.red()
        ),
        FileAction::Skipped => writeln!(out, "  {} {}", "Skipped".dimmed(), path.dimmed()),
    }
}

fn describe_policy(policy: &RetentionPolicy) -> String {
    match policy {
        RetentionPolicy::TimeBased { retention_days } => {
            format!("delete recordings older than {retention_days} days")
        }
        RetentionPolicy::DiskBased {
            threshold_percent,
            target_percent,
        } => format!(
            "above {threshold_percent}% usage, delete oldest until {target_percent}%"
        ),
    }
}

fn describe_usage(usage: &Usage) -> String {
    format!(
        "{} used of {} ({:.1}%), {} free",
        format_size(usage.snapshot.used_bytes),
        format_size(usage.snapshot.total_bytes),
        usage.used_percent,
        format_size(usage.snapshot.free_bytes)
    )
}
