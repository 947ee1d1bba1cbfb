use std::path::PathBuf;

use callsweep::config::{Config, LogFormat};
use callsweep::report::Mode;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "callsweep",
    about = "Reclaim disk space from call recordings by age or disk pressure",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default: /etc/callsweep/config.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Recordings directory, overrides `recordings_dir`
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Print the report as JSON instead of the human-readable log
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log filter, e.g. "debug" or "callsweep=trace"
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Lock file guarding against overlapping runs
    #[arg(long, global = true)]
    pub lock_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Delete recordings older than the retention period
    TimeBased {
        /// Keep recordings up to this many days old
        #[arg(long)]
        retention_days: Option<u32>,

        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete oldest recordings while disk usage is above the threshold
    DiskBased {
        /// Start cleaning above this usage percentage
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        threshold_percent: Option<u8>,

        /// Clean until usage is down to this percentage
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        target_percent: Option<u8>,

        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,
    },

    /// Show inventory and disk usage without planning or deleting anything
    ReportOnly,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        match self.command {
            Command::TimeBased { .. } => Mode::TimeBased,
            Command::DiskBased { .. } => Mode::DiskBased,
            Command::ReportOnly => Mode::ReportOnly,
        }
    }

    pub fn dry_run(&self) -> bool {
        match self.command {
            Command::TimeBased { dry_run, .. } | Command::DiskBased { dry_run, .. } => dry_run,
            Command::ReportOnly => true,
        }
    }

    /// Layer command-line values over the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.dir {
            config.recordings_dir = Some(dir.clone());
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(lock) = &self.lock_file {
            config.lock_file = Some(lock.clone());
        }
        match self.command {
            Command::TimeBased {
                retention_days: Some(days),
                ..
            } => config.time_based.retention_days = days,
            Command::DiskBased {
                threshold_percent,
                target_percent,
                ..
            } => {
                if let Some(t) = threshold_percent {
                    config.disk_based.threshold_percent = t;
                }
                if let Some(t) = target_percent {
                    config.disk_based.target_percent = t;
                }
            }
            _ => {}
        }
    }
}
