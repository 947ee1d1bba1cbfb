//! Retention decisions.
//!
//! [`plan`] is a pure function of the inventory, the clock and (for the
//! disk-pressure policy) a usage snapshot. It never touches the filesystem,
//! so the same inputs always produce the same plan; a dry run and a real
//! run over an unchanged spool select exactly the same files.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::check_disk_thresholds;
use crate::disk_info::UsageSnapshot;
use crate::error::ConfigError;
use crate::inventory::{FileRecord, Inventory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Remove recordings strictly older than `retention_days`.
    TimeBased { retention_days: u32 },
    /// Once usage exceeds `threshold_percent`, remove oldest recordings
    /// until usage is back down to `target_percent`.
    DiskBased {
        threshold_percent: u8,
        target_percent: u8,
    },
}

impl RetentionPolicy {
    pub fn time_based(retention_days: u32) -> Result<Self, ConfigError> {
        if retention_days == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        Ok(Self::TimeBased { retention_days })
    }

    pub fn disk_based(threshold_percent: u8, target_percent: u8) -> Result<Self, ConfigError> {
        check_disk_thresholds(threshold_percent, target_percent)?;
        Ok(Self::DiskBased {
            threshold_percent,
            target_percent,
        })
    }
}

/// Files selected for removal, in the order they will be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionPlan {
    files: Vec<FileRecord>,
    expected_bytes: u64,
    bytes_to_free: Option<u64>,
    target_reached: bool,
}

impl DeletionPlan {
    fn new(files: Vec<FileRecord>, bytes_to_free: Option<u64>) -> Self {
        let expected_bytes = files.iter().map(|f| f.size_bytes).sum();
        let target_reached = bytes_to_free.map_or(true, |goal| expected_bytes >= goal);
        Self {
            files,
            expected_bytes,
            bytes_to_free,
            target_reached,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), None)
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sum of the selected files' sizes.
    pub fn expected_bytes(&self) -> u64 {
        self.expected_bytes
    }

    /// How much the disk-pressure policy asked for; `None` for the age policy.
    pub fn bytes_to_free(&self) -> Option<u64> {
        self.bytes_to_free
    }

    /// False when deleting every recording still would not meet the target.
    pub fn target_reached(&self) -> bool {
        self.target_reached
    }
}

/// Decide which recordings to remove.
pub fn plan(
    inventory: &Inventory,
    now: DateTime<Utc>,
    policy: &RetentionPolicy,
    usage: &UsageSnapshot,
) -> DeletionPlan {
    let mut ordered: Vec<&FileRecord> = inventory.files.iter().collect();
    ordered.sort_by(|a, b| a.cmp_oldest_first(b));

    match *policy {
        RetentionPolicy::TimeBased { retention_days } => {
            let selected = ordered
                .into_iter()
                .filter(|f| f.age_days(now) > i64::from(retention_days))
                .cloned()
                .collect();
            DeletionPlan::new(selected, None)
        }
        RetentionPolicy::DiskBased {
            threshold_percent,
            target_percent,
        } => {
            if !exceeds_percent(usage, threshold_percent) {
                return DeletionPlan::new(Vec::new(), Some(0));
            }
            let goal = bytes_to_free(usage, target_percent);
            let mut selected = Vec::new();
            let mut running = 0u64;
            for file in ordered {
                if running >= goal {
                    break;
                }
                running += file.size_bytes;
                selected.push(file.clone());
            }
            DeletionPlan::new(selected, Some(goal))
        }
    }
}

/// Is usage strictly above `percent`? Exact integer comparison, so a disk at
/// exactly the threshold is not considered under pressure.
pub fn exceeds_percent(usage: &UsageSnapshot, percent: u8) -> bool {
    u128::from(usage.used_bytes) * 100 > u128::from(usage.total_bytes) * u128::from(percent)
}

/// `total * (used% - target%) / 100`, i.e. `used - total * target / 100`,
/// clamped at zero.
pub fn bytes_to_free(usage: &UsageSnapshot, target_percent: u8) -> u64 {
    let allowed = u128::from(usage.total_bytes) * u128::from(target_percent) / 100;
    u128::from(usage.used_bytes).saturating_sub(allowed) as u64
}
