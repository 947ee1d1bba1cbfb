use std::ffi::CString;
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ProbeError;

/// Filesystem capacity at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub total_bytes: u64,
    pub used_bytes: u64,
    /// Space available to unprivileged writers; excludes reserved blocks.
    pub free_bytes: u64,
}

impl UsageSnapshot {
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

/// Source of live capacity readings.
pub trait UsageProbe {
    fn probe(&self, path: &Path) -> Result<UsageSnapshot, ProbeError>;
}

/// Reads capacity with `statvfs(3)`.
pub struct StatvfsProbe;

impl UsageProbe for StatvfsProbe {
    fn probe(&self, path: &Path) -> Result<UsageSnapshot, ProbeError> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| ProbeError::InvalidPath(path.to_path_buf()))?;

        let mut stat = MaybeUninit::<libc::statvfs>::uninit();
        let ret = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
        if ret != 0 {
            return Err(ProbeError::Stat {
                path: path.to_path_buf(),
                source: std::io::Error::last_os_error(),
            });
        }
        let stat = unsafe { stat.assume_init() };

        let block_size = stat.f_frsize as u64;
        let total = stat.f_blocks as u64 * block_size;
        if total == 0 {
            return Err(ProbeError::ZeroCapacity(path.to_path_buf()));
        }
        let used = (stat.f_blocks as u64).saturating_sub(stat.f_bfree as u64) * block_size;
        let free = stat.f_bavail as u64 * block_size;

        Ok(UsageSnapshot {
            total_bytes: total,
            used_bytes: used,
            free_bytes: free,
        })
    }
}

/// Mount point of the filesystem hosting `path`, if it can be determined.
pub fn mount_point_for(path: &Path) -> Option<PathBuf> {
    let path = path.canonicalize().ok()?;
    let disks = sysinfo::Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .map(|d| d.mount_point())
        .filter(|mp| path.starts_with(mp))
        .max_by_key(|mp| mp.as_os_str().len())
        .map(Path::to_path_buf)
}
