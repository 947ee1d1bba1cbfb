//! Recording inventory: which files exist in the spool right now.

use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::error::ScanError;
use crate::utils;

/// One recording on disk, as seen at scan time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Last-modified time, clamped to the scan's `now`.
    pub modified_at: DateTime<Utc>,
}

impl FileRecord {
    /// Whole days elapsed since the recording was last modified. Never negative.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.modified_at).num_days().max(0)
    }

    /// Oldest first, ties broken by path ascending.
    pub fn cmp_oldest_first(&self, other: &Self) -> Ordering {
        self.modified_at
            .cmp(&other.modified_at)
            .then_with(|| self.path.cmp(&other.path))
    }
}

pub struct ScanOptions<'a> {
    pub extensions: &'a [String],
    pub recursive: bool,
    /// Files younger than this are still being written and are left out.
    pub min_file_age: Duration,
}

/// Result of scanning the recordings directory.
#[derive(Debug, Default)]
pub struct Inventory {
    /// Matching files, oldest first.
    pub files: Vec<FileRecord>,
    /// Entries that vanished or could not be statted during the scan.
    pub skipped: usize,
    /// Files excluded because they are younger than the minimum age.
    pub too_recent: usize,
}

impl Inventory {
    pub fn from_files(mut files: Vec<FileRecord>) -> Self {
        files.sort_by(FileRecord::cmp_oldest_first);
        Self {
            files,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }

    pub fn oldest(&self) -> Option<&FileRecord> {
        self.files.first()
    }

    pub fn newest(&self) -> Option<&FileRecord> {
        self.files.last()
    }
}

/// Enumerate recordings in `dir`.
///
/// Only regular files whose extension is listed in `opts.extensions` are
/// returned; symlinks are never followed. Without `opts.recursive` only
/// direct children of `dir` are considered. An empty directory is not an
/// error.
pub fn scan(dir: &Path, opts: &ScanOptions<'_>, now: DateTime<Utc>) -> Result<Inventory, ScanError> {
    let meta = std::fs::metadata(dir).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ScanError::NotFound(dir.to_path_buf()),
        _ => ScanError::Unreadable {
            path: dir.to_path_buf(),
            source,
        },
    })?;
    if !meta.is_dir() {
        return Err(ScanError::NotADirectory(dir.to_path_buf()));
    }
    // Surface permission problems on the root itself as fatal.
    std::fs::read_dir(dir).map_err(|source| ScanError::Unreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    let max_depth = if opts.recursive { usize::MAX } else { 1 };
    let mut skipped = 0usize;
    let mut candidates: Vec<DirEntry> = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
    {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if !utils::has_extension(entry.path(), opts.extensions) {
            continue;
        }
        candidates.push(entry);
    }

    // One metadata call per file; recordings may disappear under us.
    let stats: Vec<Option<FileRecord>> = candidates
        .into_par_iter()
        .map(|entry| stat_entry(&entry, now))
        .collect();

    let mut files = Vec::with_capacity(stats.len());
    let mut too_recent = 0usize;
    for record in stats {
        match record {
            Some(r) if now - r.modified_at < opts.min_file_age => too_recent += 1,
            Some(r) => files.push(r),
            None => skipped += 1,
        }
    }

    let mut inventory = Inventory::from_files(files);
    inventory.skipped = skipped;
    inventory.too_recent = too_recent;

    tracing::debug!(
        dir = %dir.display(),
        files = inventory.len(),
        bytes = inventory.total_bytes(),
        skipped,
        too_recent,
        "scan complete"
    );
    Ok(inventory)
}

fn stat_entry(entry: &DirEntry, now: DateTime<Utc>) -> Option<FileRecord> {
    let meta = match entry.metadata() {
        Ok(m) => m,
        Err(err) => {
            tracing::debug!(path = %entry.path().display(), error = %err, "file vanished during scan");
            return None;
        }
    };
    let modified = match meta.modified() {
        Ok(t) => DateTime::<Utc>::from(t),
        Err(err) => {
            tracing::warn!(path = %entry.path().display(), error = %err, "no modification time");
            return None;
        }
    };
    Some(FileRecord {
        path: entry.path().to_path_buf(),
        size_bytes: meta.len(),
        modified_at: modified.min(now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::time::SystemTime;

    fn exts() -> Vec<String> {
        vec!["wav".to_string(), "mp3".to_string()]
    }

    fn write_file(path: &Path, bytes: usize, modified: SystemTime) {
        let mut f = File::create(path).unwrap();
        f.write_all(&vec![0u8; bytes]).unwrap();
        f.set_modified(modified).unwrap();
    }

    fn days_ago(days: u64) -> SystemTime {
        SystemTime::now() - std::time::Duration::from_secs(days * 86_400)
    }

    #[test]
    fn scans_matching_files_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("new.wav"), 10, days_ago(1));
        write_file(&dir.path().join("old.mp3"), 20, days_ago(30));
        write_file(&dir.path().join("notes.txt"), 5, days_ago(60));

        let exts = exts();
        let opts = ScanOptions {
            extensions: &exts,
            recursive: false,
            min_file_age: Duration::zero(),
        };
        let inv = scan(dir.path(), &opts, Utc::now()).unwrap();
        assert_eq!(inv.len(), 2);
        assert_eq!(inv.total_bytes(), 30);
        assert_eq!(inv.oldest().unwrap().path, dir.path().join("old.mp3"));
        assert_eq!(inv.newest().unwrap().path, dir.path().join("new.wav"));
    }

    #[test]
    fn recursion_is_opt_in() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("2024").join("03");
        std::fs::create_dir_all(&sub).unwrap();
        write_file(&sub.join("call.wav"), 10, days_ago(3));
        write_file(&dir.path().join("top.wav"), 10, days_ago(3));

        let exts = exts();
        let mut opts = ScanOptions {
            extensions: &exts,
            recursive: false,
            min_file_age: Duration::zero(),
        };
        assert_eq!(scan(dir.path(), &opts, Utc::now()).unwrap().len(), 1);
        opts.recursive = true;
        assert_eq!(scan(dir.path(), &opts, Utc::now()).unwrap().len(), 2);
    }

    #[test]
    fn empty_directory_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let exts = exts();
        let opts = ScanOptions {
            extensions: &exts,
            recursive: false,
            min_file_age: Duration::zero(),
        };
        let inv = scan(dir.path(), &opts, Utc::now()).unwrap();
        assert!(inv.is_empty());
        assert_eq!(inv.skipped, 0);
    }

    #[test]
    fn missing_or_non_directory_roots_fail() {
        let dir = tempfile::tempdir().unwrap();
        let exts = exts();
        let opts = ScanOptions {
            extensions: &exts,
            recursive: false,
            min_file_age: Duration::zero(),
        };
        let missing = dir.path().join("nope");
        assert!(matches!(
            scan(&missing, &opts, Utc::now()),
            Err(ScanError::NotFound(_))
        ));

        let file = dir.path().join("a.wav");
        write_file(&file, 1, days_ago(1));
        assert!(matches!(
            scan(&file, &opts, Utc::now()),
            Err(ScanError::NotADirectory(_))
        ));
    }

    #[test]
    fn future_timestamps_are_clamped_to_now() {
        let dir = tempfile::tempdir().unwrap();
        let future = SystemTime::now() + std::time::Duration::from_secs(3 * 86_400);
        write_file(&dir.path().join("skewed.wav"), 1, future);

        let exts = exts();
        let opts = ScanOptions {
            extensions: &exts,
            recursive: false,
            min_file_age: Duration::zero(),
        };
        let now = Utc::now();
        let inv = scan(dir.path(), &opts, now).unwrap();
        let rec = inv.oldest().unwrap();
        assert_eq!(rec.modified_at, now);
        assert_eq!(rec.age_days(now), 0);
    }

    #[test]
    fn files_still_being_written_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("live.wav"), 1, SystemTime::now());
        write_file(&dir.path().join("done.wav"), 1, days_ago(1));

        let exts = exts();
        let opts = ScanOptions {
            extensions: &exts,
            recursive: false,
            min_file_age: Duration::minutes(10),
        };
        let inv = scan(dir.path(), &opts, Utc::now()).unwrap();
        assert_eq!(inv.len(), 1);
        assert_eq!(inv.too_recent, 1);
    }

    #[test]
    fn ties_break_on_path() {
        let t = Utc::now();
        let a = FileRecord {
            path: PathBuf::from("/r/a.wav"),
            size_bytes: 1,
            modified_at: t,
        };
        let b = FileRecord {
            path: PathBuf::from("/r/b.wav"),
            ..a.clone()
        };
        let inv = Inventory::from_files(vec![b.clone(), a.clone()]);
        assert_eq!(inv.files, vec![a, b]);
    }
}
