//! Retention cleanup for call-recording spools.
//!
//! A run scans the recordings directory, reads filesystem usage, builds a
//! deletion plan under either the age policy or the disk-pressure policy,
//! applies it (or simulates it) and summarises the result.

pub mod config;
pub mod disk_info;
pub mod error;
pub mod executor;
pub mod inventory;
pub mod lock;
pub mod logging;
pub mod policy;
pub mod report;
pub mod sweep;
pub mod utils;
