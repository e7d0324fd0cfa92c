//! File-based locking to prevent concurrent daemon instances.
//!
//! Uses flock-style advisory locking so only one securemonitor process
//! tails the logs and drives the firewall at a time. The lock is held for
//! the process lifetime.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

const LOCK_FILE: &str = "/var/run/securemonitor.lock";

/// Holds the exclusive daemon lock; released automatically on drop.
pub struct LockGuard {
    _file: File,
}

impl LockGuard {
    /// Attempt to acquire the exclusive lock.
    /// Returns an error if another instance is already running.
    ///
    /// The file is opened with create+read+write and without truncation so
    /// there is no window between creation and lock acquisition.
    pub fn acquire() -> Result<Self> {
        let lock_path = Path::new(LOCK_FILE);
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).ok();
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .with_context(|| format!("Failed to open lock file: {}", LOCK_FILE))?;

        fs::set_permissions(lock_path, fs::Permissions::from_mode(0o600))
            .context("Failed to set lock file permissions")?;

        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!(
                "Another instance of securemonitor is already running.\n\
                 If you believe this is an error, remove the lock file: {}",
                LOCK_FILE
            )
        })?;

        Ok(Self { _file: file })
    }
}
