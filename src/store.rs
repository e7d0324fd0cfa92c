//! Shared in-memory state: blocked addresses, strike history, alert and log
//! rings, per-service counters, and the flat-file blocked persistence.
//!
//! All state lives behind a single mutex. Each operation acquires the lock
//! for its own duration only; snapshots for file I/O are taken under the
//! lock and written after it is released.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Most recent log lines kept for the inspection API.
const MAX_LOGS: usize = 200;

/// Most recent alerts kept for the inspection API.
const MAX_ALERTS: usize = 100;

/// Monitored service kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Ssh,
    Ftp,
    Apache,
}

impl Service {
    pub fn as_str(self) -> &'static str {
        match self {
            Service::Ssh => "ssh",
            Service::Ftp => "ftp",
            Service::Apache => "apache",
        }
    }

    /// Log prefix like `[SSH]`.
    pub fn log_prefix(self) -> &'static str {
        match self {
            Service::Ssh => "[SSH]",
            Service::Ftp => "[FTP]",
            Service::Apache => "[APACHE]",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ssh" => Ok(Service::Ssh),
            "ftp" => Ok(Service::Ftp),
            "apache" => Ok(Service::Apache),
            other => Err(format!("unknown service: {}", other)),
        }
    }
}

/// Alert severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

/// A security alert surfaced on the dashboard. Immutable once appended.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub timestamp: String,
    pub service: Service,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub severity: Severity,
    pub message: String,
}

/// An address currently blocked, when it was blocked, and how many times it
/// has been blocked during this daemon's lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct BlockedEntry {
    pub ip: String,
    pub blocked_at: DateTime<Utc>,
    pub strikes: u32,
}

#[derive(Debug, Default)]
struct Inner {
    blocked: HashMap<String, BlockedEntry>,
    strikes: HashMap<String, u32>,
    alerts: VecDeque<Alert>,
    logs: VecDeque<String>,
    ssh_count: u64,
    ftp_count: u64,
    apache_count: u64,
}

/// Shared daemon state. Cheap to clone behind an `Arc`; every method locks
/// for its own duration only.
#[derive(Debug, Default)]
pub struct Store {
    inner: Mutex<Inner>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a line to the recent-logs ring, evicting the oldest at capacity.
    pub fn add_log(&self, line: impl Into<String>) {
        let mut inner = self.lock();
        inner.logs.push_back(line.into());
        while inner.logs.len() > MAX_LOGS {
            inner.logs.pop_front();
        }
    }

    /// Snapshot of the recent log lines, oldest first.
    pub fn logs(&self) -> Vec<String> {
        self.lock().logs.iter().cloned().collect()
    }

    /// Append an alert to the alerts ring, evicting the oldest at capacity.
    pub fn add_alert(&self, alert: Alert) {
        let mut inner = self.lock();
        inner.alerts.push_back(alert);
        while inner.alerts.len() > MAX_ALERTS {
            inner.alerts.pop_front();
        }
    }

    /// Snapshot of the alerts ring, oldest first.
    pub fn alerts(&self) -> Vec<Alert> {
        self.lock().alerts.iter().cloned().collect()
    }

    /// Increment a service's lifetime event counter. Zero is a no-op.
    pub fn inc_by(&self, service: Service, n: u64) {
        if n == 0 {
            return;
        }
        let mut inner = self.lock();
        match service {
            Service::Ssh => inner.ssh_count += n,
            Service::Ftp => inner.ftp_count += n,
            Service::Apache => inner.apache_count += n,
        }
    }

    pub fn count(&self, service: Service) -> u64 {
        let inner = self.lock();
        match service {
            Service::Ssh => inner.ssh_count,
            Service::Ftp => inner.ftp_count,
            Service::Apache => inner.apache_count,
        }
    }

    /// Mark an address as blocked.
    ///
    /// Inserting a fresh entry advances the strike history; re-adding an
    /// address that is already blocked leaves its strikes untouched (apart
    /// from repairing a zero left by a file load predating the history).
    pub fn add_blocked(&self, ip: &str) {
        let ip = ip.trim();
        if ip.is_empty() {
            return;
        }

        let mut guard = self.lock();
        let inner = &mut *guard;

        if let Some(entry) = inner.blocked.get_mut(ip) {
            if entry.strikes == 0 {
                entry.strikes = inner.strikes.get(ip).copied().unwrap_or(0).max(1);
            }
            return;
        }

        let strikes = inner
            .strikes
            .get(ip)
            .copied()
            .unwrap_or(0)
            .saturating_add(1)
            .max(1);
        inner.strikes.insert(ip.to_string(), strikes);
        inner.blocked.insert(
            ip.to_string(),
            BlockedEntry {
                ip: ip.to_string(),
                blocked_at: Utc::now(),
                strikes,
            },
        );
    }

    /// Remove an address from the blocked map. Strike history is preserved.
    pub fn remove_blocked(&self, ip: &str) {
        self.lock().blocked.remove(ip.trim());
    }

    /// Blocked addresses only, unordered.
    pub fn blocked_ips(&self) -> Vec<String> {
        self.lock().blocked.keys().cloned().collect()
    }

    /// Full blocked entries for the auto-unblock walk.
    pub fn blocked_entries(&self) -> Vec<BlockedEntry> {
        self.lock().blocked.values().cloned().collect()
    }

    /// Restore blocked addresses from a file, one per line.
    ///
    /// The file stores neither timestamps nor strikes, so entries are
    /// stamped with the load time and the strike history floor of 1.
    /// Missing or unreadable files are ignored.
    pub fn load_from_file(&self, path: &Path) {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) => {
                debug!("store: no blocked file at {}: {}", path.display(), e);
                return;
            }
        };

        let now = Utc::now();
        let mut guard = self.lock();
        let inner = &mut *guard;
        for raw in data.lines() {
            let ip = raw.trim();
            if ip.is_empty() {
                continue;
            }
            let strikes = inner.strikes.get(ip).copied().unwrap_or(0).max(1);
            inner.strikes.insert(ip.to_string(), strikes);
            inner.blocked.insert(
                ip.to_string(),
                BlockedEntry {
                    ip: ip.to_string(),
                    blocked_at: now,
                    strikes,
                },
            );
        }
    }

    /// Persist the blocked addresses (one per line, mode 0644).
    ///
    /// Write failures are logged and suppressed; the next cycle retries.
    pub fn save_to_file(&self, path: &Path) {
        let snapshot: Vec<String> = self.blocked_ips();

        let mut content = String::new();
        for ip in &snapshot {
            content.push_str(ip);
            content.push('\n');
        }

        if let Err(e) = std::fs::write(path, content) {
            warn!("store: failed to write {}: {}", path.display(), e);
            return;
        }
        if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)) {
            warn!(
                "store: failed to set permissions on {}: {}",
                path.display(),
                e
            );
        }
    }
}
