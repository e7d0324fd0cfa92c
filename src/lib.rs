//! # SecureMonitor - Host Intrusion Detection Daemon
//!
//! A host-resident daemon that tails authentication and web-server logs,
//! aggregates failure events per source address, escalates severity, and
//! drives the host firewall to block abusive peers with time-decayed
//! automatic release.
//!
//! ## Features
//!
//! - **Incremental tailing** - Byte-offset log reading that survives rotation
//! - **Per-service strategies** - SSH and FTP failed logins, Apache error spikes
//! - **Strike escalation** - Repeat offenders are held progressively longer
//! - **Whitelist & private-range exemptions** - Enforced at the block decision
//! - **Geo enrichment** - Country labels on alerts, memoized with a hard timeout
//! - **Inspection API** - JSON snapshots, manual unblock and event injection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SecureMonitor                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Monitor loop (tokio ticker)                                │
//! │    ├── Tailer: incremental per-file reads                   │
//! │    ├── Scan: ssh / ftp / apache line parsers                │
//! │    ├── Strategies: counters, alerts, block decisions        │
//! │    └── Auto-unblock: strike-weighted release                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Store (single lock)                                        │
//! │    └── blocked map, strikes, alert/log rings, counters      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Firewall (FirewallBackend trait)                           │
//! │    └── UfwFirewall via CommandExecutor                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  API (axum)                                                 │
//! │    └── status, logs, alerts, stats, blocked, dashboard,     │
//! │        unblock, simulate                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`api`] - JSON inspection surface
//! - [`cli`] - Command-line interface definitions
//! - [`cmd`] - Subprocess execution seam
//! - [`config`] - Configuration parsing
//! - [`firewall`] - Firewall backend abstraction (ufw)
//! - [`geo`] - Country lookups with memoization
//! - [`lock`] - Single-instance daemon lock
//! - [`monitor`] - The periodic detection and enforcement loop
//! - [`scan`] - Log line parsers and address extraction
//! - [`simulator`] - Staged-event buffers for injection
//! - [`store`] - Shared in-memory state and persistence
//! - [`strategy`] - Per-service processing strategies
//! - [`tailer`] - Incremental log file reading
//! - [`utils`] - Formatting helpers
//! - [`whitelist`] - Address exemptions

pub mod api;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod firewall;
pub mod geo;
pub mod lock;
pub mod monitor;
pub mod scan;
pub mod simulator;
pub mod store;
pub mod strategy;
pub mod tailer;
pub mod utils;
pub mod whitelist;

pub use cli::Cli;
pub use config::Config;
