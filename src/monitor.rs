//! The periodic detection and enforcement loop.
//!
//! One cycle: reload the whitelist, release expired blocks, tail the log
//! files, merge staged simulator events, hand each service's counts to its
//! strategy, then persist the blocked snapshot. The tailer, geo cache and
//! strategy totals are owned here and touched by no other task.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::Config;
use crate::firewall::FirewallBackend;
use crate::geo::GeoCache;
use crate::scan::{
    parse_apache_errors, parse_ftp_failures, parse_ftp_failures_from_lines, parse_ssh_failures,
    parse_ssh_failures_from_lines,
};
use crate::simulator::Simulator;
use crate::store::{Service, Store};
use crate::strategy::{ApacheStrategy, CycleContext, LoginStrategy, ServiceStrategy};
use crate::tailer::Tailer;
use crate::utils::{format_duration, rfc3339};
use crate::whitelist::Whitelist;

/// The monitoring loop and the scheduler-exclusive state it owns.
pub struct Monitor {
    config: Config,
    store: Arc<Store>,
    simulator: Arc<Simulator>,
    firewall: Arc<dyn FirewallBackend>,
    tailer: Tailer,
    geo: GeoCache,
    strategies: Vec<Box<dyn ServiceStrategy>>,
}

impl Monitor {
    pub fn new(
        config: Config,
        store: Arc<Store>,
        simulator: Arc<Simulator>,
        firewall: Arc<dyn FirewallBackend>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            store,
            simulator,
            firewall,
            tailer: Tailer::new(),
            geo: GeoCache::new()?,
            strategies: vec![
                Box::new(LoginStrategy::ssh()),
                Box::new(LoginStrategy::ftp()),
                Box::new(ApacheStrategy::new()),
            ],
        })
    }

    /// Run the loop forever. A scan overrunning the period delays the next
    /// tick instead of bursting, and the persist step runs every iteration.
    pub async fn run(mut self) {
        let period = Duration::from_secs(self.config.check_interval_seconds.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_cycle(Utc::now()).await;
        }
    }

    /// One full scan cycle at the given instant.
    async fn run_cycle(&mut self, now: DateTime<Utc>) {
        // The whitelist file is small; re-reading it each cycle keeps edits
        // live without a reload signal.
        let whitelist = Whitelist::load(Path::new(&self.config.whitelist_file));

        self.auto_unblock_expired(now).await;

        self.store.add_log(format!("[SCAN START] {}", rfc3339(&now)));

        let (mut ssh_fails, mut ftp_fails) = self.read_ssh_and_ftp();
        let mut apache_errors =
            parse_apache_errors(&mut self.tailer, Path::new(&self.config.apache_access_log_path));

        merge_events(&mut ssh_fails, self.simulator.drain(Service::Ssh));
        merge_events(&mut ftp_fails, self.simulator.drain(Service::Ftp));
        merge_events(&mut apache_errors, self.simulator.drain(Service::Apache));

        debug!(
            "monitor loop: ssh_ips={} ftp_ips={} apache_ips={}",
            ssh_fails.len(),
            ftp_fails.len(),
            apache_errors.len()
        );

        let mut events: HashMap<Service, HashMap<String, u64>> = HashMap::from([
            (Service::Ssh, ssh_fails),
            (Service::Ftp, ftp_fails),
            (Service::Apache, apache_errors),
        ]);

        let mut ctx = CycleContext {
            store: &self.store,
            firewall: self.firewall.as_ref(),
            geo: &mut self.geo,
        };
        for strategy in &mut self.strategies {
            let service_events = events.remove(&strategy.service()).unwrap_or_default();
            strategy
                .process(service_events, &self.config, now, &whitelist, &mut ctx)
                .await;
        }

        self.store
            .save_to_file(Path::new(&self.config.blocked_ips_file));
    }

    /// Read new SSH/FTP failures. When both services share one log file it
    /// is read once and the same lines feed both parsers.
    fn read_ssh_and_ftp(&mut self) -> (HashMap<String, u64>, HashMap<String, u64>) {
        if self.config.ssh_log_path == self.config.ftp_log_path {
            let path = Path::new(&self.config.ssh_log_path);
            let lines = match self.tailer.read_new_lines(path) {
                Ok(lines) => lines,
                Err(e) => {
                    debug!("auth: tailing {} failed: {:#}", path.display(), e);
                    Vec::new()
                }
            };
            (
                parse_ssh_failures_from_lines(&lines),
                parse_ftp_failures_from_lines(&lines),
            )
        } else {
            (
                parse_ssh_failures(&mut self.tailer, Path::new(&self.config.ssh_log_path)),
                parse_ftp_failures(&mut self.tailer, Path::new(&self.config.ftp_log_path)),
            )
        }
    }

    /// Release blocked addresses whose hold time has elapsed.
    ///
    /// The hold grows with the strike count: base, 3x, 5x, 7x base for
    /// strikes 1, 2, 3, 4. Strike history survives the release, so the next
    /// block of the same address holds longer.
    async fn auto_unblock_expired(&self, now: DateTime<Utc>) {
        if self.config.auto_unblock_minutes == 0 {
            return;
        }

        let base_secs = self.config.auto_unblock_minutes * 60;

        for entry in self.store.blocked_entries() {
            let strikes = u64::from(entry.strikes.max(1));
            let factor = 1 + (strikes - 1) * 2;
            let max_age_secs = base_secs * factor;

            let age_secs = now.signed_duration_since(entry.blocked_at).num_seconds();
            if age_secs >= 0 && age_secs as u64 >= max_age_secs {
                self.store.add_log(format!(
                    "[FW] Auto-unblock {} (age={}, strikes={}, max_age={})",
                    entry.ip,
                    format_duration(age_secs as u64),
                    strikes,
                    format_duration(max_age_secs)
                ));
                if let Err(e) = self.firewall.unblock(&entry.ip).await {
                    warn!("firewall: failed to unblock {}: {:#}", entry.ip, e);
                }
                self.store.remove_blocked(&entry.ip);
            }
        }
    }
}

fn merge_events(into: &mut HashMap<String, u64>, staged: HashMap<String, u64>) {
    for (ip, n) in staged {
        *into.entry(ip).or_insert(0) += n;
    }
}
