//! Per-service processing: counters, alerts, severity, and block decisions.
//!
//! SSH and FTP share one implementation parameterized by a small config
//! record; Apache gets its own since it rates a whole cycle rather than
//! accumulating per-address history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::warn;

use crate::config::Config;
use crate::firewall::FirewallBackend;
use crate::geo::GeoCache;
use crate::store::{Alert, Service, Severity, Store};
use crate::utils::rfc3339;
use crate::whitelist::{is_loopback_or_private, Whitelist};

/// Shared handles a strategy needs while processing one cycle.
pub struct CycleContext<'a> {
    pub store: &'a Store,
    pub firewall: &'a dyn FirewallBackend,
    pub geo: &'a mut GeoCache,
}

/// Service-specific logic: stats, alerts, blocking.
#[async_trait]
pub trait ServiceStrategy: Send {
    fn service(&self) -> Service;

    /// Handle the events detected in the current scan cycle.
    /// `events` maps address to the count of new events this cycle,
    /// already merged with staged simulator counts.
    async fn process(
        &mut self,
        events: HashMap<String, u64>,
        cfg: &Config,
        now: DateTime<Utc>,
        whitelist: &Whitelist,
        ctx: &mut CycleContext<'_>,
    );
}

/// Resolve the threshold for a service: a specific value if set, else the
/// global fallback if set, else the hardcoded default.
pub fn effective_threshold(specific: u32, global: u32, fallback: u32) -> u32 {
    if specific > 0 {
        specific
    } else if global > 0 {
        global
    } else {
        fallback
    }
}

/// Assign a severity from new events, the accumulated total and a threshold.
pub fn classify_severity(new_events: u64, total: u64, threshold: u32) -> Severity {
    let threshold = u64::from(threshold.max(1));

    // A strong spike in one cycle or reaching the limit is HIGH.
    if new_events >= threshold || total >= threshold {
        return Severity::High;
    }

    // Halfway to the threshold is MEDIUM.
    if total * 2 >= threshold {
        return Severity::Medium;
    }

    Severity::Low
}

async fn block_address(ctx: &mut CycleContext<'_>, ip: &str) {
    if let Err(e) = ctx.firewall.block(ip).await {
        warn!("firewall: failed to block {}: {:#}", ip, e);
    }
    ctx.store.add_blocked(ip);
}

/// Static description of a login-style service.
pub struct LoginServiceParams {
    pub service: Service,
    pub default_threshold: u32,
    pub specific_threshold: fn(&Config) -> u32,
}

/// Failed-login handling for SSH and FTP, with per-address running totals
/// accumulated across cycles.
pub struct LoginStrategy {
    params: LoginServiceParams,
    totals: HashMap<String, u64>,
}

impl LoginStrategy {
    pub fn ssh() -> Self {
        Self {
            params: LoginServiceParams {
                service: Service::Ssh,
                default_threshold: 3,
                specific_threshold: |cfg| cfg.ssh_max_failures,
            },
            totals: HashMap::new(),
        }
    }

    pub fn ftp() -> Self {
        Self {
            params: LoginServiceParams {
                service: Service::Ftp,
                default_threshold: 3,
                specific_threshold: |cfg| cfg.ftp_max_failures,
            },
            totals: HashMap::new(),
        }
    }
}

#[async_trait]
impl ServiceStrategy for LoginStrategy {
    fn service(&self) -> Service {
        self.params.service
    }

    async fn process(
        &mut self,
        events: HashMap<String, u64>,
        cfg: &Config,
        now: DateTime<Utc>,
        whitelist: &Whitelist,
        ctx: &mut CycleContext<'_>,
    ) {
        if events.is_empty() {
            return;
        }

        let service = self.params.service;
        let prefix = service.log_prefix();
        let threshold = effective_threshold(
            (self.params.specific_threshold)(cfg),
            cfg.max_failures,
            self.params.default_threshold,
        );

        for (ip, new_fails) in events {
            if new_fails == 0 {
                continue;
            }

            ctx.store.inc_by(service, new_fails);

            let total = {
                let entry = self.totals.entry(ip.clone()).or_insert(0);
                *entry += new_fails;
                *entry
            };

            ctx.store.add_log(format!(
                "{} {} new failed logins from {} (total={})",
                prefix, new_fails, ip, total
            ));

            let severity = classify_severity(new_fails, total, threshold);
            let country = ctx.geo.lookup(&ip).await;

            ctx.store.add_alert(Alert {
                timestamp: rfc3339(&now),
                service,
                ip: Some(ip.clone()),
                country: (!country.is_empty()).then_some(country),
                severity,
                message: format!(
                    "{} new {} failed logins from {} (total={})",
                    new_fails,
                    service.as_str().to_uppercase(),
                    ip,
                    total
                ),
            });

            if is_loopback_or_private(&ip) || whitelist.contains(&ip) {
                continue;
            }

            if total >= u64::from(threshold) {
                ctx.store.add_log(format!(
                    "{} Blocking {} (total fails={}, threshold={})",
                    prefix, ip, total, threshold
                ));
                block_address(ctx, &ip).await;
                if cfg.reset_totals_on_block {
                    self.totals.insert(ip, 0);
                }
            }
        }
    }
}

/// Apache error-rate handling. No cross-cycle totals; each cycle is rated
/// on its own counts.
pub struct ApacheStrategy;

impl ApacheStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ApacheStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceStrategy for ApacheStrategy {
    fn service(&self) -> Service {
        Service::Apache
    }

    async fn process(
        &mut self,
        events: HashMap<String, u64>,
        cfg: &Config,
        now: DateTime<Utc>,
        whitelist: &Whitelist,
        ctx: &mut CycleContext<'_>,
    ) {
        if events.is_empty() {
            return;
        }

        let threshold =
            effective_threshold(cfg.apache_error_threshold, cfg.max_failures, 10);

        let total_errors: u64 = events.values().sum();
        if total_errors == 0 {
            return;
        }

        ctx.store.inc_by(Service::Apache, total_errors);

        ctx.store.add_log(format!(
            "[APACHE] Errors detected this cycle: {} (ips={})",
            total_errors,
            events.len()
        ));

        for (ip, count) in events {
            let severity = classify_severity(count, count, threshold);
            let country = ctx.geo.lookup(&ip).await;

            ctx.store.add_alert(Alert {
                timestamp: rfc3339(&now),
                service: Service::Apache,
                ip: Some(ip.clone()),
                country: (!country.is_empty()).then_some(country),
                severity,
                message: format!("{} Apache 4xx/5xx errors from {} this cycle", count, ip),
            });

            if cfg.apache_block_on_threshold
                && !is_loopback_or_private(&ip)
                && !whitelist.contains(&ip)
                && count >= u64::from(threshold)
            {
                ctx.store.add_log(format!(
                    "[APACHE] Blocking {} (errors this cycle={}, threshold={})",
                    ip, count, threshold
                ));
                block_address(ctx, &ip).await;
            }
        }
    }
}
