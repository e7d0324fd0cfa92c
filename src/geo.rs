//! Country lookups for alert enrichment, memoized for the process lifetime.
//!
//! The cache is owned by the monitor loop and must not be shared across
//! tasks; lookups from anywhere else would need their own serialization.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

use crate::whitelist::addr_is_loopback_or_private;

const GEO_ENDPOINT: &str = "http://ip-api.com/json";

/// Lookups are best-effort; a slow upstream must not stall the scan cycle.
const TIMEOUT_SECS: u64 = 2;

/// Subset of the geolocation service response we care about.
#[derive(Debug, Deserialize)]
struct GeoResponse {
    status: String,
    #[serde(default)]
    country: String,
    #[serde(default, rename = "countryCode")]
    country_code: String,
}

/// Memoized address-to-country resolver.
pub struct GeoCache {
    client: Client,
    cache: HashMap<String, String>,
    endpoint: String,
}

impl GeoCache {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(format!("securemonitor/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client for geo lookups")?;
        Ok(Self {
            client,
            cache: HashMap::new(),
            endpoint: GEO_ENDPOINT.to_string(),
        })
    }

    /// Resolve the country label for an address:
    /// - loopback/private addresses resolve to `"Local"`,
    /// - empty or unparseable input resolves to `""`,
    /// - lookup failures are cached as `""` and never retried.
    pub async fn lookup(&mut self, ip: &str) -> String {
        let ip = ip.trim();
        if ip.is_empty() {
            return String::new();
        }

        let Ok(addr) = ip.parse::<IpAddr>() else {
            return String::new();
        };
        if addr_is_loopback_or_private(addr) {
            return "Local".to_string();
        }

        if let Some(cached) = self.cache.get(ip) {
            return cached.clone();
        }

        let label = match self.fetch_label(ip).await {
            Ok(label) => label,
            Err(e) => {
                debug!("geo: lookup failed for {}: {:#}", ip, e);
                String::new()
            }
        };
        self.cache.insert(ip.to_string(), label.clone());
        label
    }

    async fn fetch_label(&self, ip: &str) -> Result<String> {
        let url = format!(
            "{}/{}?fields=status,country,countryCode",
            self.endpoint, ip
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("geo request failed")?;
        let data: GeoResponse = response
            .json()
            .await
            .context("geo response decode failed")?;

        if data.status != "success" {
            return Ok(String::new());
        }

        let mut label = data.country;
        if !data.country_code.is_empty() {
            label = format!("{} ({})", label, data.country_code);
        }
        Ok(label)
    }

    /// Seed the cache directly, bypassing the network.
    #[cfg(test)]
    pub(crate) fn prime(&mut self, ip: &str, label: &str) {
        self.cache.insert(ip.to_string(), label.to_string());
    }
}
