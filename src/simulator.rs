//! Staged-event buffers for operator-injected failures.
//!
//! The inspection API stages events here; the monitor loop drains each
//! buffer exactly once per cycle and merges the counts into the parser
//! output for the matching service.

use std::collections::HashMap;
use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::store::Service;

#[derive(Debug, Default)]
struct Buffers {
    ssh: HashMap<String, u64>,
    ftp: HashMap<String, u64>,
    apache: HashMap<String, u64>,
}

impl Buffers {
    fn for_service(&mut self, service: Service) -> &mut HashMap<String, u64> {
        match service {
            Service::Ssh => &mut self.ssh,
            Service::Ftp => &mut self.ftp,
            Service::Apache => &mut self.apache,
        }
    }
}

/// Thread-safe staging area for simulated events, one buffer per service.
#[derive(Debug, Default)]
pub struct Simulator {
    inner: Mutex<Buffers>,
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Buffers> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stage `n` events for an address. Zero counts and empty addresses are
    /// ignored.
    pub fn add(&self, service: Service, ip: &str, n: u64) {
        let ip = ip.trim();
        if n == 0 || ip.is_empty() {
            return;
        }
        *self
            .lock()
            .for_service(service)
            .entry(ip.to_string())
            .or_insert(0) += n;
    }

    /// Atomically take the staged events for a service, leaving the buffer
    /// empty. Each staged event is observed by exactly one drain.
    pub fn drain(&self, service: Service) -> HashMap<String, u64> {
        mem::take(self.lock().for_service(service))
    }
}
