//! Host firewall enforcement via `ufw`.
//!
//! The backend reflects intent, not kernel reality: callers log failures and
//! carry on, and the blocked map is updated regardless of whether the rule
//! actually landed.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::cmd::{args_to_strings, CommandExecutor, RealCommandExecutor};

const UFW_BIN: &str = "/usr/sbin/ufw";

/// Trait for firewall backends.
#[async_trait]
pub trait FirewallBackend: Send + Sync {
    /// Add a deny rule for the given address. Empty addresses are no-ops.
    async fn block(&self, ip: &str) -> Result<()>;

    /// Remove the deny rule for the given address. Empty addresses are
    /// no-ops.
    async fn unblock(&self, ip: &str) -> Result<()>;
}

/// `ufw`-based backend.
pub struct UfwFirewall {
    executor: Box<dyn CommandExecutor>,
}

impl UfwFirewall {
    pub fn new() -> Self {
        Self::with_executor(Box::new(RealCommandExecutor::new()))
    }

    pub fn with_executor(executor: Box<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    fn run_rule(&self, args: &[&str]) -> Result<()> {
        let output = self.executor.execute(UFW_BIN, &args_to_strings(args))?;
        if !output.success {
            anyhow::bail!("ufw {} failed: {}", args.join(" "), output.stderr.trim());
        }
        Ok(())
    }
}

impl Default for UfwFirewall {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FirewallBackend for UfwFirewall {
    async fn block(&self, ip: &str) -> Result<()> {
        let ip = ip.trim();
        if ip.is_empty() {
            debug!("firewall: empty ip, skipping block");
            return Ok(());
        }

        self.run_rule(&["deny", "from", ip])?;
        info!("firewall: blocked {}", ip);
        Ok(())
    }

    async fn unblock(&self, ip: &str) -> Result<()> {
        let ip = ip.trim();
        if ip.is_empty() {
            debug!("firewall: empty ip, skipping unblock");
            return Ok(());
        }

        self.run_rule(&["delete", "deny", "from", ip])?;
        info!("firewall: unblocked {}", ip);
        Ok(())
    }
}

/// Check that the process runs with effective UID 0.
///
/// Manipulating firewall rules requires root (or CAP_NET_ADMIN); the daemon
/// can still scan and alert without it, so callers decide how hard to fail.
pub fn check_root() -> Result<()> {
    // SAFETY: geteuid() reads the effective user ID, has no preconditions,
    // never fails, and modifies no state.
    let euid = unsafe { libc::geteuid() };

    if euid != 0 {
        anyhow::bail!(
            "firewall enforcement requires root privileges; run with sudo or \
             grant CAP_NET_ADMIN"
        )
    }
    Ok(())
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Recording backend for tests.
    #[derive(Default)]
    pub struct MockFirewall {
        pub blocked: Mutex<Vec<String>>,
        pub unblocked: Mutex<Vec<String>>,
    }

    impl MockFirewall {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn blocked_ips(&self) -> Vec<String> {
            self.blocked.lock().unwrap().clone()
        }

        pub fn unblocked_ips(&self) -> Vec<String> {
            self.unblocked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FirewallBackend for MockFirewall {
        async fn block(&self, ip: &str) -> Result<()> {
            self.blocked.lock().unwrap().push(ip.to_string());
            Ok(())
        }

        async fn unblock(&self, ip: &str) -> Result<()> {
            self.unblocked.lock().unwrap().push(ip.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::{CommandOutput, MockCommandExecutor};

    fn ok_output() -> CommandOutput {
        CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            success: true,
            code: Some(0),
        }
    }

    #[tokio::test]
    async fn test_block_invokes_ufw_deny() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute()
            .withf(|cmd, args| {
                cmd == UFW_BIN && args == ["deny", "from", "203.0.113.9"].map(String::from)
            })
            .times(1)
            .returning(|_, _| Ok(ok_output()));

        let fw = UfwFirewall::with_executor(Box::new(executor));
        assert!(fw.block("203.0.113.9").await.is_ok());
    }

    #[tokio::test]
    async fn test_unblock_invokes_ufw_delete_deny() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute()
            .withf(|cmd, args| {
                cmd == UFW_BIN
                    && args == ["delete", "deny", "from", "203.0.113.9"].map(String::from)
            })
            .times(1)
            .returning(|_, _| Ok(ok_output()));

        let fw = UfwFirewall::with_executor(Box::new(executor));
        assert!(fw.unblock("203.0.113.9").await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_ip_is_a_no_op() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute().times(0);

        let fw = UfwFirewall::with_executor(Box::new(executor));
        assert!(fw.block("").await.is_ok());
        assert!(fw.block("   ").await.is_ok());
        assert!(fw.unblock("").await.is_ok());
    }

    #[tokio::test]
    async fn test_command_failure_surfaces_stderr() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute().returning(|_, _| {
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: "ERROR: permission denied".to_string(),
                success: false,
                code: Some(1),
            })
        });

        let fw = UfwFirewall::with_executor(Box::new(executor));
        let err = fw.block("203.0.113.9").await.unwrap_err();
        assert!(err.to_string().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_mock_firewall_records_calls() {
        let fw = mock::MockFirewall::new();
        fw.block("203.0.113.9").await.unwrap();
        fw.unblock("203.0.113.9").await.unwrap();
        assert_eq!(fw.blocked_ips(), vec!["203.0.113.9"]);
        assert_eq!(fw.unblocked_ips(), vec!["203.0.113.9"]);
    }
}
