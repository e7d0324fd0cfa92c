//! SSH failed-login parsing.

use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use super::extract_ip;
use crate::tailer::Tailer;

/// Aggregate failed SSH login attempts per address from raw log lines.
///
/// A line counts iff it comes from `sshd` and reports a failed password.
pub fn parse_ssh_failures_from_lines(lines: &[String]) -> HashMap<String, u64> {
    let mut failures = HashMap::new();

    for raw in lines {
        let line = raw.trim();
        if line.is_empty() || !line.contains("sshd") {
            continue;
        }

        if line.contains("Failed password") {
            let ip = extract_ip(line);
            if !ip.is_empty() {
                *failures.entry(ip).or_insert(0) += 1;
            }
        }
    }

    failures
}

/// Read new SSH log lines from disk and return per-address failure counts.
/// Read failures degrade to an empty cycle for this path.
pub fn parse_ssh_failures(tailer: &mut Tailer, path: &Path) -> HashMap<String, u64> {
    match tailer.read_new_lines(path) {
        Ok(lines) if !lines.is_empty() => parse_ssh_failures_from_lines(&lines),
        Ok(_) => HashMap::new(),
        Err(e) => {
            debug!("ssh: tailing {} failed: {:#}", path.display(), e);
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_counts_failed_passwords_per_ip() {
        let input = lines(&[
            "Jan  1 sshd[10]: Failed password for root from 203.0.113.9 port 22 ssh2",
            "Jan  1 sshd[10]: Failed password for admin from 203.0.113.9 port 22 ssh2",
            "Jan  1 sshd[10]: Failed password for root from 198.51.100.7 port 22 ssh2",
        ]);
        let failures = parse_ssh_failures_from_lines(&input);
        assert_eq!(failures.get("203.0.113.9"), Some(&2));
        assert_eq!(failures.get("198.51.100.7"), Some(&1));
    }

    #[test]
    fn test_ignores_non_sshd_lines() {
        let input = lines(&[
            "Jan  1 cron[9]: Failed password for root from 203.0.113.9",
            "Jan  1 sshd[10]: Accepted password for root from 203.0.113.9 port 22",
        ]);
        assert!(parse_ssh_failures_from_lines(&input).is_empty());
    }

    #[test]
    fn test_ignores_lines_without_address() {
        let input = lines(&["Jan  1 sshd[10]: Failed password for invalid user"]);
        assert!(parse_ssh_failures_from_lines(&input).is_empty());
    }

    #[test]
    fn test_skips_blank_lines() {
        let input = lines(&["", "   ", "\t"]);
        assert!(parse_ssh_failures_from_lines(&input).is_empty());
    }
}
