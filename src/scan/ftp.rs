//! FTP failed-login parsing (vsftpd logs).

use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use super::extract_ip;
use crate::tailer::Tailer;

/// Aggregate failed FTP login attempts per address from raw log lines.
///
/// A line counts iff it comes from `vsftpd` and reports an authentication
/// failure.
pub fn parse_ftp_failures_from_lines(lines: &[String]) -> HashMap<String, u64> {
    let mut failures = HashMap::new();

    for raw in lines {
        let line = raw.trim();
        if line.is_empty() || !line.contains("vsftpd") {
            continue;
        }

        if line.contains("authentication failure") {
            let ip = extract_ip(line);
            if !ip.is_empty() {
                *failures.entry(ip).or_insert(0) += 1;
            }
        }
    }

    failures
}

/// Read new FTP log lines from disk and return per-address failure counts.
pub fn parse_ftp_failures(tailer: &mut Tailer, path: &Path) -> HashMap<String, u64> {
    match tailer.read_new_lines(path) {
        Ok(lines) if !lines.is_empty() => parse_ftp_failures_from_lines(&lines),
        Ok(_) => HashMap::new(),
        Err(e) => {
            debug!("ftp: tailing {} failed: {:#}", path.display(), e);
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
    fn test_counts_auth_failures_per_ip() {
        let input = lines(&[
            "Jan  1 vsftpd: pam_unix(vsftpd:auth): authentication failure; rhost=203.0.113.9",
            "Jan  1 vsftpd: pam_unix(vsftpd:auth): authentication failure; rhost=203.0.113.9",
        ]);
        let failures = parse_ftp_failures_from_lines(&input);
        assert_eq!(failures.get("203.0.113.9"), Some(&2));
    }

    #[test]
    fn test_ignores_sshd_failures() {
        let input = lines(&[
            "Jan  1 sshd[10]: pam_unix(sshd:auth): authentication failure; rhost=203.0.113.9",
        ]);
        assert!(parse_ftp_failures_from_lines(&input).is_empty());
    }

    #[test]
    fn test_ignores_successful_logins() {
        let input = lines(&["Jan  1 vsftpd: OK LOGIN: Client \"203.0.113.9\""]);
        assert!(parse_ftp_failures_from_lines(&input).is_empty());
    }
}
