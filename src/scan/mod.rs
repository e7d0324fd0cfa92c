//! Log line scanning: per-service parsers and the shared address
//! extraction heuristic.

pub mod apache;
pub mod ftp;
pub mod ssh;

pub use apache::{parse_apache_errors, parse_apache_errors_from_lines};
pub use ftp::{parse_ftp_failures, parse_ftp_failures_from_lines};
pub use ssh::{parse_ssh_failures, parse_ssh_failures_from_lines};

/// Extract a client address from a log line using known patterns, in order:
/// an Apache `Client "…"` clause, an `rhost=` field, then a generic
/// `" from "` clause. Returns an empty string when nothing matches.
///
/// The result is trimmed but not validated as an IP literal.
pub fn extract_ip(line: &str) -> String {
    if let Some((_, rest)) = line.split_once("Client \"") {
        return rest.split('"').next().unwrap_or("").trim().to_string();
    }

    if let Some((_, rest)) = line.split_once("rhost=") {
        return rest
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
    }

    if let Some((_, rest)) = line.split_once(" from ") {
        return rest
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_apache_client_pattern() {
        let line = r#"[error] [client] AH01630: Client "203.0.113.9" denied by server configuration"#;
        assert_eq!(extract_ip(line), "203.0.113.9");
    }

    #[test]
    fn test_extract_rhost_pattern() {
        let line = "sshd[1023]: pam_unix(sshd:auth): authentication failure; rhost=198.51.100.7 user=root";
        assert_eq!(extract_ip(line), "198.51.100.7");
    }

    #[test]
    fn test_extract_from_pattern() {
        let line = "sshd[1023]: Failed password for root from 192.0.2.44 port 53222 ssh2";
        assert_eq!(extract_ip(line), "192.0.2.44");
    }

    #[test]
    fn test_rhost_wins_over_from() {
        let line = "vsftpd: authentication failure from somewhere; rhost=198.51.100.7";
        assert_eq!(extract_ip(line), "198.51.100.7");
    }

    #[test]
    fn test_no_pattern_yields_empty() {
        assert_eq!(extract_ip("plain message with no address"), "");
        assert_eq!(extract_ip(""), "");
    }

    #[test]
    fn test_dangling_markers_yield_empty() {
        assert_eq!(extract_ip("rhost= "), "");
        assert_eq!(extract_ip("trailing from "), "");
        assert_eq!(extract_ip(r#"Client ""#), "");
    }
}
