//! Apache access-log error parsing.

use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use super::extract_ip;
use crate::tailer::Tailer;

/// True when the access-log line carries an error status we track.
fn is_error_line(line: &str) -> bool {
    line.contains(" 404 ") || line.contains(" 500 ")
}

/// Extract the client address from a combined-format access line: the first
/// whitespace-delimited field, with the literal `-` treated as missing.
fn access_log_ip(line: &str) -> String {
    let ip = line.split_whitespace().next().unwrap_or("").trim();
    if ip == "-" {
        return String::new();
    }
    ip.to_string()
}

/// Aggregate tracked error responses per client address from raw lines.
///
/// Addresses missing from the first field fall back to the generic
/// extraction heuristic, then to the `unknown` bucket.
pub fn parse_apache_errors_from_lines(lines: &[String]) -> HashMap<String, u64> {
    let mut errors_by_ip = HashMap::new();

    for raw in lines {
        let line = raw.trim();
        if line.is_empty() || !is_error_line(line) {
            continue;
        }

        let mut ip = access_log_ip(line);
        if ip.is_empty() {
            ip = extract_ip(line);
        }
        if ip.is_empty() {
            ip = "unknown".to_string();
        }

        debug!("apache: matched error from {}: {}", ip, line);
        *errors_by_ip.entry(ip).or_insert(0) += 1;
    }

    errors_by_ip
}

/// Read new access-log lines from disk and return per-address error counts.
pub fn parse_apache_errors(tailer: &mut Tailer, path: &Path) -> HashMap<String, u64> {
    match tailer.read_new_lines(path) {
        Ok(lines) if !lines.is_empty() => parse_apache_errors_from_lines(&lines),
        Ok(_) => HashMap::new(),
        Err(e) => {
            debug!("apache: tailing {} failed: {:#}", path.display(), e);
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
    fn test_counts_404_and_500_per_ip() {
        let input = lines(&[
            r#"203.0.113.9 - - [01/Jan/2026:00:00:01 +0000] "GET /admin HTTP/1.1" 404 196"#,
            r#"203.0.113.9 - - [01/Jan/2026:00:00:02 +0000] "GET /api HTTP/1.1" 500 310"#,
            r#"198.51.100.7 - - [01/Jan/2026:00:00:03 +0000] "GET / HTTP/1.1" 200 1043"#,
        ]);
        let errors = parse_apache_errors_from_lines(&input);
        assert_eq!(errors.get("203.0.113.9"), Some(&2));
        assert!(!errors.contains_key("198.51.100.7"));
    }

    #[test]
    fn test_status_must_be_space_delimited() {
        let input = lines(&[r#"203.0.113.9 - - "GET /file4040 HTTP/1.1" 200 17"#]);
        assert!(parse_apache_errors_from_lines(&input).is_empty());
    }

    #[test]
    fn test_dash_falls_back_to_extraction() {
        let input = lines(&[
            r#"- - - [01/Jan/2026:00:00:01 +0000] "GET /x HTTP/1.1" 404 196 Client "203.0.113.9" denied"#,
        ]);
        let errors = parse_apache_errors_from_lines(&input);
        assert_eq!(errors.get("203.0.113.9"), Some(&1));
    }

    #[test]
    fn test_unresolvable_address_uses_unknown_bucket() {
        let input = lines(&[r#"- - - "GET /x HTTP/1.1" 404 196"#]);
        let errors = parse_apache_errors_from_lines(&input);
        assert_eq!(errors.get("unknown"), Some(&1));
    }
}
