//! Address exemptions: the file-backed whitelist and the loopback/private
//! range predicate.
//!
//! Whitelist entries are matched exactly as written; entries containing a
//! `/` are additionally parsed as CIDR networks and exempt every address
//! they contain.

use ipnet::IpNet;
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;

/// Parsed whitelist: exact entries plus CIDR ranges.
#[derive(Debug, Default)]
pub struct Whitelist {
    exact: HashSet<String>,
    nets: Vec<IpNet>,
}

impl Whitelist {
    /// Load a whitelist file. Each line may contain an address or CIDR;
    /// `#` starts a comment to end of line and blank lines are ignored.
    /// A missing or unreadable file yields an empty whitelist.
    pub fn load(path: &Path) -> Self {
        let mut whitelist = Self::default();

        let Ok(data) = std::fs::read_to_string(path) else {
            return whitelist;
        };

        for raw in data.lines() {
            let entry = raw.split('#').next().unwrap_or("").trim();
            if entry.is_empty() {
                continue;
            }
            if entry.contains('/') {
                if let Ok(net) = entry.parse::<IpNet>() {
                    whitelist.nets.push(net);
                }
            }
            whitelist.exact.insert(entry.to_string());
        }

        whitelist
    }

    /// True if the trimmed address is whitelisted, either verbatim or by
    /// falling inside a CIDR entry.
    pub fn contains(&self, ip: &str) -> bool {
        let ip = ip.trim();
        if self.exact.contains(ip) {
            return true;
        }
        if self.nets.is_empty() {
            return false;
        }
        match ip.parse::<IpAddr>() {
            Ok(addr) => self.nets.iter().any(|net| net.contains(&addr)),
            Err(_) => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.nets.is_empty()
    }
}

/// True for loopback and private-range addresses (RFC1918 for IPv4,
/// fc00::/7 unique-local for IPv6). Unparseable input is not exempt.
pub fn is_loopback_or_private(ip: &str) -> bool {
    match ip.trim().parse::<IpAddr>() {
        Ok(addr) => addr_is_loopback_or_private(addr),
        Err(_) => false,
    }
}

pub(crate) fn addr_is_loopback_or_private(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private(),
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn whitelist_from(content: &str) -> Whitelist {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        Whitelist::load(file.path())
    }

    #[test]
    fn test_load_skips_comments_and_blanks() {
        let wl = whitelist_from(
            "# full comment line\n\
             203.0.113.9\n\
             \n\
             198.51.100.7  # trailing comment\n",
        );
        assert!(wl.contains("203.0.113.9"));
        assert!(wl.contains("198.51.100.7"));
        assert!(!wl.contains("192.0.2.1"));
    }

    #[test]
    fn test_missing_file_yields_empty() {
        let wl = Whitelist::load(Path::new("/nonexistent/whitelist.txt"));
        assert!(wl.is_empty());
        assert!(!wl.contains("203.0.113.9"));
    }

    #[test]
    fn test_contains_trims_lookup() {
        let wl = whitelist_from("203.0.113.9\n");
        assert!(wl.contains("  203.0.113.9  "));
    }

    #[test]
    fn test_cidr_entries_match_contained_addresses() {
        let wl = whitelist_from("203.0.113.0/24\n");
        assert!(wl.contains("203.0.113.200"));
        assert!(!wl.contains("203.0.114.1"));
        // The literal entry still matches exactly.
        assert!(wl.contains("203.0.113.0/24"));
    }

    #[test]
    fn test_non_ip_entries_match_exactly() {
        let wl = whitelist_from("build-host\n");
        assert!(wl.contains("build-host"));
        assert!(!wl.contains("build"));
    }

    #[test]
    fn test_loopback_and_private_ranges() {
        assert!(is_loopback_or_private("127.0.0.1"));
        assert!(is_loopback_or_private("10.0.0.5"));
        assert!(is_loopback_or_private("192.168.1.20"));
        assert!(is_loopback_or_private("172.16.0.1"));
        assert!(is_loopback_or_private("::1"));
        assert!(is_loopback_or_private("fc00::1"));
        assert!(is_loopback_or_private("fd12:3456::1"));
    }

    #[test]
    fn test_public_and_unparseable_are_not_private() {
        assert!(!is_loopback_or_private("8.8.8.8"));
        assert!(!is_loopback_or_private("203.0.113.9"));
        assert!(!is_loopback_or_private("2001:db8::1"));
        assert!(!is_loopback_or_private("unknown"));
        assert!(!is_loopback_or_private(""));
    }
}
