//! Expansion of host specifications into candidate hosts.
//!
//! A specification is a comma-separated list. Each entry is either a literal
//! host or a range whose last number runs from `N` to `M`:
//!
//! - `exasol1..3` → `exasol1`, `exasol2`, `exasol3`
//! - `node08..10` → `node08`, `node09`, `node10`
//! - `10.0.0.1..3` → `10.0.0.1`, `10.0.0.2`, `10.0.0.3`
//!
//! Entries that look like a range but have a non-numeric upper bound
//! (`exasol1..exasol3`, `exasolX..Y`) are kept as literal host names.
//! A range may yield at most [`MAX_RANGE_HOSTS`] hosts, and a range over
//! the last octet of an IPv4 address must stay within 0..=255.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ConnectionError;

/// `<prefix><N>..<M>` with a non-empty prefix.
static HOST_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)(\d+)\.\.(\d+)$").expect("host range pattern is valid"));

/// First three octets of an IPv4 address, dot included.
static IPV4_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.$").expect("ipv4 prefix pattern is valid")
});

/// Upper limit on the hosts one range entry expands to.
pub const MAX_RANGE_HOSTS: u64 = 1024;

/// Resolve a host specification into an ordered list of candidates.
///
/// Empty entries are skipped and surrounding whitespace is trimmed.
pub fn resolve_hosts(spec: &str) -> Result<Vec<String>, ConnectionError> {
    let mut hosts = Vec::new();

    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match parse_range(entry)? {
            Some(expanded) => hosts.extend(expanded),
            None => hosts.push(entry.to_string()),
        }
    }

    Ok(hosts)
}

/// Expand one range entry, or `None` if the entry is not a range.
fn parse_range(entry: &str) -> Result<Option<Vec<String>>, ConnectionError> {
    let Some(captures) = HOST_RANGE.captures(entry) else {
        return Ok(None);
    };

    let prefix = &captures[1];
    let low_text = &captures[2];
    let invalid = || ConnectionError::InvalidHostRange {
        range: entry.to_string(),
    };

    let (Ok(low), Ok(high)) = (low_text.parse::<u64>(), captures[3].parse::<u64>()) else {
        return Err(invalid());
    };

    if high < low || high - low >= MAX_RANGE_HOSTS {
        return Err(invalid());
    }
    if IPV4_PREFIX.is_match(prefix) && high > 255 {
        return Err(invalid());
    }

    let width = low_text.len();
    Ok(Some(
        (low..=high)
            .map(|n| format!("{}{:0width$}", prefix, n, width = width))
            .collect(),
    ))
}
