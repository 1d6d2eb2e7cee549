//! Counter-store key layout shared with every other client of the same store.
//!
//! Keys look like `RATE_LIMIT:URL_PATTERN:PATTERN_1A2B3C4D:WINDOW:5364864` and are always
//! uppercased. The layout must stay bit-exact: implementations in other languages read
//! and write the same keys.

use sha1::Digest;
use sha1::Sha1;

pub const DEFAULT_KEY_PREFIX: &str = "RATE_LIMIT:URL_PATTERN";

const WINDOW_MARKER: &str = "WINDOW";

#[inline]
pub fn window_for_timestamp(unix_secs: u64, window_seconds: u64) -> u64 {
    unix_secs / window_seconds
}

pub fn build_key(key_prefix: &str, label: &str, window_seconds: u64, unix_secs: u64) -> String {
    let window = window_for_timestamp(unix_secs, window_seconds);
    format!("{key_prefix}:{label}:{WINDOW_MARKER}:{window}").to_uppercase()
}

/// Label derived from a pattern set: `PATTERN_` plus the first 8 hex chars of
/// SHA-1 over the sorted patterns joined by commas.
pub fn label_for_patterns<S: AsRef<str>>(patterns: &[S]) -> String {
    let mut sorted: Vec<&str> = patterns.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    let digest = Sha1::digest(sorted.join(",").as_bytes());
    let hex = hex::encode(digest);
    format!("PATTERN_{}", &hex[..8])
}

/// Glob for SCAN/KEYS over stored windows; omitted parts become `*`
pub fn search_pattern(key_prefix: &str, label: Option<&str>, window: Option<u64>) -> String {
    let label = label.unwrap_or("*");
    let window = window.map(|w| w.to_string()).unwrap_or_else(|| "*".to_string());
    format!("{key_prefix}:{label}:{WINDOW_MARKER}:{window}").to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub prefix: String,
    pub label: String,
    pub window: u64,
}

/// Split a stored key back into prefix, label and window.
///
/// The prefix is the first two segments when the second one contains `URL_PATTERN`
/// (the default prefix), otherwise the first segment. Labels may contain colons.
pub fn parse_key(key: &str) -> Option<ParsedKey> {
    let upper = key.to_uppercase();
    let parts: Vec<&str> = upper.split(':').collect();
    if parts.len() < 4 {
        return None;
    }

    let window_index = (1..parts.len()).rev().find(|&i| parts[i - 1] == WINDOW_MARKER)?;
    let window: u64 = parts[window_index].parse().ok()?;

    let head = &parts[..window_index - 1];
    if head.len() < 2 {
        return None;
    }

    let (prefix, label) = if parts[1].contains("URL_PATTERN") {
        (parts[..2].join(":"), head.get(2..).map(|rest| rest.join(":")).unwrap_or_default())
    } else {
        (parts[0].to_string(), head[1..].join(":"))
    };

    Some(ParsedKey { prefix, label, window })
}

/// One fixed window of one limiter, derived from the clock rather than stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitWindow {
    pub key_prefix: String,
    pub label: String,
    pub window_seconds: u64,
    pub window_index: u64,
}

impl RateLimitWindow {
    pub fn at(key_prefix: &str, label: &str, window_seconds: u64, unix_secs: u64) -> Self {
        Self {
            key_prefix: key_prefix.to_string(),
            label: label.to_string(),
            window_seconds,
            window_index: window_for_timestamp(unix_secs, window_seconds),
        }
    }

    pub fn key(&self) -> String {
        format!("{}:{}:{WINDOW_MARKER}:{}", self.key_prefix, self.label, self.window_index).to_uppercase()
    }

    pub fn start_secs(&self) -> u64 {
        self.window_index * self.window_seconds
    }

    /// Unix second at which the next window starts
    pub fn end_secs(&self) -> u64 {
        (self.window_index + 1) * self.window_seconds
    }

    pub fn seconds_remaining(&self, unix_secs: u64) -> u64 {
        self.end_secs().saturating_sub(unix_secs)
    }

    /// Stale windows expire on their own after two window lengths
    pub fn ttl_seconds(&self) -> u64 {
        self.window_seconds * 2
    }
}
