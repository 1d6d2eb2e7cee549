use std::fmt;

/// Header names whose values are masked whenever headers are displayed.
///
/// Matching is case-insensitive and by substring, so `X-ACCESS-KEY` is covered by `ACCESS-KEY`.
pub const SENSITIVE_HEADER_PATTERNS: &[&str] = &[
    "ACCESS-KEY",
    "ACCESS-SIGN",
    "ACCESS-SIGNATURE",
    "ACCESS-SECRET",
    "API-KEY",
    "API-SECRET",
    "APIKEY",
    "APISECRET",
    "AUTHORIZATION",
    "X-API-KEY",
    "X-API-SECRET",
    "X-AUTH-TOKEN",
    "X-MBX-APIKEY",
    "SIGNATURE",
];

const MASK: &str = "********";

/// Case-insensitive, insertion-ordered request headers that hide secrets on display.
///
/// `Debug` and `Display` show masked values; [`SecretHeaders::iter`] yields the real
/// values for the transport.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretHeaders {
    entries: Vec<(String, String)>,
}

impl SecretHeaders {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn is_sensitive(name: &str) -> bool {
        let upper = name.to_ascii_uppercase();
        SENSITIVE_HEADER_PATTERNS.iter().any(|pattern| upper.contains(pattern))
    }

    /// Insert or replace a header. Replacing keeps the original position but takes the new name casing.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx] = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.entries[idx].1.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|idx| self.entries.remove(idx).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Real names and values, for handing to the transport
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Names and masked values, for logs
    pub fn masked(&self) -> Vec<(String, String)> {
        self.entries.iter().map(|(name, value)| (name.clone(), Self::mask_value(name, value))).collect()
    }

    fn mask_value(name: &str, value: &str) -> String {
        if !Self::is_sensitive(name) {
            return value.to_string();
        }

        let mut chars = value.chars();
        let prefix: String = chars.by_ref().take(3).collect();
        if chars.next().is_some() {
            format!("{prefix}{MASK}")
        } else {
            "*".repeat(10)
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

impl<K, V> FromIterator<(K, V)> for SecretHeaders
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = SecretHeaders::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

impl fmt::Display for SecretHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (name, value)) in self.masked().iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{name}': '{value}'")?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for SecretHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretHeaders({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_values_masked_on_display() {
        let headers = SecretHeaders::new().with("ACCESS-KEY", "sk-1234567890").with("Content-Type", "application/json");

        let shown = headers.to_string();
        assert_eq!(shown, "{'ACCESS-KEY': 'sk-********', 'Content-Type': 'application/json'}");
        assert!(!format!("{headers:?}").contains("1234567890"));
    }

    #[test]
    fn test_short_secret_fully_masked() {
        let headers = SecretHeaders::new().with("Authorization", "abc");
        assert_eq!(headers.masked()[0].1, "**********");
    }

    #[test]
    fn test_real_values_available_to_transport() {
        let headers = SecretHeaders::new().with("X-MBX-APIKEY", "secret-value");
        let raw: Vec<_> = headers.iter().collect();
        assert_eq!(raw, vec![("X-MBX-APIKEY", "secret-value")]);
    }

    #[test]
    fn test_case_insensitive_lookup_and_replace() {
        let mut headers = SecretHeaders::new().with("Content-Type", "text/plain").with("Accept", "*/*");
        headers.insert("content-type", "application/json");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(headers.iter().next(), Some(("content-type", "application/json")));

        assert_eq!(headers.remove("accept"), Some("*/*".to_string()));
        assert!(!headers.contains("Accept"));
    }

    #[test]
    fn test_substring_detection() {
        assert!(SecretHeaders::is_sensitive("x-access-key"));
        assert!(SecretHeaders::is_sensitive("Request-Signature"));
        assert!(!SecretHeaders::is_sensitive("User-Agent"));
    }
}
