use glob::Pattern;

/// Host pattern for matching stored credentials against a page
#[derive(Debug, Clone)]
pub enum HostPattern {
    /// Exact hostname match (case-insensitive)
    Exact(String),
    /// Glob pattern match (e.g., *.example.com)
    Glob(Pattern),
}

impl HostPattern {
    /// Parse a host pattern.
    ///
    /// A pattern containing '*' or '?' is a glob, anything else an exact
    /// host. A leading `www.` is dropped, as it is from matched hosts.
    pub fn parse(pattern: &str) -> crate::Result<Self> {
        let pattern_lower = strip_www(pattern.trim()).to_lowercase();
        if pattern_lower.is_empty() {
            return Err(crate::Error::InvalidPattern("empty host pattern".to_string()));
        }
        if pattern_lower.contains('*') || pattern_lower.contains('?') {
            let glob_pattern = Pattern::new(&pattern_lower).map_err(|e| {
                crate::Error::InvalidPattern(format!("'{}': {}", pattern, e))
            })?;
            Ok(HostPattern::Glob(glob_pattern))
        } else {
            Ok(HostPattern::Exact(pattern_lower))
        }
    }

    pub fn matches(&self, hostname: &str) -> bool {
        let hostname_lower = strip_www(hostname).to_lowercase();
        match self {
            HostPattern::Exact(pattern) => &hostname_lower == pattern,
            HostPattern::Glob(pattern) => pattern.matches(&hostname_lower),
        }
    }
}

fn strip_www(host: &str) -> &str {
    match host.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("www.") => &host[4..],
        _ => host,
    }
}
