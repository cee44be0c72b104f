//! Tracked domains and the queries they are tested against.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// A domain under monitoring.
///
/// The host is normalized once at construction (lowercase, no scheme,
/// no `www.`, no port or path) so every comparison downstream is a plain
/// string comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedDomain {
    host: String,

    /// Owning account in the host application. Opaque to the engine.
    pub owner_id: Option<String>,

    /// Known titles of the domain's flagship content, used when an engine
    /// mentions the site by name rather than by URL.
    #[serde(default)]
    pub canonical_titles: Vec<String>,
}

impl TrackedDomain {
    /// Parse a bare host or a full URL into a tracked domain.
    pub fn parse(input: &str) -> ConfigResult<Self> {
        let host = normalize_host(input).ok_or_else(|| ConfigError::InvalidDomain {
            input: input.to_string(),
        })?;

        Ok(Self {
            host,
            owner_id: None,
            canonical_titles: Vec::new(),
        })
    }

    /// Set the owner id.
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Add a canonical content title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        if !title.trim().is_empty() {
            self.canonical_titles.push(title);
        }
        self
    }

    /// Normalized host, e.g. `example.com`.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// How a candidate host relates to this domain.
    pub fn match_host(&self, candidate: &str) -> HostMatch {
        let Some(candidate) = normalize_host(candidate) else {
            return HostMatch::None;
        };

        if candidate == self.host {
            HostMatch::Exact
        } else if candidate.ends_with(&format!(".{}", self.host)) {
            HostMatch::Subdomain
        } else {
            HostMatch::None
        }
    }
}

impl fmt::Display for TrackedDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host)
    }
}

/// Result of comparing a source host against a tracked domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMatch {
    /// Same host after normalization
    Exact,

    /// A subdomain of the tracked host (`blog.example.com`)
    Subdomain,

    /// Unrelated host
    None,
}

impl HostMatch {
    pub fn is_match(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Normalize a host or URL string.
///
/// Returns `None` when no host can be recovered.
pub fn normalize_host(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?.trim_end_matches('.').to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

    if host.is_empty() || (!host.contains('.') && host != "localhost") {
        return None;
    }

    Some(host)
}

/// One natural-language question to test against the engines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    pub text: String,

    /// Optional topic tag for grouping in reports
    pub topic: Option<String>,
}

impl Query {
    /// Create a query, rejecting blank text.
    pub fn new(text: impl Into<String>) -> ConfigResult<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(ConfigError::EmptyQuery);
        }
        Ok(Self { text, topic: None })
    }

    /// Tag the query with a topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_host() {
        let cases = [
            "example.com",
            "Example.COM",
            "www.example.com",
            "https://www.example.com/pricing?x=1",
            "http://example.com:8080/",
            "example.com.",
        ];
        for case in cases {
            let domain = TrackedDomain::parse(case).unwrap();
            assert_eq!(domain.host(), "example.com", "input: {}", case);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(TrackedDomain::parse("").is_err());
        assert!(TrackedDomain::parse("   ").is_err());
        assert!(TrackedDomain::parse("not a domain").is_err());
    }

    #[test]
    fn test_match_host() {
        let domain = TrackedDomain::parse("example.com").unwrap();
        assert_eq!(domain.match_host("https://WWW.example.com/a"), HostMatch::Exact);
        assert_eq!(domain.match_host("docs.example.com"), HostMatch::Subdomain);
        assert_eq!(domain.match_host("notexample.com"), HostMatch::None);
        assert_eq!(domain.match_host("example.com.evil.org"), HostMatch::None);
    }

    #[test]
    fn test_query_rejects_blank() {
        assert_eq!(Query::new("  "), Err(ConfigError::EmptyQuery));
        let q = Query::new("  best crm for startups ").unwrap();
        assert_eq!(q.text, "best crm for startups");
    }

    #[test]
    fn test_blank_titles_ignored() {
        let domain = TrackedDomain::parse("example.com")
            .unwrap()
            .with_title("")
            .with_title("The Example Guide");
        assert_eq!(domain.canonical_titles, vec!["The Example Guide".to_string()]);
    }
}
