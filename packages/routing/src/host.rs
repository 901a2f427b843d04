//! # Host Resolver
//!
//! Classifies a hostname by shape alone. Only the hostname component is
//! ever examined; anything that looks like it carries a scheme, a path or
//! credentials is refused outright.

use serde::Serialize;

/// Maximum length of one DNS label.
const MAX_LABEL_LEN: usize = 63;

/// Classification of an inbound hostname.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum HostKind {
    /// The platform's root domain
    Root,
    /// `www.` + root domain
    Www,
    /// The local development alias
    Local,
    /// Leftmost label of a host under the root domain (or local alias)
    Subdomain(String),
    /// Any other well-formed host; must be confirmed by lookup
    Custom(String),
}

impl HostKind {
    /// True for hosts that serve the marketing site rather than a tenant.
    pub fn is_platform(&self) -> bool {
        matches!(self, HostKind::Root | HostKind::Www | HostKind::Local)
    }
}

/// Shape-based hostname classifier.
#[derive(Debug, Clone)]
pub struct HostResolver {
    root_domain: String,
    www_domain: String,
    local_alias: String,
}

impl HostResolver {
    /// Create a resolver for `root_domain` (e.g. `sitekit.app`) with a
    /// local development alias (e.g. `localhost`).
    pub fn new(root_domain: impl AsRef<str>, local_alias: impl AsRef<str>) -> Self {
        let root_domain = normalize(root_domain.as_ref());
        Self {
            www_domain: format!("www.{root_domain}"),
            root_domain,
            local_alias: normalize(local_alias.as_ref()),
        }
    }

    pub fn root_domain(&self) -> &str {
        &self.root_domain
    }

    pub fn local_alias(&self) -> &str {
        &self.local_alias
    }

    /// Classify `host`. Returns `None` for anything that is not a bare,
    /// well-formed hostname (optionally followed by `:port`).
    pub fn resolve(&self, host: &str) -> Option<HostKind> {
        let host = normalize_host(host)?;

        if host == self.root_domain {
            return Some(HostKind::Root);
        }
        if host == self.www_domain {
            return Some(HostKind::Www);
        }
        if host == self.local_alias {
            return Some(HostKind::Local);
        }

        for suffix in [&self.root_domain, &self.local_alias] {
            if let Some(prefix) = strip_domain_suffix(&host, suffix) {
                // Only the leftmost label names the tenant, however deep the nesting.
                let label = prefix.split('.').next().unwrap_or(prefix);
                return Some(HostKind::Subdomain(label.to_string()));
            }
        }

        Some(HostKind::Custom(host))
    }
}

/// Returns the part of `host` in front of `.suffix`, if any.
fn strip_domain_suffix<'a>(host: &'a str, suffix: &str) -> Option<&'a str> {
    if suffix.is_empty() {
        return None;
    }
    host.strip_suffix(suffix)?
        .strip_suffix('.')
        .filter(|prefix| !prefix.is_empty())
}

fn normalize(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Strip `:port`, lowercase, drop a trailing FQDN dot and validate every
/// label. `None` when the input is not a plain hostname.
fn normalize_host(raw: &str) -> Option<String> {
    let host = match raw.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host,
        Some(_) => return None,
        None => raw,
    };

    let host = host.strip_suffix('.').unwrap_or(host).to_ascii_lowercase();
    if host.is_empty() || host.len() > 253 {
        return None;
    }

    host.split('.').all(is_valid_label).then_some(host)
}

/// DNS label rule: 1-63 of `[a-z0-9-]`, no leading or trailing hyphen.
/// Rejects `..`, path separators, `@`, `%`, whitespace and non-ASCII.
pub(crate) fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> HostResolver {
        HostResolver::new("root.tld", "local-alias")
    }

    #[test]
    fn test_platform_hosts() {
        let r = resolver();
        assert_eq!(r.resolve("root.tld"), Some(HostKind::Root));
        assert_eq!(r.resolve("www.root.tld"), Some(HostKind::Www));
        assert_eq!(r.resolve("local-alias"), Some(HostKind::Local));
        assert_eq!(r.resolve("ROOT.TLD"), Some(HostKind::Root));
        assert_eq!(r.resolve("root.tld."), Some(HostKind::Root));
    }

    #[test]
    fn test_port_is_stripped_before_classification() {
        let r = resolver();
        assert_eq!(r.resolve("root.tld:3000"), r.resolve("root.tld"));
        assert_eq!(
            r.resolve("x.root.tld:8080"),
            Some(HostKind::Subdomain("x".to_string()))
        );
        assert_eq!(r.resolve("local-alias:3000"), Some(HostKind::Local));
    }

    #[test]
    fn test_subdomain_takes_leftmost_label() {
        let r = resolver();
        assert_eq!(r.resolve("x.root.tld"), Some(HostKind::Subdomain("x".to_string())));
        assert_eq!(r.resolve("a.x.root.tld"), Some(HostKind::Subdomain("a".to_string())));
        assert_eq!(
            r.resolve("joes-pizza.local-alias"),
            Some(HostKind::Subdomain("joes-pizza".to_string()))
        );
    }

    #[test]
    fn test_non_matching_suffix_is_custom() {
        let r = resolver();
        assert_eq!(
            r.resolve("a.b.other.tld"),
            Some(HostKind::Custom("a.b.other.tld".to_string()))
        );
        // Shares the text but not the label boundary
        assert_eq!(
            r.resolve("evilroot.tld"),
            Some(HostKind::Custom("evilroot.tld".to_string()))
        );
        assert_eq!(
            r.resolve("Shop.Example.COM"),
            Some(HostKind::Custom("shop.example.com".to_string()))
        );
    }

    #[test]
    fn test_rejects_non_hostnames() {
        let r = resolver();
        for host in [
            "",
            "https://root.tld",
            "root.tld/../admin",
            "x..root.tld",
            ".root.tld",
            "user@root.tld",
            "root.tld:",
            "root.tld:abc",
            "x.root.tld%2f",
            "x root.tld",
            "[::1]:3000",
            "-x.root.tld",
            "bücher.example",
        ] {
            assert_eq!(r.resolve(host), None, "{host:?} should not resolve");
        }
    }

    #[test]
    fn test_rejects_overlong_label() {
        let r = resolver();
        let long = format!("{}.root.tld", "a".repeat(64));
        assert_eq!(r.resolve(&long), None);
        let ok = format!("{}.root.tld", "a".repeat(63));
        assert!(matches!(r.resolve(&ok), Some(HostKind::Subdomain(_))));
    }
}
