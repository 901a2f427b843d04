//! # Domain Table
//!
//! Persisted host → business bindings. Subdomain names and custom hosts
//! are globally unique; a business holds at most one active binding of
//! each kind.
//!
//! Writes take the table's write lock, so two businesses racing for the
//! same name are serialized and the loser gets `Conflict`. Reads take the
//! read lock only long enough to clone one entry.

use crate::host::{is_valid_label, HostKind, HostResolver};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitekit_common::{BusinessId, SiteError, SiteResult};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

/// How many numbered suffixes `generate_subdomain` tries before giving up.
const MAX_GENERATE_ATTEMPTS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    Subdomain,
    Custom,
}

/// A host bound to a business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub kind: DomainKind,
    /// Subdomain label (`joes-pizza`) or full custom host (`joespizza.com`)
    pub host: String,
    pub business_id: BusinessId,
    pub claimed_at: DateTime<Utc>,
}

/// Lookup seam used by the tenant router.
pub trait DomainLookup: Send + Sync {
    fn find(&self, kind: DomainKind, host: &str) -> impl Future<Output = Option<Domain>> + Send;
}

impl<T: DomainLookup> DomainLookup for Arc<T> {
    fn find(&self, kind: DomainKind, host: &str) -> impl Future<Output = Option<Domain>> + Send {
        (**self).find(kind, host)
    }
}

#[derive(Default)]
struct DomainIndex {
    subdomains: HashMap<String, Domain>,
    custom: HashMap<String, Domain>,
}

impl DomainIndex {
    fn map(&self, kind: DomainKind) -> &HashMap<String, Domain> {
        match kind {
            DomainKind::Subdomain => &self.subdomains,
            DomainKind::Custom => &self.custom,
        }
    }

    fn map_mut(&mut self, kind: DomainKind) -> &mut HashMap<String, Domain> {
        match kind {
            DomainKind::Subdomain => &mut self.subdomains,
            DomainKind::Custom => &mut self.custom,
        }
    }

    /// Bind `host` to `business`, replacing the business's previous binding
    /// of the same kind. The existing binding is untouched on conflict.
    fn bind(&mut self, kind: DomainKind, host: String, business: &BusinessId) -> SiteResult<Domain> {
        if let Some(existing) = self.map(kind).get(&host) {
            if &existing.business_id == business {
                return Ok(existing.clone());
            }
            return Err(SiteError::conflict(format!("{host} is already claimed")));
        }

        let map = self.map_mut(kind);
        map.retain(|_, d| &d.business_id != business);

        let domain = Domain {
            kind,
            host: host.clone(),
            business_id: business.clone(),
            claimed_at: Utc::now(),
        };
        map.insert(host, domain.clone());
        Ok(domain)
    }
}

/// In-memory domain table with write-time uniqueness.
pub struct DomainTable {
    resolver: HostResolver,
    reserved: HashSet<String>,
    index: RwLock<DomainIndex>,
}

impl DomainTable {
    pub fn new(resolver: HostResolver, reserved: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            resolver,
            reserved: reserved.into_iter().map(Into::into).collect(),
            index: RwLock::new(DomainIndex::default()),
        }
    }

    pub fn resolver(&self) -> &HostResolver {
        &self.resolver
    }

    /// Claim `name` as the business's subdomain.
    ///
    /// Idempotent for the current holder. A business that already holds a
    /// different subdomain gives it up in the same write.
    pub fn claim_subdomain(&self, business: &BusinessId, name: &str) -> SiteResult<Domain> {
        let name = name.trim().to_ascii_lowercase();
        self.validate_subdomain(&name)?;

        let domain = self
            .index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .bind(DomainKind::Subdomain, name, business)
            .inspect_err(|e| tracing::info!(business_id = %business, error = %e, "subdomain claim rejected"))?;

        tracing::info!(business_id = %business, subdomain = %domain.host, "subdomain claimed");
        Ok(domain)
    }

    /// Bind an externally owned host to the business.
    pub fn link_custom_domain(&self, business: &BusinessId, host: &str) -> SiteResult<Domain> {
        let host = match self.resolver.resolve(host) {
            Some(HostKind::Custom(host)) => host,
            Some(_) => {
                return Err(SiteError::validation("host", "platform hosts cannot be linked as custom domains"))
            }
            None => return Err(SiteError::validation("host", "not a valid hostname")),
        };
        if !host.contains('.') {
            return Err(SiteError::validation("host", "custom domains need at least two labels"));
        }

        let domain = self
            .index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .bind(DomainKind::Custom, host, business)?;

        tracing::info!(business_id = %business, host = %domain.host, "custom domain linked");
        Ok(domain)
    }

    /// Release a binding. Only the owning business may release it.
    pub fn release(&self, business: &BusinessId, kind: DomainKind, host: &str) -> SiteResult<Domain> {
        let host = host.trim().to_ascii_lowercase();
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        let map = index.map_mut(kind);

        match map.get(&host).map(|d| d.business_id.clone()) {
            None => Err(SiteError::not_found("domain", &host)),
            Some(owner) if &owner != business => {
                Err(SiteError::unauthorized(format!("{host} belongs to another business")))
            }
            Some(_) => {
                let released = map.remove(&host).ok_or_else(|| SiteError::not_found("domain", &host))?;
                tracing::info!(business_id = %business, host = %host, "domain released");
                Ok(released)
            }
        }
    }

    /// Slugify `display_name` and claim it, appending `-2`, `-3`, ... until
    /// a free name is found.
    pub fn generate_subdomain(&self, business: &BusinessId, display_name: &str) -> SiteResult<Domain> {
        let base = slugify(display_name);
        let base = if base.is_empty() || self.reserved.contains(&base) {
            fallback_label(business)
        } else {
            base
        };

        for attempt in 1..=MAX_GENERATE_ATTEMPTS {
            let candidate = if attempt == 1 {
                base.clone()
            } else {
                let suffix = format!("-{attempt}");
                let stem = truncate_label(&base, 63 - suffix.len());
                format!("{stem}{suffix}")
            };

            match self.claim_subdomain(business, &candidate) {
                Err(e) if e.is_conflict() => continue,
                other => return other,
            }
        }

        Err(SiteError::conflict(format!(
            "no free subdomain derived from {base:?}"
        )))
    }

    pub fn lookup(&self, kind: DomainKind, host: &str) -> Option<Domain> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        let map = index.map(kind);
        map.get(host).cloned().or_else(|| {
            // www.joespizza.com serves the same site as joespizza.com
            match kind {
                DomainKind::Custom => host.strip_prefix("www.").and_then(|bare| map.get(bare).cloned()),
                DomainKind::Subdomain => None,
            }
        })
    }

    pub fn domains_for(&self, business: &BusinessId) -> Vec<Domain> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        let mut domains: Vec<Domain> = index
            .subdomains
            .values()
            .chain(index.custom.values())
            .filter(|d| &d.business_id == business)
            .cloned()
            .collect();
        domains.sort_by_key(|d| d.kind == DomainKind::Custom);
        domains
    }

    fn validate_subdomain(&self, name: &str) -> SiteResult<()> {
        if !is_valid_label(name) {
            return Err(SiteError::validation(
                "subdomain",
                "use 1-63 lowercase letters, digits or hyphens",
            ));
        }
        if self.reserved.contains(name) {
            return Err(SiteError::validation("subdomain", format!("{name} is reserved")));
        }
        Ok(())
    }
}

impl DomainLookup for DomainTable {
    fn find(&self, kind: DomainKind, host: &str) -> impl Future<Output = Option<Domain>> + Send {
        let found = self.lookup(kind, host);
        async move { found }
    }
}

/// Turn a display name into a URL-safe subdomain label.
///
/// `"Joe's Pizza & Grill"` → `"joe-s-pizza-grill"`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    truncate_label(&slug, 63).to_string()
}

/// `site-<id>` for names that yield no usable label. Ids with nothing
/// slug-worthy get a checksum stem instead.
fn fallback_label(business: &BusinessId) -> String {
    let id = slugify(business.as_str());
    let stem = if id.is_empty() {
        format!("{:08x}", crc32fast::hash(business.as_str().as_bytes()))
    } else {
        id
    };
    truncate_label(&format!("site-{stem}"), 63).to_string()
}

fn truncate_label(label: &str, max: usize) -> &str {
    // Slugs are ASCII, so byte slicing is safe.
    label[..label.len().min(max)].trim_end_matches('-')
}
