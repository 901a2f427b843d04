//! # Tenant Router
//!
//! Turns a host header into a [`Route`]. Tenant hosts are confirmed by a
//! [`DomainLookup`] bounded by a timeout; a slow or failing lookup is a
//! routing miss, never a hung request.

use crate::domain::{Domain, DomainKind, DomainLookup};
use crate::host::{HostKind, HostResolver};
use serde::Serialize;
use std::time::Duration;

/// Where a request should go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Route {
    /// Root, www or local alias: the marketing site
    Marketing { host: HostKind },
    /// A persisted binding matched
    Tenant { domain: Domain },
    /// Unknown, malformed, or lookup timed out
    NotFound,
}

pub struct TenantRouter<L> {
    resolver: HostResolver,
    lookup: L,
    timeout: Duration,
}

impl<L: DomainLookup> TenantRouter<L> {
    pub fn new(resolver: HostResolver, lookup: L, timeout: Duration) -> Self {
        Self {
            resolver,
            lookup,
            timeout,
        }
    }

    pub fn resolver(&self) -> &HostResolver {
        &self.resolver
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    pub async fn route(&self, host: &str) -> Route {
        let Some(kind) = self.resolver.resolve(host) else {
            tracing::debug!(host, "rejected malformed host");
            return Route::NotFound;
        };

        let (domain_kind, key) = match &kind {
            HostKind::Root | HostKind::Www | HostKind::Local => {
                return Route::Marketing { host: kind.clone() };
            }
            HostKind::Subdomain(name) => (DomainKind::Subdomain, name.as_str()),
            HostKind::Custom(host) => (DomainKind::Custom, host.as_str()),
        };

        match tokio::time::timeout(self.timeout, self.lookup.find(domain_kind, key)).await {
            Ok(Some(domain)) => Route::Tenant { domain },
            Ok(None) => {
                tracing::debug!(host = key, ?domain_kind, "no domain binding");
                Route::NotFound
            }
            Err(_) => {
                tracing::warn!(
                    host = key,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "domain lookup timed out"
                );
                Route::NotFound
            }
        }
    }
}
