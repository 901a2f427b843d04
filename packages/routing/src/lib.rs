//! # Sitekit Routing
//!
//! Maps an inbound hostname to the business it serves.
//!
//! ```text
//! host header ──► HostResolver ──► HostKind ──► TenantRouter ──► Route
//!                 (shape only)                  (DomainLookup,
//!                                                with timeout)
//! ```
//!
//! The resolver never decides that a tenant exists. Subdomain and custom
//! hosts are always confirmed against the persisted [`DomainTable`] so a
//! spoofed host header cannot land on another tenant's site.

mod domain;
mod host;
mod router;

pub use domain::{slugify, Domain, DomainKind, DomainLookup, DomainTable};
pub use host::{HostKind, HostResolver};
pub use router::{Route, TenantRouter};
