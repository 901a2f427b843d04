//! # Sitekit Common
//!
//! Shared vocabulary for the tenant-site engine: the error kinds every
//! component reports, identifier newtypes, and the sanitizer that guards
//! every value on its way to a render surface.

pub mod error;
pub mod ids;
pub mod sanitize;

pub use error::*;
pub use ids::*;
pub use sanitize::{sanitize_css_value, sanitize_html_fragment, sanitize_url};
