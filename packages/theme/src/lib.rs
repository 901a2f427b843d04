//! # Sitekit Theme
//!
//! Resolves a business's theme (preset plus overrides) into sanitized CSS
//! custom properties and font declarations, and renders them as a style
//! block scoped to the business.
//!
//! ```text
//! ThemeCatalog ──► Theme ─┐
//!                         ├─► resolve_theme ──► ResolvedTheme ──► to_style_block
//! ThemeOverrides ─────────┘        │
//!                           sanitize_css_value
//! ```
//!
//! Resolution is a pure function of its inputs, so [`ThemeCache`] can be
//! filled concurrently without coordination.

mod cache;
mod catalog;
mod engine;
mod model;
pub mod presets;
mod style;

pub use cache::{fingerprint, CachedTheme, ThemeCache};
pub use catalog::{load_theme, ThemeCatalog, ThemeSource};
pub use engine::{resolve_theme, FontDeclaration, FontRole, RejectedValue, ResolvedTheme};
pub use model::{ColorScheme, Theme, ThemeOverrides, ThemeSelection, Typography, TypographyOverrides};
pub use style::scope_selector;
