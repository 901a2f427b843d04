//! # Theme Engine
//!
//! Merges a theme with business overrides and turns the result into CSS
//! custom properties. Every value passes through the sanitizer before it
//! lands in the output; rejected values are reported, never emitted.

use crate::model::{Theme, ThemeOverrides};
use serde::Serialize;
use sitekit_common::sanitize_css_value;
use std::collections::BTreeMap;

/// Families that are installed everywhere (or are CSS generics) and need
/// no stylesheet import.
const SYSTEM_FAMILIES: [&str; 12] = [
    "system-ui",
    "ui-sans-serif",
    "ui-serif",
    "ui-monospace",
    "sans-serif",
    "serif",
    "monospace",
    "arial",
    "helvetica",
    "georgia",
    "times new roman",
    "courier new",
];

const GOOGLE_FONTS_CSS: &str = "https://fonts.googleapis.com/css2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FontRole {
    Base,
    Heading,
    Mono,
}

impl FontRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontRole::Base => "base",
            FontRole::Heading => "heading",
            FontRole::Mono => "mono",
        }
    }

    fn generic_fallback(&self) -> &'static str {
        match self {
            FontRole::Base | FontRole::Heading => "system-ui, sans-serif",
            FontRole::Mono => "ui-monospace, monospace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FontDeclaration {
    pub role: FontRole,
    pub family: String,
    /// Full `font-family` value including generic fallbacks
    pub stack: String,
    /// Web font stylesheet to load, for non-system families
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stylesheet_href: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedValue {
    pub key: String,
    pub reason: &'static str,
}

/// A theme ready for the render surface.
///
/// Maps are ordered so two resolutions of the same inputs serialize
/// byte-identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTheme {
    pub theme_id: String,
    pub css: BTreeMap<String, String>,
    pub dark_css: BTreeMap<String, String>,
    pub font_declarations: Vec<FontDeclaration>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedValue>,
}

/// Resolve `theme` with `overrides` layered on top (override wins per key).
pub fn resolve_theme(theme: &Theme, overrides: &ThemeOverrides) -> ResolvedTheme {
    let mut out = Output::default();

    let light = merge(&theme.color_scheme.light, &overrides.light);
    let dark_base = theme.color_scheme.dark.clone().unwrap_or_default();
    let dark = merge(&dark_base, &overrides.dark);

    for (name, value) in &light {
        out.push_color(name, value, false);
    }
    // Dark mode starts from light values and replaces what the dark map defines.
    for (name, value) in &light {
        let value = dark.get(name).unwrap_or(value);
        out.push_color(name, value, true);
    }
    for (name, value) in dark.iter().filter(|(name, _)| !light.contains_key(*name)) {
        out.push_color(name, value, true);
    }

    for (name, value) in &merge(&theme.tokens, &overrides.tokens) {
        out.push_token(name, value);
    }

    let typography = &overrides.typography;
    let families = [
        (FontRole::Base, typography.base.as_ref().unwrap_or(&theme.typography.base)),
        (FontRole::Heading, typography.heading.as_ref().unwrap_or(&theme.typography.heading)),
        (FontRole::Mono, typography.mono.as_ref().unwrap_or(&theme.typography.mono)),
    ];
    for (role, family) in families {
        out.push_font(role, family);
    }

    ResolvedTheme {
        theme_id: theme.id.clone(),
        css: out.css,
        dark_css: out.dark_css,
        font_declarations: out.fonts,
        rejected: out.rejected,
    }
}

fn merge(base: &BTreeMap<String, String>, overrides: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut merged = base.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

#[derive(Default)]
struct Output {
    css: BTreeMap<String, String>,
    dark_css: BTreeMap<String, String>,
    fonts: Vec<FontDeclaration>,
    rejected: Vec<RejectedValue>,
}

impl Output {
    fn reject(&mut self, key: String, reason: &'static str) {
        if !self.rejected.iter().any(|r| r.key == key) {
            self.rejected.push(RejectedValue { key, reason });
        }
    }

    fn push_color(&mut self, name: &str, value: &str, dark: bool) {
        let key = format!("--color-{name}");
        if !is_valid_token_name(name) {
            self.reject(key, "invalid token name");
            return;
        }
        let value = sanitize_css_value(value);
        if value.is_empty() {
            let key = if dark { format!("{key} (dark)") } else { key };
            self.reject(key, "unsafe value");
            return;
        }
        if dark {
            self.dark_css.insert(key, value);
        } else {
            self.css.insert(key, value);
        }
    }

    fn push_token(&mut self, name: &str, value: &str) {
        let key = format!("--{name}");
        if !is_valid_token_name(name) || name.starts_with("color-") || name.starts_with("font-") {
            self.reject(key, "invalid token name");
            return;
        }
        let value = sanitize_css_value(value);
        if value.is_empty() {
            self.reject(key, "unsafe value");
            return;
        }
        self.css.insert(key, value);
    }

    fn push_font(&mut self, role: FontRole, family: &str) {
        let key = format!("--font-{}", role.as_str());
        let Some(family) = clean_family(family) else {
            self.reject(key.clone(), "unsafe font family");
            // Fall back to the generic stack so text still renders.
            self.css.insert(key, role.generic_fallback().to_string());
            return;
        };

        let is_system = SYSTEM_FAMILIES.contains(&family.to_ascii_lowercase().as_str());
        let fallback = role.generic_fallback();
        let stack = if is_system && fallback.starts_with(&family) {
            fallback.to_string()
        } else if is_system {
            format!("{family}, {fallback}")
        } else {
            format!("\"{family}\", {fallback}")
        };
        // Stacks are built from cleaned parts, but run them through the
        // sanitizer like every other emitted value.
        let stack = sanitize_css_value(&stack);

        self.css.insert(key, stack.clone());
        self.fonts.push(FontDeclaration {
            role,
            stylesheet_href: (!is_system).then(|| google_fonts_href(&family)),
            family,
            stack,
        });
    }
}

/// Token names are restricted to `[a-z0-9-]`, starting with a letter.
fn is_valid_token_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Font family names may hold letters, digits, spaces and hyphens only.
/// Surrounding quotes are stripped.
fn clean_family(raw: &str) -> Option<String> {
    let family = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    let valid = !family.is_empty()
        && family.len() <= 64
        && family
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-');
    valid.then(|| family.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn google_fonts_href(family: &str) -> String {
    format!(
        "{GOOGLE_FONTS_CSS}?family={}:wght@400;700&display=swap",
        family.replace(' ', "+")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;

    #[test]
    fn test_override_wins_key_by_key() {
        let theme = presets::classic();
        let mut overrides = ThemeOverrides::default();
        overrides.light.insert("primary".to_string(), "#ff0000".to_string());

        let resolved = resolve_theme(&theme, &overrides);
        assert_eq!(resolved.css["--color-primary"], "#ff0000");
        assert_eq!(resolved.css["--color-background"], "#ffffff");
    }

    #[test]
    fn test_dark_reuses_light_when_absent() {
        let theme = presets::midnight();
        let resolved = resolve_theme(&theme, &ThemeOverrides::default());
        assert_eq!(resolved.css["--color-primary"], resolved.dark_css["--color-primary"]);
        assert_eq!(
            resolved.css.keys().filter(|k| k.starts_with("--color-")).count(),
            resolved.dark_css.len()
        );
    }

    #[test]
    fn test_partial_dark_map_falls_back_per_key() {
        let theme = presets::sunrise();
        let resolved = resolve_theme(&theme, &ThemeOverrides::default());
        assert_eq!(resolved.dark_css["--color-background"], "#1c1410");
        // sunrise has no dark primary
        assert_eq!(resolved.dark_css["--color-primary"], "#ea580c");
    }

    #[test]
    fn test_unsafe_values_are_rejected_not_emitted() {
        let theme = presets::classic();
        let mut overrides = ThemeOverrides::default();
        overrides
            .light
            .insert("primary".to_string(), "red; background:url(x)".to_string());
        overrides.tokens.insert("Bad Name".to_string(), "1px".to_string());

        let resolved = resolve_theme(&theme, &overrides);
        assert!(!resolved.css.contains_key("--color-primary"));
        assert!(!resolved.css.contains_key("--Bad Name"));
        assert!(resolved.rejected.iter().any(|r| r.key == "--color-primary"));
        assert!(resolved.rejected.iter().any(|r| r.key == "--Bad Name"));
        // The rest of the theme is still usable
        assert_eq!(resolved.css["--color-background"], "#ffffff");
    }

    #[test]
    fn test_font_declarations() {
        let theme = presets::sunrise();
        let resolved = resolve_theme(&theme, &ThemeOverrides::default());

        let heading = resolved
            .font_declarations
            .iter()
            .find(|f| f.role == FontRole::Heading)
            .unwrap();
        assert_eq!(heading.family, "Playfair Display");
        assert_eq!(heading.stack, "\"Playfair Display\", system-ui, sans-serif");
        assert_eq!(
            heading.stylesheet_href.as_deref(),
            Some("https://fonts.googleapis.com/css2?family=Playfair+Display:wght@400;700&display=swap")
        );

        let mono = resolved
            .font_declarations
            .iter()
            .find(|f| f.role == FontRole::Mono)
            .unwrap();
        assert_eq!(mono.stylesheet_href, None);
        assert_eq!(resolved.css["--font-mono"], "ui-monospace, monospace");
    }

    #[test]
    fn test_unsafe_font_family_falls_back() {
        let theme = presets::classic();
        let mut overrides = ThemeOverrides::default();
        overrides.typography.heading = Some("Inter\"; } body { x".to_string());

        let resolved = resolve_theme(&theme, &overrides);
        assert_eq!(resolved.css["--font-heading"], "system-ui, sans-serif");
        assert!(resolved.rejected.iter().any(|r| r.key == "--font-heading"));
        assert_eq!(resolved.font_declarations.len(), 2);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let theme = presets::forest();
        let mut overrides = ThemeOverrides::default();
        overrides.tokens.insert("spacing".to_string(), "1.25rem".to_string());

        let a = serde_json::to_string(&resolve_theme(&theme, &overrides)).unwrap();
        let b = serde_json::to_string(&resolve_theme(&theme, &overrides)).unwrap();
        assert_eq!(a, b);
    }
}
