//! Built-in theme presets.

use crate::model::{ColorScheme, Theme, Typography};
use std::collections::BTreeMap;

/// Preset used when a business has no selection or its theme cannot be
/// loaded.
pub const DEFAULT_PRESET: &str = "classic";

fn tokens(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn typography(base: &str, heading: &str, mono: &str) -> Typography {
    Typography {
        base: base.to_string(),
        heading: heading.to_string(),
        mono: mono.to_string(),
    }
}

pub fn classic() -> Theme {
    Theme {
        id: "classic".to_string(),
        name: "Classic".to_string(),
        color_scheme: ColorScheme {
            light: tokens(&[
                ("background", "#ffffff"),
                ("foreground", "#1f2933"),
                ("primary", "#2563eb"),
                ("primary-foreground", "#ffffff"),
                ("muted", "#f3f4f6"),
                ("border", "#e5e7eb"),
            ]),
            dark: Some(tokens(&[
                ("background", "#111827"),
                ("foreground", "#f9fafb"),
                ("primary", "#60a5fa"),
                ("muted", "#1f2937"),
                ("border", "#374151"),
            ])),
        },
        typography: typography("Inter", "Inter", "ui-monospace"),
        tokens: tokens(&[("radius", "0.5rem")]),
    }
}

pub fn midnight() -> Theme {
    Theme {
        id: "midnight".to_string(),
        name: "Midnight".to_string(),
        color_scheme: ColorScheme {
            light: tokens(&[
                ("background", "#0b1020"),
                ("foreground", "#e2e8f0"),
                ("primary", "oklch(0.72 0.15 250)"),
                ("primary-foreground", "#0b1020"),
                ("muted", "#1e293b"),
                ("border", "#334155"),
            ]),
            dark: None,
        },
        typography: typography("IBM Plex Sans", "Space Grotesk", "IBM Plex Mono"),
        tokens: tokens(&[("radius", "0.25rem")]),
    }
}

pub fn sunrise() -> Theme {
    Theme {
        id: "sunrise".to_string(),
        name: "Sunrise".to_string(),
        color_scheme: ColorScheme {
            light: tokens(&[
                ("background", "#fffaf3"),
                ("foreground", "#3b2f2f"),
                ("primary", "#ea580c"),
                ("primary-foreground", "#ffffff"),
                ("muted", "#fdf0e0"),
                ("border", "#f5d0a9"),
            ]),
            dark: Some(tokens(&[
                ("background", "#1c1410"),
                ("foreground", "#fdf0e0"),
                ("muted", "#2a1f18"),
            ])),
        },
        typography: typography("Lato", "Playfair Display", "ui-monospace"),
        tokens: tokens(&[("radius", "1rem")]),
    }
}

pub fn forest() -> Theme {
    Theme {
        id: "forest".to_string(),
        name: "Forest".to_string(),
        color_scheme: ColorScheme {
            light: tokens(&[
                ("background", "#f6f8f4"),
                ("foreground", "#1b2a1f"),
                ("primary", "#2f6b3a"),
                ("primary-foreground", "#f6f8f4"),
                ("muted", "#e4ebe0"),
                ("border", "#c8d5c1"),
            ]),
            dark: Some(tokens(&[
                ("background", "#101a13"),
                ("foreground", "#e4ebe0"),
                ("primary", "#6fbf7e"),
            ])),
        },
        typography: typography("Source Sans 3", "Merriweather", "ui-monospace"),
        tokens: tokens(&[("radius", "0.375rem")]),
    }
}

pub fn all() -> Vec<Theme> {
    vec![classic(), midnight(), sunrise(), forest()]
}
