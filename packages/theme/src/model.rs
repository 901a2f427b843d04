use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Light and dark color tokens. Keys are token names (`primary`,
/// `background`), values raw CSS colors.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColorScheme {
    pub light: BTreeMap<String, String>,
    /// When absent, light values are reused in dark mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typography {
    pub base: String,
    pub heading: String,
    pub mono: String,
}

impl Default for Typography {
    fn default() -> Self {
        Self {
            base: "system-ui".to_string(),
            heading: "system-ui".to_string(),
            mono: "ui-monospace".to_string(),
        }
    }
}

/// A named set of color and typography tokens. Shared read-only by every
/// business that selects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub id: String,
    pub name: String,
    pub color_scheme: ColorScheme,
    #[serde(default)]
    pub typography: Typography,
    /// Non-color tokens such as `radius` or `spacing`
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypographyOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mono: Option<String>,
}

/// Business-specific values layered over a theme, key by key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThemeOverrides {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub light: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dark: BTreeMap<String, String>,
    #[serde(default)]
    pub typography: TypographyOverrides,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tokens: BTreeMap<String, String>,
}

impl ThemeOverrides {
    pub fn is_empty(&self) -> bool {
        self.light.is_empty()
            && self.dark.is_empty()
            && self.tokens.is_empty()
            && self.typography == TypographyOverrides::default()
    }
}

/// What a business has chosen: a theme id from the catalog plus overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSelection {
    pub theme_id: String,
    #[serde(default)]
    pub overrides: ThemeOverrides,
}

impl ThemeSelection {
    pub fn preset(theme_id: impl Into<String>) -> Self {
        Self {
            theme_id: theme_id.into(),
            overrides: ThemeOverrides::default(),
        }
    }
}

impl Default for ThemeSelection {
    fn default() -> Self {
        Self::preset(crate::presets::DEFAULT_PRESET)
    }
}
