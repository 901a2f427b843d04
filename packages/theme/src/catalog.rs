use crate::model::Theme;
use crate::presets;
use sitekit_common::{SiteError, SiteResult};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Where themes are fetched from on the render path.
pub trait ThemeSource: Send + Sync {
    fn fetch(&self, theme_id: &str) -> impl Future<Output = Option<Arc<Theme>>> + Send;
}

/// Built-in presets plus business-specific custom themes.
pub struct ThemeCatalog {
    themes: RwLock<HashMap<String, Arc<Theme>>>,
    default_theme: Arc<Theme>,
}

impl ThemeCatalog {
    /// Catalog preloaded with every built-in preset.
    pub fn with_presets() -> Self {
        let themes = presets::all()
            .into_iter()
            .map(|theme| (theme.id.clone(), Arc::new(theme)))
            .collect();
        Self {
            themes: RwLock::new(themes),
            default_theme: Arc::new(presets::classic()),
        }
    }

    pub fn get(&self, theme_id: &str) -> Option<Arc<Theme>> {
        self.themes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(theme_id)
            .cloned()
    }

    /// The theme used when nothing else resolves.
    pub fn default_theme(&self) -> Arc<Theme> {
        self.default_theme.clone()
    }

    /// Register or replace a custom theme. Built-in preset ids cannot be
    /// replaced.
    pub fn register_custom(&self, theme: Theme) -> SiteResult<Arc<Theme>> {
        if presets::all().iter().any(|p| p.id == theme.id) {
            return Err(SiteError::conflict(format!(
                "{} is a built-in preset",
                theme.id
            )));
        }
        if theme.id.trim().is_empty() {
            return Err(SiteError::validation("id", "theme id is required"));
        }

        let theme = Arc::new(theme);
        self.themes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(theme.id.clone(), theme.clone());
        tracing::info!(theme_id = %theme.id, "custom theme registered");
        Ok(theme)
    }

    pub fn theme_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .themes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

impl Default for ThemeCatalog {
    fn default() -> Self {
        Self::with_presets()
    }
}

impl ThemeSource for ThemeCatalog {
    fn fetch(&self, theme_id: &str) -> impl Future<Output = Option<Arc<Theme>>> + Send {
        let found = self.get(theme_id);
        async move { found }
    }
}

/// Fetch `theme_id` from `source`, falling back to `fallback` when the
/// theme is unknown or the fetch exceeds `timeout`.
pub async fn load_theme<S: ThemeSource>(
    source: &S,
    theme_id: &str,
    fallback: Arc<Theme>,
    timeout: Duration,
) -> Arc<Theme> {
    match tokio::time::timeout(timeout, source.fetch(theme_id)).await {
        Ok(Some(theme)) => theme,
        Ok(None) => {
            tracing::warn!(theme_id, fallback = %fallback.id, "unknown theme, using fallback");
            fallback
        }
        Err(_) => {
            tracing::warn!(theme_id, fallback = %fallback.id, "theme lookup timed out");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_loaded() {
        let catalog = ThemeCatalog::with_presets();
        assert_eq!(catalog.theme_ids(), vec!["classic", "forest", "midnight", "sunrise"]);
        assert_eq!(catalog.default_theme().id, "classic");
    }

    #[test]
    fn test_presets_cannot_be_replaced() {
        let catalog = ThemeCatalog::with_presets();
        let mut theme = presets::forest();
        theme.name = "Hijacked".to_string();
        assert!(catalog.register_custom(theme).unwrap_err().is_conflict());

        let mut custom = presets::forest();
        custom.id = "joes-colors".to_string();
        catalog.register_custom(custom).unwrap();
        assert!(catalog.get("joes-colors").is_some());
    }

    #[tokio::test]
    async fn test_load_theme_falls_back_for_unknown_ids() {
        let catalog = ThemeCatalog::with_presets();
        let theme = load_theme(
            &catalog,
            "missing",
            catalog.default_theme(),
            Duration::from_millis(50),
        )
        .await;
        assert_eq!(theme.id, "classic");

        let theme = load_theme(
            &catalog,
            "midnight",
            catalog.default_theme(),
            Duration::from_millis(50),
        )
        .await;
        assert_eq!(theme.id, "midnight");
    }
}
