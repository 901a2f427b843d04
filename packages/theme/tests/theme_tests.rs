//! Theme resolution end to end

use sitekit_common::BusinessId;
use sitekit_theme::{
    load_theme, presets, resolve_theme, Theme, ThemeCache, ThemeCatalog, ThemeOverrides,
    ThemeSource,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_resolve_twice_is_byte_identical() {
    let theme = presets::sunrise();
    let mut overrides = ThemeOverrides::default();
    overrides.light.insert("primary".to_string(), "oklch(0.5 0.1 30)".to_string());
    overrides.dark.insert("primary".to_string(), "#ffb703".to_string());
    overrides.typography.base = Some("Nunito".to_string());

    let first = resolve_theme(&theme, &overrides);
    let second = resolve_theme(&theme, &overrides);

    assert_eq!(first.css, second.css);
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
    assert_eq!(first.to_style_block("biz"), second.to_style_block("biz"));
}

#[test]
fn test_hex_escaped_override_never_reaches_style_block() {
    let mut overrides = ThemeOverrides::default();
    overrides
        .light
        .insert("background".to_string(), "\\75 rl(https://evil.test/p.gif)".to_string());
    overrides
        .tokens
        .insert("radius".to_string(), "1px\\3c/style\\3e".to_string());

    let resolved = resolve_theme(&presets::classic(), &overrides);
    let css = resolved.to_style_block("biz");

    assert!(!css.contains("evil.test"));
    assert!(!css.contains("\\3c"));
    assert!(!resolved.css.contains_key("--radius"));
    assert_eq!(resolved.rejected.len(), 2);
}

#[test]
fn test_cache_invalidation_picks_up_new_selection() {
    let cache = ThemeCache::new();
    let biz = BusinessId::new("biz");
    let catalog = ThemeCatalog::with_presets();

    let classic = catalog.get("classic").unwrap();
    let before = cache.get_or_resolve(&biz, &classic, &ThemeOverrides::default());
    assert_eq!(before.theme.theme_id, "classic");

    cache.invalidate(&biz);
    let midnight = catalog.get("midnight").unwrap();
    let after = cache.get_or_resolve(&biz, &midnight, &ThemeOverrides::default());
    assert_eq!(after.theme.theme_id, "midnight");
    assert_ne!(before.style_block, after.style_block);
}

struct SlowSource;

impl ThemeSource for SlowSource {
    fn fetch(&self, _theme_id: &str) -> impl Future<Output = Option<Arc<Theme>>> + Send {
        async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Some(Arc::new(presets::midnight()))
        }
    }
}

#[tokio::test]
async fn test_slow_theme_source_falls_back() {
    let fallback = Arc::new(presets::classic());
    let theme = load_theme(&SlowSource, "midnight", fallback, Duration::from_millis(20)).await;
    assert_eq!(theme.id, "classic");
}
