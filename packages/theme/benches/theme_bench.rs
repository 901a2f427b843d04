use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sitekit_common::BusinessId;
use sitekit_theme::{presets, resolve_theme, ThemeCache, ThemeOverrides};

fn resolve_preset(c: &mut Criterion) {
    let theme = presets::sunrise();
    let mut overrides = ThemeOverrides::default();
    overrides.light.insert("primary".to_string(), "#c2410c".to_string());
    overrides.typography.heading = Some("Fraunces".to_string());

    c.bench_function("resolve_theme_with_overrides", |b| {
        b.iter(|| resolve_theme(black_box(&theme), black_box(&overrides)))
    });

    c.bench_function("render_style_block", |b| {
        let resolved = resolve_theme(&theme, &overrides);
        b.iter(|| resolved.to_style_block(black_box("joes-pizza")))
    });
}

fn cache_hit(c: &mut Criterion) {
    let cache = ThemeCache::new();
    let biz = BusinessId::new("joes-pizza");
    let theme = presets::classic();
    let overrides = ThemeOverrides::default();
    cache.get_or_resolve(&biz, &theme, &overrides);

    c.bench_function("theme_cache_hit", |b| {
        b.iter(|| cache.get_or_resolve(black_box(&biz), &theme, &overrides))
    });
}

criterion_group!(benches, resolve_preset, cache_hit);
criterion_main!(benches);
