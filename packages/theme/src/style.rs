//! Scoped style block emission.

use crate::engine::ResolvedTheme;
use std::collections::BTreeMap;

/// Attribute selector scoping a theme to one business's render root.
///
/// Characters outside `[A-Za-z0-9_-]` become CSS hex escapes (`.` is
/// `\2e `), so the selector still matches the exact id while the value
/// can never close the string or the `<style>` element.
pub fn scope_selector(scope: &str) -> String {
    let mut escaped = String::with_capacity(scope.len());
    for c in scope.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            escaped.push(c);
        } else {
            escaped.push_str(&format!("\\{:x} ", u32::from(c)));
        }
    }
    format!("[data-site=\"{escaped}\"]")
}

fn push_rule(css: &mut String, selector: &str, properties: &BTreeMap<String, String>, indent: &str) {
    css.push_str(indent);
    css.push_str(selector);
    css.push_str(" {\n");

    for (key, value) in properties {
        css.push_str(indent);
        css.push_str("  ");
        css.push_str(key);
        css.push_str(": ");
        css.push_str(value);
        css.push_str(";\n");
    }

    css.push_str(indent);
    css.push_str("}\n");
}

impl ResolvedTheme {
    /// Render the theme as a `<style>` body scoped to `scope`.
    ///
    /// Dark values apply under `prefers-color-scheme: dark` unless the root
    /// forces `data-theme="light"`, and always under `data-theme="dark"`.
    pub fn to_style_block(&self, scope: &str) -> String {
        let selector = scope_selector(scope);
        let mut css = String::new();

        push_rule(&mut css, &selector, &self.css, "");

        if !self.dark_css.is_empty() {
            css.push_str("@media (prefers-color-scheme: dark) {\n");
            push_rule(
                &mut css,
                &format!("{selector}:not([data-theme=\"light\"])"),
                &self.dark_css,
                "  ",
            );
            css.push_str("}\n");
            push_rule(
                &mut css,
                &format!("{selector}[data-theme=\"dark\"]"),
                &self.dark_css,
                "",
            );
        }

        css
    }
}
