//! # Sanitizer
//!
//! Strips unsafe CSS and HTML before it reaches a render surface.
//!
//! Every function here is silent-safe: a rejected input yields an empty
//! value (or `None`) instead of an error, because callers sit on the page
//! render path where failing a whole page over one bad value is worse
//! than dropping the value.

use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Characters that may never appear in a decoded CSS value.
const FORBIDDEN_CSS_CHARS: [char; 6] = [';', '{', '}', '<', '>', '\\'];

/// Function tokens that may never appear in a decoded CSS value. Every
/// function that can fetch a resource from a bare string is listed, since
/// `image-set("https://...")` loads without any `url(`.
const FORBIDDEN_CSS_TOKENS: [&str; 6] = ["url(", "src(", "image(", "image-set(", "cross-fade(", "expression("];

/// Sanitize a single CSS declaration value.
///
/// Returns the trimmed input unchanged when it is safe, or an empty
/// string when it is rejected. Hex escapes (`\75 rl(`) are decoded before
/// checking so an obfuscated `url(` or `</style>` is caught too.
pub fn sanitize_css_value(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let decoded = decode_css_escapes(trimmed);
    if decoded.chars().any(|c| FORBIDDEN_CSS_CHARS.contains(&c) || c.is_control()) {
        return String::new();
    }

    let lowered = decoded.to_ascii_lowercase();
    if FORBIDDEN_CSS_TOKENS.iter().any(|token| lowered.contains(token)) {
        return String::new();
    }

    trimmed.to_string()
}

/// Decode CSS hex escapes: a backslash followed by 1-6 hex digits and an
/// optional single whitespace terminator.
///
/// Backslashes that do not start a hex escape are kept as-is so the
/// caller still sees (and rejects) them.
fn decode_css_escapes(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '\\' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let start = i + 1;
        let mut end = start;
        while end < chars.len() && end - start < 6 && chars[end].is_ascii_hexdigit() {
            end += 1;
        }

        if end == start {
            out.push('\\');
            i += 1;
            continue;
        }

        let hex: String = chars[start..end].iter().collect();
        let decoded = u32::from_str_radix(&hex, 16)
            .ok()
            .filter(|cp| *cp != 0)
            .and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        out.push(decoded);

        i = end;
        if i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
    }

    out
}

/// Sanitize a link or media URL.
///
/// Accepts site-relative paths and `http`, `https`, `mailto` and `tel`
/// URLs. Anything carrying whitespace, control characters, quotes or
/// markup characters is rejected, which also defeats `java\tscript:`
/// style obfuscation.
pub fn sanitize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | '"' | '\'' | '\\' | '`'))
    {
        return None;
    }

    if trimmed.starts_with('/') {
        // Protocol-relative URLs can point anywhere.
        return (!trimmed.starts_with("//")).then(|| trimmed.to_string());
    }

    let lowered = trimmed.to_ascii_lowercase();
    const ALLOWED_SCHEMES: [&str; 4] = ["https://", "http://", "mailto:", "tel:"];
    ALLOWED_SCHEMES
        .iter()
        .any(|scheme| lowered.starts_with(scheme) && lowered.len() > scheme.len())
        .then(|| trimmed.to_string())
}

/// Tags that survive HTML sanitizing. Everything else is removed while
/// its text content is kept.
const ALLOWED_TAGS: [&str; 17] = [
    "a", "b", "blockquote", "br", "em", "h2", "h3", "h4", "i", "li", "ol", "p", "s", "span",
    "strong", "u", "ul",
];

/// Elements removed together with their content.
const DROPPED_BLOCKS: [&str; 6] = ["script", "style", "iframe", "object", "embed", "template"];

fn comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?(-->|$)|<[!?][^>]*>").expect("valid regex"))
}

fn block_regexes() -> &'static Vec<Regex> {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        DROPPED_BLOCKS
            .iter()
            .map(|tag| {
                Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?(</{tag}\s*>|$)")).expect("valid regex")
            })
            .collect()
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<(/?)([a-zA-Z][a-zA-Z0-9]*)([^>]*)>").expect("valid regex"))
}

fn href_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).expect("valid regex")
    })
}

/// Sanitize an HTML fragment from a custom section.
///
/// Uses an allow-list: known formatting tags are rebuilt without
/// attributes (links keep a sanitized `href`), script-like elements are
/// dropped with their content, and every other tag is removed.
pub fn sanitize_html_fragment(raw: &str) -> String {
    let mut html = comment_regex().replace_all(raw, "").into_owned();
    for re in block_regexes() {
        html = re.replace_all(&html, "").into_owned();
    }

    tag_regex()
        .replace_all(&html, |caps: &Captures| {
            let closing = !caps[1].is_empty();
            let name = caps[2].to_ascii_lowercase();
            if !ALLOWED_TAGS.contains(&name.as_str()) {
                return String::new();
            }
            if closing {
                return format!("</{name}>");
            }
            if name == "a" {
                let href = href_regex().captures(&caps[3]).and_then(|h| {
                    h.get(1)
                        .or_else(|| h.get(2))
                        .or_else(|| h.get(3))
                        .and_then(|m| sanitize_url(m.as_str()))
                });
                return match href {
                    Some(href) => format!(
                        "<a href=\"{}\" rel=\"nofollow noopener\">",
                        href.replace('&', "&amp;")
                    ),
                    None => "<a>".to_string(),
                };
            }
            format!("<{name}>")
        })
        .into_owned()
}
