//! # Section Composer
//!
//! Turns a snapshot into the page model handed to the render surface.
//!
//! Composition is a pure function of the snapshot (and options): it never
//! fails. Bad fields are dropped, sections left with nothing to show are
//! excluded, and every such decision is reported as a [`Diagnostic`] so
//! the editor can point at it.
//!
//! Ordering is by each section's `order` value; ties keep the order the
//! sections appear in the snapshot.

use crate::section::{
    CallToAction, ContactSection, CustomSection, GallerySection, HeroSection, HoursSection,
    MediaRef, ReviewsSection, Section, SectionBody, SectionKind,
};
use crate::snapshot::{Snapshot, SnapshotKind};
use serde::Serialize;
use sitekit_common::{sanitize_css_value, sanitize_html_fragment, sanitize_url, PageId, SectionId};
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational, nothing was removed
    Info,
    /// A field was dropped
    Warning,
    /// The whole section was excluded
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub section_id: SectionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedSection {
    pub id: SectionId,
    /// Index in the composed page
    pub position: usize,
    pub order: i64,
    /// False for kinds this build does not know
    pub validated: bool,
    #[serde(flatten)]
    pub body: SectionBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageModel {
    pub page_id: PageId,
    pub mode: SnapshotKind,
    pub version: u64,
    pub sections: Vec<ComposedSection>,
    pub diagnostics: Vec<Diagnostic>,
}

impl PageModel {
    /// The page shown when nothing resolves.
    pub fn empty(page_id: PageId, mode: SnapshotKind) -> Self {
        Self {
            page_id,
            mode,
            version: 0,
            sections: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    /// Known kinds the business may show. `None` allows every kind.
    pub allowed_kinds: Option<BTreeSet<SectionKind>>,
}

pub fn compose(snapshot: &Snapshot) -> PageModel {
    compose_with(snapshot, &ComposeOptions::default())
}

pub fn compose_with(snapshot: &Snapshot, options: &ComposeOptions) -> PageModel {
    let mut ordered: Vec<&Section> = snapshot.sections.iter().collect();
    // sort_by_key is stable, which is what keeps ties in insertion order
    ordered.sort_by_key(|s| s.order);

    let mut report = Report::new();
    let mut seen = HashSet::new();
    let mut sections = Vec::with_capacity(ordered.len());

    for section in ordered {
        report.section_id = section.id.clone();

        if !seen.insert(&section.id) {
            report.exclude("duplicate section id");
            continue;
        }

        if let (Some(kind), Some(allowed)) = (section.body.kind(), &options.allowed_kinds) {
            if !allowed.contains(&kind) {
                report.exclude(format!("{kind} sections are not included in the current plan"));
                continue;
            }
        }

        let (body, validated) = match &section.body {
            SectionBody::Unknown { kind, .. } => {
                report.info(format!("unknown section kind {kind:?} passed through unvalidated"));
                (Some(section.body.clone()), false)
            }
            known => (validate(known, &mut report), true),
        };

        let Some(body) = body else { continue };
        sections.push(ComposedSection {
            id: section.id.clone(),
            position: sections.len(),
            order: section.order,
            validated,
            body,
        });
    }

    PageModel {
        page_id: snapshot.page_id.clone(),
        mode: snapshot.kind,
        version: snapshot.version,
        sections,
        diagnostics: report.diagnostics,
    }
}

struct Report {
    /// Section currently being validated
    section_id: SectionId,
    diagnostics: Vec<Diagnostic>,
}

impl Report {
    fn new() -> Self {
        Self {
            section_id: SectionId::new(""),
            diagnostics: Vec::new(),
        }
    }

    fn push(&mut self, field: Option<&str>, message: impl Into<String>, severity: Severity) {
        self.diagnostics.push(Diagnostic {
            section_id: self.section_id.clone(),
            field: field.map(str::to_string),
            message: message.into(),
            severity,
        });
    }

    fn info(&mut self, message: impl Into<String>) {
        self.push(None, message, Severity::Info);
    }

    fn drop_field(&mut self, field: &str, message: impl Into<String>) {
        self.push(Some(field), message, Severity::Warning);
    }

    fn exclude(&mut self, message: impl Into<String>) {
        self.push(None, message, Severity::Error);
    }

    fn exclude_field(&mut self, field: &str, message: impl Into<String>) {
        self.push(Some(field), message, Severity::Error);
    }
}

/// Validate a known-kind body, returning the cleaned body or `None` if
/// nothing usable is left.
fn validate(body: &SectionBody, report: &mut Report) -> Option<SectionBody> {
    match body {
        SectionBody::Hero(hero) => validate_hero(hero.clone(), report).map(SectionBody::Hero),
        SectionBody::About(about) => {
            let mut about = about.clone();
            if about.body.trim().is_empty() {
                report.exclude_field("body", "about section has no body");
                return None;
            }
            about.image = clean_media(about.image, "image", report);
            Some(SectionBody::About(about))
        }
        SectionBody::Gallery(gallery) => validate_gallery(gallery.clone(), report).map(SectionBody::Gallery),
        SectionBody::Reviews(reviews) => validate_reviews(reviews.clone(), report).map(SectionBody::Reviews),
        SectionBody::Hours(hours) => validate_hours(hours.clone(), report).map(SectionBody::Hours),
        SectionBody::Contact(contact) => validate_contact(contact.clone(), report).map(SectionBody::Contact),
        SectionBody::Custom(custom) => validate_custom(custom.clone(), report).map(SectionBody::Custom),
        SectionBody::Unknown { .. } => Some(body.clone()),
    }
}

fn clean_media(media: Option<MediaRef>, field: &str, report: &mut Report) -> Option<MediaRef> {
    let mut media = media?;
    match sanitize_url(&media.url) {
        Some(url) => {
            media.url = url;
            Some(media)
        }
        None => {
            report.drop_field(field, "unsafe media url");
            None
        }
    }
}

fn validate_hero(mut hero: HeroSection, report: &mut Report) -> Option<HeroSection> {
    if hero.title.trim().is_empty() {
        report.exclude_field("title", "hero section needs a title");
        return None;
    }
    hero.background_image = clean_media(hero.background_image, "backgroundImage", report);
    if let Some(cta) = hero.cta.take() {
        match sanitize_url(&cta.href) {
            Some(href) if !cta.label.trim().is_empty() => {
                hero.cta = Some(CallToAction { label: cta.label, href });
            }
            _ => report.drop_field("cta", "call to action needs a label and a safe link"),
        }
    }
    Some(hero)
}

fn validate_gallery(mut gallery: GallerySection, report: &mut Report) -> Option<GallerySection> {
    let before = gallery.images.len();
    gallery.images = gallery
        .images
        .into_iter()
        .filter_map(|image| clean_media(Some(image), "images", report))
        .collect();

    if gallery.images.is_empty() {
        let message = if before == 0 {
            "gallery has no images"
        } else {
            "gallery has no usable images"
        };
        report.exclude_field("images", message);
        return None;
    }
    Some(gallery)
}

fn validate_reviews(mut reviews: ReviewsSection, report: &mut Report) -> Option<ReviewsSection> {
    reviews.reviews.retain(|review| {
        if !(1..=5).contains(&review.rating) {
            report.drop_field("reviews", format!("rating {} is outside 1-5", review.rating));
            false
        } else if review.author.trim().is_empty() {
            report.drop_field("reviews", "review has no author");
            false
        } else {
            true
        }
    });

    if reviews.reviews.is_empty() {
        report.exclude_field("reviews", "no usable reviews");
        return None;
    }
    Some(reviews)
}

/// Minutes since midnight for `HH:MM`.
fn parse_clock(value: &str) -> Option<u16> {
    let (h, m) = value.split_once(':')?;
    if h.len() != 2 || m.len() != 2 {
        return None;
    }
    let h: u16 = h.parse().ok()?;
    let m: u16 = m.parse().ok()?;
    (h < 24 && m < 60).then_some(h * 60 + m)
}

fn validate_hours(mut hours: HoursSection, report: &mut Report) -> Option<HoursSection> {
    let mut days = HashSet::new();
    hours.entries.retain_mut(|entry| {
        if !days.insert(entry.day) {
            report.drop_field("entries", format!("duplicate entry for {:?}", entry.day));
            return false;
        }
        if entry.closed {
            entry.opens = None;
            entry.closes = None;
            return true;
        }

        let opens = entry.opens.as_deref().and_then(parse_clock);
        let closes = entry.closes.as_deref().and_then(parse_clock);
        match (opens, closes) {
            (Some(o), Some(c)) if c > o => true,
            (Some(_), Some(_)) => {
                report.drop_field("entries", format!("{:?} closes before it opens", entry.day));
                false
            }
            _ => {
                report.drop_field("entries", format!("{:?} has an invalid HH:MM time", entry.day));
                false
            }
        }
    });

    if hours.entries.is_empty() {
        report.exclude_field("entries", "no usable opening hours");
        return None;
    }
    Some(hours)
}

fn validate_contact(mut contact: ContactSection, report: &mut Report) -> Option<ContactSection> {
    if let Some(email) = &contact.email {
        if !email.contains('@') || email.chars().any(char::is_whitespace) {
            report.drop_field("email", "not an email address");
            contact.email = None;
        }
    }
    if let Some(map_url) = contact.map_url.take() {
        match sanitize_url(&map_url) {
            Some(url) => contact.map_url = Some(url),
            None => report.drop_field("mapUrl", "unsafe map url"),
        }
    }

    let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
    if blank(&contact.phone) && blank(&contact.email) && blank(&contact.address) && contact.map_url.is_none() {
        report.exclude("contact section has no contact details");
        return None;
    }
    Some(contact)
}

fn is_css_property(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '-')
}

fn validate_custom(mut custom: CustomSection, report: &mut Report) -> Option<CustomSection> {
    let html = sanitize_html_fragment(&custom.html);
    if html != custom.html {
        report.drop_field("html", "unsafe markup removed");
    }
    custom.html = html;

    custom.style.retain(|property, value| {
        if !is_css_property(property) {
            report.drop_field("style", format!("invalid property {property:?}"));
            return false;
        }
        if sanitize_css_value(value).is_empty() {
            report.drop_field("style", format!("unsafe value for {property}"));
            return false;
        }
        *value = value.trim().to_string();
        true
    });

    if custom.html.trim().is_empty() && custom.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
        report.exclude_field("html", "custom section has no content");
        return None;
    }
    Some(custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::{AboutSection, HoursEntry, Review, Weekday};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn snapshot(sections: Vec<Section>) -> Snapshot {
        Snapshot {
            page_id: "p".into(),
            kind: SnapshotKind::Draft,
            version: 3,
            based_on: None,
            sections,
            author: None,
            created_at: Utc::now(),
        }
    }

    fn about(id: &str, order: i64) -> Section {
        Section::new(
            id,
            order,
            SectionBody::About(AboutSection {
                title: None,
                body: format!("about {id}"),
                image: None,
            }),
        )
    }

    fn ids(page: &PageModel) -> Vec<&str> {
        page.sections.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let page = compose(&snapshot(vec![
            about("c", 2),
            about("a", 1),
            about("b", 1),
            about("z", -5),
        ]));
        assert_eq!(ids(&page), vec!["z", "a", "b", "c"]);
        assert_eq!(page.sections[3].position, 3);
        assert_eq!(page.version, 3);
    }

    #[test]
    fn test_compose_is_pure() {
        let snap = snapshot(vec![about("a", 1), about("b", 0)]);
        assert_eq!(compose(&snap), compose(&snap));
    }

    #[test]
    fn test_unknown_kind_passes_through() {
        let mut attributes = serde_json::Map::new();
        attributes.insert("items".to_string(), serde_json::json!([1, 2]));
        let unknown = Section::new(
            "m",
            0,
            SectionBody::Unknown {
                kind: "menu".to_string(),
                attributes,
            },
        );

        let page = compose(&snapshot(vec![unknown.clone()]));
        assert_eq!(page.sections.len(), 1);
        assert!(!page.sections[0].validated);
        assert_eq!(page.sections[0].body, unknown.body);
        assert_eq!(page.diagnostics[0].severity, Severity::Info);
    }

    #[test]
    fn test_bad_fields_dropped_section_kept() {
        let section = Section::new(
            "g",
            0,
            SectionBody::Gallery(GallerySection {
                title: None,
                images: vec![
                    MediaRef { url: "javascript:alert(1)".to_string(), alt: None },
                    MediaRef { url: "https://cdn.example.com/1.jpg".to_string(), alt: None },
                ],
            }),
        );

        let page = compose(&snapshot(vec![section]));
        let SectionBody::Gallery(gallery) = &page.sections[0].body else {
            panic!("expected gallery");
        };
        assert_eq!(gallery.images.len(), 1);
        assert_eq!(page.diagnostics.len(), 1);
        assert_eq!(page.diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn test_empty_hero_is_excluded() {
        let hero = Section::new(
            "h",
            0,
            SectionBody::Hero(HeroSection {
                title: "  ".to_string(),
                subtitle: None,
                background_image: None,
                cta: None,
            }),
        );
        let page = compose(&snapshot(vec![hero, about("a", 1)]));
        assert_eq!(ids(&page), vec!["a"]);
        assert_eq!(page.sections[0].position, 0);
        assert_eq!(page.diagnostics[0].section_id.as_str(), "h");
        assert_eq!(page.diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn test_reviews_and_hours_rules() {
        let reviews = Section::new(
            "r",
            0,
            SectionBody::Reviews(ReviewsSection {
                title: None,
                reviews: vec![
                    Review { author: "Ann".to_string(), rating: 5, text: None, date: None },
                    Review { author: "Bob".to_string(), rating: 9, text: None, date: None },
                ],
            }),
        );
        let entry = |day, opens: &str, closes: &str| HoursEntry {
            day,
            opens: Some(opens.to_string()),
            closes: Some(closes.to_string()),
            closed: false,
        };
        let hours = Section::new(
            "o",
            1,
            SectionBody::Hours(HoursSection {
                title: None,
                entries: vec![
                    entry(Weekday::Monday, "09:00", "17:00"),
                    entry(Weekday::Monday, "10:00", "18:00"),
                    entry(Weekday::Tuesday, "17:00", "09:00"),
                    entry(Weekday::Wednesday, "9am", "5pm"),
                    HoursEntry { day: Weekday::Sunday, opens: None, closes: None, closed: true },
                ],
                timezone: None,
            }),
        );

        let page = compose(&snapshot(vec![reviews, hours]));
        let SectionBody::Reviews(r) = &page.sections[0].body else { panic!() };
        assert_eq!(r.reviews.len(), 1);
        let SectionBody::Hours(h) = &page.sections[1].body else { panic!() };
        assert_eq!(
            h.entries.iter().map(|e| e.day).collect::<Vec<_>>(),
            vec![Weekday::Monday, Weekday::Sunday]
        );
        assert_eq!(page.diagnostics.len(), 4);
    }

    #[test]
    fn test_custom_html_and_styles_are_sanitized() {
        let mut style = BTreeMap::new();
        style.insert("color".to_string(), "#333".to_string());
        style.insert("background".to_string(), "url(https://evil)".to_string());
        let custom = Section::new(
            "c",
            0,
            SectionBody::Custom(CustomSection {
                title: None,
                html: "<p>Hi</p><script>alert(1)</script>".to_string(),
                style,
            }),
        );

        let page = compose(&snapshot(vec![custom]));
        let SectionBody::Custom(c) = &page.sections[0].body else { panic!() };
        assert_eq!(c.html, "<p>Hi</p>");
        assert_eq!(c.style.keys().collect::<Vec<_>>(), vec!["color"]);
    }

    #[test]
    fn test_contact_rules() {
        let contact = Section::new(
            "k",
            0,
            SectionBody::Contact(ContactSection {
                title: None,
                phone: None,
                email: Some("not-an-email".to_string()),
                address: None,
                map_url: Some("javascript:void(0)".to_string()),
            }),
        );
        let page = compose(&snapshot(vec![contact]));
        assert!(page.sections.is_empty());
        assert_eq!(page.diagnostics.len(), 3);
    }

    #[test]
    fn test_allowed_kinds_filter() {
        let custom = Section::new(
            "c",
            0,
            SectionBody::Custom(CustomSection {
                title: Some("Hi".to_string()),
                html: String::new(),
                style: BTreeMap::new(),
            }),
        );
        let options = ComposeOptions {
            allowed_kinds: Some(BTreeSet::from([SectionKind::About])),
        };

        let page = compose_with(&snapshot(vec![custom, about("a", 1)]), &options);
        assert_eq!(ids(&page), vec!["a"]);
        assert!(page.diagnostics[0].message.contains("plan"));
    }
}
