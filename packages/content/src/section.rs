//! # Sections
//!
//! One typed content block per kind. Sections serialize flat:
//!
//! ```json
//! { "id": "s1", "order": 10, "kind": "hero", "title": "Joe's Pizza" }
//! ```
//!
//! Kinds this build does not know are kept verbatim as
//! [`SectionBody::Unknown`] so content written by newer editors survives
//! a round trip through older servers.

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use sitekit_common::{SectionId, SiteError};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SectionError {
    #[error("section has no kind")]
    MissingKind,

    #[error("invalid {kind} section: {message}")]
    InvalidAttributes { kind: String, message: String },

    #[error("section is not an object")]
    NotAnObject,
}

impl From<SectionError> for SiteError {
    fn from(e: SectionError) -> Self {
        SiteError::validation("section", e.to_string())
    }
}

/// Closed set of section kinds this build understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Hero,
    About,
    Gallery,
    Reviews,
    Hours,
    Contact,
    Custom,
}

impl SectionKind {
    pub const ALL: [SectionKind; 7] = [
        SectionKind::Hero,
        SectionKind::About,
        SectionKind::Gallery,
        SectionKind::Reviews,
        SectionKind::Hours,
        SectionKind::Contact,
        SectionKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Hero => "hero",
            SectionKind::About => "about",
            SectionKind::Gallery => "gallery",
            SectionKind::Reviews => "reviews",
            SectionKind::Hours => "hours",
            SectionKind::Contact => "contact",
            SectionKind::Custom => "custom",
        }
    }

    pub fn parse(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == kind)
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallToAction {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroSection {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<MediaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<CallToAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AboutSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GallerySection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub images: Vec<MediaRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub author: String,
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoursEntry {
    pub day: Weekday,
    /// `HH:MM`, 24h clock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opens: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closes: Option<String>,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoursSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub entries: Vec<HoursEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub html: String,
    /// Inline style properties applied to the section root
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, String>,
}

/// Content of a section, one variant per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionBody {
    Hero(HeroSection),
    About(AboutSection),
    Gallery(GallerySection),
    Reviews(ReviewsSection),
    Hours(HoursSection),
    Contact(ContactSection),
    Custom(CustomSection),
    /// A kind this build does not know, kept verbatim
    Unknown {
        kind: String,
        attributes: Map<String, Value>,
    },
}

fn parse_attributes<T: serde::de::DeserializeOwned>(
    kind: &str,
    attributes: Map<String, Value>,
) -> Result<T, SectionError> {
    serde_json::from_value(Value::Object(attributes)).map_err(|e| SectionError::InvalidAttributes {
        kind: kind.to_string(),
        message: e.to_string(),
    })
}

fn to_attributes<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        // Section structs always serialize to objects.
        _ => Map::new(),
    }
}

impl SectionBody {
    /// Build a body from its kind tag and attribute map.
    ///
    /// Unknown kinds are preserved; known kinds must match their schema.
    pub fn from_parts(kind: &str, attributes: Map<String, Value>) -> Result<Self, SectionError> {
        let Some(known) = SectionKind::parse(kind) else {
            return Ok(SectionBody::Unknown {
                kind: kind.to_string(),
                attributes,
            });
        };

        Ok(match known {
            SectionKind::Hero => SectionBody::Hero(parse_attributes(kind, attributes)?),
            SectionKind::About => SectionBody::About(parse_attributes(kind, attributes)?),
            SectionKind::Gallery => SectionBody::Gallery(parse_attributes(kind, attributes)?),
            SectionKind::Reviews => SectionBody::Reviews(parse_attributes(kind, attributes)?),
            SectionKind::Hours => SectionBody::Hours(parse_attributes(kind, attributes)?),
            SectionKind::Contact => SectionBody::Contact(parse_attributes(kind, attributes)?),
            SectionKind::Custom => SectionBody::Custom(parse_attributes(kind, attributes)?),
        })
    }

    /// Split into kind tag and attribute map.
    pub fn to_parts(&self) -> (String, Map<String, Value>) {
        let (kind, attributes) = match self {
            SectionBody::Hero(s) => (SectionKind::Hero, to_attributes(s)),
            SectionBody::About(s) => (SectionKind::About, to_attributes(s)),
            SectionBody::Gallery(s) => (SectionKind::Gallery, to_attributes(s)),
            SectionBody::Reviews(s) => (SectionKind::Reviews, to_attributes(s)),
            SectionBody::Hours(s) => (SectionKind::Hours, to_attributes(s)),
            SectionBody::Contact(s) => (SectionKind::Contact, to_attributes(s)),
            SectionBody::Custom(s) => (SectionKind::Custom, to_attributes(s)),
            SectionBody::Unknown { kind, attributes } => return (kind.clone(), attributes.clone()),
        };
        (kind.as_str().to_string(), attributes)
    }

    /// `None` for unknown kinds.
    pub fn kind(&self) -> Option<SectionKind> {
        match self {
            SectionBody::Hero(_) => Some(SectionKind::Hero),
            SectionBody::About(_) => Some(SectionKind::About),
            SectionBody::Gallery(_) => Some(SectionKind::Gallery),
            SectionBody::Reviews(_) => Some(SectionKind::Reviews),
            SectionBody::Hours(_) => Some(SectionKind::Hours),
            SectionBody::Contact(_) => Some(SectionKind::Contact),
            SectionBody::Custom(_) => Some(SectionKind::Custom),
            SectionBody::Unknown { .. } => None,
        }
    }

    pub fn kind_name(&self) -> &str {
        match self {
            SectionBody::Unknown { kind, .. } => kind,
            known => known.kind().map(|k| k.as_str()).unwrap_or_default(),
        }
    }
}

impl Serialize for SectionBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (kind, mut attributes) = self.to_parts();
        if attributes.contains_key("kind") {
            return Err(S::Error::custom("section attributes may not contain `kind`"));
        }
        attributes.insert("kind".to_string(), Value::String(kind));
        attributes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SectionBody {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut attributes = Map::<String, Value>::deserialize(deserializer)?;
        let kind = match attributes.remove("kind") {
            Some(Value::String(kind)) => kind,
            _ => return Err(D::Error::custom(SectionError::MissingKind)),
        };
        SectionBody::from_parts(&kind, attributes).map_err(D::Error::custom)
    }
}

/// A section placed within a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    /// Explicit position; ties keep insertion order
    #[serde(default)]
    pub order: i64,
    #[serde(flatten)]
    pub body: SectionBody,
}

impl Section {
    pub fn new(id: impl Into<SectionId>, order: i64, body: SectionBody) -> Self {
        Self {
            id: id.into(),
            order,
            body,
        }
    }

    /// Parse one section from raw ingested JSON.
    pub fn from_value(value: Value) -> Result<Self, SectionError> {
        let Value::Object(mut map) = value else {
            return Err(SectionError::NotAnObject);
        };
        let kind = match map.remove("kind") {
            Some(Value::String(kind)) => kind,
            _ => return Err(SectionError::MissingKind),
        };
        let id = match map.remove("id") {
            Some(Value::String(id)) => SectionId::new(id),
            _ => {
                return Err(SectionError::InvalidAttributes {
                    kind,
                    message: "missing string `id`".to_string(),
                })
            }
        };
        let order = match map.remove("order") {
            None | Some(Value::Null) => 0,
            Some(Value::Number(n)) => n.as_i64().ok_or_else(|| SectionError::InvalidAttributes {
                kind: kind.clone(),
                message: "`order` must be an integer".to_string(),
            })?,
            Some(_) => {
                return Err(SectionError::InvalidAttributes {
                    kind,
                    message: "`order` must be an integer".to_string(),
                })
            }
        };

        Ok(Section {
            id,
            order,
            body: SectionBody::from_parts(&kind, map)?,
        })
    }
}

/// A section that could not be ingested.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestError {
    pub index: usize,
    pub error: SectionError,
}

/// Parse a list of raw sections, keeping the good ones.
///
/// Malformed known-kind sections are dropped and reported; unknown kinds
/// are kept.
pub fn sections_from_values(values: Vec<Value>) -> (Vec<Section>, Vec<IngestError>) {
    let mut sections = Vec::with_capacity(values.len());
    let mut errors = Vec::new();

    for (index, value) in values.into_iter().enumerate() {
        match Section::from_value(value) {
            Ok(section) => sections.push(section),
            Err(error) => {
                tracing::debug!(index, %error, "dropping malformed section");
                errors.push(IngestError { index, error });
            }
        }
    }

    (sections, errors)
}
