//! # Sitekit Content
//!
//! Businesses, their pages, and the two content states every page has.
//!
//! ```text
//!                 mutate_draft(base_version, patch)
//!                         │
//!                         ▼
//!   ┌──────────┐   promote   ┌────────────┐
//!   │  draft   │ ──────────► │ published  │ ──► history (bounded)
//!   │ (v, v+1) │ ◄────────── │ (rev r)    │
//!   └──────────┘   revert    └────────────┘
//!         │                        │
//!         └──────── compose ───────┴──► PageModel
//! ```
//!
//! Drafts are versioned and guarded by optimistic concurrency; published
//! snapshots are immutable once written.

mod business;
mod composer;
mod patch;
mod section;
mod snapshot;
mod store;

pub use business::{Business, BusinessDirectory, NewBusiness};
pub use composer::{compose, compose_with, ComposeOptions, ComposedSection, Diagnostic, PageModel, Severity};
pub use patch::{DraftPatch, PatchError};
pub use section::{
    sections_from_values, AboutSection, CallToAction, ContactSection, CustomSection, GallerySection,
    HeroSection, HoursEntry, HoursSection, IngestError, MediaRef, Review, ReviewsSection, Section,
    SectionBody, SectionError, SectionKind, Weekday,
};
pub use snapshot::{Snapshot, SnapshotKind};
pub use store::{is_valid_slug, ContentStore, NewPage, Page, DEFAULT_HISTORY_LIMIT};
