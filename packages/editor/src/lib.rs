//! # Sitekit Editor
//!
//! Authoring side of the engine: edit sessions, the editor service that
//! guards every write, and live preview synchronization.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐  propose(base, patch)  ┌──────────────────────────┐
//! │  EditSession  │ ─────────────────────► │      EditorService       │
//! └───────────────┘ ◄──── Conflict ─────── │  authorize → entitle →   │
//!                                          │  ContentStore::mutate    │
//!                                          └────────────┬─────────────┘
//!                                                       │ PreviewFrame
//!                                                       ▼
//!                                          ┌──────────────────────────┐
//!                                          │  PreviewHub (watch/page) │
//!                                          └────────────┬─────────────┘
//!                                                       ▼
//!                                              PreviewSession × N
//! ```
//!
//! ## Core Principles
//!
//! 1. **Store is source of truth**: previews are views of the draft
//! 2. **No last-writer-wins**: stale proposals fail with `Conflict`
//! 3. **Latest state, not replay**: observers that fall behind skip ahead

mod collaborators;
mod service;
mod session;
mod sync;

pub use collaborators::{
    AllowAll, AnalyticsEvent, AnalyticsSink, ChannelAnalytics, Entitlements, Feature, PlanEntitlements,
    TracingAnalytics,
};
pub use service::EditorService;
pub use session::{AppliedMutation, EditSession};
pub use sync::{PreviewFrame, PreviewHub, PreviewSession, PreviewState, PreviewTheme};
