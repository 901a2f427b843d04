//! # Collaborators
//!
//! Narrow seams to services the editor consults but does not implement:
//! the billing plan (is a feature entitled?) and the analytics sink
//! (fire-and-forget events).

use serde::Serialize;
use sitekit_common::{BusinessId, PageId, UserId};
use sitekit_content::SectionKind;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc;

/// Plan-gated features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "feature", content = "kind", rename_all = "snake_case")]
pub enum Feature {
    Section(SectionKind),
    CustomTheme,
    CustomDomain,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::Section(kind) => write!(f, "section:{kind}"),
            Feature::CustomTheme => f.write_str("custom_theme"),
            Feature::CustomDomain => f.write_str("custom_domain"),
        }
    }
}

pub trait Entitlements: Send + Sync {
    fn is_entitled(&self, business: &BusinessId, feature: Feature) -> bool;

    /// Section kinds `business` may show.
    fn allowed_kinds(&self, business: &BusinessId) -> BTreeSet<SectionKind> {
        SectionKind::ALL
            .into_iter()
            .filter(|kind| self.is_entitled(business, Feature::Section(*kind)))
            .collect()
    }
}

/// Everything is entitled. Used when no billing service is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Entitlements for AllowAll {
    fn is_entitled(&self, _business: &BusinessId, _feature: Feature) -> bool {
        true
    }
}

/// Static feature sets per business, with a fallback plan for businesses
/// that have none recorded.
pub struct PlanEntitlements {
    default_plan: BTreeSet<Feature>,
    plans: RwLock<HashMap<BusinessId, BTreeSet<Feature>>>,
}

impl PlanEntitlements {
    pub fn new(default_plan: impl IntoIterator<Item = Feature>) -> Self {
        Self {
            default_plan: default_plan.into_iter().collect(),
            plans: RwLock::new(HashMap::new()),
        }
    }

    /// The free plan: every section kind except custom HTML, presets only.
    pub fn free() -> Self {
        Self::new(
            SectionKind::ALL
                .into_iter()
                .filter(|kind| *kind != SectionKind::Custom)
                .map(Feature::Section),
        )
    }

    pub fn set_plan(&self, business: BusinessId, features: impl IntoIterator<Item = Feature>) {
        self.plans
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(business, features.into_iter().collect());
    }
}

impl Entitlements for PlanEntitlements {
    fn is_entitled(&self, business: &BusinessId, feature: Feature) -> bool {
        match self
            .plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(business)
        {
            Some(plan) => plan.contains(&feature),
            None => self.default_plan.contains(&feature),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    SessionOpened { page_id: PageId, user_id: UserId },
    SessionClosed { page_id: PageId, user_id: UserId, mutations: usize },
    DraftMutated { page_id: PageId, version: u64 },
    MutationRejected { page_id: PageId, reason: &'static str },
    Promoted { page_id: PageId, revision: u64 },
    Reverted { page_id: PageId, version: u64 },
    ThemeChanged { business_id: BusinessId, theme_id: String },
}

/// Receives analytics events. Implementations must not block.
pub trait AnalyticsSink: Send + Sync {
    fn emit(&self, event: AnalyticsEvent);
}

/// Writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn emit(&self, event: AnalyticsEvent) {
        tracing::info!(target: "sitekit::analytics", ?event, "analytics event");
    }
}

/// Forwards events to a bounded channel, dropping them when it is full.
#[derive(Debug, Clone)]
pub struct ChannelAnalytics {
    sender: mpsc::Sender<AnalyticsEvent>,
}

impl ChannelAnalytics {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AnalyticsEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

impl AnalyticsSink for ChannelAnalytics {
    fn emit(&self, event: AnalyticsEvent) {
        if let Err(e) = self.sender.try_send(event) {
            tracing::debug!(error = %e, "analytics event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_entitlements() {
        let plans = PlanEntitlements::free();
        let joes = BusinessId::new("joes");
        let pro = BusinessId::new("pro");
        plans.set_plan(pro.clone(), [Feature::CustomTheme, Feature::Section(SectionKind::Custom)]);

        assert!(plans.is_entitled(&joes, Feature::Section(SectionKind::Hero)));
        assert!(!plans.is_entitled(&joes, Feature::Section(SectionKind::Custom)));
        assert!(!plans.is_entitled(&joes, Feature::CustomTheme));

        assert!(plans.is_entitled(&pro, Feature::CustomTheme));
        assert!(!plans.is_entitled(&pro, Feature::Section(SectionKind::Hero)));
        assert_eq!(
            plans.allowed_kinds(&pro).into_iter().collect::<Vec<_>>(),
            vec![SectionKind::Custom]
        );
    }

    #[test]
    fn test_feature_names() {
        assert_eq!(Feature::Section(SectionKind::Gallery).to_string(), "section:gallery");
        assert_eq!(Feature::CustomDomain.to_string(), "custom_domain");
    }

    #[tokio::test]
    async fn test_channel_analytics_drops_when_full() {
        let (sink, mut rx) = ChannelAnalytics::new(1);
        let event = |version| AnalyticsEvent::DraftMutated {
            page_id: "p".into(),
            version,
        };

        sink.emit(event(1));
        sink.emit(event(2));

        assert_eq!(rx.recv().await, Some(event(1)));
        assert!(rx.try_recv().is_err());
    }
}
