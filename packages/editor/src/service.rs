//! # Editor Service
//!
//! Entry point for every authoring operation. Ownership and plan checks run
//! before the content store is touched; accepted writes fan out to the
//! preview hub and the analytics sink.

use crate::collaborators::{AllowAll, AnalyticsEvent, AnalyticsSink, Entitlements, Feature, TracingAnalytics};
use crate::session::EditSession;
use crate::sync::{PreviewFrame, PreviewHub, PreviewSession, PreviewTheme};
use sitekit_common::{BusinessId, PageId, SiteError, SiteResult, UserId};
use sitekit_content::{
    compose_with, Business, BusinessDirectory, ComposeOptions, ContentStore, DraftPatch, Page,
    PageModel, Snapshot, SnapshotKind,
};
use sitekit_theme::{load_theme, presets, CachedTheme, ThemeCache, ThemeCatalog, ThemeSelection};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_THEME_TIMEOUT: Duration = Duration::from_millis(250);

pub struct EditorService {
    businesses: Arc<BusinessDirectory>,
    store: Arc<ContentStore>,
    catalog: Arc<ThemeCatalog>,
    themes: Arc<ThemeCache>,
    hub: Arc<PreviewHub>,
    entitlements: Arc<dyn Entitlements>,
    analytics: Arc<dyn AnalyticsSink>,
    theme_timeout: Duration,
    next_session: AtomicU64,
}

impl EditorService {
    pub fn new(
        businesses: Arc<BusinessDirectory>,
        store: Arc<ContentStore>,
        catalog: Arc<ThemeCatalog>,
        themes: Arc<ThemeCache>,
    ) -> Self {
        Self {
            businesses,
            store,
            catalog,
            themes,
            hub: Arc::new(PreviewHub::new()),
            entitlements: Arc::new(AllowAll),
            analytics: Arc::new(TracingAnalytics),
            theme_timeout: DEFAULT_THEME_TIMEOUT,
            next_session: AtomicU64::new(1),
        }
    }

    pub fn with_entitlements(mut self, entitlements: Arc<dyn Entitlements>) -> Self {
        self.entitlements = entitlements;
        self
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = analytics;
        self
    }

    pub fn with_theme_timeout(mut self, timeout: Duration) -> Self {
        self.theme_timeout = timeout;
        self
    }

    pub fn hub(&self) -> &Arc<PreviewHub> {
        &self.hub
    }

    pub fn store(&self) -> &Arc<ContentStore> {
        &self.store
    }

    pub fn businesses(&self) -> &Arc<BusinessDirectory> {
        &self.businesses
    }

    pub fn entitlements(&self) -> &Arc<dyn Entitlements> {
        &self.entitlements
    }

    /// The page and its business, if `actor` may edit it.
    pub fn authorize_page(&self, actor: &UserId, page_id: &PageId) -> SiteResult<(Business, Page)> {
        let page = self.store.page(page_id)?;
        let business = self.businesses.authorize_edit(actor, &page.business_id).map_err(|e| {
            tracing::warn!(page_id = %page_id, user_id = %actor, error = %e, "edit refused");
            e
        })?;
        Ok((business, page))
    }

    /// Compose options honouring the business's plan.
    pub fn compose_options(&self, business: &BusinessId) -> ComposeOptions {
        ComposeOptions {
            allowed_kinds: Some(self.entitlements.allowed_kinds(business)),
        }
    }

    /// The resolved theme for a business, served from the cache.
    ///
    /// Unknown theme ids, or a catalog that does not answer in time, fall
    /// back to the default preset.
    pub async fn resolved_theme(&self, business: &Business) -> Arc<CachedTheme> {
        let theme = load_theme(
            self.catalog.as_ref(),
            &business.theme.theme_id,
            self.catalog.default_theme(),
            self.theme_timeout,
        )
        .await;
        self.themes
            .get_or_resolve(&business.id, &theme, &business.theme.overrides)
    }

    pub fn open_session(self: &Arc<Self>, actor: &UserId, page_id: &PageId) -> SiteResult<EditSession> {
        let (business, _) = self.authorize_page(actor, page_id)?;
        let base_version = self.store.draft_version(page_id)?;
        let id = format!(
            "{page_id}:{actor}:{}",
            self.next_session.fetch_add(1, Ordering::Relaxed)
        );

        tracing::info!(session_id = %id, page_id = %page_id, base_version, "edit session opened");
        self.analytics.emit(AnalyticsEvent::SessionOpened {
            page_id: page_id.clone(),
            user_id: actor.clone(),
        });

        Ok(EditSession::new(
            id,
            self.clone(),
            actor.clone(),
            business.id,
            page_id.clone(),
            base_version,
        ))
    }

    /// The draft as the editor sees it.
    pub fn draft_model(&self, actor: &UserId, page_id: &PageId) -> SiteResult<PageModel> {
        let (business, _) = self.authorize_page(actor, page_id)?;
        let draft = self.store.get_snapshot(page_id, SnapshotKind::Draft)?;
        Ok(compose_with(&draft, &self.compose_options(&business.id)))
    }

    /// Apply `patch` against `base_version` of the draft.
    ///
    /// Conflict is returned as-is; it is up to the caller to refresh and
    /// retry.
    pub async fn propose_mutation(
        &self,
        actor: &UserId,
        page_id: &PageId,
        base_version: u64,
        patch: &DraftPatch,
    ) -> SiteResult<Arc<Snapshot>> {
        let (business, _) = self.authorize_page(actor, page_id)?;

        for kind in patch.section_kinds() {
            self.require(&business.id, Feature::Section(kind))?;
        }

        let draft = match self
            .store
            .mutate_draft(page_id, base_version, patch, Some(actor.clone()))
        {
            Ok(draft) => draft,
            Err(e) => {
                self.analytics.emit(AnalyticsEvent::MutationRejected {
                    page_id: page_id.clone(),
                    reason: e.kind(),
                });
                return Err(e);
            }
        };

        self.publish_preview(&business, &draft).await;
        self.analytics.emit(AnalyticsEvent::DraftMutated {
            page_id: page_id.clone(),
            version: draft.version,
        });
        Ok(draft)
    }

    pub fn promote(&self, actor: &UserId, page_id: &PageId) -> SiteResult<Arc<Snapshot>> {
        self.authorize_page(actor, page_id)?;
        let published = self.store.promote(page_id, Some(actor.clone()))?;
        self.analytics.emit(AnalyticsEvent::Promoted {
            page_id: page_id.clone(),
            revision: published.version,
        });
        Ok(published)
    }

    pub async fn revert(&self, actor: &UserId, page_id: &PageId) -> SiteResult<Arc<Snapshot>> {
        let (business, _) = self.authorize_page(actor, page_id)?;
        let draft = self
            .store
            .revert_draft_to_published(page_id, Some(actor.clone()))?;

        self.publish_preview(&business, &draft).await;
        self.analytics.emit(AnalyticsEvent::Reverted {
            page_id: page_id.clone(),
            version: draft.version,
        });
        Ok(draft)
    }

    /// Change a business's theme selection and push the new theme to every
    /// open preview of its pages.
    pub async fn update_theme(
        &self,
        actor: &UserId,
        business_id: &BusinessId,
        selection: ThemeSelection,
    ) -> SiteResult<Business> {
        self.businesses.authorize_edit(actor, business_id)?;

        if self.catalog.get(&selection.theme_id).is_none() {
            return Err(SiteError::validation(
                "themeId",
                format!("unknown theme {:?}", selection.theme_id),
            ));
        }
        let is_preset = presets::all().iter().any(|p| p.id == selection.theme_id);
        if !is_preset || !selection.overrides.is_empty() {
            self.require(business_id, Feature::CustomTheme)?;
        }

        let business = self.businesses.set_theme(actor, business_id, selection)?;
        self.themes.invalidate(business_id);

        let cached = self.resolved_theme(&business).await;
        let theme = Arc::new(PreviewTheme::from(cached.as_ref()));
        for page in self.store.pages_for(business_id) {
            self.hub
                .publish_theme(&page.id, business.theme_revision, theme.clone());
        }

        self.analytics.emit(AnalyticsEvent::ThemeChanged {
            business_id: business_id.clone(),
            theme_id: business.theme.theme_id.clone(),
        });
        Ok(business)
    }

    /// Watch the draft of a page. The first update is the current state.
    pub async fn subscribe_preview(&self, actor: &UserId, page_id: &PageId) -> SiteResult<PreviewSession> {
        let (business, _) = self.authorize_page(actor, page_id)?;
        let draft = self.store.get_snapshot(page_id, SnapshotKind::Draft)?;
        let frame = self.frame_for(&business, &draft).await;
        Ok(self.hub.subscribe(frame))
    }

    pub(crate) fn record_session_closed(&self, page_id: &PageId, actor: &UserId, mutations: usize) {
        self.analytics.emit(AnalyticsEvent::SessionClosed {
            page_id: page_id.clone(),
            user_id: actor.clone(),
            mutations,
        });
    }

    fn require(&self, business: &BusinessId, feature: Feature) -> SiteResult<()> {
        if self.entitlements.is_entitled(business, feature) {
            return Ok(());
        }
        tracing::info!(business_id = %business, %feature, "feature not entitled");
        Err(SiteError::NotEntitled {
            feature: feature.to_string(),
        })
    }

    async fn frame_for(&self, business: &Business, draft: &Snapshot) -> PreviewFrame {
        let page = compose_with(draft, &self.compose_options(&business.id));
        let cached = self.resolved_theme(business).await;
        PreviewFrame::new(page, business.theme_revision, PreviewTheme::from(cached.as_ref()))
    }

    async fn publish_preview(&self, business: &Business, draft: &Snapshot) {
        let frame = self.frame_for(business, draft).await;
        self.hub.publish(frame);
    }
}
