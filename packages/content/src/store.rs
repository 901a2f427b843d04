//! # Content Store
//!
//! Draft and published snapshots per page.
//!
//! ## Concurrency
//!
//! Each page lives behind its own lock, so writers on different pages
//! never contend. Draft writes are guarded by the version the caller saw:
//! a write against a stale version is rejected with `Conflict`, never
//! merged and never overwritten. Readers receive `Arc<Snapshot>` values
//! that are never mutated after publication, so a reader holding a
//! published snapshot is unaffected by later edits, promotions or
//! reverts.

use crate::patch::DraftPatch;
use crate::section::Section;
use crate::snapshot::{Snapshot, SnapshotKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitekit_common::{BusinessId, PageId, SiteError, SiteResult, UserId};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: PageId,
    pub business_id: BusinessId,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPage {
    /// Generated when absent
    pub id: Option<PageId>,
    pub business_id: BusinessId,
    pub slug: String,
    pub sections: Vec<Section>,
    pub author: Option<UserId>,
}

impl NewPage {
    pub fn new(business_id: impl Into<BusinessId>, slug: impl Into<String>) -> Self {
        Self {
            id: None,
            business_id: business_id.into(),
            slug: slug.into(),
            sections: Vec::new(),
            author: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<PageId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_sections(mut self, sections: Vec<Section>) -> Self {
        self.sections = sections;
        self
    }
}

struct PageRecord {
    page: Page,
    draft: Arc<Snapshot>,
    published: Option<Arc<Snapshot>>,
    /// Previously published snapshots, newest first
    history: VecDeque<Arc<Snapshot>>,
    last_revision: u64,
}

impl PageRecord {
    fn published(&self) -> SiteResult<&Arc<Snapshot>> {
        self.published
            .as_ref()
            .ok_or_else(|| SiteError::not_found("published snapshot", &self.page.id))
    }

    fn archive_published(&mut self, limit: usize) {
        if let Some(previous) = self.published.take() {
            self.history.push_front(previous);
            self.history.truncate(limit);
        }
    }
}

#[derive(Default)]
struct Index {
    pages: HashMap<PageId, Arc<RwLock<PageRecord>>>,
    slugs: HashMap<(BusinessId, String), PageId>,
}

pub struct ContentStore {
    index: RwLock<Index>,
    history_limit: usize,
    next_id: AtomicU64,
}

impl Default for ContentStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl ContentStore {
    pub fn new(history_limit: usize) -> Self {
        Self {
            index: RwLock::new(Index::default()),
            history_limit,
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a page with its initial draft at version 1 and nothing
    /// published.
    pub fn create_page(&self, new_page: NewPage) -> SiteResult<Page> {
        if !is_valid_slug(&new_page.slug) {
            return Err(SiteError::validation(
                "slug",
                format!("{:?} is not a URL-safe slug", new_page.slug),
            ));
        }

        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);

        let slug_key = (new_page.business_id.clone(), new_page.slug.clone());
        if index.slugs.contains_key(&slug_key) {
            return Err(SiteError::conflict(format!(
                "business {} already has a page at /{}",
                new_page.business_id, new_page.slug
            )));
        }

        let id = match new_page.id {
            Some(id) => id,
            None => self.generate_id(&index),
        };
        if index.pages.contains_key(&id) {
            return Err(SiteError::conflict(format!("page {id} already exists")));
        }

        let page = Page {
            id: id.clone(),
            business_id: new_page.business_id,
            slug: new_page.slug,
            created_at: Utc::now(),
        };
        let draft = Snapshot::draft(id.clone(), 1, new_page.sections, new_page.author);
        let record = PageRecord {
            page: page.clone(),
            draft: Arc::new(draft),
            published: None,
            history: VecDeque::new(),
            last_revision: 0,
        };

        index.slugs.insert(slug_key, id.clone());
        index.pages.insert(id, Arc::new(RwLock::new(record)));

        tracing::info!(page_id = %page.id, business_id = %page.business_id, slug = %page.slug, "page created");
        Ok(page)
    }

    fn generate_id(&self, index: &Index) -> PageId {
        loop {
            let n = self.next_id.fetch_add(1, Ordering::Relaxed);
            let id = PageId::new(format!("pg_{n}"));
            if !index.pages.contains_key(&id) {
                return id;
            }
        }
    }

    fn record(&self, page_id: &PageId) -> SiteResult<Arc<RwLock<PageRecord>>> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .pages
            .get(page_id)
            .cloned()
            .ok_or_else(|| SiteError::not_found("page", page_id))
    }

    pub fn page(&self, page_id: &PageId) -> SiteResult<Page> {
        let record = self.record(page_id)?;
        let record = record.read().unwrap_or_else(PoisonError::into_inner);
        Ok(record.page.clone())
    }

    pub fn page_by_slug(&self, business_id: &BusinessId, slug: &str) -> SiteResult<Page> {
        let page_id = self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .slugs
            .get(&(business_id.clone(), slug.to_string()))
            .cloned()
            .ok_or_else(|| SiteError::not_found("page", format!("{business_id}/{slug}")))?;
        self.page(&page_id)
    }

    /// Pages of a business, ordered by slug.
    pub fn pages_for(&self, business_id: &BusinessId) -> Vec<Page> {
        let records: Vec<_> = {
            let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
            index
                .slugs
                .iter()
                .filter(|((business, _), _)| business == business_id)
                .filter_map(|(_, id)| index.pages.get(id).cloned())
                .collect()
        };

        let mut pages: Vec<Page> = records
            .iter()
            .map(|r| r.read().unwrap_or_else(PoisonError::into_inner).page.clone())
            .collect();
        pages.sort_by(|a, b| a.slug.cmp(&b.slug));
        pages
    }

    pub fn get_snapshot(&self, page_id: &PageId, kind: SnapshotKind) -> SiteResult<Arc<Snapshot>> {
        let record = self.record(page_id)?;
        let record = record.read().unwrap_or_else(PoisonError::into_inner);
        match kind {
            SnapshotKind::Draft => Ok(record.draft.clone()),
            SnapshotKind::Published => record.published().cloned(),
        }
    }

    pub fn draft_version(&self, page_id: &PageId) -> SiteResult<u64> {
        Ok(self.get_snapshot(page_id, SnapshotKind::Draft)?.version)
    }

    /// Apply `patch` to the draft if it is still at `base_version`.
    ///
    /// On success the draft advances by exactly one version. A stale base
    /// yields `Conflict` carrying the current version; an invalid patch
    /// yields `Validation`/`NotFound`. Either way the draft is untouched.
    pub fn mutate_draft(
        &self,
        page_id: &PageId,
        base_version: u64,
        patch: &DraftPatch,
        author: Option<UserId>,
    ) -> SiteResult<Arc<Snapshot>> {
        let record = self.record(page_id)?;
        let mut record = record.write().unwrap_or_else(PoisonError::into_inner);

        let current = record.draft.version;
        if current != base_version {
            tracing::debug!(page_id = %page_id, base_version, current, "draft mutation rejected: stale base");
            return Err(SiteError::version_conflict(base_version, current));
        }

        let sections = patch.applied_to(&record.draft.sections).map_err(|e| {
            tracing::debug!(page_id = %page_id, error = %e, "draft mutation rejected: invalid patch");
            SiteError::from(e)
        })?;

        let draft = Arc::new(Snapshot::draft(page_id.clone(), current + 1, sections, author));
        record.draft = draft.clone();

        tracing::info!(page_id = %page_id, version = draft.version, "draft mutated");
        Ok(draft)
    }

    /// Copy the current draft into a new published snapshot.
    ///
    /// The previous published snapshot moves into the bounded history.
    pub fn promote(&self, page_id: &PageId, author: Option<UserId>) -> SiteResult<Arc<Snapshot>> {
        let record = self.record(page_id)?;
        let mut record = record.write().unwrap_or_else(PoisonError::into_inner);

        let revision = record.last_revision + 1;
        let published = Arc::new(Snapshot::published_from(&record.draft, revision, author));

        record.archive_published(self.history_limit);
        record.published = Some(published.clone());
        record.last_revision = revision;

        tracing::info!(
            page_id = %page_id,
            revision,
            draft_version = record.draft.version,
            "draft promoted"
        );
        Ok(published)
    }

    /// Replace the draft's sections with the published ones.
    ///
    /// The draft version still advances, so editors holding the old version
    /// get `Conflict` on their next write instead of silently editing
    /// content that no longer exists.
    pub fn revert_draft_to_published(&self, page_id: &PageId, author: Option<UserId>) -> SiteResult<Arc<Snapshot>> {
        let record = self.record(page_id)?;
        let mut record = record.write().unwrap_or_else(PoisonError::into_inner);

        let sections = record.published()?.sections.clone();
        let draft = Arc::new(Snapshot::draft(
            page_id.clone(),
            record.draft.version + 1,
            sections,
            author,
        ));
        record.draft = draft.clone();

        tracing::info!(page_id = %page_id, version = draft.version, "draft reverted to published");
        Ok(draft)
    }

    /// Publish an archived revision again, as a new revision.
    pub fn restore_published(
        &self,
        page_id: &PageId,
        revision: u64,
        author: Option<UserId>,
    ) -> SiteResult<Arc<Snapshot>> {
        let record = self.record(page_id)?;
        let mut record = record.write().unwrap_or_else(PoisonError::into_inner);

        let archived = record
            .history
            .iter()
            .find(|s| s.version == revision)
            .cloned()
            .ok_or_else(|| SiteError::not_found("published revision", format!("{page_id}@{revision}")))?;

        let next = record.last_revision + 1;
        let restored = Arc::new(Snapshot {
            version: next,
            author,
            created_at: Utc::now(),
            ..(*archived).clone()
        });

        record.archive_published(self.history_limit);
        record.published = Some(restored.clone());
        record.last_revision = next;

        tracing::info!(page_id = %page_id, restored_from = revision, revision = next, "published revision restored");
        Ok(restored)
    }

    /// Take the page offline. The draft is untouched.
    pub fn unpublish(&self, page_id: &PageId) -> SiteResult<Arc<Snapshot>> {
        let record = self.record(page_id)?;
        let mut record = record.write().unwrap_or_else(PoisonError::into_inner);

        let removed = record.published()?.clone();
        record.archive_published(self.history_limit);

        tracing::info!(page_id = %page_id, revision = removed.version, "page unpublished");
        Ok(removed)
    }

    /// Archived published snapshots, newest first.
    pub fn published_history(&self, page_id: &PageId) -> SiteResult<Vec<Arc<Snapshot>>> {
        let record = self.record(page_id)?;
        let record = record.read().unwrap_or_else(PoisonError::into_inner);
        Ok(record.history.iter().cloned().collect())
    }
}

/// Page slugs: 1–63 chars of `[a-z0-9-]`, no leading or trailing hyphen.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 63
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::{AboutSection, SectionBody};

    fn about(id: &str, body: &str) -> Section {
        Section::new(
            id,
            0,
            SectionBody::About(AboutSection {
                title: None,
                body: body.to_string(),
                image: None,
            }),
        )
    }

    fn store_with_page() -> (ContentStore, PageId) {
        let store = ContentStore::new(2);
        let page = store
            .create_page(NewPage::new("biz", "home").with_sections(vec![about("a", "v1")]))
            .unwrap();
        (store, page.id)
    }

    fn set_body(body: &str) -> DraftPatch {
        DraftPatch::UpdateSection {
            id: "a".into(),
            body: about("a", body).body,
        }
    }

    #[test]
    fn test_new_page_has_draft_only() {
        let (store, page) = store_with_page();
        assert_eq!(store.draft_version(&page).unwrap(), 1);
        let err = store.get_snapshot(&page, SnapshotKind::Published).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_slug_rules() {
        let (store, _) = store_with_page();
        assert!(store
            .create_page(NewPage::new("biz", "home"))
            .unwrap_err()
            .is_conflict());
        // Same slug under another business is fine
        store.create_page(NewPage::new("other", "home")).unwrap();
        assert_eq!(
            store.create_page(NewPage::new("biz", "Home Page")).unwrap_err().kind(),
            "validation"
        );
    }

    #[test]
    fn test_stale_base_is_rejected_without_change() {
        let (store, page) = store_with_page();
        store.mutate_draft(&page, 1, &set_body("v2"), None).unwrap();

        let err = store.mutate_draft(&page, 1, &set_body("lost"), None).unwrap_err();
        assert_eq!(
            err,
            SiteError::version_conflict(1, 2)
        );
        let draft = store.get_snapshot(&page, SnapshotKind::Draft).unwrap();
        assert_eq!(draft.version, 2);
        assert_eq!(draft.sections[0], about("a", "v2"));
    }

    #[test]
    fn test_invalid_patch_does_not_advance_version() {
        let (store, page) = store_with_page();
        let err = store
            .mutate_draft(&page, 1, &DraftPatch::RemoveSection { id: "zz".into() }, None)
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert_eq!(store.draft_version(&page).unwrap(), 1);
    }

    #[test]
    fn test_history_is_bounded_and_restorable() {
        let (store, page) = store_with_page();
        for (base, body) in [(1, "r1"), (2, "r2"), (3, "r3")] {
            store.mutate_draft(&page, base, &set_body(body), None).unwrap();
            store.promote(&page, None).unwrap();
        }

        let history = store.published_history(&page).unwrap();
        assert_eq!(history.iter().map(|s| s.version).collect::<Vec<_>>(), vec![2, 1]);

        let restored = store.restore_published(&page, 1, None).unwrap();
        assert_eq!(restored.version, 4);
        assert_eq!(restored.sections[0], about("a", "r1"));
        assert_eq!(restored.based_on, Some(2));

        // Limit of two: revision 1 fell out when 3 was archived
        let history = store.published_history(&page).unwrap();
        assert_eq!(history.iter().map(|s| s.version).collect::<Vec<_>>(), vec![3, 2]);
    }

    #[test]
    fn test_unpublish_keeps_draft() {
        let (store, page) = store_with_page();
        store.promote(&page, None).unwrap();
        store.unpublish(&page).unwrap();

        assert!(store.get_snapshot(&page, SnapshotKind::Published).is_err());
        assert_eq!(store.draft_version(&page).unwrap(), 1);
        assert!(store.unpublish(&page).is_err());

        // Revisions keep counting after an unpublish
        assert_eq!(store.promote(&page, None).unwrap().version, 2);
    }

    #[test]
    fn test_pages_for_business() {
        let (store, _) = store_with_page();
        store.create_page(NewPage::new("biz", "about")).unwrap();
        store.create_page(NewPage::new("other", "zzz")).unwrap();

        let slugs: Vec<_> = store
            .pages_for(&"biz".into())
            .into_iter()
            .map(|p| p.slug)
            .collect();
        assert_eq!(slugs, vec!["about", "home"]);
        assert!(store.page_by_slug(&"biz".into(), "about").is_ok());
        assert!(store.page_by_slug(&"biz".into(), "zzz").is_err());
    }
}
