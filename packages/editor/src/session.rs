//! # Edit Sessions
//!
//! An EditSession is one author's connection to one page's draft. It
//! remembers the draft version its view is based on and the mutations it
//! has had accepted.
//!
//! Sessions do not hold locks and do not queue writes: every proposal goes
//! straight to the store, guarded by the session's base version. When
//! another author got there first the proposal comes back as `Conflict`
//! and the session stays where it was until `refresh` is called.

use crate::service::EditorService;
use chrono::{DateTime, Utc};
use sitekit_common::{BusinessId, PageId, SiteError, SiteResult, UserId};
use sitekit_content::{DraftPatch, Snapshot};
use std::sync::Arc;

/// A mutation the store accepted
#[derive(Debug, Clone)]
pub struct AppliedMutation {
    /// Draft version the mutation produced
    pub version: u64,
    pub patch: DraftPatch,
    pub applied_at: DateTime<Utc>,
}

pub struct EditSession {
    id: String,
    service: Arc<EditorService>,
    user: UserId,
    business_id: BusinessId,
    page_id: PageId,
    base_version: u64,
    applied: Vec<AppliedMutation>,
    closed: bool,
}

impl EditSession {
    pub(crate) fn new(
        id: String,
        service: Arc<EditorService>,
        user: UserId,
        business_id: BusinessId,
        page_id: PageId,
        base_version: u64,
    ) -> Self {
        Self {
            id,
            service,
            user,
            business_id,
            page_id,
            base_version,
            applied: Vec::new(),
            closed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    pub fn business_id(&self) -> &BusinessId {
        &self.business_id
    }

    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    pub fn applied(&self) -> &[AppliedMutation] {
        &self.applied
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> SiteResult<()> {
        if self.closed {
            return Err(SiteError::validation("session", format!("session {} is closed", self.id)));
        }
        Ok(())
    }

    /// Propose `patch` against the session's base version.
    pub async fn propose(&mut self, patch: DraftPatch) -> SiteResult<Arc<Snapshot>> {
        self.ensure_open()?;

        let result = self
            .service
            .propose_mutation(&self.user, &self.page_id, self.base_version, &patch)
            .await;

        match &result {
            Ok(draft) => {
                self.base_version = draft.version;
                self.applied.push(AppliedMutation {
                    version: draft.version,
                    patch,
                    applied_at: Utc::now(),
                });
            }
            Err(e) if e.is_conflict() => {
                tracing::debug!(session_id = %self.id, base_version = self.base_version, "proposal conflicted");
            }
            Err(_) => {}
        }
        result
    }

    /// Rebase onto the current draft. Returns the new base version.
    pub fn refresh(&mut self) -> SiteResult<u64> {
        self.ensure_open()?;
        let version = self.service.store().draft_version(&self.page_id)?;
        if version != self.base_version {
            tracing::debug!(session_id = %self.id, from = self.base_version, to = version, "session rebased");
        }
        self.base_version = version;
        Ok(version)
    }

    /// End the session. Mutations already accepted stay in the draft.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        tracing::info!(session_id = %self.id, mutations = self.applied.len(), "edit session closed");
        self.service
            .record_session_closed(&self.page_id, &self.user, self.applied.len());
    }
}

impl Drop for EditSession {
    fn drop(&mut self) {
        self.close();
    }
}
