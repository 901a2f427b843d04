use crate::section::Section;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitekit_common::{PageId, UserId};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    Draft,
    Published,
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotKind::Draft => f.write_str("draft"),
            SnapshotKind::Published => f.write_str("published"),
        }
    }
}

/// An ordered section list plus its version stamp.
///
/// Snapshots are values: the store hands out `Arc<Snapshot>` and never
/// mutates one after it has been shared. A new draft version or a new
/// published revision is always a new `Snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub page_id: PageId,
    pub kind: SnapshotKind,
    /// Draft: mutation counter. Published: publish revision.
    pub version: u64,
    /// For published snapshots, the draft version that was copied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub based_on: Option<u64>,
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn draft(page_id: PageId, version: u64, sections: Vec<Section>, author: Option<UserId>) -> Self {
        Self {
            page_id,
            kind: SnapshotKind::Draft,
            version,
            based_on: None,
            sections,
            author,
            created_at: Utc::now(),
        }
    }

    /// Copy of `draft` as published revision `revision`.
    pub fn published_from(draft: &Snapshot, revision: u64, author: Option<UserId>) -> Self {
        Self {
            page_id: draft.page_id.clone(),
            kind: SnapshotKind::Published,
            version: revision,
            based_on: Some(draft.version),
            sections: draft.sections.clone(),
            author,
            created_at: Utc::now(),
        }
    }

    pub fn is_draft(&self) -> bool {
        self.kind == SnapshotKind::Draft
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id.as_str() == id)
    }
}
