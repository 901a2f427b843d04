//! # Draft Patches
//!
//! Edit operations on a draft's section list.
//!
//! A patch is applied to a copy of the sections and the copy replaces the
//! draft only when every step succeeded. A failing step inside a `Batch`
//! leaves the draft exactly as it was.

use crate::section::{Section, SectionBody, SectionKind};
use serde::{Deserialize, Serialize};
use sitekit_common::{SectionId, SiteError};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DraftPatch {
    /// Add a section. Its id must not already be present.
    InsertSection { section: Section },

    /// Replace the body of an existing section, keeping id and order
    UpdateSection { id: SectionId, body: SectionBody },

    RemoveSection { id: SectionId },

    /// Change a section's explicit order value
    MoveSection { id: SectionId, order: i64 },

    /// Swap in a whole new section list
    ReplaceSections { sections: Vec<Section> },

    Batch { patches: Vec<DraftPatch> },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchError {
    #[error("Section not found: {0}")]
    SectionNotFound(SectionId),

    #[error("Duplicate section id: {0}")]
    DuplicateSection(SectionId),

    #[error("Empty batch")]
    EmptyBatch,
}

impl From<PatchError> for SiteError {
    fn from(e: PatchError) -> Self {
        match e {
            PatchError::SectionNotFound(id) => SiteError::not_found("section", id),
            other => SiteError::validation("patch", other.to_string()),
        }
    }
}

impl DraftPatch {
    /// Apply to `sections` in place. Callers pass a copy.
    pub fn apply(&self, sections: &mut Vec<Section>) -> Result<(), PatchError> {
        match self {
            DraftPatch::InsertSection { section } => {
                if sections.iter().any(|s| s.id == section.id) {
                    return Err(PatchError::DuplicateSection(section.id.clone()));
                }
                sections.push(section.clone());
            }

            DraftPatch::UpdateSection { id, body } => {
                find_mut(sections, id)?.body = body.clone();
            }

            DraftPatch::RemoveSection { id } => {
                let index = sections
                    .iter()
                    .position(|s| &s.id == id)
                    .ok_or_else(|| PatchError::SectionNotFound(id.clone()))?;
                sections.remove(index);
            }

            DraftPatch::MoveSection { id, order } => {
                find_mut(sections, id)?.order = *order;
            }

            DraftPatch::ReplaceSections { sections: replacement } => {
                let mut seen = BTreeSet::new();
                for section in replacement {
                    if !seen.insert(&section.id) {
                        return Err(PatchError::DuplicateSection(section.id.clone()));
                    }
                }
                *sections = replacement.clone();
            }

            DraftPatch::Batch { patches } => {
                if patches.is_empty() {
                    return Err(PatchError::EmptyBatch);
                }
                for patch in patches {
                    patch.apply(sections)?;
                }
            }
        }
        Ok(())
    }

    /// Apply to a copy of `sections`, returning the result.
    pub fn applied_to(&self, sections: &[Section]) -> Result<Vec<Section>, PatchError> {
        let mut next = sections.to_vec();
        self.apply(&mut next)?;
        Ok(next)
    }

    /// Known section kinds this patch introduces, for entitlement checks.
    pub fn section_kinds(&self) -> BTreeSet<SectionKind> {
        let mut kinds = BTreeSet::new();
        self.collect_kinds(&mut kinds);
        kinds
    }

    fn collect_kinds(&self, kinds: &mut BTreeSet<SectionKind>) {
        match self {
            DraftPatch::InsertSection { section } => kinds.extend(section.body.kind()),
            DraftPatch::UpdateSection { body, .. } => kinds.extend(body.kind()),
            DraftPatch::ReplaceSections { sections } => {
                kinds.extend(sections.iter().filter_map(|s| s.body.kind()))
            }
            DraftPatch::Batch { patches } => {
                for patch in patches {
                    patch.collect_kinds(kinds);
                }
            }
            DraftPatch::RemoveSection { .. } | DraftPatch::MoveSection { .. } => {}
        }
    }
}

fn find_mut<'a>(sections: &'a mut [Section], id: &SectionId) -> Result<&'a mut Section, PatchError> {
    sections
        .iter_mut()
        .find(|s| &s.id == id)
        .ok_or_else(|| PatchError::SectionNotFound(id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::{AboutSection, HeroSection};
    use serde_json::json;

    fn hero(id: &str, order: i64, title: &str) -> Section {
        Section::new(
            id,
            order,
            SectionBody::Hero(HeroSection {
                title: title.to_string(),
                subtitle: None,
                background_image: None,
                cta: None,
            }),
        )
    }

    fn about(id: &str, order: i64) -> Section {
        Section::new(
            id,
            order,
            SectionBody::About(AboutSection {
                title: None,
                body: "Since 1982".to_string(),
                image: None,
            }),
        )
    }

    #[test]
    fn test_insert_update_move_remove() {
        let mut sections = vec![hero("h", 0, "Joe's")];

        DraftPatch::InsertSection { section: about("a", 10) }
            .apply(&mut sections)
            .unwrap();
        DraftPatch::MoveSection { id: "a".into(), order: -1 }
            .apply(&mut sections)
            .unwrap();
        DraftPatch::UpdateSection {
            id: "h".into(),
            body: hero("h", 0, "Joe's Pizza").body,
        }
        .apply(&mut sections)
        .unwrap();

        assert_eq!(sections[1].order, -1);
        assert_eq!(sections[0], hero("h", 0, "Joe's Pizza"));

        DraftPatch::RemoveSection { id: "h".into() }
            .apply(&mut sections)
            .unwrap();
        assert_eq!(sections.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut sections = vec![hero("h", 0, "Joe's")];
        let err = DraftPatch::InsertSection { section: about("h", 1) }
            .apply(&mut sections)
            .unwrap_err();
        assert_eq!(err, PatchError::DuplicateSection("h".into()));
    }

    #[test]
    fn test_failed_batch_leaves_input_untouched() {
        let original = vec![hero("h", 0, "Joe's")];
        let patch = DraftPatch::Batch {
            patches: vec![
                DraftPatch::InsertSection { section: about("a", 1) },
                DraftPatch::RemoveSection { id: "missing".into() },
            ],
        };

        let err = patch.applied_to(&original).unwrap_err();
        assert_eq!(err, PatchError::SectionNotFound("missing".into()));
        assert_eq!(original, vec![hero("h", 0, "Joe's")]);
    }

    #[test]
    fn test_section_kinds_walks_batches() {
        let patch = DraftPatch::Batch {
            patches: vec![
                DraftPatch::InsertSection { section: hero("h", 0, "x") },
                DraftPatch::ReplaceSections { sections: vec![about("a", 0)] },
                DraftPatch::RemoveSection { id: "z".into() },
            ],
        };
        let kinds: Vec<_> = patch.section_kinds().into_iter().collect();
        assert_eq!(kinds, vec![SectionKind::Hero, SectionKind::About]);
    }

    #[test]
    fn test_wire_format() {
        let patch: DraftPatch = serde_json::from_value(json!({
            "op": "move_section",
            "id": "s1",
            "order": 5
        }))
        .unwrap();
        assert_eq!(patch, DraftPatch::MoveSection { id: "s1".into(), order: 5 });

        let patch: DraftPatch = serde_json::from_value(json!({
            "op": "insert_section",
            "section": { "id": "s2", "order": 1, "kind": "about", "body": "Hi" }
        }))
        .unwrap();
        assert!(matches!(patch, DraftPatch::InsertSection { .. }));
    }
}
