//! # Theme Cache
//!
//! Resolved themes keyed by business id. Each entry remembers a
//! fingerprint of the inputs it was computed from; a lookup with a
//! different fingerprint recomputes. Invalidation is explicit and happens
//! whenever a business changes its theme selection.
//!
//! Fills are not coordinated: two page loads racing on the same business
//! both compute, and because resolution is pure they insert equal values.

use crate::engine::{resolve_theme, ResolvedTheme};
use crate::model::{Theme, ThemeOverrides};
use sitekit_common::BusinessId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTheme {
    pub business_id: BusinessId,
    pub fingerprint: u32,
    pub theme: ResolvedTheme,
    /// `to_style_block` output scoped to the business
    pub style_block: String,
}

/// CRC32 over the serialized inputs. Maps are ordered, so equal inputs
/// always hash equally.
pub fn fingerprint(theme: &Theme, overrides: &ThemeOverrides) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    // Serializing plain string maps cannot fail.
    hasher.update(&serde_json::to_vec(theme).unwrap_or_default());
    hasher.update(b"\0");
    hasher.update(&serde_json::to_vec(overrides).unwrap_or_default());
    hasher.finalize()
}

#[derive(Default)]
pub struct ThemeCache {
    entries: RwLock<HashMap<BusinessId, Arc<CachedTheme>>>,
}

impl ThemeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached theme for `business_id`, computing it if missing
    /// or stale.
    pub fn get_or_resolve(
        &self,
        business_id: &BusinessId,
        theme: &Theme,
        overrides: &ThemeOverrides,
    ) -> Arc<CachedTheme> {
        let fingerprint = fingerprint(theme, overrides);

        if let Some(entry) = self.get(business_id) {
            if entry.fingerprint == fingerprint {
                return entry;
            }
        }

        let resolved = resolve_theme(theme, overrides);
        if !resolved.rejected.is_empty() {
            tracing::warn!(
                business_id = %business_id,
                rejected = resolved.rejected.len(),
                "theme values rejected by sanitizer"
            );
        }

        let entry = Arc::new(CachedTheme {
            business_id: business_id.clone(),
            fingerprint,
            style_block: resolved.to_style_block(business_id.as_str()),
            theme: resolved,
        });

        tracing::debug!(business_id = %business_id, fingerprint, "theme cache filled");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(business_id.clone(), entry.clone());
        entry
    }

    pub fn get(&self, business_id: &BusinessId) -> Option<Arc<CachedTheme>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(business_id)
            .cloned()
    }

    /// Drop the entry for `business_id`. Returns whether one existed.
    pub fn invalidate(&self, business_id: &BusinessId) -> bool {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(business_id)
            .is_some();
        if removed {
            tracing::debug!(business_id = %business_id, "theme cache invalidated");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
