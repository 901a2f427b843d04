//! Businesses (tenants) and their ownership.
//!
//! Businesses are created by ingestion, unowned, and later claimed by the
//! person who runs them. They are never deleted; archiving hides them from
//! routing and stops further edits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitekit_common::{BusinessId, SiteError, SiteResult, UserId};
use sitekit_theme::ThemeSelection;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: BusinessId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserId>,
    #[serde(default)]
    pub theme: ThemeSelection,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every theme change
    #[serde(default)]
    pub theme_revision: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBusiness {
    pub id: BusinessId,
    pub display_name: String,
    #[serde(default)]
    pub owner: Option<UserId>,
    #[serde(default)]
    pub theme: ThemeSelection,
}

#[derive(Default)]
pub struct BusinessDirectory {
    businesses: RwLock<HashMap<BusinessId, Business>>,
}

impl BusinessDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, new: NewBusiness) -> SiteResult<Business> {
        let display_name = new.display_name.trim();
        if display_name.is_empty() {
            return Err(SiteError::validation("displayName", "display name is required"));
        }

        let mut businesses = self.businesses.write().unwrap_or_else(PoisonError::into_inner);
        if businesses.contains_key(&new.id) {
            return Err(SiteError::conflict(format!("business {} already exists", new.id)));
        }

        let now = Utc::now();
        let business = Business {
            id: new.id.clone(),
            display_name: display_name.to_string(),
            owner: new.owner,
            theme: new.theme,
            archived: false,
            created_at: now,
            updated_at: now,
            theme_revision: 0,
        };
        businesses.insert(new.id, business.clone());

        tracing::info!(business_id = %business.id, "business registered");
        Ok(business)
    }

    /// Look up a business, archived or not.
    pub fn get(&self, id: &BusinessId) -> SiteResult<Business> {
        self.businesses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| SiteError::not_found("business", id))
    }

    /// Look up a business that is still live. Archived ones are NotFound.
    pub fn get_active(&self, id: &BusinessId) -> SiteResult<Business> {
        match self.get(id)? {
            business if business.archived => Err(SiteError::not_found("business", id)),
            business => Ok(business),
        }
    }

    fn update<F>(&self, id: &BusinessId, f: F) -> SiteResult<Business>
    where
        F: FnOnce(&mut Business) -> SiteResult<()>,
    {
        let mut businesses = self.businesses.write().unwrap_or_else(PoisonError::into_inner);
        let business = businesses
            .get_mut(id)
            .ok_or_else(|| SiteError::not_found("business", id))?;

        // Work on a copy so a failing update leaves the entry unchanged.
        let mut next = business.clone();
        f(&mut next)?;
        next.updated_at = Utc::now();
        *business = next.clone();
        Ok(next)
    }

    /// Record `user` as owner. Succeeds when unowned or already owned by
    /// `user`.
    pub fn claim_ownership(&self, id: &BusinessId, user: &UserId) -> SiteResult<Business> {
        let business = self.update(id, |b| {
            ensure_live(b)?;
            match &b.owner {
                Some(owner) if owner != user => Err(SiteError::unauthorized(format!(
                    "business {id} is already claimed"
                ))),
                _ => {
                    b.owner = Some(user.clone());
                    Ok(())
                }
            }
        })?;
        tracing::info!(business_id = %id, user_id = %user, "business claimed");
        Ok(business)
    }

    pub fn transfer_ownership(&self, actor: &UserId, id: &BusinessId, new_owner: &UserId) -> SiteResult<Business> {
        let business = self.update(id, |b| {
            ensure_owner(b, actor)?;
            b.owner = Some(new_owner.clone());
            Ok(())
        })?;
        tracing::info!(business_id = %id, from = %actor, to = %new_owner, "ownership transferred");
        Ok(business)
    }

    /// Soft delete.
    pub fn archive(&self, actor: &UserId, id: &BusinessId) -> SiteResult<Business> {
        let business = self.update(id, |b| {
            ensure_owner(b, actor)?;
            b.archived = true;
            Ok(())
        })?;
        tracing::info!(business_id = %id, "business archived");
        Ok(business)
    }

    pub fn set_theme(&self, actor: &UserId, id: &BusinessId, theme: ThemeSelection) -> SiteResult<Business> {
        let business = self.update(id, |b| {
            ensure_owner(b, actor)?;
            b.theme = theme;
            b.theme_revision += 1;
            Ok(())
        })?;
        tracing::info!(
            business_id = %id,
            theme_id = %business.theme.theme_id,
            theme_revision = business.theme_revision,
            "theme selection changed"
        );
        Ok(business)
    }

    /// The business if `actor` may edit it.
    pub fn authorize_edit(&self, actor: &UserId, id: &BusinessId) -> SiteResult<Business> {
        let business = self.get(id)?;
        ensure_owner(&business, actor)?;
        Ok(business)
    }
}

fn ensure_live(business: &Business) -> SiteResult<()> {
    if business.archived {
        return Err(SiteError::not_found("business", &business.id));
    }
    Ok(())
}

fn ensure_owner(business: &Business, actor: &UserId) -> SiteResult<()> {
    ensure_live(business)?;
    match &business.owner {
        Some(owner) if owner == actor => Ok(()),
        _ => Err(SiteError::unauthorized(format!(
            "{actor} does not own business {}",
            business.id
        ))),
    }
}
