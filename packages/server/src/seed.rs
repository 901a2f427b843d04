//! Startup data: businesses, their domains and pages, as handed over by
//! the ingestion pipeline.
//!
//! ```json
//! {
//!   "businesses": [{
//!     "id": "joes",
//!     "displayName": "Joe's Pizza",
//!     "owner": "joe",
//!     "subdomain": "joes-pizza",
//!     "pages": [{ "slug": "home", "publish": true, "sections": [ ... ] }]
//!   }]
//! }
//! ```
//!
//! Sections go through ingestion, so malformed ones are dropped and
//! counted rather than failing the whole load.

use crate::state::AppState;
use anyhow::Context;
use serde::Deserialize;
use sitekit_content::{sections_from_values, NewBusiness, NewPage};
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedFile {
    #[serde(default)]
    pub businesses: Vec<SeedBusiness>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedBusiness {
    #[serde(flatten)]
    pub business: NewBusiness,

    /// Explicit subdomain; generated from the display name when absent
    #[serde(default)]
    pub subdomain: Option<String>,

    #[serde(default)]
    pub custom_domain: Option<String>,

    #[serde(default)]
    pub pages: Vec<SeedPage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedPage {
    #[serde(default)]
    pub id: Option<String>,
    pub slug: String,
    #[serde(default)]
    pub sections: Vec<serde_json::Value>,
    /// Promote the initial draft right away
    #[serde(default)]
    pub publish: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub businesses: usize,
    pub pages: usize,
    pub dropped_sections: usize,
}

pub fn load_seed(path: &Path) -> anyhow::Result<SeedFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let seed = serde_json::from_str(&content)
        .with_context(|| format!("parsing seed file {}", path.display()))?;
    Ok(seed)
}

pub fn apply_seed(state: &AppState, seed: SeedFile) -> anyhow::Result<SeedReport> {
    let mut report = SeedReport::default();

    for entry in seed.businesses {
        let business = state.businesses.register(entry.business)?;
        report.businesses += 1;

        let domain = match &entry.subdomain {
            Some(name) => state.domains.claim_subdomain(&business.id, name)?,
            None => state
                .domains
                .generate_subdomain(&business.id, &business.display_name)?,
        };
        tracing::debug!(business_id = %business.id, subdomain = %domain.host, "seeded subdomain");

        if let Some(host) = &entry.custom_domain {
            state.domains.link_custom_domain(&business.id, host)?;
        }

        for page in entry.pages {
            let (sections, errors) = sections_from_values(page.sections);
            for error in &errors {
                tracing::warn!(
                    business_id = %business.id,
                    slug = %page.slug,
                    index = error.index,
                    error = %error.error,
                    "seed section dropped"
                );
            }
            report.dropped_sections += errors.len();

            let mut new_page = NewPage::new(business.id.clone(), page.slug).with_sections(sections);
            if let Some(id) = page.id {
                new_page = new_page.with_id(id);
            }
            let created = state.store.create_page(new_page)?;
            if page.publish {
                state.store.promote(&created.id, None)?;
            }
            report.pages += 1;
        }
    }

    tracing::info!(
        businesses = report.businesses,
        pages = report.pages,
        dropped_sections = report.dropped_sections,
        "seed loaded"
    );
    Ok(report)
}
