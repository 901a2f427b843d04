use crate::config::ServerConfig;
use sitekit_content::{BusinessDirectory, ContentStore};
use sitekit_editor::{AllowAll, EditorService, Entitlements};
use sitekit_routing::{DomainTable, HostResolver, TenantRouter};
use sitekit_theme::{ThemeCache, ThemeCatalog};
use std::sync::Arc;

/// Everything the HTTP handlers share.
pub struct AppState {
    pub config: ServerConfig,
    pub domains: Arc<DomainTable>,
    pub router: TenantRouter<Arc<DomainTable>>,
    pub businesses: Arc<BusinessDirectory>,
    pub store: Arc<ContentStore>,
    pub catalog: Arc<ThemeCatalog>,
    pub editor: Arc<EditorService>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_entitlements(config, Arc::new(AllowAll))
    }

    pub fn with_entitlements(config: ServerConfig, entitlements: Arc<dyn Entitlements>) -> Self {
        let resolver = HostResolver::new(&config.root_domain, &config.local_alias);
        let domains = Arc::new(DomainTable::new(
            resolver.clone(),
            config.reserved_subdomains.iter().cloned(),
        ));
        let router = TenantRouter::new(resolver, domains.clone(), config.lookup_timeout());

        let businesses = Arc::new(BusinessDirectory::new());
        let store = Arc::new(ContentStore::new(config.published_history_limit));
        let catalog = Arc::new(ThemeCatalog::with_presets());
        let editor = EditorService::new(
            businesses.clone(),
            store.clone(),
            catalog.clone(),
            Arc::new(ThemeCache::new()),
        )
        .with_entitlements(entitlements)
        .with_theme_timeout(config.lookup_timeout());

        Self {
            config,
            domains,
            router,
            businesses,
            store,
            catalog,
            editor: Arc::new(editor),
        }
    }
}
