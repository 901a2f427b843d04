//! HTTP surface.
//!
//! Public site routes are keyed by the `Host` header; editor routes by the
//! authenticated user in `x-user-id`, which the identity provider in front
//! of this server sets.

use crate::state::AppState;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post, put},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use sitekit_common::{BusinessId, PageId, SiteError, SiteResult, UserId};
use sitekit_content::{compose_with, Business, DraftPatch, PageModel, Snapshot, SnapshotKind};
use sitekit_editor::Feature;
use sitekit_routing::{Domain, HostKind, Route};
use sitekit_theme::{FontDeclaration, ThemeSelection};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const USER_HEADER: &str = "x-user-id";
const DEFAULT_SLUG: &str = "home";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/site", get(site_handler))
        .route("/api/site/theme.css", get(theme_css_handler))
        .route("/api/editor/pages/:page_id", get(draft_handler))
        .route("/api/editor/pages/:page_id/mutations", post(mutation_handler))
        .route("/api/editor/pages/:page_id/promote", post(promote_handler))
        .route("/api/editor/pages/:page_id/revert", post(revert_handler))
        .route("/api/editor/pages/:page_id/preview", get(preview_sse_handler))
        .route("/api/editor/businesses/:business_id/theme", put(theme_handler))
        .route("/api/editor/businesses/:business_id/subdomain", post(subdomain_handler))
        .route("/api/editor/businesses/:business_id/custom-domain", post(custom_domain_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Errors and extractors
// ============================================================================

/// `SiteError` rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError(pub SiteError);

impl From<SiteError> for ApiError {
    fn from(e: SiteError) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_version: Option<u64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SiteError::NotFound { .. } => StatusCode::NOT_FOUND,
            SiteError::Conflict { .. } => StatusCode::CONFLICT,
            SiteError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            SiteError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            SiteError::NotEntitled { .. } => StatusCode::FORBIDDEN,
            SiteError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            SiteError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let current_version = match &self.0 {
            SiteError::Conflict { current_version, .. } => *current_version,
            _ => None,
        };
        let body = ErrorBody {
            error: self.0.kind(),
            message: self.0.to_string(),
            current_version,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// The authenticated user making an editor request.
pub struct Actor(pub UserId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Actor(UserId::new(v)))
            .ok_or_else(|| ApiError(SiteError::unauthorized(format!("missing {USER_HEADER} header"))))
    }
}

fn host_header(headers: &HeaderMap) -> &str {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

// ============================================================================
// Public site
// ============================================================================

#[derive(Debug, Deserialize)]
struct SiteQuery {
    slug: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThemePayload {
    css: BTreeMap<String, String>,
    dark_css: BTreeMap<String, String>,
    font_declarations: Vec<FontDeclaration>,
    style_block: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SiteBusiness {
    id: BusinessId,
    display_name: String,
}

#[derive(Serialize)]
#[serde(tag = "route", rename_all = "snake_case")]
enum SiteResponse {
    Marketing {
        host: HostKind,
    },
    Tenant {
        business: SiteBusiness,
        page: PageModel,
        theme: ThemePayload,
    },
}

/// Route the request's host to a live business.
async fn tenant_for(state: &AppState, headers: &HeaderMap) -> SiteResult<Result<(Business, Domain), Route>> {
    let host = host_header(headers);
    match state.router.route(host).await {
        Route::Tenant { domain } => {
            let business = state.businesses.get_active(&domain.business_id)?;
            Ok(Ok((business, domain)))
        }
        Route::NotFound => Err(SiteError::not_found("site", host)),
        marketing => Ok(Err(marketing)),
    }
}

async fn site_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SiteQuery>,
) -> ApiResult<Json<SiteResponse>> {
    let (business, domain) = match tenant_for(&state, &headers).await? {
        Ok(tenant) => tenant,
        Err(Route::Marketing { host }) => return Ok(Json(SiteResponse::Marketing { host })),
        Err(_) => return Err(SiteError::not_found("site", host_header(&headers)).into()),
    };

    let slug = query.slug.as_deref().unwrap_or(DEFAULT_SLUG);
    let page = state.store.page_by_slug(&business.id, slug)?;
    let published = state.store.get_snapshot(&page.id, SnapshotKind::Published)?;
    let model = compose_with(&published, &state.editor.compose_options(&business.id));
    let cached = state.editor.resolved_theme(&business).await;

    tracing::debug!(
        business_id = %business.id,
        via = ?domain.kind,
        page_id = %page.id,
        revision = published.version,
        "site served"
    );

    Ok(Json(SiteResponse::Tenant {
        business: SiteBusiness {
            id: business.id.clone(),
            display_name: business.display_name.clone(),
        },
        page: model,
        theme: ThemePayload {
            css: cached.theme.css.clone(),
            dark_css: cached.theme.dark_css.clone(),
            font_declarations: cached.theme.font_declarations.clone(),
            style_block: cached.style_block.clone(),
        },
    }))
}

async fn theme_css_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Response> {
    let business = match tenant_for(&state, &headers).await? {
        Ok((business, _)) => business,
        Err(_) => return Err(SiteError::not_found("site", host_header(&headers)).into()),
    };

    let cached = state.editor.resolved_theme(&business).await;
    Ok((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        cached.style_block.clone(),
    )
        .into_response())
}

// ============================================================================
// Editor
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MutationRequest {
    base_version: u64,
    patch: DraftPatch,
}

async fn draft_handler(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
    Path(page_id): Path<PageId>,
) -> ApiResult<Json<PageModel>> {
    Ok(Json(state.editor.draft_model(&user, &page_id)?))
}

async fn mutation_handler(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
    Path(page_id): Path<PageId>,
    Json(request): Json<MutationRequest>,
) -> ApiResult<Json<Arc<Snapshot>>> {
    let draft = state
        .editor
        .propose_mutation(&user, &page_id, request.base_version, &request.patch)
        .await?;
    Ok(Json(draft))
}

async fn promote_handler(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
    Path(page_id): Path<PageId>,
) -> ApiResult<Json<Arc<Snapshot>>> {
    Ok(Json(state.editor.promote(&user, &page_id)?))
}

async fn revert_handler(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
    Path(page_id): Path<PageId>,
) -> ApiResult<Json<Arc<Snapshot>>> {
    Ok(Json(state.editor.revert(&user, &page_id).await?))
}

/// SSE stream of preview frames for one page's draft
async fn preview_sse_handler(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
    Path(page_id): Path<PageId>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let session = state.editor.subscribe_preview(&user, &page_id).await?;

    // The first frame is the current draft
    let frames = session.into_stream().map(|frame| {
        let json = serde_json::to_string(&*frame).unwrap_or_default();
        Ok(Event::default()
            .event("frame")
            .id(frame.version.to_string())
            .data(json))
    });

    Ok(Sse::new(frames).keep_alive(
        KeepAlive::new()
            .interval(state.config.preview_keep_alive())
            .text("ping"),
    ))
}

async fn theme_handler(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
    Path(business_id): Path<BusinessId>,
    Json(selection): Json<ThemeSelection>,
) -> ApiResult<Json<Business>> {
    Ok(Json(state.editor.update_theme(&user, &business_id, selection).await?))
}

#[derive(Debug, Deserialize)]
struct DomainRequest {
    name: String,
}

async fn subdomain_handler(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
    Path(business_id): Path<BusinessId>,
    Json(request): Json<DomainRequest>,
) -> ApiResult<(StatusCode, Json<Domain>)> {
    state.businesses.authorize_edit(&user, &business_id)?;
    let domain = state.domains.claim_subdomain(&business_id, &request.name)?;
    Ok((StatusCode::CREATED, Json(domain)))
}

async fn custom_domain_handler(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
    Path(business_id): Path<BusinessId>,
    Json(request): Json<DomainRequest>,
) -> ApiResult<(StatusCode, Json<Domain>)> {
    state.businesses.authorize_edit(&user, &business_id)?;
    if !state
        .editor
        .entitlements()
        .is_entitled(&business_id, Feature::CustomDomain)
    {
        return Err(SiteError::NotEntitled {
            feature: Feature::CustomDomain.to_string(),
        }
        .into());
    }
    let domain = state.domains.link_custom_domain(&business_id, &request.name)?;
    Ok((StatusCode::CREATED, Json(domain)))
}
