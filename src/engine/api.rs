//! Rootbridge API Module
//! REST API over the bridge service with OpenAPI documentation

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::engine::bridge::candidates::LinkCandidate;
use crate::engine::bridge::generation::GenerationResolver;
use crate::engine::bridge::issues::BridgeIssueSummary;
use crate::engine::bridge::model::{BridgeLink, LinkStatus};
use crate::engine::bridge::service::BridgeService;
use crate::engine::error::{BridgeError, ValidationKind};
use crate::engine::tree::AssembledTree;

pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<BridgeService>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        request_link,
        list_links,
        link_candidates,
        get_link,
        approve_link,
        reject_link,
        set_primary,
        clear_primary,
        set_generation,
        list_issues,
        connected_tree,
    ),
    tags(
        (name = "links", description = "Bridge link workflow"),
        (name = "admin", description = "Primary bridges and generation overrides"),
        (name = "tree", description = "Multi-branch tree assembly"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/branches/{branch_id}/links", post(request_link).get(list_links))
        .route("/api/branches/{branch_id}/links/candidates", get(link_candidates))
        .route("/api/branches/{branch_id}/tree/connected", get(connected_tree))
        .route("/api/links/{link_id}", get(get_link))
        .route("/api/links/{link_id}/approve", post(approve_link))
        .route("/api/links/{link_id}/reject", post(reject_link))
        .route("/api/links/{link_id}/primary", post(set_primary).delete(clear_primary))
        .route("/api/links/{link_id}/generation", put(set_generation))
        .route("/api/bridge-issues", get(list_issues))
        .route("/api/openapi.json", get(openapi_json))
        .route("/api/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Errors rendered as `{ "error": message }`
pub enum ApiError {
    Service(BridgeError),
    BadRequest(String),
    Internal(String),
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        ApiError::Service(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Service(err) => {
                let status = match &err {
                    BridgeError::Validation(_) => StatusCode::BAD_REQUEST,
                    BridgeError::NotFound { .. } => StatusCode::NOT_FOUND,
                    BridgeError::Authorization(_) => StatusCode::FORBIDDEN,
                    BridgeError::Conflict(_) => StatusCode::CONFLICT,
                    BridgeError::Database(_) | BridgeError::Sqlite(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        if status.is_server_error() {
            tracing::error!(error = %message, "request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Acting user, taken from the `x-user-id` header
pub struct Actor(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Actor(v.to_string()))
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": format!("missing {} header", USER_HEADER) })),
                )
            })
    }
}

/// Run a blocking service call off the async runtime
async fn blocking<T, F>(state: &ApiState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&BridgeService) -> Result<T, BridgeError> + Send + 'static,
{
    let service = state.service.clone();
    tokio::task::spawn_blocking(move || f(&service))
        .await
        .map_err(|e| ApiError::Internal(format!("service task failed: {}", e)))?
        .map_err(ApiError::Service)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequestBody {
    pub person_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/branches/{branch_id}/links",
    params(("branch_id" = String, Path, description = "Requesting branch")),
    request_body = Value,
    responses(
        (status = 201, description = "Pending link created", body = Value),
        (status = 400, description = "Malformed body or ids", body = Value),
        (status = 409, description = "Person already linked between these branches", body = Value)
    ),
    tag = "links"
)]
async fn request_link(
    State(state): State<ApiState>,
    Actor(actor): Actor,
    Path(branch_id): Path<String>,
    body: std::result::Result<Json<LinkRequestBody>, JsonRejection>,
) -> Result<(StatusCode, Json<BridgeLink>), ApiError> {
    let Json(body) = body?;
    let link = blocking(&state, move |s| {
        s.request_link(&body.person_id, &branch_id, &actor, body.display_name, body.notes)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(link)))
}

#[derive(Deserialize)]
pub struct LinkListQuery {
    #[serde(default)]
    status: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/branches/{branch_id}/links",
    params(
        ("branch_id" = String, Path, description = "Branch id"),
        ("status" = Option<String>, Query, description = "pending, approved or rejected"),
    ),
    responses((status = 200, description = "Links touching the branch, newest first", body = Value)),
    tag = "links"
)]
async fn list_links(
    State(state): State<ApiState>,
    Path(branch_id): Path<String>,
    Query(query): Query<LinkListQuery>,
) -> Result<Json<Vec<BridgeLink>>, ApiError> {
    let status = match query.status {
        None => None,
        Some(s) => match LinkStatus::parse(&s) {
            Some(status) => Some(status),
            None => return Err(BridgeError::Validation(ValidationKind::UnknownStatus(s)).into()),
        },
    };
    let links = blocking(&state, move |s| s.list_links(&branch_id, status)).await?;
    Ok(Json(links))
}

#[derive(Deserialize)]
pub struct CandidateQuery {
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/api/branches/{branch_id}/links/candidates",
    params(
        ("branch_id" = String, Path, description = "Branch that would request the link"),
        ("q" = Option<String>, Query, description = "Case-insensitive name filter"),
        ("limit" = Option<usize>, Query, description = "Page size, 1-100, default 20"),
    ),
    responses(
        (status = 200, description = "Unlinked persons from other branches, by name", body = Value),
        (status = 404, description = "No such branch", body = Value)
    ),
    tag = "links"
)]
async fn link_candidates(
    State(state): State<ApiState>,
    Path(branch_id): Path<String>,
    Query(query): Query<CandidateQuery>,
) -> Result<Json<Vec<LinkCandidate>>, ApiError> {
    let candidates = blocking(&state, move |s| {
        s.link_candidates(&branch_id, query.q.as_deref(), query.limit)
    })
    .await?;
    Ok(Json(candidates))
}

#[utoipa::path(
    get,
    path = "/api/links/{link_id}",
    params(("link_id" = String, Path, description = "Link id")),
    responses(
        (status = 200, description = "Bridge link", body = Value),
        (status = 404, description = "No such link", body = Value)
    ),
    tag = "links"
)]
async fn get_link(State(state): State<ApiState>, Path(link_id): Path<String>) -> Result<Json<BridgeLink>, ApiError> {
    Ok(Json(blocking(&state, move |s| s.get_link(&link_id)).await?))
}

#[utoipa::path(
    post,
    path = "/api/links/{link_id}/approve",
    params(("link_id" = String, Path, description = "Link id")),
    responses(
        (status = 200, description = "Link after approval", body = Value),
        (status = 403, description = "Approver moderates neither branch", body = Value)
    ),
    tag = "links"
)]
async fn approve_link(
    State(state): State<ApiState>,
    Actor(actor): Actor,
    Path(link_id): Path<String>,
) -> Result<Json<BridgeLink>, ApiError> {
    Ok(Json(blocking(&state, move |s| s.approve_link(&link_id, &actor)).await?))
}

#[derive(Deserialize, Default)]
pub struct RejectBody {
    #[serde(default)]
    pub reason: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/links/{link_id}/reject",
    params(("link_id" = String, Path, description = "Link id")),
    request_body = Value,
    responses((status = 200, description = "Rejected link", body = Value)),
    tag = "links"
)]
async fn reject_link(
    State(state): State<ApiState>,
    Actor(actor): Actor,
    Path(link_id): Path<String>,
    body: Bytes,
) -> Result<Json<BridgeLink>, ApiError> {
    // The body is optional
    let body: RejectBody = if body.iter().all(u8::is_ascii_whitespace) {
        RejectBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(format!("invalid body: {}", e)))?
    };
    Ok(Json(
        blocking(&state, move |s| s.reject_link(&link_id, &actor, body.reason)).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/links/{link_id}/primary",
    params(("link_id" = String, Path, description = "Link id")),
    responses(
        (status = 200, description = "Pair summary after promotion", body = Value),
        (status = 409, description = "Link is not approved", body = Value)
    ),
    tag = "admin"
)]
async fn set_primary(
    State(state): State<ApiState>,
    Actor(actor): Actor,
    Path(link_id): Path<String>,
) -> Result<Json<BridgeIssueSummary>, ApiError> {
    Ok(Json(blocking(&state, move |s| s.set_primary(&link_id, &actor)).await?))
}

#[utoipa::path(
    delete,
    path = "/api/links/{link_id}/primary",
    params(("link_id" = String, Path, description = "Link id")),
    responses((status = 200, description = "Pair summary after clearing", body = Value)),
    tag = "admin"
)]
async fn clear_primary(
    State(state): State<ApiState>,
    Actor(actor): Actor,
    Path(link_id): Path<String>,
) -> Result<Json<BridgeIssueSummary>, ApiError> {
    Ok(Json(blocking(&state, move |s| s.clear_primary(&link_id, &actor)).await?))
}

#[utoipa::path(
    put,
    path = "/api/links/{link_id}/generation",
    params(("link_id" = String, Path, description = "Link id")),
    request_body = Value,
    responses(
        (status = 200, description = "Link with the new override", body = Value),
        (status = 400, description = "Generation not null or an integer in 1-30", body = Value)
    ),
    tag = "admin"
)]
async fn set_generation(
    State(state): State<ApiState>,
    Actor(actor): Actor,
    Path(link_id): Path<String>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<BridgeLink>, ApiError> {
    let Json(body) = body?;
    let fields = body
        .as_object()
        .ok_or_else(|| ApiError::BadRequest("expected a JSON object with generationNumber".to_string()))?;
    let value = GenerationResolver::override_from_json(fields.get("generationNumber").unwrap_or(&Value::Null))?;
    let link = blocking(&state, move |s| s.set_generation_override(&link_id, value, &actor)).await?;
    Ok(Json(link))
}

#[utoipa::path(
    get,
    path = "/api/bridge-issues",
    responses((status = 200, description = "Open links grouped by branch pair", body = Value)),
    tag = "admin"
)]
async fn list_issues(State(state): State<ApiState>) -> Result<Json<Vec<BridgeIssueSummary>>, ApiError> {
    Ok(Json(blocking(&state, |s| s.list_issues_by_pair()).await?))
}

#[utoipa::path(
    get,
    path = "/api/branches/{branch_id}/tree/connected",
    params(("branch_id" = String, Path, description = "Anchor branch")),
    responses((status = 200, description = "Anchor and directly bridged branch graphs", body = Value)),
    tag = "tree"
)]
async fn connected_tree(
    State(state): State<ApiState>,
    Path(branch_id): Path<String>,
) -> Result<Json<AssembledTree>, ApiError> {
    Ok(Json(blocking(&state, move |s| s.assemble_tree(&branch_id)).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::seeded_db;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn router() -> Router {
        create_router(ApiState {
            service: Arc::new(BridgeService::sqlite(seeded_db())),
        })
    }

    async fn call(router: &Router, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_HEADER, user);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_request_approve_and_promote() {
        let router = router();

        let (status, link) = call(
            &router,
            "POST",
            "/api/branches/branch-a/links",
            Some("alice"),
            Some(json!({ "personId": "b-ngozi" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(link["status"], "pending");
        assert_eq!(link["targetBranchId"], "branch-b");
        let id = link["id"].as_str().unwrap().to_string();

        let (status, _) = call(&router, "POST", &format!("/api/links/{id}/approve"), Some("bob"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, summary) = call(&router, "POST", &format!("/api/links/{id}/primary"), Some("root"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["hasPrimary"], true);
        assert_eq!(summary["primaryLinkId"], id.as_str());

        let (status, issues) = call(&router, "GET", "/api/bridge-issues", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(issues.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let router = router();

        let (status, body) = call(
            &router,
            "POST",
            "/api/branches/branch-a/links",
            None,
            Some(json!({ "personId": "b-ngozi" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains(USER_HEADER));

        let (status, _) = call(&router, "GET", "/api/links/missing", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, link) = call(
            &router,
            "POST",
            "/api/branches/branch-a/links",
            Some("alice"),
            Some(json!({ "personId": "b-ngozi" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = link["id"].as_str().unwrap().to_string();

        let (status, _) = call(&router, "POST", &format!("/api/links/{id}/approve"), Some("carol"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&router, "POST", &format!("/api/links/{id}/primary"), Some("root"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(
            &router,
            "PUT",
            &format!("/api/links/{id}/generation"),
            Some("root"),
            Some(json!({ "generationNumber": 31 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("31"));

        let (status, _) = call(&router, "GET", "/api/branches/branch-a/links?status=maybe", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_bodies_are_json_errors() {
        let router = router();

        let (status, body) = call(&router, "POST", "/api/branches/branch-a/links", Some("alice"), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("personId"));

        let (_, link) = call(
            &router,
            "POST",
            "/api/branches/branch-a/links",
            Some("alice"),
            Some(json!({ "personId": "b-ngozi" })),
        )
        .await;
        let uri = format!("/api/links/{}/generation", link["id"].as_str().unwrap());

        for bad in [json!({ "generationNumber": 5.5 }), json!({ "generationNumber": "7" })] {
            let (status, body) = call(&router, "PUT", &uri, Some("root"), Some(bad)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].as_str().unwrap().contains("out of range"));
        }

        let (status, body) = call(&router, "PUT", &uri, Some("root"), Some(json!([5]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, updated) = call(&router, "PUT", &uri, Some("root"), Some(json!({ "generationNumber": 4 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["displayGenerationOverride"], 4);

        let (status, cleared) = call(&router, "PUT", &uri, Some("root"), Some(json!({ "generationNumber": null }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(cleared["displayGenerationOverride"].is_null());
    }

    #[tokio::test]
    async fn test_link_candidates() {
        let router = router();
        call(
            &router,
            "POST",
            "/api/branches/branch-a/links",
            Some("alice"),
            Some(json!({ "personId": "b-ngozi" })),
        )
        .await;

        let (status, found) = call(&router, "GET", "/api/branches/branch-a/links/candidates?q=bello&limit=2", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<_> = found.as_array().unwrap().iter().map(|c| c["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["b-ada", "b-musa"]);
        assert_eq!(found[0]["homeBranch"]["surname"], "Bello");

        let (status, _) = call(&router, "GET", "/api/branches/branch-z/links/candidates", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reject_with_reason_and_tree() {
        let router = router();
        let (_, link) = call(
            &router,
            "POST",
            "/api/branches/branch-a/links",
            Some("alice"),
            Some(json!({ "personId": "b-tunde" })),
        )
        .await;
        let id = link["id"].as_str().unwrap().to_string();

        let (status, rejected) = call(
            &router,
            "POST",
            &format!("/api/links/{id}/reject"),
            Some("bob"),
            Some(json!({ "reason": "wrong Tunde" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rejected["status"], "rejected");
        assert_eq!(rejected["notes"], "wrong Tunde");

        let (status, listed) = call(&router, "GET", "/api/branches/branch-b/links?status=rejected", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, tree) = call(&router, "GET", "/api/branches/branch-a/tree/connected", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tree["anchorBranch"]["branch"]["id"], "branch-a");
        assert!(tree["connectedBranches"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health_and_openapi() {
        let router = router();
        let (status, health) = call(&router, "GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "ok");

        let (status, doc) = call(&router, "GET", "/api/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(doc["paths"]["/api/bridge-issues"].is_object());
    }
}
