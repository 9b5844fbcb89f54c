use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
};
use fera_common::{
    ActivityKind, LeadDraft, LeadPatch, LeadStatus, LeadView, StatusFilter, TaskDraft, TaskPatch,
    User,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::sync::broadcast;
use tracing::error;

use super::auth::{Session, SessionStore};
use super::context::{ContextRegistry, SharedContext};
use super::ws::{WsEnvelope, WsMessage, broadcast_all, broadcast_to};
use crate::errors::CrmError;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub auth: Arc<SessionStore>,
    pub contexts: Arc<ContextRegistry>,
    pub ws_tx: broadcast::Sender<WsEnvelope>,
    pub monthly_goal: f64,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Default)]
pub struct LeadQuery {
    pub q: Option<String>,
    pub status: Option<String>,
    pub view: Option<String>,
}

#[derive(Deserialize)]
pub struct MoveLeadRequest {
    pub status: String,
    #[serde(default)]
    pub record_activity: bool,
}

#[derive(Deserialize)]
pub struct AddActivityRequest {
    pub kind: String,
    pub content: String,
}

#[derive(Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<String>,
}

#[derive(Deserialize)]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: Option<User>,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: Option<User>,
    pub search_query: String,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<CrmError> for ApiError {
    fn from(err: CrmError) -> Self {
        let msg = err.to_string();
        match err {
            CrmError::LeadNotFound { .. }
            | CrmError::TaskNotFound { .. }
            | CrmError::ProfileNotFound { .. } => ApiError::NotFound(msg),
            CrmError::Unauthorized | CrmError::InvalidCredentials => ApiError::Unauthorized(msg),
            CrmError::Forbidden(_) => ApiError::Forbidden(msg),
            CrmError::EmailTaken { .. } | CrmError::Validation(_) | CrmError::Parse(_) => {
                ApiError::BadRequest(msg)
            }
            CrmError::Database(e) => {
                error!(error = ?e, "Store failure");
                ApiError::Internal(msg)
            }
            CrmError::LockPoisoned => ApiError::Internal(msg),
        }
    }
}

/// Decode a JSON body, reporting shape and enum errors as 400.
fn parse_body<T: DeserializeOwned>(body: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::BadRequest(format!("Invalid body: {}", e)))
}

// ── Authentication ────────────────────────────────────────────────────

/// The caller's session and its data context, resolved from the bearer token.
pub struct Authed {
    pub session: Session,
    pub ctx: SharedContext,
}

impl FromRequestParts<SharedState> for Authed {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".into()))?;
        let session = state.auth.resolve(token)?;
        let ctx = state.contexts.context_for(&session).await;
        Ok(Authed { session, ctx })
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/session", get(current_session))
        .route("/api/leads", get(list_leads).post(create_lead))
        .route("/api/leads/bulk-delete", post(bulk_delete_leads))
        .route(
            "/api/leads/{id}",
            get(get_lead).patch(update_lead).delete(delete_lead),
        )
        .route("/api/leads/{id}/status", patch(move_lead))
        .route("/api/leads/{id}/activities", post(add_activity))
        .route("/api/board", get(get_board))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/board", get(get_task_board))
        .route("/api/tasks/{id}", patch(update_task).delete(delete_task))
        .route("/api/tasks/{id}/toggle", post(toggle_task))
        .route("/api/team", get(list_team).post(invite_member))
        .route("/api/team/{id}", axum::routing::delete(remove_member))
        .route("/api/profile", patch(update_profile))
        .route("/api/search", put(set_search))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/toasts", get(list_toasts))
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/{id}/read", post(mark_notification_read))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn session_response(state: &SharedState, session: Session) -> SessionResponse {
    let ctx = state.contexts.context_for(&session).await;
    let user = ctx.lock().await.user().cloned();
    SessionResponse {
        token: session.token,
        user,
    }
}

async fn register(
    State(state): State<SharedState>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let req: RegisterRequest = parse_body(body)?;
    let session = state
        .auth
        .register(&req.email, &req.password, req.name.as_deref())
        .await?;
    // Other accounts see the new roster entry on their next read.
    state.contexts.refresh_all().await;
    Ok((
        StatusCode::CREATED,
        Json(session_response(&state, session).await),
    ))
}

async fn login(
    State(state): State<SharedState>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let req: LoginRequest = parse_body(body)?;
    let session = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(session_response(&state, session).await))
}

async fn logout(
    State(state): State<SharedState>,
    authed: Authed,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.logout(&authed.session.token)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn current_session(authed: Authed) -> Result<impl IntoResponse, ApiError> {
    let ctx = authed.ctx.lock().await;
    Ok(Json(MeResponse {
        user: ctx.user().cloned(),
        search_query: ctx.search_query().to_string(),
    }))
}

async fn list_leads(
    authed: Authed,
    Query(params): Query<LeadQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status: StatusFilter = params
        .status
        .as_deref()
        .unwrap_or("all")
        .parse()
        .map_err(CrmError::from)?;
    let view: LeadView = params
        .view
        .as_deref()
        .unwrap_or("all")
        .parse()
        .map_err(CrmError::from)?;
    let ctx = authed.ctx.lock().await;
    Ok(Json(ctx.filtered_leads(params.q.as_deref(), status, view)))
}

async fn create_lead(
    State(state): State<SharedState>,
    authed: Authed,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let draft: LeadDraft = parse_body(body)?;
    let lead = authed.ctx.lock().await.add_lead(draft).await?;
    broadcast_to(
        &state.ws_tx,
        &authed.session.account_id,
        &WsMessage::LeadCreated { lead: lead.clone() },
    );
    Ok((StatusCode::CREATED, Json(lead)))
}

async fn get_lead(authed: Authed, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let ctx = authed.ctx.lock().await;
    match ctx.lead(&id) {
        Some(lead) => Ok(Json(lead.clone())),
        None => Err(CrmError::LeadNotFound { id }.into()),
    }
}

async fn update_lead(
    State(state): State<SharedState>,
    authed: Authed,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let patch: LeadPatch = parse_body(body)?;
    let lead = authed.ctx.lock().await.update_lead(&id, patch).await?;
    broadcast_to(
        &state.ws_tx,
        &authed.session.account_id,
        &WsMessage::LeadUpdated { lead: lead.clone() },
    );
    Ok(Json(lead))
}

async fn move_lead(
    State(state): State<SharedState>,
    authed: Authed,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let req: MoveLeadRequest = parse_body(body)?;
    let status: LeadStatus = req.status.parse().map_err(CrmError::from)?;
    let (from_status, lead) = {
        let mut ctx = authed.ctx.lock().await;
        let from_status = ctx.lead(&id).map(|l| l.lead.status);
        let lead = ctx
            .update_lead_status(&id, status, req.record_activity)
            .await?;
        (from_status, lead)
    };
    broadcast_to(
        &state.ws_tx,
        &authed.session.account_id,
        &WsMessage::LeadMoved {
            lead_id: id,
            from_status,
            to_status: status,
        },
    );
    Ok(Json(lead))
}

async fn add_activity(
    State(state): State<SharedState>,
    authed: Authed,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let req: AddActivityRequest = parse_body(body)?;
    let kind: ActivityKind = req.kind.parse().map_err(CrmError::from)?;
    let lead = authed
        .ctx
        .lock()
        .await
        .add_activity(&id, kind, &req.content)
        .await?;
    broadcast_to(
        &state.ws_tx,
        &authed.session.account_id,
        &WsMessage::ActivityAdded { lead: lead.clone() },
    );
    Ok((StatusCode::CREATED, Json(lead)))
}

async fn delete_lead(
    State(state): State<SharedState>,
    authed: Authed,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authed.ctx.lock().await.delete_lead(&id).await?;
    broadcast_to(
        &state.ws_tx,
        &authed.session.account_id,
        &WsMessage::LeadsDeleted { lead_ids: vec![id] },
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn bulk_delete_leads(
    State(state): State<SharedState>,
    authed: Authed,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let req: BulkDeleteRequest = parse_body(body)?;
    let removed = authed.ctx.lock().await.delete_leads(req.ids).await?;
    if !removed.is_empty() {
        broadcast_to(
            &state.ws_tx,
            &authed.session.account_id,
            &WsMessage::LeadsDeleted {
                lead_ids: removed.clone(),
            },
        );
    }
    Ok(Json(serde_json::json!({
        "removed": removed.len(),
        "lead_ids": removed,
    })))
}

async fn get_board(authed: Authed) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(authed.ctx.lock().await.board()))
}

async fn list_tasks(authed: Authed) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(authed.ctx.lock().await.tasks().to_vec()))
}

async fn get_task_board(authed: Authed) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(authed.ctx.lock().await.task_board()))
}

async fn create_task(
    State(state): State<SharedState>,
    authed: Authed,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let draft: TaskDraft = parse_body(body)?;
    let task = authed.ctx.lock().await.add_task(draft).await?;
    broadcast_to(
        &state.ws_tx,
        &authed.session.account_id,
        &WsMessage::TaskCreated { task: task.clone() },
    );
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<SharedState>,
    authed: Authed,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let patch: TaskPatch = parse_body(body)?;
    let task = authed.ctx.lock().await.update_task(&id, patch).await?;
    broadcast_to(
        &state.ws_tx,
        &authed.session.account_id,
        &WsMessage::TaskUpdated { task: task.clone() },
    );
    Ok(Json(task))
}

async fn toggle_task(
    State(state): State<SharedState>,
    authed: Authed,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = authed.ctx.lock().await.toggle_task(&id).await?;
    broadcast_to(
        &state.ws_tx,
        &authed.session.account_id,
        &WsMessage::TaskUpdated { task: task.clone() },
    );
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<SharedState>,
    authed: Authed,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authed.ctx.lock().await.delete_task(&id).await?;
    broadcast_to(
        &state.ws_tx,
        &authed.session.account_id,
        &WsMessage::TaskDeleted { task_id: id },
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn list_team(authed: Authed) -> Result<impl IntoResponse, ApiError> {
    let ctx = authed.ctx.lock().await;
    Ok(Json(serde_json::json!({
        "members": ctx.team(),
        "performance": ctx.team_performance(),
    })))
}

async fn invite_member(authed: Authed) -> Result<impl IntoResponse, ApiError> {
    authed.ctx.lock().await.add_team_member();
    Ok(StatusCode::ACCEPTED)
}

async fn remove_member(
    State(state): State<SharedState>,
    authed: Authed,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authed.ctx.lock().await.delete_team_member(&id).await?;
    state.auth.revoke_account(&id)?;
    state.contexts.refresh_all().await;
    broadcast_all(&state.ws_tx, &WsMessage::MemberRemoved { member_id: id });
    Ok(StatusCode::NO_CONTENT)
}

async fn update_profile(
    State(state): State<SharedState>,
    authed: Authed,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let req: ProfileRequest = parse_body(body)?;
    let user = authed
        .ctx
        .lock()
        .await
        .update_profile(req.name, req.avatar)
        .await?;
    state.contexts.refresh_all().await;
    broadcast_all(&state.ws_tx, &WsMessage::ProfileUpdated { user: user.clone() });
    Ok(Json(user))
}

async fn set_search(
    authed: Authed,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let req: SearchRequest = parse_body(body)?;
    authed.ctx.lock().await.set_search_query(&req.query);
    Ok(Json(serde_json::json!({ "query": req.query })))
}

async fn get_dashboard(
    State(state): State<SharedState>,
    authed: Authed,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = authed.ctx.lock().await;
    Ok(Json(serde_json::json!({
        "stats": ctx.dashboard(state.monthly_goal),
        "performance": ctx.team_performance(),
    })))
}

async fn list_toasts(authed: Authed) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(authed.ctx.lock().await.toasts()))
}

async fn list_notifications(authed: Authed) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(authed.ctx.lock().await.notifications().to_vec()))
}

async fn mark_notification_read(
    authed: Authed,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if authed.ctx.lock().await.mark_notification_read(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Notification {} not found", id)))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::db::{CrmDb, DbHandle};
    use crate::crm::repository::{CrmStore, SqliteStore};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        let store: Arc<dyn CrmStore> = Arc::new(SqliteStore::new(DbHandle::new(
            CrmDb::new_in_memory().unwrap(),
        )));
        let (ws_tx, _) = broadcast::channel(16);
        Arc::new(AppState {
            auth: Arc::new(SessionStore::new(store.clone())),
            contexts: Arc::new(ContextRegistry::new(store, Duration::from_secs(60))),
            ws_tx,
            monthly_goal: 100_000.0,
        })
    }

    fn test_app() -> (Router, SharedState) {
        let state = test_state();
        (api_router().with_state(state.clone()), state)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    async fn register(app: &Router, email: &str) -> String {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/register",
                None,
                serde_json::json!({"email": email, "password": "password", "name": "Alex"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: serde_json::Value = body_json(response.into_body()).await;
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_lead(app: &Router, token: &str, body: serde_json::Value) -> serde_json::Value {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/leads", Some(token), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response.into_body()).await
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _) = test_app();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_requires_bearer_token() {
        let (app, _) = test_app();
        let request = Request::builder()
            .uri("/api/leads")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.oneshot(get_request("/api/leads", "bogus")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(body["error"], "Not signed in");
    }

    #[tokio::test]
    async fn test_register_login_and_session() {
        let (app, _) = test_app();
        let token = register(&app, "alex@fera.io").await;

        let response = app.clone().oneshot(get_request("/api/session", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let me: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(me["user"]["name"], "Alex");
        assert_eq!(me["user"]["role"], "admin");

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/login",
                None,
                serde_json::json!({"email": "alex@fera.io", "password": "nope!!"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/auth/login",
                None,
                serde_json::json!({"email": "alex@fera.io", "password": "password"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_and_list_leads_with_filters() {
        let (app, _) = test_app();
        let token = register(&app, "alex@fera.io").await;

        let lead = create_lead(
            &app,
            &token,
            serde_json::json!({"name": "Sarah Costa", "company": "Skynet", "value": "12500", "priority": "high"}),
        )
        .await;
        assert_eq!(lead["value"], 12500.0);
        assert_eq!(lead["score"], 42.5);
        create_lead(&app, &token, serde_json::json!({"name": "Diana", "value": "n/a"})).await;

        let response = app.clone().oneshot(get_request("/api/leads", &token)).await.unwrap();
        let all: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0]["name"], "Diana");
        assert_eq!(all[0]["value"], 0.0);

        let response = app
            .clone()
            .oneshot(get_request("/api/leads?view=urgent&status=all", &token))
            .await
            .unwrap();
        let urgent: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert_eq!(urgent.len(), 1);
        assert_eq!(urgent[0]["name"], "Sarah Costa");

        let response = app
            .clone()
            .oneshot(get_request("/api/leads?q=skynet", &token))
            .await
            .unwrap();
        let hits: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert_eq!(hits.len(), 1);

        let response = app
            .oneshot(get_request("/api/leads?status=won", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_enum_in_body_is_bad_request() {
        let (app, _) = test_app();
        let token = register(&app, "alex@fera.io").await;
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/leads",
                Some(&token),
                serde_json::json!({"name": "X", "priority": "urgent"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_move_lead_and_board() {
        let (app, state) = test_app();
        let token = register(&app, "alex@fera.io").await;
        let lead = create_lead(&app, &token, serde_json::json!({"name": "Stark", "value": 150000})).await;
        let id = lead["id"].as_str().unwrap();

        let mut rx = state.ws_tx.subscribe();
        let response = app
            .clone()
            .oneshot(json_request(
                "PATCH",
                &format!("/api/leads/{}/status", id),
                Some(&token),
                serde_json::json!({"status": "negotiation"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let moved: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(moved["status"], "negotiation");
        assert_eq!(moved["last_interaction"], "Updated just now");

        let event = rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&event.payload).unwrap();
        assert_eq!(parsed["type"], "LeadMoved");
        assert_eq!(parsed["data"]["from_status"], "new");

        let response = app.clone().oneshot(get_request("/api/board", &token)).await.unwrap();
        let board: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert_eq!(board.len(), 6);
        assert_eq!(board[3]["count"], 1);
        assert_eq!(board[3]["total_value"], 150000.0);

        let response = app
            .oneshot(json_request(
                "PATCH",
                &format!("/api/leads/{}/status", id),
                Some(&token),
                serde_json::json!({"status": "won"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_accounts_are_isolated() {
        let (app, _) = test_app();
        let alice = register(&app, "alice@fera.io").await;
        let bob = register(&app, "bob@fera.io").await;
        let lead = create_lead(&app, &alice, serde_json::json!({"name": "Private"})).await;
        let id = lead["id"].as_str().unwrap();

        let response = app.clone().oneshot(get_request("/api/leads", &bob)).await.unwrap();
        let leads: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert!(leads.is_empty());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/leads/{}", id))
                    .header("authorization", format!("Bearer {}", bob))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(get_request("/api/leads", &alice)).await.unwrap();
        let leads: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert_eq!(leads.len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_delete_broadcasts_only_removed_ids() {
        let (app, state) = test_app();
        let alice = register(&app, "alice@fera.io").await;
        let bob = register(&app, "bob@fera.io").await;
        let own = create_lead(&app, &alice, serde_json::json!({"name": "Mine"})).await;
        let foreign = create_lead(&app, &bob, serde_json::json!({"name": "Theirs"})).await;
        let own_id = own["id"].as_str().unwrap().to_string();
        let foreign_id = foreign["id"].as_str().unwrap().to_string();
        let mut rx = state.ws_tx.subscribe();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/leads/bulk-delete",
                Some(&alice),
                serde_json::json!({"ids": [own_id, foreign_id, "ghost"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(body["removed"], 1);
        assert_eq!(body["lead_ids"], serde_json::json!([own_id]));

        let envelope = rx.try_recv().unwrap();
        let payload: serde_json::Value = serde_json::from_str(&envelope.payload).unwrap();
        assert_eq!(payload["type"], "LeadsDeleted");
        assert_eq!(payload["data"]["lead_ids"], serde_json::json!([own_id]));
        assert!(rx.try_recv().is_err());

        // Nothing of Alice's left to remove: no event at all.
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/leads/bulk-delete",
                Some(&alice),
                serde_json::json!({"ids": [foreign_id]}),
            ))
            .await
            .unwrap();
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(body["removed"], 0);
        assert!(rx.try_recv().is_err());

        let response = app.oneshot(get_request("/api/leads", &bob)).await.unwrap();
        let leads: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert_eq!(leads.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicate_registration_is_client_error() {
        let (app, _) = test_app();
        let attempts: Vec<_> = (0..4)
            .map(|_| {
                let app = app.clone();
                tokio::spawn(async move {
                    app.oneshot(json_request(
                        "POST",
                        "/api/auth/register",
                        None,
                        serde_json::json!({"email": "dup@fera.io", "password": "password"}),
                    ))
                    .await
                    .unwrap()
                    .status()
                })
            })
            .collect();

        let mut created = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                StatusCode::CREATED => created += 1,
                status => assert_eq!(status, StatusCode::BAD_REQUEST),
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_failed_mutation_surfaces_toast() {
        let (app, _) = test_app();
        let token = register(&app, "alex@fera.io").await;
        let response = app
            .clone()
            .oneshot(json_request(
                "PATCH",
                "/api/leads/ghost",
                Some(&token),
                serde_json::json!({"name": "x"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(get_request("/api/toasts", &token)).await.unwrap();
        let toasts: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0]["kind"], "error");
    }

    #[tokio::test]
    async fn test_task_flow() {
        let (app, _) = test_app();
        let token = register(&app, "alex@fera.io").await;
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/tasks",
                Some(&token),
                serde_json::json!({"title": "Prepare Q3 report", "priority": "high"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let task: serde_json::Value = body_json(response.into_body()).await;
        let id = task["id"].as_str().unwrap();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/tasks/{}/toggle", id),
                Some(&token),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        let toggled: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(toggled["status"], "completed");

        let response = app.oneshot(get_request("/api/tasks/board", &token)).await.unwrap();
        let board: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert_eq!(board[2]["count"], 1);
    }

    #[tokio::test]
    async fn test_member_removal_forbidden_for_non_admin() {
        let (app, state) = test_app();
        let admin = register(&app, "admin@fera.io").await;
        let sales = register(&app, "sales@fera.io").await;
        let admin_id = state.auth.resolve(&admin).unwrap().account_id;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/team/{}", admin_id))
                    .header("authorization", format!("Bearer {}", sales))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let sales_id = state.auth.resolve(&sales).unwrap().account_id;
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/team/{}", sales_id))
                    .header("authorization", format!("Bearer {}", admin))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(state.auth.resolve(&sales).is_err());
    }

    #[tokio::test]
    async fn test_dashboard_and_notifications() {
        let (app, _) = test_app();
        let token = register(&app, "alex@fera.io").await;
        create_lead(&app, &token, serde_json::json!({"name": "Won", "status": "closed", "value": 50000})).await;

        let response = app.clone().oneshot(get_request("/api/dashboard", &token)).await.unwrap();
        let dash: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(dash["stats"]["revenue"], 50000.0);
        assert_eq!(dash["stats"]["goal_progress"], 50.0);

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/notifications/n2/read", Some(&token), serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.oneshot(get_request("/api/notifications", &token)).await.unwrap();
        let notifications: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert!(notifications.iter().all(|n| n["id"] != "n2" || n["read"] == true));
    }

    #[tokio::test]
    async fn test_logout_invalidates_token() {
        let (app, _) = test_app();
        let token = register(&app, "alex@fera.io").await;
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/auth/logout", Some(&token), serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.oneshot(get_request("/api/session", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
