//! solace-server/src/routes.rs
//!
//! REST surface under `/api/sessions`, plus `/ws` and `/health`.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::debug;

use solace_common::models::session::{ScheduleRequest, SessionType};
use solace_common::models::supporter::SupporterStatus;
use solace_core::Error;

use crate::api::{ok, ApiError, ApiResult};
use crate::auth::AuthenticatedUser;
use crate::context::AppState;
use crate::ws;

pub fn build_router(state: AppState) -> Router {
    let sessions = Router::new()
        .route("/schedule", post(schedule))
        .route("/start/{session_id}", post(start))
        .route("/end/{session_id}", post(end))
        .route("/cancel/{session_id}", post(cancel))
        .route("/supporter/{supporter_id}", get(supporter_sessions))
        .route("/user/{user_id}", get(user_sessions))
        .route("/chats/supporter/{supporter_id}", get(supporter_chats))
        .route("/chat/{session_id}/messages", get(chat_messages))
        .route("/chat/start", post(start_chat))
        .route("/chat/{session_id}/end", post(end_chat))
        .route("/supporter/status", put(supporter_status));

    Router::new()
        .nest("/api/sessions", sessions)
        .route("/ws", get(ws::upgrade))
        .route("/health", get(health))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Lenient body parsing: an empty body is the default value, malformed JSON is a 400
/// in the usual envelope.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(body)?)
}

fn parse_id(raw: &str, what: &str) -> Result<i64, Error> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| Error::Validation(format!("Invalid {}: {}", what, raw)))
}

async fn health() -> Json<Value> {
    ok(json!({ "status": "ok" }))
}

async fn schedule(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request: ScheduleRequest = parse_body(&body)?;
    let session = state.lifecycle.schedule(identity.id, request).await?;
    Ok((
        StatusCode::CREATED,
        ok(json!({ "message": "Session scheduled successfully", "session": session })),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartBody {
    session_type: Option<String>,
}

async fn start(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(session_id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let session_id = parse_id(&session_id, "session id")?;
    let body: StartBody = parse_body(&body)?;
    let session_type = body
        .session_type
        .map(|t| t.parse::<SessionType>().map_err(Error::Validation))
        .transpose()?;

    let started = state.lifecycle.start(session_id, &identity, session_type).await?;
    let chat_session = started.chat.as_ref().map(|c| c.session().clone());
    Ok(ok(json!({
        "message": "Session started",
        "session": started.session,
        "chatSession": chat_session,
        "chatOutcome": started.chat.as_ref().map(|c| c.label()),
    })))
}

async fn end(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(session_id): Path<String>,
) -> ApiResult {
    let session_id = parse_id(&session_id, "session id")?;
    let session = state.lifecycle.end(session_id, &identity).await?;
    Ok(ok(json!({ "message": "Session ended", "session": session })))
}

async fn cancel(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(session_id): Path<String>,
) -> ApiResult {
    let session_id = parse_id(&session_id, "session id")?;
    let session = state.lifecycle.cancel(session_id, &identity).await?;
    Ok(ok(json!({ "message": "Session cancelled", "session": session })))
}

async fn supporter_sessions(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(supporter_id): Path<String>,
) -> ApiResult {
    let supporter_id = parse_id(&supporter_id, "supporter id")?;
    let sessions = state.lifecycle.sessions_for_supporter(&identity, supporter_id).await?;
    Ok(ok(json!({ "sessions": sessions })))
}

async fn user_sessions(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(user_id): Path<String>,
) -> ApiResult {
    let user_id = parse_id(&user_id, "user id")?;
    let sessions = state.lifecycle.sessions_for_user(&identity, user_id).await?;
    Ok(ok(json!({ "sessions": sessions })))
}

async fn supporter_chats(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(supporter_id): Path<String>,
) -> ApiResult {
    let supporter_id = parse_id(&supporter_id, "supporter id")?;
    let chats = state.delivery.active_chats_for_supporter(supporter_id, &identity).await?;
    Ok(ok(json!({ "chats": chats })))
}

async fn chat_messages(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(session_id): Path<String>,
) -> ApiResult {
    let session_id = parse_id(&session_id, "session id")?;
    let messages = state.delivery.messages_for_session(session_id, &identity).await?;
    Ok(ok(json!({ "messages": messages })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartChatBody {
    supporter_id: Option<i64>,
    /// Only meaningful for admins opening a chat on someone's behalf.
    user_id: Option<i64>,
    title: Option<String>,
}

async fn start_chat(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    body: Bytes,
) -> ApiResult {
    let body: StartChatBody = parse_body(&body)?;
    let supporter_id = body
        .supporter_id
        .ok_or_else(|| Error::Validation("Missing required fields: supporterId".into()))?;
    let user_id = body.user_id.unwrap_or(identity.id);

    let outcome = state
        .lifecycle
        .start_chat(&identity, user_id, supporter_id, body.title)
        .await?;
    debug!("chat/start -> {}", outcome.label());
    Ok(ok(json!({
        "outcome": outcome.label(),
        "chatSession": outcome.session(),
    })))
}

async fn end_chat(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(session_id): Path<String>,
) -> ApiResult {
    let session_id = parse_id(&session_id, "session id")?;
    let chat = state.lifecycle.end_chat(session_id, &identity).await?;
    Ok(ok(json!({ "message": "Chat session ended", "chatSession": chat })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    status: Option<String>,
    supporter_id: Option<i64>,
}

async fn supporter_status(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    body: Bytes,
) -> ApiResult {
    let body: StatusBody = parse_body(&body)?;
    let status = body
        .status
        .ok_or_else(|| Error::Validation("Missing required fields: status".into()))?
        .parse::<SupporterStatus>()
        .map_err(Error::Validation)?;
    let supporter_id = body.supporter_id.unwrap_or(identity.id);

    state
        .presence
        .set_supporter_status(&identity, supporter_id, status)
        .await?;
    Ok(ok(json!({ "supporterId": supporter_id, "status": status })))
}
