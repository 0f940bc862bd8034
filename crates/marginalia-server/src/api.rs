use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use marginalia_shared::{ConversationSummary, Message, Notification};
use marginalia_store::{Comment, Reply, Thought, User};

use crate::auth::AuthedUser;
use crate::config::ServerConfig;
use crate::delivery::{Db, DeliveryRouter};
use crate::error::ApiError;
use crate::presence::Presence;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub presence: Arc<dyn Presence>,
    pub router: Arc<DeliveryRouter>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/users", post(create_user))
        .route("/chats", get(list_chats))
        .route("/chats/{peer}", get(get_conversation))
        .route("/chats/{peer}/messages", post(send_message))
        .route("/messages/{id}", delete(delete_message))
        .route("/notifications", get(list_notifications))
        .route("/notifications/{id}/read", post(mark_notification_read))
        .route("/notifications/{id}", delete(delete_notification))
        .route("/thoughts", post(create_thought))
        .route("/thoughts/{id}/toggle-like", post(toggle_thought_like))
        .route("/thoughts/{id}/comments", post(add_comment))
        .route("/comments/{id}/toggle-like", post(toggle_comment_like))
        .route("/comments/{id}/replies", post(add_reply))
        .route("/gateway", get(crate::ws::gateway_upgrade))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    instance: String,
    online_users: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        instance: state.config.instance_name.clone(),
        online_users: state.presence.online_count().await,
    })
}

// ─── Users ───

#[derive(Deserialize)]
struct CreateUserRequest {
    handle: String,
    display_name: String,
}

/// Register the identity projection of an externally managed account.
async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let handle = req.handle.trim();
    if handle.is_empty() {
        return Err(ApiError::BadRequest("handle must not be empty".into()));
    }

    let user = state
        .db
        .lock()
        .await
        .create_user(handle, req.display_name.trim())?;

    info!(user = %user.id, handle = %user.handle, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

// ─── Chats ───

async fn list_chats(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let summaries = state.db.lock().await.conversation_summaries(user)?;
    Ok(Json(summaries))
}

/// Fetching a conversation is what marks the peer's messages as read, so the
/// flip happens before the select and the response already reflects it.
async fn get_conversation(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(peer): Path<Uuid>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let db = state.db.lock().await;
    db.mark_conversation_read(user, peer)?;
    let messages = db.conversation(user, peer)?;
    Ok(Json(messages))
}

#[derive(Deserialize)]
struct SendMessageRequest {
    text: String,
}

async fn send_message(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(peer): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let message = state.router.send_message(user, peer, &req.text).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn delete_message(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.db.lock().await.delete_message(id, user)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ─── Notifications ───

async fn list_notifications(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let notifications = state.db.lock().await.notifications_for_user(user)?;
    Ok(Json(notifications))
}

async fn mark_notification_read(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.db.lock().await.mark_notification_read(id, user)?;
    Ok(Json(serde_json::json!({ "read": true })))
}

async fn delete_notification(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.db.lock().await.delete_notification(id, user)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ─── Thoughts ───

#[derive(Deserialize)]
struct CreateThoughtRequest {
    title: String,
    body: String,
}

async fn create_thought(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Json(req): Json<CreateThoughtRequest>,
) -> Result<(StatusCode, Json<Thought>), ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".into()));
    }

    let thought = state
        .db
        .lock()
        .await
        .create_thought(user, req.title.trim(), &req.body)?;
    Ok((StatusCode::CREATED, Json(thought)))
}

#[derive(Serialize)]
struct ToggleLikeResponse {
    liked: bool,
    like_count: u64,
}

async fn toggle_thought_like(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ToggleLikeResponse>, ApiError> {
    let (thought, liked, like_count) = {
        let db = state.db.lock().await;
        let thought = db.get_thought(id)?;
        let liked = db.toggle_thought_like(id, user)?;
        (thought, liked, db.thought_like_count(id)?)
    };

    // Only the like edge notifies; unliking leaves any prior notification
    // in place.
    if liked {
        state.router.thought_liked(user, &thought).await?;
    }

    Ok(Json(ToggleLikeResponse { liked, like_count }))
}

#[derive(Deserialize)]
struct CommentRequest {
    text: String,
}

async fn add_comment(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let (thought, comment) = {
        let db = state.db.lock().await;
        let thought = db.get_thought(id)?;
        let comment = db.create_comment(id, user, req.text.trim())?;
        (thought, comment)
    };

    state.router.comment_added(user, &thought).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn toggle_comment_like(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ToggleLikeResponse>, ApiError> {
    let (thought, comment, liked, like_count) = {
        let db = state.db.lock().await;
        let comment = db.get_comment(id)?;
        let thought = db.get_thought(comment.thought_id)?;
        let liked = db.toggle_comment_like(id, user)?;
        (thought, comment, liked, db.comment_like_count(id)?)
    };

    if liked {
        state.router.comment_liked(user, &thought, &comment).await?;
    }

    Ok(Json(ToggleLikeResponse { liked, like_count }))
}

#[derive(Deserialize)]
struct ReplyRequest {
    text: String,
}

async fn add_reply(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ReplyRequest>,
) -> Result<(StatusCode, Json<Reply>), ApiError> {
    let (thought, comment, reply) = {
        let db = state.db.lock().await;
        let comment = db.get_comment(id)?;
        let thought = db.get_thought(comment.thought_id)?;
        let reply = db.create_reply(id, user, req.text.trim())?;
        (thought, comment, reply)
    };

    state.router.reply_added(user, &thought, &comment).await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
