//! REST API endpoint handlers.
//!
//! Every failure is answered with a JSON body `{"error": "..."}`; turn
//! failures also carry the `conversation_id` so a client can recover the
//! conversation a failed first turn created.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parley::agent::TurnError;
use parley::conversation::{Conversation, ConversationId, ConversationOverview};
use parley::gateway::{Gateway, GatewayError, TurnReply};
use parley::store::StoreError;
use parley::tools::{ProviderError, ProviderSpec, ToolDescriptor};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub conversation_id: Option<ConversationId>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            conversation_id: None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<ConversationId>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            conversation_id: self.conversation_id,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        let message = e.to_string();
        match e {
            GatewayError::EmptyMessage => Self::new(StatusCode::BAD_REQUEST, message),
            GatewayError::Store(StoreError::NotFound(_)) => {
                Self::new(StatusCode::NOT_FOUND, message)
            }
            GatewayError::Store(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, message),
            GatewayError::Turn {
                conversation_id,
                source,
            } => {
                let status = match source {
                    TurnError::RequestFailed { .. } => StatusCode::BAD_GATEWAY,
                    TurnError::Cancelled { .. } | TurnError::OrderingViolation(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                Self {
                    status,
                    message,
                    conversation_id: Some(conversation_id),
                }
            }
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        let status = match e {
            ProviderError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
            ProviderError::SpawnFailed(_)
            | ProviderError::Transport(_)
            | ProviderError::Protocol(_)
            | ProviderError::Remote(_)
            | ProviderError::Timeout => StatusCode::BAD_GATEWAY,
            ProviderError::Io(_) | ProviderError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

// ── Conversations ──────────────────────────────────────────────────

/// Request body for POST /api/conversations.
#[derive(Deserialize)]
pub struct CreateConversationRequest {
    pub owner: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct CreateConversationResponse {
    pub conversation: ConversationOverview,
    pub reply: TurnReply,
}

/// POST /api/conversations: Create a conversation and run its first turn.
///
/// Returns 201 with the new conversation's overview and the turn reply.
pub async fn create_conversation(
    State(app): State<AppState>,
    Json(body): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<CreateConversationResponse>), ApiError> {
    let (conversation, reply) = app
        .gateway
        .start_conversation(&body.owner, &body.message)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateConversationResponse {
            conversation,
            reply,
        }),
    ))
}

#[derive(Deserialize)]
pub struct OwnerQuery {
    pub owner: String,
}

/// GET /api/conversations?owner=: Conversations of one owner, newest first.
pub async fn list_conversations(
    State(app): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<ConversationOverview>>, ApiError> {
    Ok(Json(app.gateway.list_conversations(&query.owner).await?))
}

/// GET /api/conversations/{id}: One conversation with its full history.
pub async fn get_conversation(
    State(app): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<Json<Conversation>, ApiError> {
    Ok(Json(app.gateway.conversation(id).await?))
}

/// DELETE /api/conversations/{id}: Returns 204, or 404 for unknown ids.
pub async fn delete_conversation(
    State(app): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<StatusCode, ApiError> {
    app.gateway.delete_conversation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request body for POST /api/conversations/{id}/turn.
#[derive(Deserialize)]
pub struct TurnRequest {
    pub message: String,
}

/// POST /api/conversations/{id}/turn: Run one turn.
///
/// 502 when the model request fails; messages confirmed before the failure
/// are still persisted.
pub async fn post_turn(
    State(app): State<AppState>,
    Path(id): Path<ConversationId>,
    Json(body): Json<TurnRequest>,
) -> Result<Json<TurnReply>, ApiError> {
    Ok(Json(app.gateway.turn(id, &body.message).await?))
}

// ── Provider ───────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolDescriptor>,
}

/// POST /api/provider/connect: Start or reach a provider and load its tools.
///
/// The body is a provider spec, e.g.
/// `{"transport": "stdio", "command": ["python", "server.py"]}` or
/// `{"transport": "http", "url": "http://localhost:8000/mcp"}`.
/// Replaces any connected provider.
pub async fn connect_provider(
    State(app): State<AppState>,
    Json(spec): Json<ProviderSpec>,
) -> Result<Json<ToolsResponse>, ApiError> {
    info!("Connecting provider {}", spec.describe());
    let provider = spec.open().await.inspect_err(|e| {
        warn!("Failed to open provider {}: {e}", spec.describe());
    })?;
    let tools = app.gateway.session().connect(provider).await?;
    Ok(Json(ToolsResponse { tools }))
}

/// POST /api/provider/disconnect: Returns 204; a no-op when nothing is connected.
pub async fn disconnect_provider(State(app): State<AppState>) -> Result<StatusCode, ApiError> {
    app.gateway.session().disconnect().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/tools: Tools currently offered to the model.
pub async fn list_tools(State(app): State<AppState>) -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: app.gateway.session().registry().list(),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub provider_connected: bool,
    pub tools: usize,
}

/// GET /api/health: Liveness plus provider status.
pub async fn health(State(app): State<AppState>) -> Json<HealthResponse> {
    let session = app.gateway.session();
    Json(HealthResponse {
        status: "ok",
        model: app.gateway.config().model.clone(),
        provider_connected: session.is_connected(),
        tools: session.registry().len(),
    })
}
