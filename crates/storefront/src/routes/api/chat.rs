//! Support assistant endpoint.

use axum::{Json, extract::State};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use crate::error::JsonError;
use crate::middleware::OptionalAuth;
use crate::models::session_keys;
use crate::services::chat::{ChatReply, ChatbotService};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Send a message to the assistant and get its reply.
///
/// The conversation id lives in the browser session, so a visitor keeps
/// one transcript across pages.
#[instrument(skip(state, session, user, request))]
pub async fn send(
    State(state): State<AppState>,
    session: Session,
    user: OptionalAuth,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, JsonError> {
    let conversation = session.get::<Uuid>(session_keys::CHAT_SESSION).await?;

    let reply = ChatbotService::new(state.pool(), state.chat())
        .respond(
            conversation,
            user.0.as_ref().map(|u| u.id),
            &request.message,
        )
        .await?;

    if conversation != Some(reply.session_id) {
        session
            .insert(session_keys::CHAT_SESSION, reply.session_id)
            .await?;
    }
    Ok(Json(reply))
}
