use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use solace_db::Database;
use solace_db::models::{ConversationRow, MessageRow};
use solace_types::api::{
    Claims, ConversationListResponse, CreateConversationRequest, CreateConversationResponse,
    MessageListResponse, SendMessageRequest, SendMessageResponse,
};
use solace_types::models::{Conversation, Message};

use crate::error::ApiError;
use crate::{AppState, parse_timestamp, parse_uuid};

/// Fixed page cap for message reads; `since` is the only cursor.
const MESSAGE_PAGE_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    /// RFC 3339 timestamp; only messages strictly newer are returned.
    pub since: Option<String>,
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.db.list_conversations(&claims.sub.to_string())?;
    let conversations = rows.into_iter().map(conversation_from_row).collect();
    Ok(Json(ConversationListResponse { conversations }))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let other_user_id = req
        .other_user_id
        .ok_or_else(|| ApiError::validation("other_user_id is required"))?;
    if other_user_id == claims.sub {
        return Err(ApiError::validation("cannot start a conversation with yourself"));
    }

    let conversation_id = state.db.create_or_get_conversation(
        &Uuid::new_v4().to_string(),
        &claims.sub.to_string(),
        &other_user_id.to_string(),
        &solace_db::now(),
    )?;

    Ok(Json(CreateConversationResponse {
        conversation_id: parse_uuid(&conversation_id, "conversation id"),
    }))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let cid = conversation_id.to_string();
    load_for_participant(&state.db, &cid, &claims.sub.to_string())?;

    let since = match query.since.as_deref() {
        Some(raw) => Some(parse_since(raw)?),
        None => None,
    };

    // Run the blocking DB read off the async runtime
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || {
        db.db.get_messages(&cid, since.as_deref(), MESSAGE_PAGE_LIMIT)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!(e))
    })??;

    let messages = rows.into_iter().map(message_from_row).collect();
    Ok(Json(MessageListResponse { messages }))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cid = conversation_id.to_string();
    load_for_participant(&state.db, &cid, &claims.sub.to_string())?;

    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::validation("text is required"));
    }

    let message_id = Uuid::new_v4();

    // Run the blocking DB write off the async runtime
    let db = state.clone();
    let sender = claims.sub.to_string();
    let client_id = req.client_id.clone();
    tokio::task::spawn_blocking(move || {
        db.db.insert_message(
            &message_id.to_string(),
            &cid,
            &sender,
            &text,
            client_id.as_deref(),
            &solace_db::now(),
        )
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!(e))
    })??;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message_id,
            // Echoed verbatim for client-side reconciliation; the server
            // does not deduplicate on it.
            client_id: req.client_id,
        }),
    ))
}

/// A conversation is only visible to its two participants; for anyone else
/// it does not exist. Absent and not-permitted are deliberately the same
/// answer so the response leaks nothing.
fn load_for_participant(
    db: &Database,
    conversation_id: &str,
    caller_id: &str,
) -> Result<ConversationRow, ApiError> {
    let convo = db
        .get_conversation(conversation_id)?
        .ok_or(ApiError::NotFound("Conversation"))?;
    if convo.user_a != caller_id && convo.user_b != caller_id {
        return Err(ApiError::NotFound("Conversation"));
    }
    Ok(convo)
}

/// Normalize a client `since` cursor to the canonical storage encoding so
/// the strict greater-than comparison is exact.
fn parse_since(raw: &str) -> Result<String, ApiError> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map_err(|_| ApiError::validation("Invalid since format"))?;
    Ok(solace_db::timestamp(parsed.with_timezone(&Utc)))
}

fn conversation_from_row(row: ConversationRow) -> Conversation {
    let user_a = parse_uuid(&row.user_a, "conversation user_a");
    let user_b = parse_uuid(&row.user_b, "conversation user_b");

    let mut participant_usernames = HashMap::new();
    participant_usernames.insert(user_a, row.username_a);
    participant_usernames.insert(user_b, row.username_b);

    Conversation {
        id: parse_uuid(&row.id, "conversation id"),
        participants: vec![user_a, user_b],
        participant_usernames,
        last_message_at: row.last_message_at.as_deref().map(parse_timestamp),
        last_message_sender_id: row
            .last_message_sender_id
            .as_deref()
            .map(|id| parse_uuid(id, "last_message_sender_id")),
        created_at: parse_timestamp(&row.created_at),
    }
}

fn message_from_row(row: MessageRow) -> Message {
    Message {
        id: parse_uuid(&row.id, "message id"),
        conversation_id: parse_uuid(&row.conversation_id, "message conversation_id"),
        sender_id: parse_uuid(&row.sender_id, "message sender_id"),
        sender_username: row.sender_username,
        text: row.text,
        client_id: row.client_id,
        created_at: parse_timestamp(&row.created_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_is_normalized_to_storage_encoding() {
        assert_eq!(
            parse_since("2026-01-02T10:00:02+00:00").unwrap(),
            "2026-01-02T10:00:02.000Z"
        );
        // Offset times are converted to UTC before comparison
        assert_eq!(
            parse_since("2026-01-02T12:00:02.500+02:00").unwrap(),
            "2026-01-02T10:00:02.500Z"
        );
    }

    #[test]
    fn bad_since_is_a_validation_error() {
        assert!(matches!(
            parse_since("yesterday").unwrap_err(),
            ApiError::Validation(_)
        ));
    }

    #[test]
    fn non_participant_gets_not_found() {
        let db = Database::open_in_memory().unwrap();
        let now = "2026-01-01T00:00:00.000Z";
        db.create_user("u1", "alice", now).unwrap();
        db.create_user("u2", "bob", now).unwrap();
        let id = db.create_or_get_conversation("conv1", "u1", "u2", now).unwrap();

        assert!(load_for_participant(&db, &id, "u1").is_ok());
        assert!(matches!(
            load_for_participant(&db, &id, "u3").unwrap_err(),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            load_for_participant(&db, "missing", "u1").unwrap_err(),
            ApiError::NotFound(_)
        ));
    }
}
