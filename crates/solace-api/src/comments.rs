use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use solace_db::models::CommentRow;
use solace_types::api::{AddCommentRequest, AddCommentResponse, Claims, CommentListResponse};
use solace_types::models::Comment;

use crate::error::ApiError;
use crate::{AppState, parse_timestamp, parse_uuid};

/// Decide which thread a new comment lands in.
///
/// The post owner runs one private thread per non-owner commenter and must
/// say which thread a reply is addressed to. A non-owner always lands in
/// their own thread — any client-supplied thread id is discarded, so a user
/// cannot inject comments into someone else's thread.
fn resolve_thread(
    author_id: Uuid,
    owner_id: Uuid,
    requested_thread: Option<Uuid>,
) -> Result<(Uuid, bool), ApiError> {
    if author_id == owner_id {
        let thread = requested_thread
            .ok_or_else(|| ApiError::validation("thread_user_id is required for owner replies"))?;
        Ok((thread, true))
    } else {
        Ok((author_id, false))
    }
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.comment.trim();
    if text.is_empty() {
        return Err(ApiError::validation("comment is required"));
    }

    let post = state
        .db
        .get_post(&post_id.to_string())?
        .ok_or(ApiError::NotFound("Post"))?;

    let owner_id = parse_uuid(&post.user_id, "post user_id");
    let (thread_user_id, is_owner_reply) = resolve_thread(claims.sub, owner_id, req.thread_user_id)?;

    let comment_id = Uuid::new_v4();
    state.db.insert_comment(&CommentRow {
        id: comment_id.to_string(),
        post_id: post_id.to_string(),
        user_id: claims.sub.to_string(),
        thread_user_id: thread_user_id.to_string(),
        parent_comment_id: req.parent_comment_id.map(|id| id.to_string()),
        is_owner_reply,
        comment: text.to_string(),
        created_at: solace_db::now(),
    })?;

    Ok((StatusCode::CREATED, Json(AddCommentResponse { comment_id })))
}

/// The per-request visibility filter: the owner reads every thread on the
/// post; anyone else reads only their own thread. Recomputed on every call,
/// never cached.
pub async fn get_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state
        .db
        .get_post(&post_id.to_string())?
        .ok_or(ApiError::NotFound("Post"))?;

    let is_owner = post.user_id == claims.sub.to_string();
    let thread_filter = if is_owner { None } else { Some(claims.sub.to_string()) };

    // Run the blocking DB read off the async runtime
    let db = state.clone();
    let pid = post_id.to_string();
    let rows = tokio::task::spawn_blocking(move || {
        db.db.get_post_comments(&pid, thread_filter.as_deref())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!(e))
    })??;

    let comments: Vec<Comment> = rows.into_iter().map(comment_from_row).collect();
    let count = comments.len();

    Ok(Json(CommentListResponse { comments, count }))
}

fn comment_from_row(row: CommentRow) -> Comment {
    Comment {
        id: parse_uuid(&row.id, "comment id"),
        post_id: parse_uuid(&row.post_id, "comment post_id"),
        user_id: parse_uuid(&row.user_id, "comment user_id"),
        thread_user_id: parse_uuid(&row.thread_user_id, "comment thread_user_id"),
        parent_comment_id: row.parent_comment_id.as_deref().map(|id| parse_uuid(id, "parent_comment_id")),
        is_owner_reply: row.is_owner_reply,
        comment: row.comment,
        created_at: parse_timestamp(&row.created_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_must_address_a_thread() {
        let owner = Uuid::new_v4();
        let err = resolve_thread(owner, owner, None).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn owner_reply_lands_in_requested_thread() {
        let owner = Uuid::new_v4();
        let commenter = Uuid::new_v4();
        let (thread, is_owner_reply) = resolve_thread(owner, owner, Some(commenter)).unwrap();
        assert_eq!(thread, commenter);
        assert!(is_owner_reply);
    }

    #[test]
    fn non_owner_cannot_pick_a_foreign_thread() {
        let owner = Uuid::new_v4();
        let author = Uuid::new_v4();
        let victim = Uuid::new_v4();

        // A forged thread_user_id is ignored outright
        let (thread, is_owner_reply) = resolve_thread(author, owner, Some(victim)).unwrap();
        assert_eq!(thread, author);
        assert!(!is_owner_reply);

        // Same result with no thread supplied
        let (thread, _) = resolve_thread(author, owner, None).unwrap();
        assert_eq!(thread, author);
    }
}
