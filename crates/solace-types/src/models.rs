use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A community post in the public feed. Immutable after creation except the
/// like/star counters and their membership sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mood: String,
    pub activity_title: String,
    pub activity_description: String,
    pub activity_type: String,
    pub mood_intensity: i64,
    pub description: String,
    pub note: String,
    pub is_public: bool,
    pub likes: i64,
    pub stars: i64,
    pub created_at: DateTime<Utc>,
    /// Whether the requesting user has liked/starred this post. Always false
    /// for unauthenticated reads.
    pub is_liked: bool,
    pub is_starred: bool,
}

/// A comment on a post. Every comment belongs to exactly one thread,
/// identified by `thread_user_id` — always a non-owner participant's id.
/// Comments authored by the post owner carry `is_owner_reply = true` and
/// address an existing thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub thread_user_id: Uuid,
    pub parent_comment_id: Option<Uuid>,
    pub is_owner_reply: bool,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// A pairwise private conversation. The participant pair is canonicalized
/// (sorted), so one document exists per pair regardless of who initiated.
/// `participant_usernames` is a snapshot taken at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub participants: Vec<Uuid>,
    pub participant_usernames: HashMap<Uuid, String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_sender_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A direct message. `sender_username` is resolved live at read time, not
/// from the conversation's snapshot. `client_id` is an opaque idempotency
/// token echoed back for client-side reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub text: String,
    pub client_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
