use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Comment, Conversation, Message, Post};

// -- JWT Claims --

/// JWT claims shared between the REST middleware and anything else that
/// needs to identify a caller. Canonical definition lives here in
/// solace-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub mood: String,
    pub activity_title: String,
    pub activity_description: String,
    pub activity_type: String,
    pub mood_intensity: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub note: String,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct CreatePostResponse {
    pub post_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<Post>,
    pub count: usize,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct UserPostsResponse {
    pub posts: Vec<Post>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct PostStatusResponse {
    pub post_id: Uuid,
    pub is_liked: bool,
    pub is_starred: bool,
    pub total_likes: i64,
    pub total_stars: i64,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddCommentRequest {
    pub comment: String,
    /// Required when the author is the post owner: the thread (non-owner
    /// participant id) the reply is addressed to. Ignored for non-owners.
    pub thread_user_id: Option<Uuid>,
    pub parent_comment_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AddCommentResponse {
    pub comment_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<Comment>,
    pub count: usize,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateConversationRequest {
    pub other_user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CreateConversationResponse {
    pub conversation_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<Conversation>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub text: String,
    pub client_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message_id: Uuid,
    pub client_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<Message>,
}
