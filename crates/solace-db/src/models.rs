/// Database row types — these map directly to SQLite rows.
/// Distinct from the solace-types API models to keep the DB layer
/// independent; ids and timestamps stay strings here and are parsed at
/// the API boundary.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub created_at: String,
}

pub struct PostRow {
    pub id: String,
    pub user_id: String,
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
    pub created_at: String,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub thread_user_id: String,
    pub parent_comment_id: Option<String>,
    pub is_owner_reply: bool,
    pub comment: String,
    pub created_at: String,
}

#[derive(Debug)]
pub struct ConversationRow {
    pub id: String,
    pub user_a: String,
    pub user_b: String,
    pub username_a: String,
    pub username_b: String,
    pub last_message_at: Option<String>,
    pub last_message_sender_id: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub text: String,
    pub client_id: Option<String>,
    pub created_at: String,
}
