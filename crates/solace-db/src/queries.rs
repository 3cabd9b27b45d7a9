use std::collections::HashSet;

use crate::models::{CommentRow, ConversationRow, MessageRow, PostRow, UserRow};
use crate::Database;
use anyhow::{Result, anyhow};
use rusqlite::types::ToSql;
use rusqlite::Connection;

/// Order-independent key for a participant pair: the two ids sorted
/// lexicographically. A conversation between A and B has one identity
/// regardless of which side initiated it.
pub fn canonical_pair<'a>(x: &'a str, y: &'a str) -> (&'a str, &'a str) {
    if x <= y { (x, y) } else { (y, x) }
}

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, created_at) VALUES (?1, ?2, ?3)",
                (id, username, now),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, username, created_at FROM users WHERE id = ?1")?;
            stmt.query_row([id], |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })
            .optional()
        })
    }

    pub fn get_username_by_id(&self, id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| query_username(conn, id))
    }

    // -- Posts --

    pub fn insert_post(&self, post: &PostRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, user_id, mood, activity_title, activity_description,
                                    activity_type, mood_intensity, description, note, is_public,
                                    likes, stars, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, 0, ?11)",
                rusqlite::params![
                    post.id,
                    post.user_id,
                    post.mood,
                    post.activity_title,
                    post.activity_description,
                    post.activity_type,
                    post.mood_intensity,
                    post.description,
                    post.note,
                    post.is_public,
                    post.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{POST_COLUMNS} WHERE id = ?1"))?;
            stmt.query_row([id], post_from_row).optional()
        })
    }

    /// Public feed, newest first. `mood` / `activity_type` are optional
    /// equality filters.
    pub fn list_public_posts(
        &self,
        limit: u32,
        skip: u32,
        mood: Option<&str>,
        activity_type: Option<&str>,
    ) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut sql = format!("{POST_COLUMNS} WHERE is_public = 1");
            let mut params: Vec<&dyn ToSql> = Vec::new();

            if let Some(mood) = mood.as_ref() {
                sql.push_str(" AND mood = ?");
                params.push(mood);
            }
            if let Some(activity_type) = activity_type.as_ref() {
                sql.push_str(" AND activity_type = ?");
                params.push(activity_type);
            }

            sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");
            params.push(&limit);
            params.push(&skip);

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_user_posts(&self, user_id: &str) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("{POST_COLUMNS} WHERE user_id = ?1 ORDER BY created_at DESC"))?;
            let rows = stmt
                .query_map([user_id], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_liked_posts(&self, user_id: &str) -> Result<Vec<PostRow>> {
        self.list_marked_posts("post_likes", user_id)
    }

    pub fn list_starred_posts(&self, user_id: &str) -> Result<Vec<PostRow>> {
        self.list_marked_posts("post_stars", user_id)
    }

    fn list_marked_posts(&self, table: &str, user_id: &str) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT p.id, p.user_id, p.mood, p.activity_title, p.activity_description,
                        p.activity_type, p.mood_intensity, p.description, p.note, p.is_public,
                        p.likes, p.stars, p.created_at
                 FROM posts p
                 JOIN {table} m ON m.post_id = p.id
                 WHERE m.user_id = ?1
                 ORDER BY p.created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Likes / stars --
    //
    // Membership sets with counters on the post row. Membership change and
    // counter adjustment share one transaction, and the counter only moves
    // when membership actually changed, so repeated likes stay idempotent.

    /// Returns true if the post was newly liked.
    pub fn like_post(&self, post_id: &str, user_id: &str, now: &str) -> Result<bool> {
        self.add_mark("post_likes", "likes", post_id, user_id, now)
    }

    /// Returns true if a like was actually removed.
    pub fn unlike_post(&self, post_id: &str, user_id: &str) -> Result<bool> {
        self.remove_mark("post_likes", "likes", post_id, user_id)
    }

    pub fn star_post(&self, post_id: &str, user_id: &str, now: &str) -> Result<bool> {
        self.add_mark("post_stars", "stars", post_id, user_id, now)
    }

    pub fn unstar_post(&self, post_id: &str, user_id: &str) -> Result<bool> {
        self.remove_mark("post_stars", "stars", post_id, user_id)
    }

    fn add_mark(
        &self,
        table: &str,
        counter: &str,
        post_id: &str,
        user_id: &str,
        now: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                &format!(
                    "INSERT OR IGNORE INTO {table} (post_id, user_id, created_at) VALUES (?1, ?2, ?3)"
                ),
                (post_id, user_id, now),
            )?;
            if inserted > 0 {
                tx.execute(
                    &format!("UPDATE posts SET {counter} = {counter} + 1 WHERE id = ?1"),
                    [post_id],
                )?;
            }
            tx.commit()?;
            Ok(inserted > 0)
        })
    }

    fn remove_mark(&self, table: &str, counter: &str, post_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                &format!("DELETE FROM {table} WHERE post_id = ?1 AND user_id = ?2"),
                (post_id, user_id),
            )?;
            if removed > 0 {
                tx.execute(
                    &format!("UPDATE posts SET {counter} = {counter} - 1 WHERE id = ?1"),
                    [post_id],
                )?;
            }
            tx.commit()?;
            Ok(removed > 0)
        })
    }

    pub fn is_post_liked(&self, post_id: &str, user_id: &str) -> Result<bool> {
        self.has_mark("post_likes", post_id, user_id)
    }

    pub fn is_post_starred(&self, post_id: &str, user_id: &str) -> Result<bool> {
        self.has_mark("post_stars", post_id, user_id)
    }

    fn has_mark(&self, table: &str, post_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    &format!("SELECT 1 FROM {table} WHERE post_id = ?1 AND user_id = ?2"),
                    (post_id, user_id),
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Batch-fetch which of `post_ids` the user has liked (eliminates N+1
    /// when annotating the feed).
    pub fn liked_post_ids(&self, user_id: &str, post_ids: &[String]) -> Result<HashSet<String>> {
        self.marked_post_ids("post_likes", user_id, post_ids)
    }

    pub fn starred_post_ids(&self, user_id: &str, post_ids: &[String]) -> Result<HashSet<String>> {
        self.marked_post_ids("post_stars", user_id, post_ids)
    }

    fn marked_post_ids(
        &self,
        table: &str,
        user_id: &str,
        post_ids: &[String],
    ) -> Result<HashSet<String>> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (2..=post_ids.len() + 1).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT post_id FROM {table} WHERE user_id = ?1 AND post_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<&dyn ToSql> = vec![&user_id];
            for id in post_ids {
                params.push(id);
            }

            let ids = stmt
                .query_map(params.as_slice(), |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<HashSet<_>, _>>()?;
            Ok(ids)
        })
    }

    // -- Comments --

    pub fn insert_comment(&self, comment: &CommentRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, user_id, thread_user_id, parent_comment_id,
                                       is_owner_reply, comment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    comment.id,
                    comment.post_id,
                    comment.user_id,
                    comment.thread_user_id,
                    comment.parent_comment_id,
                    comment.is_owner_reply,
                    comment.comment,
                    comment.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Comments on a post in creation order. `thread_user_id = None` returns
    /// every thread (the owner's view); `Some(id)` restricts to that
    /// participant's private thread with the owner.
    pub fn get_post_comments(
        &self,
        post_id: &str,
        thread_user_id: Option<&str>,
    ) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT id, post_id, user_id, thread_user_id, parent_comment_id,
                        is_owner_reply, comment, created_at
                 FROM comments WHERE post_id = ?",
            );
            let mut params: Vec<&dyn ToSql> = vec![&post_id];
            if let Some(thread) = thread_user_id.as_ref() {
                sql.push_str(" AND thread_user_id = ?");
                params.push(thread);
            }
            sql.push_str(" ORDER BY created_at ASC");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        user_id: row.get(2)?,
                        thread_user_id: row.get(3)?,
                        parent_comment_id: row.get(4)?,
                        is_owner_reply: row.get(5)?,
                        comment: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Conversations --

    /// Get-or-create for the canonical participant pair. Idempotent: both
    /// argument orders resolve to the same row, and a lost race against a
    /// concurrent creator is absorbed by INSERT OR IGNORE + re-read
    /// (first-writer-wins, never a user-visible error).
    pub fn create_or_get_conversation(
        &self,
        new_id: &str,
        user_id: &str,
        other_user_id: &str,
        now: &str,
    ) -> Result<String> {
        let (a, b) = canonical_pair(user_id, other_user_id);

        self.with_conn(|conn| {
            if let Some(existing) = query_conversation_by_pair(conn, a, b)? {
                return Ok(existing.id);
            }

            // Display names are snapshotted at creation time, not live-updated.
            let username_a = query_username(conn, a)?.unwrap_or_else(|| "User".to_string());
            let username_b = query_username(conn, b)?.unwrap_or_else(|| "User".to_string());

            conn.execute(
                "INSERT OR IGNORE INTO conversations
                     (id, user_a, user_b, username_a, username_b, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![new_id, a, b, username_a, username_b, now],
            )?;

            let row = query_conversation_by_pair(conn, a, b)?
                .ok_or_else(|| anyhow!("conversation vanished after insert: {} / {}", a, b))?;
            Ok(row.id)
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{CONVERSATION_COLUMNS} WHERE id = ?1"))?;
            stmt.query_row([id], conversation_from_row).optional()
        })
    }

    /// Conversations containing `user_id`, most recently active first.
    /// Conversations with no messages yet (NULL last_message_at) sort last.
    pub fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{CONVERSATION_COLUMNS} WHERE user_a = ?1 OR user_b = ?1
                 ORDER BY last_message_at DESC"
            ))?;
            let rows = stmt
                .query_map([user_id], conversation_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    /// Insert a message and update the conversation's last-message metadata
    /// in one transaction, so readers never observe one without the other.
    pub fn insert_message(
        &self,
        id: &str,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
        client_id: Option<&str>,
        now: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, text, client_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, conversation_id, sender_id, text, client_id, now],
            )?;
            tx.execute(
                "UPDATE conversations SET last_message_at = ?1, last_message_sender_id = ?2
                 WHERE id = ?3",
                rusqlite::params![now, sender_id, conversation_id],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Messages in creation order, capped at `limit`. `since` filters to
    /// strictly newer rows (incremental sync for polling clients).
    /// Sender usernames are resolved live via JOIN — a single query,
    /// no N+1 — and deliberately not taken from the conversation snapshot.
    pub fn get_messages(
        &self,
        conversation_id: &str,
        since: Option<&str>,
        limit: u32,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT m.id, m.conversation_id, m.sender_id, u.username, m.text, m.client_id,
                        m.created_at
                 FROM messages m
                 LEFT JOIN users u ON m.sender_id = u.id
                 WHERE m.conversation_id = ?",
            );
            let mut params: Vec<&dyn ToSql> = vec![&conversation_id];
            if let Some(since) = since.as_ref() {
                sql.push_str(" AND m.created_at > ?");
                params.push(since);
            }
            sql.push_str(" ORDER BY m.created_at ASC LIMIT ?");
            params.push(&limit);

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        sender_username: row
                            .get::<_, Option<String>>(3)?
                            .unwrap_or_else(|| "User".to_string()),
                        text: row.get(4)?,
                        client_id: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

const POST_COLUMNS: &str = "SELECT id, user_id, mood, activity_title, activity_description,
        activity_type, mood_intensity, description, note, is_public, likes, stars, created_at
 FROM posts";

const CONVERSATION_COLUMNS: &str = "SELECT id, user_a, user_b, username_a, username_b,
        last_message_at, last_message_sender_id, created_at
 FROM conversations";

fn post_from_row(row: &rusqlite::Row) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        mood: row.get(2)?,
        activity_title: row.get(3)?,
        activity_description: row.get(4)?,
        activity_type: row.get(5)?,
        mood_intensity: row.get(6)?,
        description: row.get(7)?,
        note: row.get(8)?,
        is_public: row.get(9)?,
        likes: row.get(10)?,
        stars: row.get(11)?,
        created_at: row.get(12)?,
    })
}

fn conversation_from_row(row: &rusqlite::Row) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        user_a: row.get(1)?,
        user_b: row.get(2)?,
        username_a: row.get(3)?,
        username_b: row.get(4)?,
        last_message_at: row.get(5)?,
        last_message_sender_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn query_conversation_by_pair(
    conn: &Connection,
    user_a: &str,
    user_b: &str,
) -> Result<Option<ConversationRow>> {
    let mut stmt =
        conn.prepare(&format!("{CONVERSATION_COLUMNS} WHERE user_a = ?1 AND user_b = ?2"))?;
    stmt.query_row([user_a, user_b], conversation_from_row)
        .optional()
}

fn query_username(conn: &Connection, user_id: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT username FROM users WHERE id = ?1")?;
    stmt.query_row([user_id], |row| row.get(0)).optional()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommentRow, PostRow};

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "alice", "2026-01-01T00:00:00.000Z").unwrap();
        db.create_user("u2", "bob", "2026-01-01T00:00:00.000Z").unwrap();
        db.create_user("u3", "carol", "2026-01-01T00:00:00.000Z").unwrap();
        db
    }

    fn test_post(id: &str, user_id: &str, created_at: &str) -> PostRow {
        PostRow {
            id: id.to_string(),
            user_id: user_id.to_string(),
            mood: "calm".to_string(),
            activity_title: "Morning walk".to_string(),
            activity_description: "A walk by the river".to_string(),
            activity_type: "exercise".to_string(),
            mood_intensity: 6,
            description: String::new(),
            note: String::new(),
            is_public: true,
            likes: 0,
            stars: 0,
            created_at: created_at.to_string(),
        }
    }

    fn test_comment(
        id: &str,
        post_id: &str,
        user_id: &str,
        thread_user_id: &str,
        is_owner_reply: bool,
        text: &str,
        created_at: &str,
    ) -> CommentRow {
        CommentRow {
            id: id.to_string(),
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            thread_user_id: thread_user_id.to_string(),
            parent_comment_id: None,
            is_owner_reply,
            comment: text.to_string(),
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn owner_sees_all_threads_others_see_their_own() {
        let db = test_db();
        db.insert_post(&test_post("p1", "u1", "2026-01-02T10:00:00.000Z")).unwrap();

        db.insert_comment(&test_comment(
            "c1", "p1", "u2", "u2", false, "hi", "2026-01-02T10:01:00.000Z",
        ))
        .unwrap();
        db.insert_comment(&test_comment(
            "c2", "p1", "u3", "u3", false, "hey", "2026-01-02T10:02:00.000Z",
        ))
        .unwrap();
        db.insert_comment(&test_comment(
            "c3", "p1", "u1", "u2", true, "thanks", "2026-01-02T10:03:00.000Z",
        ))
        .unwrap();

        // Owner view: every thread
        let all = db.get_post_comments("p1", None).unwrap();
        assert_eq!(all.len(), 3);

        // u2's thread holds their comment and the owner reply, in creation order
        let u2_view = db.get_post_comments("p1", Some("u2")).unwrap();
        assert_eq!(
            u2_view.iter().map(|c| c.comment.as_str()).collect::<Vec<_>>(),
            vec!["hi", "thanks"]
        );

        // u3 never sees u2's thread
        let u3_view = db.get_post_comments("p1", Some("u3")).unwrap();
        assert_eq!(u3_view.len(), 1);
        assert_eq!(u3_view[0].comment, "hey");
    }

    #[test]
    fn conversation_pair_is_order_independent() {
        let db = test_db();
        let now = "2026-01-02T10:00:00.000Z";

        let first = db.create_or_get_conversation("conv1", "u1", "u2", now).unwrap();
        let second = db.create_or_get_conversation("conv2", "u2", "u1", now).unwrap();

        assert_eq!(first, "conv1");
        assert_eq!(second, "conv1");

        // Only one row exists for the pair
        let for_u1 = db.list_conversations("u1").unwrap();
        assert_eq!(for_u1.len(), 1);
        assert_eq!(for_u1[0].username_a, "alice");
        assert_eq!(for_u1[0].username_b, "bob");
    }

    #[test]
    fn conversation_survives_duplicate_insert_race() {
        let db = test_db();
        let now = "2026-01-02T10:00:00.000Z";
        let winner = db.create_or_get_conversation("conv1", "u1", "u2", now).unwrap();

        // Simulate the loser of the race inserting directly against the
        // canonical pair: the UNIQUE constraint swallows it.
        db.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO conversations
                     (id, user_a, user_b, username_a, username_b, created_at)
                 VALUES ('conv2', 'u1', 'u2', 'alice', 'bob', ?1)",
                [now],
            )?;
            Ok(())
        })
        .unwrap();

        let resolved = db.create_or_get_conversation("conv3", "u2", "u1", now).unwrap();
        assert_eq!(resolved, winner);
        assert_eq!(db.list_conversations("u2").unwrap().len(), 1);
    }

    #[test]
    fn conversations_order_by_activity_with_idle_last() {
        let db = test_db();
        let now = "2026-01-02T10:00:00.000Z";
        db.create_or_get_conversation("quiet", "u1", "u2", now).unwrap();
        db.create_or_get_conversation("active", "u1", "u3", now).unwrap();

        db.insert_message("m1", "active", "u3", "hello", None, "2026-01-02T11:00:00.000Z")
            .unwrap();

        let rows = db.list_conversations("u1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "active");
        assert_eq!(rows[0].last_message_at.as_deref(), Some("2026-01-02T11:00:00.000Z"));
        assert_eq!(rows[0].last_message_sender_id.as_deref(), Some("u3"));
        assert_eq!(rows[1].id, "quiet");
        assert!(rows[1].last_message_at.is_none());
    }

    #[test]
    fn messages_filter_strictly_after_since() {
        let db = test_db();
        let now = "2026-01-02T10:00:00.000Z";
        db.create_or_get_conversation("conv1", "u1", "u2", now).unwrap();

        db.insert_message("m1", "conv1", "u1", "one", None, "2026-01-02T10:00:01.000Z").unwrap();
        db.insert_message("m2", "conv1", "u2", "two", Some("tok-2"), "2026-01-02T10:00:02.000Z")
            .unwrap();
        db.insert_message("m3", "conv1", "u1", "three", None, "2026-01-02T10:00:03.000Z").unwrap();

        let all = db.get_messages("conv1", None, 50).unwrap();
        assert_eq!(
            all.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(),
            vec!["one", "two", "three"]
        );
        assert_eq!(all[1].client_id.as_deref(), Some("tok-2"));
        assert_eq!(all[0].sender_username, "alice");
        assert_eq!(all[1].sender_username, "bob");

        // Strictly greater: the message at the cursor itself is excluded
        let after = db.get_messages("conv1", Some("2026-01-02T10:00:02.000Z"), 50).unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].text, "three");

        // Re-issuing from the last returned timestamp yields nothing new
        let none = db.get_messages("conv1", Some(&after[0].created_at), 50).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn message_limit_caps_page_size() {
        let db = test_db();
        let now = "2026-01-02T10:00:00.000Z";
        db.create_or_get_conversation("conv1", "u1", "u2", now).unwrap();
        for i in 0..5 {
            db.insert_message(
                &format!("m{}", i),
                "conv1",
                "u1",
                "tick",
                None,
                &format!("2026-01-02T10:00:0{}.000Z", i),
            )
            .unwrap();
        }
        assert_eq!(db.get_messages("conv1", None, 3).unwrap().len(), 3);
    }

    #[test]
    fn likes_are_idempotent_and_counted_once() {
        let db = test_db();
        db.insert_post(&test_post("p1", "u1", "2026-01-02T10:00:00.000Z")).unwrap();
        let now = "2026-01-02T10:01:00.000Z";

        assert!(db.like_post("p1", "u2", now).unwrap());
        assert!(!db.like_post("p1", "u2", now).unwrap());
        assert_eq!(db.get_post("p1").unwrap().unwrap().likes, 1);
        assert!(db.is_post_liked("p1", "u2").unwrap());

        assert!(db.unlike_post("p1", "u2").unwrap());
        assert!(!db.unlike_post("p1", "u2").unwrap());
        assert_eq!(db.get_post("p1").unwrap().unwrap().likes, 0);
        assert!(!db.is_post_liked("p1", "u2").unwrap());
    }

    #[test]
    fn feed_filters_and_pagination() {
        let db = test_db();
        let mut p1 = test_post("p1", "u1", "2026-01-02T10:00:00.000Z");
        p1.mood = "calm".to_string();
        let mut p2 = test_post("p2", "u2", "2026-01-02T11:00:00.000Z");
        p2.mood = "anxious".to_string();
        let mut p3 = test_post("p3", "u2", "2026-01-02T12:00:00.000Z");
        p3.is_public = false;
        db.insert_post(&p1).unwrap();
        db.insert_post(&p2).unwrap();
        db.insert_post(&p3).unwrap();

        // Private posts never appear; newest first
        let feed = db.list_public_posts(20, 0, None, None).unwrap();
        assert_eq!(feed.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), vec!["p2", "p1"]);

        let calm = db.list_public_posts(20, 0, Some("calm"), None).unwrap();
        assert_eq!(calm.len(), 1);
        assert_eq!(calm[0].id, "p1");

        let second_page = db.list_public_posts(1, 1, None, None).unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].id, "p1");
    }

    #[test]
    fn batch_mark_lookup_matches_membership() {
        let db = test_db();
        db.insert_post(&test_post("p1", "u1", "2026-01-02T10:00:00.000Z")).unwrap();
        db.insert_post(&test_post("p2", "u1", "2026-01-02T11:00:00.000Z")).unwrap();
        let now = "2026-01-02T12:00:00.000Z";
        db.like_post("p1", "u2", now).unwrap();
        db.star_post("p2", "u2", now).unwrap();

        let ids = vec!["p1".to_string(), "p2".to_string()];
        let liked = db.liked_post_ids("u2", &ids).unwrap();
        let starred = db.starred_post_ids("u2", &ids).unwrap();
        assert!(liked.contains("p1") && !liked.contains("p2"));
        assert!(starred.contains("p2") && !starred.contains("p1"));
    }

    #[test]
    fn canonical_pair_sorts_lexicographically() {
        assert_eq!(canonical_pair("b", "a"), ("a", "b"));
        assert_eq!(canonical_pair("a", "b"), ("a", "b"));
        assert_eq!(canonical_pair("x", "x"), ("x", "x"));
    }
}
