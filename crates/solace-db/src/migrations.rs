use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS posts (
            id                   TEXT PRIMARY KEY,
            user_id              TEXT NOT NULL REFERENCES users(id),
            mood                 TEXT NOT NULL,
            activity_title       TEXT NOT NULL,
            activity_description TEXT NOT NULL,
            activity_type        TEXT NOT NULL,
            mood_intensity       INTEGER NOT NULL,
            description          TEXT NOT NULL DEFAULT '',
            note                 TEXT NOT NULL DEFAULT '',
            is_public            INTEGER NOT NULL DEFAULT 1,
            likes                INTEGER NOT NULL DEFAULT 0,
            stars                INTEGER NOT NULL DEFAULT 0,
            created_at           TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_posts_public
            ON posts(is_public, created_at);

        CREATE TABLE IF NOT EXISTS post_likes (
            post_id     TEXT NOT NULL REFERENCES posts(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            UNIQUE(post_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS post_stars (
            post_id     TEXT NOT NULL REFERENCES posts(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            UNIQUE(post_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS comments (
            id                TEXT PRIMARY KEY,
            post_id           TEXT NOT NULL REFERENCES posts(id),
            user_id           TEXT NOT NULL REFERENCES users(id),
            thread_user_id    TEXT NOT NULL,
            parent_comment_id TEXT,
            is_owner_reply    INTEGER NOT NULL DEFAULT 0,
            comment           TEXT NOT NULL,
            created_at        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, thread_user_id, created_at);

        -- (user_a, user_b) is the canonical participant pair: the two ids
        -- sorted lexicographically. The UNIQUE constraint absorbs the
        -- duplicate-creation race between concurrent get-or-create calls.
        CREATE TABLE IF NOT EXISTS conversations (
            id                      TEXT PRIMARY KEY,
            user_a                  TEXT NOT NULL REFERENCES users(id),
            user_b                  TEXT NOT NULL REFERENCES users(id),
            username_a              TEXT NOT NULL,
            username_b              TEXT NOT NULL,
            last_message_at         TEXT,
            last_message_sender_id  TEXT,
            created_at              TEXT NOT NULL,
            UNIQUE(user_a, user_b)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            sender_id       TEXT NOT NULL REFERENCES users(id),
            text            TEXT NOT NULL,
            client_id       TEXT,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
