pub mod comments;
pub mod conversations;
pub mod error;
pub mod middleware;
pub mod posts;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use solace_db::Database;
use tracing::warn;
use uuid::Uuid;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

/// Parse a stored id, falling back to the nil UUID on corrupt data rather
/// than failing the whole response.
pub(crate) fn parse_uuid(raw: &str, field: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", field, raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt timestamp '{}': {}", raw, e);
        DateTime::default()
    })
}
