use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use solace_db::Database;
use solace_db::models::PostRow;
use solace_types::api::{
    Claims, CreatePostRequest, CreatePostResponse, PostListResponse, PostStatusResponse,
    UserPostsResponse,
};
use solace_types::models::Post;

use crate::error::ApiError;
use crate::middleware::claims_from_headers;
use crate::{AppState, parse_timestamp, parse_uuid};

#[derive(Debug, Deserialize)]
pub struct PostQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub skip: u32,
    pub mood: Option<String>,
    pub activity_type: Option<String>,
}

fn default_limit() -> u32 {
    20
}

const MAX_PAGE: u32 = 50;

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mood = req.mood.trim();
    let activity_title = req.activity_title.trim();
    let activity_description = req.activity_description.trim();
    let activity_type = req.activity_type.trim();

    if [mood, activity_title, activity_description, activity_type]
        .iter()
        .any(|f| f.is_empty())
    {
        return Err(ApiError::validation(
            "mood, activity_title, activity_description, and activity_type are required",
        ));
    }
    if !(1..=10).contains(&req.mood_intensity) {
        return Err(ApiError::validation("mood_intensity must be an integer between 1-10"));
    }

    let post_id = Uuid::new_v4();
    state.db.insert_post(&PostRow {
        id: post_id.to_string(),
        user_id: claims.sub.to_string(),
        mood: mood.to_string(),
        activity_title: activity_title.to_string(),
        activity_description: activity_description.to_string(),
        activity_type: activity_type.to_string(),
        mood_intensity: req.mood_intensity,
        description: req.description.trim().to_string(),
        note: req.note.trim().to_string(),
        is_public: req.is_public,
        likes: 0,
        stars: 0,
        created_at: solace_db::now(),
    })?;

    Ok((StatusCode::CREATED, Json(CreatePostResponse { post_id })))
}

/// Public feed. Authentication is optional here: a valid bearer token gets
/// each post annotated with the caller's like/star state, anonymous reads
/// get both flags false.
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let caller = claims_from_headers(&headers, &state.jwt_secret).map(|c| c.sub.to_string());
    let limit = query.limit.min(MAX_PAGE);

    // Run all blocking DB queries off the async runtime
    let db = state.clone();
    let posts = tokio::task::spawn_blocking(move || {
        let rows = db.db.list_public_posts(
            limit,
            query.skip,
            query.mood.as_deref().filter(|m| !m.trim().is_empty()),
            query.activity_type.as_deref().filter(|t| !t.trim().is_empty()),
        )?;
        annotate_rows(&db.db, rows, caller.as_deref())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!(e))
    })??;

    let count = posts.len();
    Ok(Json(PostListResponse {
        posts,
        count,
        has_more: count == limit as usize,
    }))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_post(&post_id.to_string())?
        .ok_or(ApiError::NotFound("Post"))?;
    Ok(Json(post_from_row(row, false, false)))
}

pub async fn like_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let pid = post_id.to_string();
    state.db.get_post(&pid)?.ok_or(ApiError::NotFound("Post"))?;
    state.db.like_post(&pid, &claims.sub.to_string(), &solace_db::now())?;
    Ok(Json(serde_json::json!({ "liked": true })))
}

pub async fn unlike_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.unlike_post(&post_id.to_string(), &claims.sub.to_string())?;
    Ok(Json(serde_json::json!({ "liked": false })))
}

pub async fn star_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let pid = post_id.to_string();
    state.db.get_post(&pid)?.ok_or(ApiError::NotFound("Post"))?;
    state.db.star_post(&pid, &claims.sub.to_string(), &solace_db::now())?;
    Ok(Json(serde_json::json!({ "starred": true })))
}

pub async fn unstar_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.unstar_post(&post_id.to_string(), &claims.sub.to_string())?;
    Ok(Json(serde_json::json!({ "starred": false })))
}

pub async fn post_status(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let pid = post_id.to_string();
    let post = state.db.get_post(&pid)?.ok_or(ApiError::NotFound("Post"))?;
    let uid = claims.sub.to_string();

    Ok(Json(PostStatusResponse {
        post_id,
        is_liked: state.db.is_post_liked(&pid, &uid)?,
        is_starred: state.db.is_post_starred(&pid, &uid)?,
        total_likes: post.likes,
        total_stars: post.stars,
    }))
}

pub async fn my_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let rows = state.db.list_user_posts(&uid)?;
    user_posts_response(&state.db, rows, &uid)
}

pub async fn my_liked_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let rows = state.db.list_liked_posts(&uid)?;
    user_posts_response(&state.db, rows, &uid)
}

pub async fn my_starred_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let rows = state.db.list_starred_posts(&uid)?;
    user_posts_response(&state.db, rows, &uid)
}

fn user_posts_response(
    db: &Database,
    rows: Vec<PostRow>,
    user_id: &str,
) -> Result<Json<UserPostsResponse>, ApiError> {
    let posts = annotate_rows(db, rows, Some(user_id))?;
    let count = posts.len();
    Ok(Json(UserPostsResponse { posts, count }))
}

/// Annotate rows with the caller's like/star membership, batch-fetched in
/// two queries rather than per post.
fn annotate_rows(
    db: &Database,
    rows: Vec<PostRow>,
    caller_id: Option<&str>,
) -> Result<Vec<Post>, ApiError> {
    let (liked, starred) = match caller_id {
        Some(uid) => {
            let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
            (db.liked_post_ids(uid, &ids)?, db.starred_post_ids(uid, &ids)?)
        }
        None => (HashSet::new(), HashSet::new()),
    };

    Ok(rows
        .into_iter()
        .map(|row| {
            let is_liked = liked.contains(&row.id);
            let is_starred = starred.contains(&row.id);
            post_from_row(row, is_liked, is_starred)
        })
        .collect())
}

fn post_from_row(row: PostRow, is_liked: bool, is_starred: bool) -> Post {
    Post {
        id: parse_uuid(&row.id, "post id"),
        user_id: parse_uuid(&row.user_id, "post user_id"),
        mood: row.mood,
        activity_title: row.activity_title,
        activity_description: row.activity_description,
        activity_type: row.activity_type,
        mood_intensity: row.mood_intensity,
        description: row.description,
        note: row.note,
        is_public: row.is_public,
        likes: row.likes,
        stars: row.stars,
        created_at: parse_timestamp(&row.created_at),
        is_liked,
        is_starred,
    }
}
