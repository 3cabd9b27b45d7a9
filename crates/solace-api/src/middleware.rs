use axum::{
    extract::Request,
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use solace_types::api::Claims;

use crate::error::ApiError;

pub fn jwt_secret() -> String {
    std::env::var("SOLACE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into())
}

/// Extract and validate JWT from the Authorization header; the verified
/// claims become a request extension for handlers downstream.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let claims = claims_from_headers(req.headers(), &jwt_secret()).ok_or(ApiError::Unauthorized)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Best-effort identity for routes that work both anonymously and
/// authenticated (the public feed annotates like/star state when a valid
/// bearer token happens to be present).
pub fn claims_from_headers(headers: &HeaderMap, secret: &str) -> Option<Claims> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;
    let token = auth_header.strip_prefix("Bearer ")?;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use uuid::Uuid;

    fn bearer(secret: &str, exp_offset_secs: i64) -> HeaderMap {
        let claims = Claims {
            sub: Uuid::new_v4(),
            username: "alice".to_string(),
            exp: (chrono::Utc::now().timestamp() + exp_offset_secs) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn valid_token_yields_claims() {
        let headers = bearer("secret", 3600);
        let claims = claims_from_headers(&headers, "secret").unwrap();
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let headers = bearer("secret", 3600);
        assert!(claims_from_headers(&headers, "other").is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let headers = bearer("secret", -3600);
        assert!(claims_from_headers(&headers, "secret").is_none());
    }

    #[test]
    fn missing_header_yields_none() {
        assert!(claims_from_headers(&HeaderMap::new(), "secret").is_none());
    }
}
