use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};
use sqlx::SqliteConnection;

use crate::error::ApiError;
use crate::models::User;

/// Hex SHA-256 digest of a bearer token. Only the digest is stored.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Extract the bearer token from the Authorization header.
/// Header format: `Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolve the request's bearer token to an active staff account.
pub async fn require_staff(
    headers: &HeaderMap,
    conn: &mut SqliteConnection,
) -> Result<User, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    let token_hash = hash_token(token);

    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, is_active FROM users WHERE token_hash = ?",
    )
    .bind(&token_hash)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(ApiError::Unauthorized)?;

    if !user.is_active {
        tracing::warn!("auth attempt for deactivated account: {}", user.username);
        return Err(ApiError::Unauthorized);
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_known_vectors() {
        assert_eq!(
            hash_token("test"),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
        assert_eq!(
            hash_token(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_bearer_token_parses_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer s3cret".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("s3cret"));
    }

    #[test]
    fn test_bearer_token_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic dXNlcg==".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_bearer_token_missing_header() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
