use crate::common::response::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims issued by the account service. `sub` is the acting user id.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub fn verify_token(token: &str, secret: &str) -> Result<TokenClaims, jsonwebtoken::errors::Error> {
    decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(&req) else {
        return Err(ApiError(
            "Unauthorized: Missing or invalid token".to_string(),
            StatusCode::UNAUTHORIZED,
        ));
    };

    let claims = verify_token(token, &state.config.jwt_secret).map_err(|_| {
        ApiError(
            "Unauthorized: Invalid token signature".to_string(),
            StatusCode::UNAUTHORIZED,
        )
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}


#[cfg(test)]
mod tests {
    use super::testing::{token_for, TEST_SECRET};
    use super::*;

    #[test]
    fn accepts_token_signed_with_secret() {
        let claims = verify_token(&token_for("admin-7", "ADMIN"), TEST_SECRET).unwrap();
        assert_eq!(claims.sub, "admin-7");
        assert_eq!(claims.role, "ADMIN");
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        assert!(verify_token(&token_for("admin-7", "ADMIN"), "another-secret").is_err());
    }
}
