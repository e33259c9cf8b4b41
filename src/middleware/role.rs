use crate::common::response::ApiError;
use crate::middleware::auth::TokenClaims;
use axum::{
    extract::{Extension, Request},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

pub const ROLE_ADMIN: &str = "ADMIN";
pub const ROLE_SELLER: &str = "SELLER";

pub async fn admin_guard(
    Extension(claims): Extension<TokenClaims>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if claims.role != ROLE_ADMIN {
        return Err(ApiError("Forbidden: Admin access required".to_string(), StatusCode::FORBIDDEN));
    }

    Ok(next.run(req).await)
}

/// Sellers manage their own listing media; admins may act on any.
pub async fn uploader_guard(
    Extension(claims): Extension<TokenClaims>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if claims.role != ROLE_ADMIN && claims.role != ROLE_SELLER {
        return Err(ApiError("Forbidden: Seller or admin access required".to_string(), StatusCode::FORBIDDEN));
    }

    Ok(next.run(req).await)
}
