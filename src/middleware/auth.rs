use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

use crate::auth::whitelist::{client_ip, request_domain};
use crate::auth::TokenError;
use crate::error::ApiError;
use crate::server::AppState;

/// API token authentication: resolves the bearer token (or `X-API-Key`),
/// checks expiry and the token's IP / domain whitelists, and puts the
/// resulting `AuthToken` in the request extensions
pub async fn token_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let secret = extract_token(request.headers()).ok_or(TokenError::MissingToken)?;

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let ip = client_ip(request.headers(), peer);
    let domain = request_domain(request.headers());

    let token = state
        .tokens()
        .authenticate(&secret, ip, domain.as_deref())
        .await?;

    request.extensions_mut().insert(token);
    Ok(next.run(request).await)
}

/// `Authorization: Bearer <token>`, else `X-API-Key: <token>`
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, token) = v.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim().to_string())
        });

    bearer
        .or_else(|| {
            headers
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
        })
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_then_api_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert("x-api-key", HeaderValue::from_static("dt_key"));
        assert_eq!(extract_token(&headers).as_deref(), Some("dt_key"));

        headers.insert("authorization", HeaderValue::from_static("Bearer dt_bearer"));
        assert_eq!(extract_token(&headers).as_deref(), Some("dt_bearer"));

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&headers).as_deref(), Some("dt_key"));

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_token(&headers), None);
    }
}
