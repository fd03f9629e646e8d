use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use tally_auth::SharedSecret;

use crate::app::{dto::ApiKeyQuery, errors};

/// Header carrying the shared API key.
pub const API_KEY_HEADER: &str = "x-api-key";

const ALLOWED_HEADERS: &str = "Content-Type, X-API-KEY";
const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";

#[derive(Clone)]
pub struct CorsState {
    allow_origin: HeaderValue,
}

impl CorsState {
    pub fn new(origin: &str) -> Self {
        let allow_origin = HeaderValue::from_str(origin).unwrap_or_else(|_| {
            tracing::warn!(origin, "ALLOW_ORIGIN is not a valid header value; using *");
            HeaderValue::from_static("*")
        });
        Self { allow_origin }
    }
}

/// Adds CORS headers to every response and answers preflight requests directly.
pub async fn cors_middleware(
    State(state): State<CorsState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let mut res = if req.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(req).await
    };

    let headers = res.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, state.allow_origin.clone());
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    res
}

/// Rejects requests without the configured API key. A no-op when no key is configured.
pub async fn api_key_middleware(
    State(api_key): State<Option<SharedSecret>>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let Some(api_key) = api_key else {
        return Ok(next.run(req).await);
    };

    let from_query = Query::<ApiKeyQuery>::try_from_uri(req.uri())
        .map(|Query(q)| q.api_key)
        .unwrap_or_default();
    let provided = provided_api_key(req.headers(), from_query.as_deref());

    if api_key.matches(provided) {
        Ok(next.run(req).await)
    } else {
        tracing::warn!(path = %req.uri().path(), "rejected request without a valid API key");
        Err(errors::unauthorized("Unauthorized"))
    }
}

/// The API key presented by the caller: the header wins over the `apiKey` query parameter.
pub fn provided_api_key<'a>(headers: &'a HeaderMap, from_query: Option<&'a str>) -> Option<&'a str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .or(from_query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_takes_precedence_over_query() {
        let mut headers = HeaderMap::new();
        assert_eq!(provided_api_key(&headers, Some("q")), Some("q"));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("h"));
        assert_eq!(provided_api_key(&headers, Some("q")), Some("h"));
        assert_eq!(provided_api_key(&headers, None), Some("h"));
    }

    #[test]
    fn empty_header_falls_through_to_query() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static(""));
        assert_eq!(provided_api_key(&headers, Some("q")), Some("q"));
        assert_eq!(provided_api_key(&headers, None), None);
    }

    #[test]
    fn invalid_origin_falls_back_to_wildcard() {
        assert_eq!(CorsState::new("bad\norigin").allow_origin, "*");
        assert_eq!(CorsState::new("http://a.test").allow_origin, "http://a.test");
    }
}
