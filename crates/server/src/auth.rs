//! Request identity: trace ids and API key authentication.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{FromRequestParts, Request};
use axum::http::HeaderValue;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use stash_metadata::MetadataError;
use stash_metadata::accounts;
use stash_metadata::models::AccountRow;
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the request correlation id.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and potential log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value.
    /// Keeps at most MAX_TRACE_ID_LEN characters and drops anything but printable ASCII.
    pub fn from_client(value: &str) -> Self {
        // Count characters, not bytes, so multi-byte input cannot split a code point.
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    /// Get the trace ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extract trace ID from X-Trace-Id header or generate a new one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Run every request inside a span carrying its trace ID, and echo the ID back.
pub async fn trace_id_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(&req);
    req.extensions_mut().insert(trace_id.clone());

    let span = tracing::info_span!(
        "request",
        trace_id = %trace_id,
        account_id = tracing::field::Empty,
    );
    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

/// Extract the bearer token from an Authorization header value.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn parse_bearer(value: &str) -> Option<&str> {
    if value.len() < 7 || !value.is_char_boundary(7) {
        return None;
    }
    let (scheme, token) = value.split_at(7);
    if !scheme.eq_ignore_ascii_case("bearer ") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}

/// The account that owns the presented API key.
///
/// Handlers that take this argument reject the request with 401 unless the
/// `Authorization: Bearer <key>` header resolves to an existing account.
#[derive(Clone, Debug)]
pub struct AuthenticatedAccount {
    pub account: AccountRow,
}

impl AuthenticatedAccount {
    pub fn id(&self) -> i64 {
        self.account.id
    }
}

impl FromRequestParts<AppState> for AuthenticatedAccount {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".to_string()))?;

        let api_key = header.to_str().ok().and_then(parse_bearer).ok_or_else(|| {
            ApiError::Unauthorized("expected 'Authorization: Bearer <api key>'".to_string())
        })?;

        match accounts::resolve_api_key(state.metadata.as_ref(), api_key).await {
            Ok(account) => {
                tracing::Span::current().record("account_id", account.id);
                Ok(Self { account })
            }
            Err(MetadataError::InvalidApiKey) => {
                tracing::debug!("Rejected unknown API key");
                Err(ApiError::Unauthorized("invalid API key".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
