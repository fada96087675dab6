use std::fmt;

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied id that is reused as-is
const MAX_FORWARDED_LEN: usize = 64;

/// Correlates a timeline request across log lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Reuse the proxy's id when it is short visible ASCII, otherwise mint a
    /// UUID v4.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let forwarded = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty() && s.len() <= MAX_FORWARDED_LEN)
            .filter(|s| s.bytes().all(|b| b.is_ascii_graphic()));

        match forwarded {
            Some(id) => Self(id.to_string()),
            None => Self(Uuid::new_v4().to_string()),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub async fn request_id_middleware(headers: HeaderMap, mut request: Request, next: Next) -> Response {
    let id = RequestId::from_headers(&headers);
    tracing::Span::current().record("request_id", id.0.as_str());

    let header = HeaderValue::from_str(&id.0).ok();
    request.extensions_mut().insert(id);

    let mut response = next.run(request).await;
    if let Some(val) = header {
        response.headers_mut().insert(REQUEST_ID_HEADER, val);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_forwarded_id_is_reused_trimmed() {
        assert_eq!(RequestId::from_headers(&headers("  edge-42 ")).0, "edge-42");
    }

    #[test]
    fn test_unusable_ids_are_replaced() {
        let too_long = "a".repeat(MAX_FORWARDED_LEN + 1);
        for value in ["", "   ", "two words", too_long.as_str()] {
            let id = RequestId::from_headers(&headers(value));
            assert!(Uuid::parse_str(&id.0).is_ok(), "{value:?} was kept");
        }
        assert!(Uuid::parse_str(&RequestId::from_headers(&HeaderMap::new()).to_string()).is_ok());
    }
}
