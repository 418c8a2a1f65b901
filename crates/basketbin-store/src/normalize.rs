//! Read-side view of a captured request
//!
//! Headers are stored as an opaque text block; the body content type is
//! recovered here by scanning that block.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use basketbin_db::entities::captured_request;

/// Captured request joined with its body
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    pub id: i32,
    pub basket_name: String,
    pub sent_at: DateTime<Utc>,
    pub method: String,
    pub headers: String,
    pub request_body_content_type: Option<String>,
    /// `None` when no body was stored or the blob lookup failed
    pub request_body: Option<Bytes>,
}

/// Extract the `Content-Type` value from a raw header block
///
/// Header names match case-insensitively; the first non-empty value wins.
pub fn content_type(headers: &str) -> Option<String> {
    headers
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(name, _)| name.trim().eq_ignore_ascii_case("content-type"))
        .map(|(_, value)| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Build the read view for a stored row; never fails
pub fn normalize(row: captured_request::Model, body: Option<Bytes>) -> NormalizedRequest {
    let request_body_content_type = content_type(&row.headers);

    NormalizedRequest {
        id: row.id,
        basket_name: row.basket_name,
        sent_at: row.sent_at,
        method: row.method,
        headers: row.headers,
        request_body_content_type,
        request_body: body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(headers: &str, body_blob_id: Option<&str>) -> captured_request::Model {
        captured_request::Model {
            id: 1,
            basket_name: "demo".to_string(),
            sent_at: Utc::now(),
            method: "POST".to_string(),
            headers: headers.to_string(),
            body_blob_id: body_blob_id.map(str::to_string),
        }
    }

    #[test]
    fn test_content_type_extraction() {
        assert_eq!(
            content_type("Content-Type: application/json\nX-Foo: bar"),
            Some("application/json".to_string())
        );
        assert_eq!(
            content_type("x-foo: bar\r\ncontent-TYPE:  text/plain; charset=utf-8\r\n"),
            Some("text/plain; charset=utf-8".to_string())
        );
        assert_eq!(content_type("X-Foo: bar"), None);
        assert_eq!(content_type(""), None);
        assert_eq!(content_type("Content-Type:\nContent-Type: a/b"), Some("a/b".to_string()));
    }

    #[test]
    fn test_content_type_ignores_lookalike_headers() {
        assert_eq!(content_type("X-Content-Type: text/html"), None);
        assert_eq!(content_type("Content-Type-Options: nosniff"), None);
        assert_eq!(content_type("not a header line"), None);
    }

    #[test]
    fn test_normalize_with_body() {
        let view = normalize(
            row("Content-Type: application/json", Some("b1")),
            Some(Bytes::from_static(b"{\"x\":1}")),
        );

        assert_eq!(view.method, "POST");
        assert_eq!(view.request_body_content_type.as_deref(), Some("application/json"));
        assert_eq!(view.request_body, Some(Bytes::from_static(b"{\"x\":1}")));
    }

    #[test]
    fn test_normalize_without_body() {
        let view = normalize(row("X-Foo: bar", None), None);

        assert!(view.request_body.is_none());
        assert!(view.request_body_content_type.is_none());
        assert_eq!(view.headers, "X-Foo: bar");
    }
}
