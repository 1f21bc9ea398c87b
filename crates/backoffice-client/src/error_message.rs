//! Collapses any backend error body into one readable message.
//!
//! The backend answers failures in one of three shapes: `{"detail": ".."}`,
//! `{"message": ".."}`, or a map of field name to one or many messages. A body
//! may also be plain text or missing entirely. All of them end up as a single
//! string so callers never branch on the shape.

use reqwest::StatusCode;
use serde_json::{Map, Value};

/// Build the normalized message for a failed response.
///
/// Never fails and never returns an empty string.
pub fn normalize_error(status: StatusCode, body: Option<&str>) -> String {
    let text = match body.map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => return status_fallback(status),
    };

    let parsed = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(_) => return text.to_string(),
    };

    let message = match parsed {
        Value::Object(map) => from_object(&map),
        Value::String(s) => s,
        Value::Null => String::new(),
        other => join_messages(&other),
    };

    if message.trim().is_empty() {
        status_fallback(status)
    } else {
        message
    }
}

fn status_fallback(status: StatusCode) -> String {
    format!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown Status")
    )
}

fn from_object(map: &Map<String, Value>) -> String {
    for key in ["detail", "message"] {
        match map.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Null) | None => {},
            Some(other) => {
                let joined = join_messages(other);
                if !joined.is_empty() {
                    return joined;
                }
            },
        }
    }

    map.iter()
        .filter_map(|(field, value)| {
            let messages = join_messages(value);
            if messages.is_empty() {
                None
            } else {
                Some(format!("{}: {}", field, messages))
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// A bare value becomes a one-element list; lists are joined with ", ".
fn join_messages(value: &Value) -> String {
    let items: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(render_one).collect(),
        other => render_one(other).into_iter().collect(),
    };
    items.join(", ")
}

fn render_one(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => {
            let nested = from_object(map);
            (!nested.is_empty()).then_some(nested)
        },
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_body_uses_status_line() {
        assert_eq!(
            normalize_error(StatusCode::INTERNAL_SERVER_ERROR, None),
            "HTTP 500: Internal Server Error"
        );
        assert_eq!(normalize_error(StatusCode::BAD_GATEWAY, Some("   ")), "HTTP 502: Bad Gateway");
    }

    #[test]
    fn test_plain_text_body_is_used_as_detail() {
        assert_eq!(
            normalize_error(StatusCode::BAD_REQUEST, Some("Something broke")),
            "Something broke"
        );
    }

    #[test]
    fn test_detail_and_message_are_verbatim() {
        assert_eq!(
            normalize_error(StatusCode::FORBIDDEN, Some(r#"{"detail": "No access"}"#)),
            "No access"
        );
        assert_eq!(
            normalize_error(StatusCode::CONFLICT, Some(r#"{"message": "Already approved"}"#)),
            "Already approved"
        );
    }

    #[test]
    fn test_detail_wins_over_fields() {
        let body = r#"{"name": ["Too short"], "detail": "Invalid input"}"#;
        assert_eq!(normalize_error(StatusCode::BAD_REQUEST, Some(body)), "Invalid input");
    }

    #[test]
    fn test_field_errors_are_joined() {
        let body = r#"{"inn": ["This field is required."], "name": ["Too short"]}"#;
        let msg = normalize_error(StatusCode::BAD_REQUEST, Some(body));
        assert_eq!(msg, "inn: This field is required.; name: Too short");
    }

    #[test]
    fn test_bare_string_field_and_multiple_messages() {
        let body = r#"{"amount": "Must be positive", "date": ["Required", "Bad format"]}"#;
        let msg = normalize_error(StatusCode::BAD_REQUEST, Some(body));
        assert_eq!(msg, "amount: Must be positive; date: Required, Bad format");
    }

    #[test]
    fn test_degenerate_bodies_fall_back() {
        assert_eq!(normalize_error(StatusCode::NOT_FOUND, Some("{}")), "HTTP 404: Not Found");
        assert_eq!(normalize_error(StatusCode::NOT_FOUND, Some("null")), "HTTP 404: Not Found");
        assert_eq!(
            normalize_error(StatusCode::BAD_REQUEST, Some(r#"{"name": []}"#)),
            "HTTP 400: Bad Request"
        );
        assert_eq!(
            normalize_error(StatusCode::BAD_REQUEST, Some(r#"["first", "second"]"#)),
            "first, second"
        );
    }

    #[test]
    fn test_nested_field_errors() {
        let body = r#"{"items": [{"price": ["Required"]}]}"#;
        assert_eq!(normalize_error(StatusCode::BAD_REQUEST, Some(body)), "items: price: Required");
    }
}
