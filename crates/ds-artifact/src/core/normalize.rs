use serde_json::Value;

/// Turn an error response body into a single human-readable message.
///
/// Structured bodies are searched for `message`, then `error.message`,
/// then `error` as a string, then `code`. Non-JSON bodies use their
/// trimmed text. An empty body falls back to `HTTP <status>`.
pub fn normalize_error_body(status: u16, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body)
        && let Some(message) = message_from_json(&value)
    {
        return message;
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() || text.starts_with('{') {
        format!("HTTP {status}")
    } else {
        text.to_string()
    }
}

fn message_from_json(value: &Value) -> Option<String> {
    let non_empty = |v: &Value| {
        v.as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    value
        .get("message")
        .and_then(non_empty)
        .or_else(|| value.pointer("/error/message").and_then(non_empty))
        .or_else(|| value.get("error").and_then(non_empty))
        .or_else(|| value.get("code").and_then(non_empty))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_message() {
        let body = br#"{"code":"NotAuthorizedOrNotFound","message":"Authorization failed"}"#;
        assert_eq!(normalize_error_body(404, body), "Authorization failed");
    }

    #[test]
    fn nested_error_message() {
        let body = br#"{"error":{"message":"quota exceeded"}}"#;
        assert_eq!(normalize_error_body(429, body), "quota exceeded");
    }

    #[test]
    fn code_only() {
        let body = br#"{"code":"InternalError"}"#;
        assert_eq!(normalize_error_body(500, body), "InternalError");
    }

    #[test]
    fn plain_text() {
        assert_eq!(normalize_error_body(502, b"  Bad Gateway \n"), "Bad Gateway");
    }

    #[test]
    fn empty_or_unhelpful_json() {
        assert_eq!(normalize_error_body(500, b""), "HTTP 500");
        assert_eq!(normalize_error_body(500, br#"{"message":""}"#), "HTTP 500");
    }
}
