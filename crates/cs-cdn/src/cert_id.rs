use serde_json::Value;

const CERT_ID_KEY: &str = "certID";

/// Extract the certificate id from an upload response body.
///
/// A well-formed JSON object is decoded properly. Anything else goes through
/// [`scan_certificate_id`], which accepts truncated or otherwise malformed
/// payloads as long as the key and a value are present.
pub fn parse_certificate_id(body: &str) -> Option<String> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get(CERT_ID_KEY) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        },
        _ => scan_certificate_id(body),
    }
}

/// Best-effort substring scan for `"certID": <value>`.
///
/// The value is either a quoted string or the raw token up to the next `,`,
/// `}` or newline.
fn scan_certificate_id(body: &str) -> Option<String> {
    let key = format!("\"{}\"", CERT_ID_KEY);
    let after_key = &body[body.find(&key)? + key.len()..];
    let rest = after_key[after_key.find(':')? + 1..].trim();

    if let Some(quoted) = rest.strip_prefix('"') {
        if let Some(end) = quoted.find('"') {
            if end > 0 {
                return Some(quoted[..end].to_string());
            }
        }
    }

    let token = match rest.find([',', '}', '\n']) {
        Some(end) => rest[..end].trim(),
        None => rest,
    };
    let token = token.trim_matches('"').trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_string_and_number() {
        assert_eq!(
            parse_certificate_id(r#"{"certID":"5f1e2d","extra":true}"#).as_deref(),
            Some("5f1e2d")
        );
        assert_eq!(
            parse_certificate_id(r#"{"certID": 12345}"#).as_deref(),
            Some("12345")
        );
    }

    #[test]
    fn test_structured_without_key() {
        assert_eq!(parse_certificate_id(r#"{"code":200}"#), None);
        assert_eq!(parse_certificate_id(r#"{"certID":""}"#), None);
    }

    #[test]
    fn test_tolerates_malformed_json() {
        // trailing garbage after a quoted value
        assert_eq!(
            parse_certificate_id("{\"certID\" : \"abc123\", oops").as_deref(),
            Some("abc123")
        );
        // unquoted token cut at the next delimiter
        assert_eq!(
            parse_certificate_id("{\"certID\": abc-9 }garbage").as_deref(),
            Some("abc-9")
        );
        assert_eq!(
            parse_certificate_id("prefix \"certID\":xyz\nmore").as_deref(),
            Some("xyz")
        );
        // runs to end of input without a delimiter
        assert_eq!(
            parse_certificate_id("\"certID\": tail").as_deref(),
            Some("tail")
        );
    }

    #[test]
    fn test_scan_failures() {
        assert_eq!(parse_certificate_id("not json at all"), None);
        assert_eq!(parse_certificate_id("\"certID\" without colon"), None);
        assert_eq!(parse_certificate_id(""), None);
    }
}
