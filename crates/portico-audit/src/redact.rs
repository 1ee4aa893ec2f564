//! Payload redaction.
//!
//! Strips sensitive fields from JSON payloads before they are persisted or
//! logged. Matching is on key *names* only; values are never inspected, so
//! a secret stored under an unconventional key name will pass through.
//! This covers the common case, it is not DLP.

use serde_json::{Map, Value};

/// Marker that replaces a sensitive field's value.
pub const REDACTED_MARKER: &str = "[REDACTED]";

/// Lowercased fragments matched case-insensitively as substrings of key
/// names. The list is a fixed enumeration; extending it is a code change.
pub const SENSITIVE_KEY_FRAGMENTS: &[&str] = &[
    "password",
    "passwordhash",
    "token",
    "accesstoken",
    "refreshtoken",
    "secret",
    "apikey",
    "ssn",
    "socialsecuritynumber",
    "creditcardnumber",
    "cvv",
];

/// Whether a key name matches one of the sensitive fragments.
pub fn is_sensitive_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    SENSITIVE_KEY_FRAGMENTS.iter().any(|f| lowered.contains(f))
}

/// Return a copy of `value` with every sensitive field's value replaced by
/// [`REDACTED_MARKER`], at any nesting depth. Non-object/array inputs pass
/// through unchanged; the function never fails and is idempotent.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(REDACTED_MARKER.to_string()));
                } else {
                    out.insert(key.clone(), redact(inner));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redacts_password_at_any_depth() {
        let input = json!({
            "email": "lender@example.com",
            "password": "hunter2",
            "profile": {
                "nested": { "password": "deep" },
                "name": "Alice"
            }
        });

        let out = redact(&input);
        assert_eq!(out["password"], REDACTED_MARKER);
        assert_eq!(out["profile"]["nested"]["password"], REDACTED_MARKER);
        // Non-sensitive siblings are untouched.
        assert_eq!(out["email"], "lender@example.com");
        assert_eq!(out["profile"]["name"], "Alice");
    }

    #[test]
    fn test_matching_is_case_insensitive_substring() {
        let input = json!({
            "PASSWORD": "x",
            "userApiKey": "x",
            "refreshTokenValue": "x",
            "creditCardNumber": "x",
            "my_cvv_code": "x"
        });

        let out = redact(&input);
        for key in ["PASSWORD", "userApiKey", "refreshTokenValue", "creditCardNumber", "my_cvv_code"] {
            assert_eq!(out[key], REDACTED_MARKER, "{key} should be redacted");
        }
    }

    #[test]
    fn test_recurses_into_arrays() {
        let input = json!([
            { "token": "a" },
            { "amount": 5, "children": [{ "ssn": "123-45-6789" }] }
        ]);

        let out = redact(&input);
        assert_eq!(out[0]["token"], REDACTED_MARKER);
        assert_eq!(out[1]["amount"], 5);
        assert_eq!(out[1]["children"][0]["ssn"], REDACTED_MARKER);
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(redact(&json!("password")), json!("password"));
        assert_eq!(redact(&json!(42)), json!(42));
        assert_eq!(redact(&json!(null)), json!(null));
        assert_eq!(redact(&json!(true)), json!(true));
    }

    #[test]
    fn test_redaction_is_idempotent() {
        let input = json!({
            "password": "hunter2",
            "items": [{ "apiKey": "k" }],
            "plain": "keep"
        });

        let once = redact(&input);
        let twice = redact(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unlisted_financial_keys_pass_through() {
        // The fragment list is a fixed enumeration; keys outside it are
        // not caught even when they look sensitive.
        let input = json!({ "bankAccountNumber": "12345", "bankName": "Chase" });

        let out = redact(&input);
        assert_eq!(out["bankAccountNumber"], "12345");
        assert_eq!(out["bankName"], "Chase");
    }

    #[test]
    fn test_key_names_are_preserved() {
        let input = json!({ "secret": "s", "other": 1 });
        let out = redact(&input);
        let obj = out.as_object().unwrap();
        assert!(obj.contains_key("secret"));
        assert!(obj.contains_key("other"));
        assert_eq!(obj.len(), 2);
    }
}
