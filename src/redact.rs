//! Sensitive-field redaction for audit and log output.

use serde_json::Value;

/// Redact any object key matching (case-insensitively) one of
/// `sensitive_fields` to `"[redacted]"`, recursively.
#[must_use]
pub fn redact_value(value: &Value, sensitive_fields: &[String]) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                if is_sensitive_key(key, sensitive_fields) {
                    out.insert(key.clone(), Value::String("[redacted]".to_string()));
                } else {
                    out.insert(key.clone(), redact_value(val, sensitive_fields));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| redact_value(v, sensitive_fields)).collect())
        }
        other => other.clone(),
    }
}

fn is_sensitive_key(key: &str, sensitive_fields: &[String]) -> bool {
    let key_lower = key.to_ascii_lowercase();
    sensitive_fields
        .iter()
        .any(|f| key_lower.contains(&f.to_ascii_lowercase()))
}

/// Redact a free-form string value if its associated field name is
/// sensitive; otherwise return it unchanged.
#[must_use]
pub fn redact_field(field_name: &str, value: &str, sensitive_fields: &[String]) -> String {
    if is_sensitive_key(field_name, sensitive_fields) {
        "[redacted]".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Vec<String> {
        vec![
            "password".to_string(),
            "secret".to_string(),
            "token".to_string(),
            "api_key".to_string(),
        ]
    }

    #[test]
    fn redacts_top_level_sensitive_field() {
        let value = serde_json::json!({"username": "alice", "password": "hunter2"});
        let redacted = redact_value(&value, &fields());
        assert_eq!(redacted["username"], "alice");
        assert_eq!(redacted["password"], "[redacted]");
    }

    #[test]
    fn redacts_nested_sensitive_fields() {
        let value = serde_json::json!({"user": {"api_key": "abc", "name": "bob"}});
        let redacted = redact_value(&value, &fields());
        assert_eq!(redacted["user"]["api_key"], "[redacted]");
        assert_eq!(redacted["user"]["name"], "bob");
    }

    #[test]
    fn redacts_within_arrays() {
        let value = serde_json::json!([{"token": "xyz"}, {"token": "abc"}]);
        let redacted = redact_value(&value, &fields());
        assert_eq!(redacted[0]["token"], "[redacted]");
        assert_eq!(redacted[1]["token"], "[redacted]");
    }

    #[test]
    fn leaves_non_sensitive_values_untouched() {
        let value = serde_json::json!({"resource": "events", "action": "read"});
        let redacted = redact_value(&value, &fields());
        assert_eq!(redacted, value);
    }
}
