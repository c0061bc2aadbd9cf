//! Utility functions shared by notification channels.

use serde_json::Value;

/// Maximum length for failure detail stored alongside a dispatch outcome.
pub const MAX_DETAIL_LENGTH: usize = 4000;

/// Truncate a string to the specified maximum length.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated]", &s[..end])
    }
}

/// Redact sensitive fields from a JSON configuration.
///
/// Removes values for keys that commonly contain secrets: passwords,
/// tokens, secrets, API keys, and credentials. Nested objects and arrays
/// are redacted recursively.
pub fn redact_sensitive_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, val) in map {
                let key_lower = key.to_lowercase();
                let is_sensitive = key_lower.contains("password")
                    || key_lower.contains("passwd")
                    || key_lower.contains("pwd")
                    || key_lower.contains("token")
                    || key_lower.contains("secret")
                    || key_lower.contains("api_key")
                    || key_lower.contains("apikey")
                    || key_lower.contains("credentials");

                if is_sensitive {
                    redacted.insert(key.clone(), Value::String("***".to_string()));
                } else if val.is_object() || val.is_array() {
                    redacted.insert(key.clone(), redact_sensitive_json(val));
                } else {
                    redacted.insert(key.clone(), val.clone());
                }
            }
            Value::Object(redacted)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(redact_sensitive_json).collect()),
        _ => value.clone(),
    }
}
