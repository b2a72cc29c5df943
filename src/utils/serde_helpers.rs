//! Serde helpers for SurrealDB record ids and partial-update payloads.

use serde::{Deserialize, Deserializer};

/// Accepts a SurrealDB record id (`coupon:⟨uuid⟩`, `coupon:abc`, or the
/// structured `{ tb, id }` form) and keeps only the key part, which is what
/// the API exposes as `id`.
pub mod record_key {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum IdValue {
            String(String),
            Thing {
                #[allow(dead_code)]
                tb: String,
                id: serde_json::Value,
            },
        }

        match IdValue::deserialize(deserializer)? {
            IdValue::String(s) => Ok(strip_table(&s)),
            IdValue::Thing { id, .. } => Ok(key_from_value(&id)),
        }
    }

    fn key_from_value(id: &serde_json::Value) -> String {
        match id {
            serde_json::Value::String(s) => unquote(s),
            serde_json::Value::Number(n) => n.to_string(),
            // Enum-tagged form, e.g. {"String": "abc"}
            serde_json::Value::Object(map) => map
                .get("String")
                .or_else(|| map.values().next())
                .map(key_from_value)
                .unwrap_or_default(),
            other => other.to_string(),
        }
    }

    fn strip_table(raw: &str) -> String {
        match raw.split_once(':') {
            Some((_, key)) => unquote(key),
            None => unquote(raw),
        }
    }

    fn unquote(key: &str) -> String {
        key.trim_start_matches('⟨')
            .trim_end_matches('⟩')
            .trim_matches('`')
            .to_string()
    }
}

/// Distinguishes a missing field (`None`) from an explicit `null`
/// (`Some(None)`). Use together with `#[serde(default)]`.
pub mod double_option {
    use super::*;

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
