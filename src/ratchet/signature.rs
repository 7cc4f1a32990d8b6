//! Engine signatures
//!
//! A signature is a SHA-256 over the canonical JSON of `{tool, mode,
//! engineOptions}`. Object keys are sorted and set-like option lists are
//! sorted and deduplicated, so formatting noise never registers as drift.
//! Ordered lists such as `pluginArgs` keep their order.

use super::manifest::ManifestRun;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Option keys whose list values are unordered sets.
const SET_LIKE_KEYS: &[&str] = &["include", "exclude"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSignature {
    pub tool: String,
    pub mode: String,
    #[serde(default)]
    pub engine_options: Value,
    pub hash: String,
}

impl EngineSignature {
    pub fn new(tool: &str, mode: &str, engine_options: &Value) -> Self {
        Self {
            tool: tool.to_string(),
            mode: mode.to_string(),
            engine_options: canonicalize(engine_options),
            hash: signature_hash(tool, mode, engine_options),
        }
    }

    /// Signature of the configuration a manifest run was produced with.
    pub fn of_run(run: &ManifestRun) -> Self {
        Self::new(&run.tool, &run.mode, &run.engine_options)
    }
}

/// Hash `{tool, mode, engineOptions}` after canonicalization, as lowercase hex.
pub fn signature_hash(tool: &str, mode: &str, engine_options: &Value) -> String {
    let payload = json!({
        "tool": tool,
        "mode": mode,
        "engineOptions": canonicalize(engine_options),
    });
    let mut text = String::new();
    write_canonical(&payload, &mut text);
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Canonical form of an options value: set-like lists sorted and deduplicated.
///
/// Key order is fixed at serialization time by [`write_canonical`].
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let v = canonicalize(v);
                    let v = if SET_LIKE_KEYS.contains(&key.as_str()) {
                        sort_set(v)
                    } else {
                        v
                    };
                    (key.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn sort_set(value: Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut keyed: Vec<(String, Value)> = items
                .into_iter()
                .map(|item| {
                    let mut text = String::new();
                    write_canonical(&item, &mut text);
                    (text, item)
                })
                .collect();
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            keyed.dedup_by(|a, b| a.0 == b.0);
            Value::Array(keyed.into_iter().map(|(_, item)| item).collect())
        }
        other => other,
    }
}

/// Compact JSON with object keys in sorted order regardless of map backing.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
