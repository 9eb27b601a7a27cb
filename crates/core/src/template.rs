//! Template variable substitution for node configuration.
//!
//! Node configs may reference agency- and model-scoped variables with
//! `{{namespace.key}}` placeholders, e.g. `"a portrait of {{model.name}}"`.
//! Resolution is a pure recursive walk over the JSON tree; only string
//! values are rewritten. Unresolved placeholders pass through unchanged —
//! this silently masks typos, but matches what saved workflows rely on
//! (a literal `{{...}}` in output is visible and debuggable).

use std::collections::HashMap;

use serde_json::Value;

/// Replace `{{var}}` placeholders in every string of a JSON tree.
pub fn resolve(value: &Value, vars: &HashMap<String, String>) -> Value {
    match value {
        Value::String(s) => Value::String(resolve_str(s, vars)),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve(v, vars)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Replace `{{var}}` placeholders in a single string.
///
/// Placeholder names are trimmed, so `{{ model.name }}` and
/// `{{model.name}}` are equivalent. Unknown names are left verbatim.
pub fn resolve_str(input: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                match vars.get(name) {
                    Some(replacement) => out.push_str(replacement),
                    None => {
                        // Unknown variable: keep the placeholder as-is.
                        out.push_str(&rest[start..start + 2 + end + 2]);
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated opener: keep the remainder literally.
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}
