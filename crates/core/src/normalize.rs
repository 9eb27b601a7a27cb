//! Normalization of heterogeneous job-completion payloads.
//!
//! The self-hosted pools run a zoo of community workers whose completion
//! payloads disagree on shape. [`normalize`] reduces the observed shapes
//! to a canonical `{primary, all}` media result so executors never branch
//! on backend-specific payloads. An unrecognized shape yields the empty
//! result instead of an error; the caller turns that into a domain
//! "no media in output" failure.

use serde_json::Value;

/// Canonical media extracted from a completion payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedOutput {
    /// The first media item, if any.
    pub primary: Option<String>,
    /// Every media item found, in payload order.
    pub all: Vec<String>,
}

impl NormalizedOutput {
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Reduce a completion payload to canonical media references.
///
/// Shapes are tried in fixed precedence order:
/// 1. the payload itself is an array of media items;
/// 2. an `images` field holding such an array;
/// 3. a single `image` field (string or object);
/// 4. a `message` field holding one raw encoded blob.
///
/// Array items may be raw strings, `{"data": ...}` or `{"image": ...}`
/// objects. Bare encoded payloads without a scheme prefix are wrapped
/// into a `data:` URI.
pub fn normalize(payload: &Value) -> NormalizedOutput {
    let all = if let Some(items) = payload.as_array() {
        collect_items(items)
    } else if let Some(items) = payload.get("images").and_then(Value::as_array) {
        collect_items(items)
    } else if let Some(single) = payload.get("image").and_then(media_item) {
        vec![single]
    } else if let Some(message) = payload.get("message").and_then(Value::as_str) {
        if message.is_empty() {
            Vec::new()
        } else {
            vec![canonicalize(message)]
        }
    } else {
        Vec::new()
    };

    NormalizedOutput {
        primary: all.first().cloned(),
        all,
    }
}

fn collect_items(items: &[Value]) -> Vec<String> {
    items.iter().filter_map(media_item).collect()
}

/// Extract one media reference from an array element or single field.
fn media_item(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(canonicalize(s)),
        Value::Object(map) => map
            .get("data")
            .or_else(|| map.get("image"))
            .or_else(|| map.get("url"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(canonicalize),
        _ => None,
    }
}

/// Wrap a bare encoded payload into a canonical `data:` URI; pass
/// schemed references (http, https, data, s3) through unchanged.
fn canonicalize(raw: &str) -> String {
    let schemed = raw.starts_with("http://")
        || raw.starts_with("https://")
        || raw.starts_with("data:")
        || raw.starts_with("s3://");
    if schemed {
        raw.to_string()
    } else {
        format!("data:image/png;base64,{raw}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // One test per documented payload shape.

    #[test]
    fn array_of_raw_strings() {
        let payload = json!(["https://cdn.example/a.png", "https://cdn.example/b.png"]);
        let out = normalize(&payload);
        assert_eq!(out.primary.as_deref(), Some("https://cdn.example/a.png"));
        assert_eq!(out.all.len(), 2);
    }

    #[test]
    fn array_of_data_objects() {
        let payload = json!({"images": [{"data": "https://cdn.example/a.png"}]});
        let out = normalize(&payload);
        assert_eq!(out.primary.as_deref(), Some("https://cdn.example/a.png"));
    }

    #[test]
    fn array_of_image_objects() {
        let payload = json!({"images": [{"image": "iVBORw0KGgo="}]});
        let out = normalize(&payload);
        assert_eq!(
            out.primary.as_deref(),
            Some("data:image/png;base64,iVBORw0KGgo=")
        );
    }

    #[test]
    fn single_image_field_as_string() {
        let payload = json!({"image": "https://cdn.example/only.png"});
        let out = normalize(&payload);
        assert_eq!(out.all, vec!["https://cdn.example/only.png"]);
    }

    #[test]
    fn single_image_field_as_object() {
        let payload = json!({"image": {"url": "https://cdn.example/only.png"}});
        let out = normalize(&payload);
        assert_eq!(out.primary.as_deref(), Some("https://cdn.example/only.png"));
    }

    #[test]
    fn message_field_with_raw_media() {
        let payload = json!({"message": "iVBORw0KGgoAAAANS"});
        let out = normalize(&payload);
        assert_eq!(
            out.primary.as_deref(),
            Some("data:image/png;base64,iVBORw0KGgoAAAANS")
        );
    }

    // Precedence and edge cases.

    #[test]
    fn images_array_wins_over_message() {
        let payload = json!({
            "images": ["https://cdn.example/a.png"],
            "message": "ok"
        });
        let out = normalize(&payload);
        assert_eq!(out.all, vec!["https://cdn.example/a.png"]);
    }

    #[test]
    fn data_uri_not_double_wrapped() {
        let payload = json!(["data:image/jpeg;base64,/9j/4AAQ"]);
        let out = normalize(&payload);
        assert_eq!(out.primary.as_deref(), Some("data:image/jpeg;base64,/9j/4AAQ"));
    }

    #[test]
    fn unrecognized_shape_yields_empty_result() {
        for payload in [
            json!({"status": "done"}),
            json!(42),
            json!(null),
            json!({"message": ""}),
        ] {
            let out = normalize(&payload);
            assert!(out.is_empty(), "expected empty for {payload}");
            assert_eq!(out.primary, None);
        }
    }

    #[test]
    fn mixed_array_skips_unusable_items() {
        let payload = json!(["https://cdn.example/a.png", 7, {"other": true}]);
        let out = normalize(&payload);
        assert_eq!(out.all.len(), 1);
    }
}
