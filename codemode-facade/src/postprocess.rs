//! Turning tool output into the value a script receives.

use codemode_types::{ContentItem, ToolOutput};
use serde_json::{Map, Value, json};

/// The uniform shape of a bounded-context empty result.
#[must_use]
pub fn empty_result(reason: &str) -> Value {
    json!({
        "data": [],
        "content": [],
        "meta": { "reason": reason },
    })
}

/// Extract the script-facing value from a successful tool output.
///
/// Empty outcomes become [`empty_result`]. Otherwise structured content
/// wins; a single text item is parsed as JSON when it is JSON and kept as
/// a string when not; several items become an array.
#[must_use]
pub fn unwrap_output(output: &ToolOutput) -> Value {
    if let Some(empty) = &output.empty {
        return empty_result(&empty.reason);
    }
    if let Some(structured) = &output.structured_content {
        return structured.clone();
    }
    let mut items: Vec<Value> = output.content.iter().map(content_value).collect();
    match items.len() {
        0 => Value::Null,
        1 => items.remove(0),
        _ => Value::Array(items),
    }
}

fn content_value(item: &ContentItem) -> Value {
    match item {
        ContentItem::Text(text) => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
        }
        ContentItem::Image { media_type, data } => json!({
            "type": "image",
            "mediaType": media_type,
            "data": data,
        }),
    }
}

/// Cut a list payload down to the largest prefix whose serialized form fits
/// in `max_bytes`.
///
/// A list payload is a bare array or an object with a `data` array. Bare
/// arrays that need truncating are wrapped as `{data, meta}`. The result's
/// `meta` records `truncated`, `totalItems` and `returnedItems`. Payloads
/// that already fit, and anything that is not a list payload, are returned
/// unchanged.
#[must_use]
pub fn truncate_to_fit(value: Value, max_bytes: usize) -> Value {
    if serialized_len(&value) <= max_bytes {
        return value;
    }
    let (items, envelope) = match value {
        Value::Array(items) => (items, Map::new()),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => (items, map),
            Some(other) => {
                map.insert("data".to_string(), other);
                return Value::Object(map);
            }
            None => return Value::Object(map),
        },
        other => return other,
    };

    let total = items.len();
    let build = |returned: usize| {
        let mut out = envelope.clone();
        let mut meta = match out.remove("meta") {
            Some(Value::Object(meta)) => meta,
            _ => Map::new(),
        };
        meta.insert("truncated".to_string(), Value::Bool(true));
        meta.insert("totalItems".to_string(), json!(total));
        meta.insert("returnedItems".to_string(), json!(returned));
        out.insert("data".to_string(), Value::Array(items[..returned].to_vec()));
        out.insert("meta".to_string(), Value::Object(meta));
        Value::Object(out)
    };

    // Largest prefix that fits; serialized size grows with the prefix.
    let (mut low, mut high) = (0usize, total);
    while low < high {
        let mid = low + (high - low).div_ceil(2);
        if serialized_len(&build(mid)) <= max_bytes {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    tracing::debug!(total, returned = low, max_bytes, "list payload truncated");
    build(low)
}

/// Byte length of the compact JSON serialization.
#[must_use]
pub fn serialized_len(value: &Value) -> usize {
    serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(usize::MAX)
}
