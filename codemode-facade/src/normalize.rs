//! Alias and shorthand normalization.
//!
//! Both passes are deterministic and idempotent: arguments already in
//! canonical form pass through unchanged.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

/// Rewrite alias keys to their canonical names.
///
/// When both an alias and its canonical key are present the canonical value
/// is kept and the alias is dropped. Non-object arguments are returned as-is.
#[must_use]
pub fn apply_aliases(args: Value, aliases: &BTreeMap<String, String>) -> Value {
    let Value::Object(mut map) = args else {
        return args;
    };
    for (alias, canonical) in aliases {
        if let Some(value) = map.remove(alias) {
            map.entry(canonical.clone()).or_insert(value);
        }
    }
    Value::Object(map)
}

/// Rewrite `query.fields` and `query.filters` shorthand to canonical form.
#[must_use]
pub fn apply_query_shorthand(mut args: Value) -> Value {
    if let Some(query) = args.get_mut("query").and_then(Value::as_object_mut) {
        if let Some(Value::Array(fields)) = query.get_mut("fields") {
            for field in fields.iter_mut() {
                *field = normalize_field(field.take());
            }
        }
        if let Some(Value::Array(filters)) = query.get_mut("filters") {
            for filter in filters.iter_mut() {
                *filter = normalize_filter(filter.take());
            }
        }
    }
    args
}

/// `"Region"` → `{fieldCaption: "Region"}`;
/// `{name, aggregation}` → `{fieldCaption, function: UPPER}`.
pub(crate) fn normalize_field(field: Value) -> Value {
    match field {
        Value::String(caption) => json!({ "fieldCaption": caption }),
        Value::Object(mut map) => {
            if !map.contains_key("fieldCaption")
                && let Some(name) = map.remove("name")
            {
                map.insert("fieldCaption".to_string(), name);
            }
            if !map.contains_key("function")
                && let Some(Value::String(aggregation)) = map.get("aggregation")
            {
                let function = aggregation.trim().to_uppercase();
                map.remove("aggregation");
                map.insert("function".to_string(), Value::String(function));
            }
            Value::Object(map)
        }
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    AtLeast,
    AtMost,
    Between,
}

impl Operator {
    fn parse(raw: &str) -> Option<Self> {
        Some(match raw.trim().to_uppercase().as_str() {
            "EQUALS" | "EQ" | "=" | "==" => Self::Equals,
            "NOT_EQUALS" | "NE" | "!=" | "<>" => Self::NotEquals,
            "IN" => Self::In,
            "NOT_IN" => Self::NotIn,
            "GREATER_THAN" | "GREATER_THAN_OR_EQUAL" | "GT" | "GTE" | ">" | ">=" => Self::AtLeast,
            "LESS_THAN" | "LESS_THAN_OR_EQUAL" | "LT" | "LTE" | "<" | "<=" => Self::AtMost,
            "BETWEEN" => Self::Between,
            _ => return None,
        })
    }
}

/// `{field, operator, value}` → a canonical `SET` or
/// `QUANTITATIVE_NUMERICAL` filter. Anything unrecognized is left alone.
pub(crate) fn normalize_filter(filter: Value) -> Value {
    match filter {
        Value::Object(map) => match rewrite_filter(&map) {
            Some(rewritten) => Value::Object(rewritten),
            None => Value::Object(map),
        },
        other => other,
    }
}

fn rewrite_filter(map: &Map<String, Value>) -> Option<Map<String, Value>> {
    if map.contains_key("filterType") {
        return None;
    }
    let operator = map.get("operator").and_then(Value::as_str).and_then(Operator::parse)?;
    let field = match map.get("field")? {
        Value::String(caption) => json!({ "fieldCaption": caption }),
        object @ Value::Object(_) => object.clone(),
        _ => return None,
    };
    let Value::Object(canonical) = canonical_filter(operator, map.get("value")?)? else {
        return None;
    };

    let mut out = Map::new();
    out.insert("field".to_string(), field);
    for (key, extra) in map {
        if !matches!(key.as_str(), "field" | "operator" | "value") {
            out.insert(key.clone(), extra.clone());
        }
    }
    out.extend(canonical);
    Some(out)
}

fn canonical_filter(operator: Operator, value: &Value) -> Option<Value> {
    let set_values = || match value {
        Value::Array(values) => values.clone(),
        single => vec![single.clone()],
    };
    Some(match operator {
        Operator::Equals | Operator::In => json!({
            "filterType": "SET",
            "values": set_values(),
        }),
        Operator::NotEquals | Operator::NotIn => json!({
            "filterType": "SET",
            "values": set_values(),
            "exclude": true,
        }),
        Operator::AtLeast if value.is_number() => json!({
            "filterType": "QUANTITATIVE_NUMERICAL",
            "quantitativeFilterType": "MIN",
            "min": value,
        }),
        Operator::AtMost if value.is_number() => json!({
            "filterType": "QUANTITATIVE_NUMERICAL",
            "quantitativeFilterType": "MAX",
            "max": value,
        }),
        Operator::Between => match value.as_array().map(Vec::as_slice) {
            Some([min, max]) if min.is_number() && max.is_number() => json!({
                "filterType": "QUANTITATIVE_NUMERICAL",
                "quantitativeFilterType": "RANGE",
                "min": min,
                "max": max,
            }),
            _ => return None,
        },
        Operator::AtLeast | Operator::AtMost => return None,
    })
}
