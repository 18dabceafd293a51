//! Alias tables and illustrative examples derived from tool schemas.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::operation::OperationExample;

/// The canonical datasource identifier argument.
pub const DATASOURCE_KEY: &str = "datasourceLuid";

/// Spellings agents commonly use for [`DATASOURCE_KEY`].
pub const DATASOURCE_ALIASES: [&str; 4] =
    ["datasourceId", "dataSourceLuid", "datasource_luid", "luid"];

/// Example with only the required arguments filled in.
pub const MINIMAL_EXAMPLE: &str = "minimal";
/// Example using `{name, aggregation}` fields.
pub const FIELD_SHORTHAND_EXAMPLE: &str = "field-shorthand";
/// Example using `{field, operator, value}` filters.
pub const FILTER_SHORTHAND_EXAMPLE: &str = "filter-shorthand";

const MAX_REF_HOPS: usize = 16;
const MAX_EXAMPLE_DEPTH: usize = 8;

/// Which structured-query sections a schema's `query` property declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryShape {
    /// `query.fields` is declared.
    pub fields: bool,
    /// `query.filters` is declared.
    pub filters: bool,
}

/// The alias table for a tool schema.
///
/// Only schemas declaring [`DATASOURCE_KEY`] get aliases, and an alias that
/// is itself a declared property is never attached.
#[must_use]
pub fn aliases_for(schema: &Value) -> BTreeMap<String, String> {
    let Some(properties) = properties(schema, schema) else {
        return BTreeMap::new();
    };
    if !properties.contains_key(DATASOURCE_KEY) {
        return BTreeMap::new();
    }
    DATASOURCE_ALIASES
        .iter()
        .filter(|alias| !properties.contains_key(**alias))
        .map(|alias| ((*alias).to_string(), DATASOURCE_KEY.to_string()))
        .collect()
}

/// The query sections the schema declares, if it has a `query` object.
#[must_use]
pub fn query_shape(schema: &Value) -> Option<QueryShape> {
    let query = properties(schema, schema)?.get("query")?;
    let query_props = properties(schema, query)?;
    let shape = QueryShape {
        fields: query_props.contains_key("fields"),
        filters: query_props.contains_key("filters"),
    };
    (shape.fields || shape.filters).then_some(shape)
}

/// Examples for a tool schema: always a minimal payload, plus shorthand
/// variants for query-shaped schemas.
#[must_use]
pub fn examples_for(schema: &Value) -> Vec<OperationExample> {
    let minimal = minimal_example(schema);
    let mut examples = vec![OperationExample {
        name: MINIMAL_EXAMPLE.to_string(),
        args: minimal.clone(),
    }];

    let Some(shape) = query_shape(schema) else {
        return examples;
    };
    let base = match minimal {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let with_query = |query: Value| {
        let mut args = base.clone();
        args.insert("query".to_string(), query);
        Value::Object(args)
    };

    if shape.fields {
        examples.push(OperationExample {
            name: FIELD_SHORTHAND_EXAMPLE.to_string(),
            args: with_query(json!({
                "fields": [
                    {"name": "Region"},
                    {"name": "Sales", "aggregation": "sum"}
                ]
            })),
        });
    }
    if shape.filters {
        let mut query = json!({
            "filters": [
                {"field": "Region", "operator": "EQUALS", "value": "West"},
                {"field": "Sales", "operator": "GREATER_THAN", "value": 400}
            ]
        });
        if shape.fields {
            query["fields"] = json!(["Region", {"name": "Sales", "aggregation": "sum"}]);
        }
        examples.push(OperationExample {
            name: FILTER_SHORTHAND_EXAMPLE.to_string(),
            args: with_query(query),
        });
    }
    examples
}

/// A small argument object that satisfies the schema's required properties.
#[must_use]
pub fn minimal_example(schema: &Value) -> Value {
    example_value(schema, schema, "value", 0)
}

fn example_value(root: &Value, schema: &Value, name: &str, depth: usize) -> Value {
    let schema = resolve(root, schema);
    let Some(obj) = schema.as_object() else {
        return json!(format!("<{name}>"));
    };
    if depth > MAX_EXAMPLE_DEPTH {
        return Value::Null;
    }
    if let Some(default) = obj.get("default") {
        return default.clone();
    }
    if let Some(Value::Array(examples)) = obj.get("examples")
        && let Some(first) = examples.first()
    {
        return first.clone();
    }
    if let Some(constant) = obj.get("const") {
        return constant.clone();
    }
    if let Some(Value::Array(values)) = obj.get("enum")
        && let Some(first) = values.first()
    {
        return first.clone();
    }
    for keyword in ["anyOf", "oneOf"] {
        if let Some(Value::Array(branches)) = obj.get(keyword)
            && let Some(first) = branches
                .iter()
                .find(|b| resolve(root, b).get("type") != Some(&json!("null")))
        {
            return example_value(root, first, name, depth + 1);
        }
    }

    let ty = match obj.get("type") {
        Some(Value::String(ty)) => ty.as_str(),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|ty| *ty != "null")
            .unwrap_or("null"),
        _ if obj.contains_key("properties") => "object",
        _ => "string",
    };
    match ty {
        "object" => {
            let mut out = Map::new();
            let required = obj
                .get("required")
                .and_then(Value::as_array)
                .map(|r| r.iter().filter_map(Value::as_str).collect::<Vec<_>>())
                .unwrap_or_default();
            let props = obj.get("properties").and_then(Value::as_object);
            for key in required {
                let value = props
                    .and_then(|p| p.get(key))
                    .map(|prop| example_value(root, prop, key, depth + 1))
                    .unwrap_or_else(|| json!(format!("<{key}>")));
                out.insert(key.to_string(), value);
            }
            Value::Object(out)
        }
        "array" => match obj.get("items") {
            Some(items) => json!([example_value(root, items, name, depth + 1)]),
            None => json!([]),
        },
        "integer" | "number" => {
            let min = obj.get("minimum").and_then(Value::as_f64).unwrap_or(1.0).max(1.0);
            json!(min as i64)
        }
        "boolean" => json!(false),
        "null" => Value::Null,
        _ => json!(format!("<{name}>")),
    }
}

/// Follow local `$ref`s until a non-reference schema is reached.
#[must_use]
pub fn resolve<'a>(root: &'a Value, mut schema: &'a Value) -> &'a Value {
    for _ in 0..MAX_REF_HOPS {
        let Some(reference) = schema.get("$ref").and_then(Value::as_str) else {
            break;
        };
        let target = match reference.strip_prefix('#') {
            Some("") => Some(root),
            Some(pointer) => root.pointer(pointer),
            None => None,
        };
        match target {
            Some(target) => schema = target,
            None => break,
        }
    }
    schema
}

/// The `properties` map of `schema`, following references.
#[must_use]
pub fn properties<'a>(root: &'a Value, schema: &'a Value) -> Option<&'a Map<String, Value>> {
    resolve(root, schema).get("properties")?.as_object()
}
