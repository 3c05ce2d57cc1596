//! JSON Schema patching for Gemini function declarations
//!
//! Gemini accepts an OpenAPI subset: no `$ref`, no type unions, a short list
//! of `format` values, and every array needs an `items` schema. Schemas from
//! `schemars` and from MCP servers are rewritten into that subset.

use serde_json::{json, Map, Value};

/// Keys Gemini understands inside a schema node
const ALLOWED_KEYS: &[&str] = &[
    "type",
    "format",
    "description",
    "nullable",
    "enum",
    "properties",
    "required",
    "items",
    "minimum",
    "maximum",
    "minItems",
    "maxItems",
];

const ALLOWED_FORMATS: &[&str] = &["int32", "int64", "float", "double", "enum", "date-time"];

/// Nesting beyond this is replaced by a plain object (recursive `$ref`s)
const MAX_DEPTH: usize = 16;

/// Rewrite `schema` into the subset accepted by Gemini
pub fn for_gemini(schema: &Value) -> Value {
    let defs = definitions(schema);
    let mut out = sanitize(schema, &defs, 0);

    // Function parameters must be an object
    if out.get("type").and_then(Value::as_str) != Some("object") {
        out = json!({ "type": "object", "properties": {} });
    }
    out
}

fn definitions(schema: &Value) -> Map<String, Value> {
    let mut defs = Map::new();
    for key in ["$defs", "definitions"] {
        if let Some(Value::Object(map)) = schema.get(key) {
            defs.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    defs
}

fn resolve<'a>(reference: &str, defs: &'a Map<String, Value>) -> Option<&'a Value> {
    let name = reference
        .strip_prefix("#/$defs/")
        .or_else(|| reference.strip_prefix("#/definitions/"))?;
    defs.get(name)
}

fn sanitize(node: &Value, defs: &Map<String, Value>, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return json!({ "type": "object" });
    }

    let map = match node {
        Value::Object(map) => map,
        // `true` accepts anything; a string is the closest thing Gemini takes
        _ => return json!({ "type": "string" }),
    };

    if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
        let mut resolved = match resolve(reference, defs) {
            Some(target) => sanitize(target, defs, depth + 1),
            None => json!({ "type": "object" }),
        };
        if let (Some(description), Value::Object(out)) = (map.get("description"), &mut resolved) {
            out.insert("description".to_string(), description.clone());
        }
        return resolved;
    }

    for key in ["anyOf", "oneOf"] {
        if let Some(Value::Array(variants)) = map.get(key) {
            return collapse_union(map, variants, defs, depth);
        }
    }

    let mut out = Map::new();

    match map.get("type") {
        Some(Value::Array(types)) => {
            let concrete: Vec<&str> = types
                .iter()
                .filter_map(Value::as_str)
                .filter(|t| *t != "null")
                .collect();
            out.insert(
                "type".to_string(),
                json!(concrete.first().copied().unwrap_or("string")),
            );
            if concrete.len() < types.len() {
                out.insert("nullable".to_string(), json!(true));
            }
        }
        Some(Value::String(t)) => {
            out.insert("type".to_string(), json!(t));
        }
        _ => {}
    }

    if let Some(constant) = map.get("const") {
        out.insert("enum".to_string(), json!([constant]));
        out.entry("type".to_string()).or_insert(json!("string"));
    }

    for (key, value) in map {
        if !ALLOWED_KEYS.contains(&key.as_str()) || out.contains_key(key) {
            continue;
        }
        match key.as_str() {
            "format" => {
                if value.as_str().is_some_and(|f| ALLOWED_FORMATS.contains(&f)) {
                    out.insert(key.clone(), value.clone());
                }
            }
            "properties" => {
                if let Value::Object(props) = value {
                    let props: Map<String, Value> = props
                        .iter()
                        .map(|(name, prop)| (name.clone(), sanitize(prop, defs, depth + 1)))
                        .collect();
                    out.insert(key.clone(), Value::Object(props));
                }
            }
            "items" => {
                out.insert(key.clone(), sanitize(value, defs, depth + 1));
            }
            "enum" => {
                // Gemini only takes string enums
                let values: Vec<Value> = value
                    .as_array()
                    .map(|v| v.iter().filter(|e| !e.is_null()).cloned().collect())
                    .unwrap_or_default();
                if values.iter().all(Value::is_string) {
                    out.insert(key.clone(), Value::Array(values));
                    out.insert("type".to_string(), json!("string"));
                }
            }
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }

    if !out.contains_key("type") && out.contains_key("properties") {
        out.insert("type".to_string(), json!("object"));
    }

    if out.get("type").and_then(Value::as_str) == Some("array") && !out.contains_key("items") {
        out.insert("items".to_string(), json!({ "type": "string" }));
    }

    // `required` may only name declared properties
    if let Some(Value::Array(required)) = out.get("required").cloned() {
        let declared = out.get("properties").and_then(Value::as_object);
        let kept: Vec<Value> = required
            .into_iter()
            .filter(|name| {
                name.as_str()
                    .is_some_and(|n| declared.is_some_and(|p| p.contains_key(n)))
            })
            .collect();
        if kept.is_empty() {
            out.remove("required");
        } else {
            out.insert("required".to_string(), Value::Array(kept));
        }
    }

    if !out.contains_key("type") {
        out.insert("type".to_string(), json!("string"));
    }

    Value::Object(out)
}

fn collapse_union(
    parent: &Map<String, Value>,
    variants: &[Value],
    defs: &Map<String, Value>,
    depth: usize,
) -> Value {
    let is_null = |v: &Value| v.get("type").and_then(Value::as_str) == Some("null");
    let concrete: Vec<&Value> = variants.iter().filter(|v| !is_null(v)).collect();
    let nullable = concrete.len() < variants.len();

    let consts: Option<Vec<Value>> = concrete
        .iter()
        .map(|v| v.get("const").filter(|c| c.is_string()).cloned())
        .collect();

    let mut out = match (consts, concrete.first()) {
        (Some(values), _) if concrete.len() > 1 => json!({ "type": "string", "enum": values }),
        (_, Some(first)) => sanitize(first, defs, depth + 1),
        (_, None) => json!({ "type": "string" }),
    };

    if let Value::Object(map) = &mut out {
        if nullable {
            map.insert("nullable".to_string(), json!(true));
        }
        if let Some(description) = parent.get("description") {
            map.insert("description".to_string(), description.clone());
        }
    }
    out
}
