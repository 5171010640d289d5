//! Parameter-schema normalization for model-facing tool declarations.

use serde_json::Value;

/// Schema fields the model API accepts.
///
/// Everything else a provider attaches (vendor annotations, `$schema`,
/// `additionalProperties`, FastMCP metadata) is dropped before the schema
/// is declared to the model.
const ALLOWED_KEYS: [&str; 7] = [
    "type",
    "properties",
    "required",
    "description",
    "title",
    "default",
    "enum",
];

/// Strip a provider-supplied parameter schema down to the field subset the
/// model API accepts. Pure and idempotent; non-object values pass through
/// unchanged.
pub fn normalize(schema: &Value) -> Value {
    match schema.as_object() {
        Some(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| ALLOWED_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        None => schema.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_vendor_keys() {
        let raw = json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"],
            "additionalProperties": false,
            "$schema": "http://json-schema.org/draft-07/schema#",
            "x-vendor-hint": "internal"
        });
        let normalized = normalize(&raw);
        assert_eq!(
            normalized,
            json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            })
        );
    }

    #[test]
    fn output_keys_within_allowed_set() {
        let raw = json!({
            "title": "add_to_order",
            "description": "Add an item",
            "type": "object",
            "default": {},
            "enum": null,
            "extra": 1,
            "definitions": {}
        });
        let normalized = normalize(&raw);
        for key in normalized.as_object().unwrap().keys() {
            assert!(ALLOWED_KEYS.contains(&key.as_str()), "unexpected key {key}");
        }
    }

    #[test]
    fn idempotent() {
        let raw = json!({
            "type": "object",
            "properties": {"pdf_id": {"type": "string"}},
            "$defs": {"x": {}},
            "additionalProperties": true
        });
        let once = normalize(&raw);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn non_object_passes_through() {
        assert_eq!(normalize(&json!(null)), json!(null));
        assert_eq!(normalize(&json!(true)), json!(true));
        assert_eq!(normalize(&json!("object")), json!("object"));
    }
}
