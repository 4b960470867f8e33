use serde_json::{json, Value};

use crate::errors::{Error, Result};

/// One of the two schema dialects a provider may contribute (spec §9,
/// REDESIGN FLAGS: "tagged variant `Schema = { JSONSchema | FieldList
/// }`"). Dispatch on the tag rather than inheritance.
#[derive(Debug, Clone)]
pub enum Schema {
    JsonSchema(Value),
    FieldList(Vec<FieldDescriptor>),
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub variable: String,
    pub field_type: String,
    pub default: Option<Value>,
    pub required: bool,
    pub pattern: Option<String>,
    pub allowed_values: Option<Vec<Value>>,
}

impl Schema {
    /// Parse a provider-contributed schema text. Accepts either dialect
    /// and never fails on empty text (an empty schema validates
    /// nothing and every path lookup returns `BadField`).
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Schema::JsonSchema(json!({ "type": "object", "properties": {} })));
        }
        let value: Value = serde_json::from_str(text)?;
        if value.is_array() {
            let fields = value
                .as_array()
                .unwrap()
                .iter()
                .map(FieldDescriptor::from_json)
                .collect::<Result<Vec<_>>>()?;
            Ok(Schema::FieldList(fields))
        } else {
            Ok(Schema::JsonSchema(value))
        }
    }

    /// Navigate a dotted path and validate `value` (a string, as all
    /// submitted values arrive as strings per spec §4.3) against the
    /// leaf type. Classifies errors per spec: unknown field ⇒
    /// `BadField`; type/pattern/constraint mismatch ⇒ `InvalidValue`.
    pub fn validate_path(&self, path: &str, value: &str) -> Result<()> {
        match self {
            Schema::JsonSchema(root) => Self::validate_json_schema_path(root, path, value),
            Schema::FieldList(fields) => Self::validate_field_list_path(fields, path, value),
        }
    }

    fn validate_json_schema_path(root: &Value, path: &str, value: &str) -> Result<()> {
        let mut node = root;
        let segments: Vec<&str> = path.split('.').collect();
        for (i, segment) in segments.iter().enumerate() {
            let properties = node.get("properties").ok_or_else(|| Error::BadField { field: path.into() })?;
            let next = properties.get(segment).ok_or_else(|| Error::BadField { field: path.into() })?;

            let is_leaf = i == segments.len() - 1;
            if is_leaf {
                return validate_leaf(next, path, value);
            }

            if next.get("type").and_then(Value::as_str) != Some("object") {
                return Err(Error::BadField { field: path.into() });
            }
            node = next;
        }
        Err(Error::BadField { field: path.into() })
    }

    fn validate_field_list_path(fields: &[FieldDescriptor], path: &str, value: &str) -> Result<()> {
        let field = fields
            .iter()
            .find(|f| f.variable == path)
            .ok_or_else(|| Error::BadField { field: path.into() })?;

        let leaf = field.as_json_schema_leaf();
        validate_leaf(&leaf, path, value)
    }

    /// The JSON-Schema `type` of the leaf node at `path`, used by the
    /// merge step to pick a YAML scalar representation (spec §4.3 step
    /// 4). Assumes `path` has already been validated.
    pub fn leaf_type(&self, path: &str) -> Option<String> {
        match self {
            Schema::JsonSchema(root) => {
                let mut node = root;
                let segments: Vec<&str> = path.split('.').collect();
                for (i, segment) in segments.iter().enumerate() {
                    let next = node.get("properties")?.get(segment)?;
                    if i == segments.len() - 1 {
                        return next.get("type").and_then(Value::as_str).map(str::to_string);
                    }
                    node = next;
                }
                None
            }
            Schema::FieldList(fields) => fields.iter().find(|f| f.variable == path).map(|f| f.field_type.clone()),
        }
    }
}

impl FieldDescriptor {
    fn from_json(value: &Value) -> Result<Self> {
        let variable = value
            .get("variable")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::BadRequest("field descriptor missing `variable`".into()))?
            .to_string();

        let field_type = value
            .get("type")
            .map(coerce_type_tag)
            .unwrap_or_else(|| "string".to_string());

        Ok(FieldDescriptor {
            variable,
            field_type,
            default: value.get("default").cloned(),
            required: value.get("required").and_then(Value::as_bool).unwrap_or(false),
            pattern: value.get("pattern").and_then(Value::as_str).map(str::to_string),
            allowed_values: value
                .get("allowed_values")
                .and_then(Value::as_array)
                .cloned(),
        })
    }

    /// Build the synthetic single-property JSON-Schema object the spec
    /// describes for the flat-field-descriptor dialect, so both
    /// dialects share one leaf validator.
    fn as_json_schema_leaf(&self) -> Value {
        let mut leaf = json!({ "type": self.field_type });
        if let Some(pattern) = &self.pattern {
            leaf["pattern"] = json!(pattern);
        }
        if let Some(allowed) = &self.allowed_values {
            leaf["enum"] = json!(allowed);
        }
        leaf
    }
}

/// Integer-coded or string-coded type tags (spec §4.3) normalised to
/// JSON-Schema type names.
fn coerce_type_tag(tag: &Value) -> String {
    if let Some(s) = tag.as_str() {
        return s.to_string();
    }
    match tag.as_i64() {
        Some(0) => "string".to_string(),
        Some(1) => "number".to_string(),
        Some(2) => "boolean".to_string(),
        Some(3) => "integer".to_string(),
        _ => "string".to_string(),
    }
}

/// Validate a single submitted string value against a leaf JSON-Schema
/// node, constructing the synthetic single-property object the spec
/// calls for (§4.3) and delegating to `jsonschema`.
fn validate_leaf(leaf: &Value, path: &str, value: &str) -> Result<()> {
    let coerced = coerce_value(leaf, value);

    let synthetic = json!({
        "type": "object",
        "properties": { "value": leaf },
        "required": ["value"],
    });

    let compiled = jsonschema::JSONSchema::compile(&synthetic).map_err(|e| Error::InvalidValue {
        field: path.into(),
        reason: format!("schema for `{path}` does not compile: {e}"),
    })?;

    let instance = json!({ "value": coerced });
    if let Err(mut errors) = compiled.validate(&instance) {
        let reason = errors
            .next()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "value does not match schema".into());
        return Err(Error::InvalidValue {
            field: path.into(),
            reason,
        });
    }
    Ok(())
}

/// Submitted values always arrive as strings (spec §4.3); coerce into
/// the JSON type the leaf schema declares before validating, so
/// `"9090"` against `type: number` is checked as a number, not a
/// string that merely looks like one.
fn coerce_value(leaf: &Value, value: &str) -> Value {
    match leaf.get("type").and_then(Value::as_str) {
        Some("number") => value.parse::<f64>().map(|n| json!(n)).unwrap_or_else(|_| json!(value)),
        Some("integer") => value.parse::<i64>().map(|n| json!(n)).unwrap_or_else(|_| json!(value)),
        Some("boolean") => value.parse::<bool>().map(|b| json!(b)).unwrap_or_else(|_| json!(value)),
        _ => json!(value),
    }
}

/// Merge a single dotted-path value into a mutable YAML document,
/// creating intermediate mappings and replacing non-mapping nodes
/// along the way (spec §4.3 step 4).
pub fn merge_path(doc: &mut serde_yaml::Value, path: &str, value: &str, leaf_type: Option<&str>) {
    let segments: Vec<&str> = path.split('.').collect();
    if !doc.is_mapping() {
        *doc = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
    }

    let mut node = doc;
    for segment in &segments[..segments.len() - 1] {
        let key = serde_yaml::Value::String(segment.to_string());
        let map = node.as_mapping_mut().expect("ensured mapping above");
        if !matches!(map.get(&key), Some(v) if v.is_mapping()) {
            map.insert(key.clone(), serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
        }
        node = map.get_mut(&key).unwrap();
    }

    let leaf_key = serde_yaml::Value::String((*segments.last().unwrap()).to_string());
    let scalar = scalarize(value, leaf_type);
    node.as_mapping_mut().expect("ensured mapping above").insert(leaf_key, scalar);
}

fn scalarize(value: &str, leaf_type: Option<&str>) -> serde_yaml::Value {
    match leaf_type {
        Some("number") => value
            .parse::<f64>()
            .map(serde_yaml::Value::from)
            .unwrap_or_else(|_| serde_yaml::Value::String(value.to_string())),
        Some("integer") => value
            .parse::<i64>()
            .map(serde_yaml::Value::from)
            .unwrap_or_else(|_| serde_yaml::Value::String(value.to_string())),
        Some("boolean") => value
            .parse::<bool>()
            .map(serde_yaml::Value::from)
            .unwrap_or_else(|_| serde_yaml::Value::String(value.to_string())),
        _ => serde_yaml::Value::String(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_schema_path_rejects_unknown_field() {
        let schema = Schema::parse(r#"{"properties": {"api": {"type": "object", "properties": {"port": {"type": "number"}}}}}"#).unwrap();
        let err = schema.validate_path("api.bogus", "1").unwrap_err();
        assert!(matches!(err, Error::BadField { .. }));
    }

    #[test]
    fn json_schema_path_rejects_type_mismatch() {
        let schema = Schema::parse(r#"{"properties": {"api": {"type": "object", "properties": {"port": {"type": "number"}}}}}"#).unwrap();
        let err = schema.validate_path("api.port", "not-a-number").unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
    }

    #[test]
    fn json_schema_path_accepts_valid_number_and_boolean() {
        let schema = Schema::parse(
            r#"{"properties": {"api": {"type": "object", "properties": {"port": {"type": "number"}, "enabled": {"type": "boolean"}}}}}"#,
        )
        .unwrap();
        schema.validate_path("api.port", "9090").unwrap();
        schema.validate_path("api.enabled", "true").unwrap();
    }

    #[test]
    fn pattern_constraint_accepts_and_rejects() {
        let schema = Schema::parse(r#"{"properties": {"timeout": {"type": "string", "pattern": "^[0-9]+(s|m|h)$"}}}"#).unwrap();
        schema.validate_path("timeout", "30s").unwrap();
        schema.validate_path("timeout", "5m").unwrap();
        assert!(schema.validate_path("timeout", "30sec").is_err());
        assert!(schema.validate_path("timeout", "30").is_err());
    }

    #[test]
    fn field_list_dialect_validates_like_json_schema() {
        let schema = Schema::parse(
            r#"[{"variable": "api.port", "type": "number", "required": true}]"#,
        )
        .unwrap();
        schema.validate_path("api.port", "9090").unwrap();
        assert!(schema.validate_path("api.port", "nope").is_err());
        assert!(matches!(
            schema.validate_path("api.unknown", "x").unwrap_err(),
            Error::BadField { .. }
        ));
    }

    #[test]
    fn merge_path_creates_nested_structure() {
        let mut doc = serde_yaml::Value::Null;
        merge_path(&mut doc, "api.port", "9090", Some("number"));
        merge_path(&mut doc, "api.enabled", "true", Some("boolean"));
        let text = serde_yaml::to_string(&doc).unwrap();
        assert!(text.contains("port: 9090"));
        assert!(text.contains("enabled: true"));
    }
}
