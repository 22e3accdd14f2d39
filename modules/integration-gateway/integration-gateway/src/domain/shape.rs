use serde::Deserialize;
use serde_json::Value;

/// Structural expectation for an operation's response body.
///
/// A 2xx response that does not match is treated as "wrong endpoint",
/// not as success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ResponseShape {
    /// Any parseable JSON document.
    #[default]
    AnyJson,
    /// The value at `pointer` must be an array.
    Array {
        #[serde(default)]
        pointer: String,
    },
    /// The value at `pointer` must be an object containing every `required` key.
    Object {
        #[serde(default)]
        pointer: String,
        #[serde(default)]
        required: Vec<String>,
    },
}

impl ResponseShape {
    #[must_use]
    pub fn pointer(&self) -> Option<&str> {
        match self {
            Self::AnyJson => None,
            Self::Array { pointer } | Self::Object { pointer, .. } => Some(pointer),
        }
    }

    /// Returns the value at the shape's pointer if the document matches.
    ///
    /// # Errors
    ///
    /// A human-readable reason when it does not.
    pub fn extract(&self, body: Value) -> Result<Value, String> {
        match self {
            Self::AnyJson => Ok(body),
            Self::Array { pointer } => match take_pointer(body, pointer)? {
                v @ Value::Array(_) => Ok(v),
                other => Err(format!(
                    "expected array at '{pointer}', found {}",
                    type_name(&other)
                )),
            },
            Self::Object { pointer, required } => match take_pointer(body, pointer)? {
                Value::Object(map) => {
                    if let Some(missing) = required.iter().find(|k| !map.contains_key(k.as_str()))
                    {
                        return Err(format!("object at '{pointer}' lacks '{missing}'"));
                    }
                    Ok(Value::Object(map))
                }
                other => Err(format!(
                    "expected object at '{pointer}', found {}",
                    type_name(&other)
                )),
            },
        }
    }
}

fn take_pointer(mut body: Value, pointer: &str) -> Result<Value, String> {
    body.pointer_mut(pointer)
        .map(Value::take)
        .ok_or_else(|| format!("no value at '{pointer}'"))
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_shape_extracts_nested_list() {
        let shape = ResponseShape::Array {
            pointer: "/data".to_owned(),
        };
        let v = shape.extract(json!({ "data": [1, 2] })).unwrap();
        assert_eq!(v, json!([1, 2]));
    }

    #[test]
    fn array_shape_rejects_object() {
        let shape = ResponseShape::Array {
            pointer: String::new(),
        };
        let err = shape.extract(json!({ "error": "not here" })).unwrap_err();
        assert_eq!(err, "expected array at '', found object");
    }

    #[test]
    fn missing_pointer_is_reported() {
        let shape = ResponseShape::Array {
            pointer: "/jobs".to_owned(),
        };
        assert_eq!(
            shape.extract(json!({ "items": [] })).unwrap_err(),
            "no value at '/jobs'"
        );
    }

    #[test]
    fn object_shape_checks_required_keys() {
        let shape = ResponseShape::Object {
            pointer: String::new(),
            required: vec!["version".to_owned(), "name".to_owned()],
        };
        assert!(shape.extract(json!({ "version": "9.6", "name": "dir" })).is_ok());
        assert_eq!(
            shape.extract(json!({ "version": "9.6" })).unwrap_err(),
            "object at '' lacks 'name'"
        );
    }

    #[test]
    fn deserializes_from_tagged_form() {
        let shape: ResponseShape =
            serde_json::from_value(json!({ "type": "array", "pointer": "/result" })).unwrap();
        assert_eq!(shape.pointer(), Some("/result"));
        let any: ResponseShape = serde_json::from_value(json!({ "type": "any_json" })).unwrap();
        assert_eq!(any, ResponseShape::AnyJson);
    }
}
