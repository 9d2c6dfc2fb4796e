//! Location-tagged mirror of a JSON document.

use serde_json::{Map, Number, Value};

use crate::pointer::JsonPointer;
use crate::types::json_type_name;

/// A JSON value paired with its JSON Pointer from the document root.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedNode {
    location: JsonPointer,
    content: Content,
}

#[derive(Debug, Clone, PartialEq)]
enum Content {
    Scalar(Value),
    Array(Vec<AnnotatedNode>),
    Object(Vec<(String, AnnotatedNode)>),
}

/// Annotate a whole document, rooted at `""`.
pub fn annotate(value: &Value) -> AnnotatedNode {
    annotate_at(value, JsonPointer::root())
}

/// Annotate `value` as if it lived at `location`.
pub fn annotate_at(value: &Value, location: JsonPointer) -> AnnotatedNode {
    let content = match value {
        Value::Array(items) => Content::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| annotate_at(item, location.push_index(i)))
                .collect(),
        ),
        Value::Object(map) => Content::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), annotate_at(item, location.push(key))))
                .collect(),
        ),
        scalar => Content::Scalar(scalar.clone()),
    };
    AnnotatedNode { location, content }
}

impl AnnotatedNode {
    pub fn location(&self) -> &JsonPointer {
        &self.location
    }

    /// Member `key` of an object node.
    pub fn get(&self, key: &str) -> Option<&AnnotatedNode> {
        match &self.content {
            Content::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn entries(&self) -> Option<&[(String, AnnotatedNode)]> {
        match &self.content {
            Content::Object(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&[AnnotatedNode]> {
        match &self.content {
            Content::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &self.content {
            Content::Scalar(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.content {
            Content::Scalar(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match &self.content {
            Content::Scalar(Value::Number(n)) => Some(n),
            _ => None,
        }
    }

    /// Non-negative integer payloads such as `minLength`; `2.0` is accepted.
    pub fn as_count(&self) -> Option<u64> {
        let n = self.as_number()?;
        if let Some(u) = n.as_u64() {
            return Some(u);
        }
        n.as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    }

    /// Name of this node's JSON type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match &self.content {
            Content::Scalar(value) => json_type_name(value),
            Content::Array(_) => "array",
            Content::Object(_) => "object",
        }
    }

    /// Rebuild the raw JSON value (used by `const` and `enum`).
    pub fn to_value(&self) -> Value {
        match &self.content {
            Content::Scalar(value) => value.clone(),
            Content::Array(items) => Value::Array(items.iter().map(|i| i.to_value()).collect()),
            Content::Object(entries) => {
                let mut map = Map::new();
                for (key, item) in entries {
                    map.insert(key.clone(), item.to_value());
                }
                Value::Object(map)
            }
        }
    }
}
