// src/snapshot/node.rs
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::consts::FALLBACK_ROLE;
use crate::error::PipelineError;

/// Node roles the outline formats specially; everything else is `Other`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Text,
    Heading,
    Link,
    Img,
    Other(String),
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "text" => Role::Text,
            "heading" => Role::Heading,
            "link" => Role::Link,
            "img" => Role::Img,
            "" => Role::Other(s!(FALLBACK_ROLE)),
            other => Role::Other(s!(other)),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Text => "text",
            Role::Heading => "heading",
            Role::Link => "link",
            Role::Img => "img",
            Role::Other(r) => r,
        }
    }
}

/// One `{name, value}` entry of a node's property list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Property {
    pub key: String,
    pub value: Option<String>,
}

impl Property {
    pub fn new(key: &str, value: &str) -> Self {
        Self { key: s!(key), value: Some(s!(value)) }
    }

    /// `url` and `href` are the only keys the outline reads.
    pub fn is_link_target(&self) -> bool {
        matches!(self.key.as_str(), "url" | "href")
    }
}

/// A captured accessibility node. Child order is page order and is kept.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Value")]
pub struct AccessibilityNode {
    pub role: Role,
    pub name: Option<String>,
    pub level: Option<i64>,
    pub children: Vec<AccessibilityNode>,
    /// Non-object entries of `children`. Not rendered, but they still make
    /// the node's line end in `:`.
    pub opaque_children: usize,
    pub properties: Vec<Property>,
}

impl AccessibilityNode {
    pub fn new(role: &str) -> Self {
        Self {
            role: Role::parse(role),
            name: None,
            level: None,
            children: Vec::new(),
            opaque_children: 0,
            properties: Vec::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(s!(name));
        self
    }

    pub fn level(mut self, level: i64) -> Self {
        self.level = Some(level);
        self
    }

    pub fn child(mut self, node: AccessibilityNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.properties.push(Property::new(key, value));
        self
    }

    pub fn has_link_target(&self) -> bool {
        self.properties.iter().any(Property::is_link_target)
    }

    /// Decode a JSON tree leniently. Only a non-object root is an error;
    /// non-list `children`/`properties` read as empty and non-object
    /// children are counted in `opaque_children` but not decoded.
    pub fn from_value(value: &Value) -> Result<Self, PipelineError> {
        match value {
            Value::Object(obj) => Ok(Self::from_object(obj)),
            other => Err(PipelineError::MalformedTree(format!(
                "expected an object at the tree root, found {}",
                kind_of(other)
            ))),
        }
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        let role = scalar_string(obj.get("role"))
            .map(|r| Role::parse(&r))
            .unwrap_or_else(|| Role::Other(s!(FALLBACK_ROLE)));

        let level = match obj.get("level") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };

        let (children, opaque_children) = match obj.get("children") {
            Some(Value::Array(items)) => {
                let children: Vec<Self> = items
                    .iter()
                    .filter_map(Value::as_object)
                    .map(Self::from_object)
                    .collect();
                let opaque = items.len() - children.len();
                (children, opaque)
            }
            _ => (Vec::new(), 0),
        };

        let properties = match obj.get("properties") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|p| {
                    let key = scalar_string(p.get("name"))?;
                    Some(Property { key, value: scalar_string(p.get("value")) })
                })
                .collect(),
            _ => Vec::new(),
        };

        Self {
            role,
            name: scalar_string(obj.get("name")),
            level,
            children,
            opaque_children,
            properties,
        }
    }
}

impl TryFrom<Value> for AccessibilityNode {
    type Error = PipelineError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}

/// Strings as-is, numbers and bools stringified, everything else absent.
fn scalar_string(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some(s!("True")),
        Value::Bool(false) => Some(s!("False")),
        _ => None,
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
