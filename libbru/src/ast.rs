//! Bru block tree.
//!
//! A document is a flat, ordered list of blocks. Every block has a name, an
//! optional `:qualifier`, optional `(key=value)` parameters and one of three
//! body shapes.

use serde::{Deserialize, Serialize};

/// Root of a parsed Bru file: blocks in source order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    pub blocks: Vec<Block>,
}

impl Ast {
    /// First block with the given name and qualifier.
    pub fn find(&self, name: &str, qualifier: Option<&str>) -> Option<&Block> {
        self.blocks
            .iter()
            .find(|b| b.name == name && b.qualifier.as_deref() == qualifier)
    }

    /// Number of blocks called `name`, regardless of qualifier.
    pub fn count(&self, name: &str) -> usize {
        self.blocks.iter().filter(|b| b.name == name).count()
    }
}

/// A named, delimited section of a Bru file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    pub body: Body,
}

impl Block {
    /// Dictionary block `name[:qualifier] { ... }`.
    pub fn dictionary(name: &str, qualifier: Option<&str>, pairs: Vec<Pair>) -> Self {
        Self {
            name: name.to_string(),
            qualifier: qualifier.map(String::from),
            params: Vec::new(),
            body: Body::Dictionary(pairs),
        }
    }

    /// Tagged text block `name(params)` ... `/name`.
    pub fn text(name: &str, params: Vec<Param>, payload: &str) -> Self {
        Self {
            name: name.to_string(),
            qualifier: None,
            params,
            body: Body::Text(payload.to_string()),
        }
    }

    /// Array block `name:qualifier [ ... ]`.
    pub fn array(name: &str, qualifier: Option<&str>, items: Vec<ArrayItem>) -> Self {
        Self {
            name: name.to_string(),
            qualifier: qualifier.map(String::from),
            params: Vec::new(),
            body: Body::Array(items),
        }
    }

    /// `name` or `name:qualifier`, which is also what end markers repeat.
    pub fn full_name(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{}:{}", self.name, q),
            None => self.name.clone(),
        }
    }

    /// Value of a header parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }
}

/// A `key=value` header parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub key: String,
    pub value: String,
}

impl Param {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Body of a block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum Body {
    /// Ordered `name: value` lines.
    Dictionary(Vec<Pair>),
    /// Verbatim text between the header and the end marker.
    Text(String),
    /// Ordered names, no values.
    Array(Vec<ArrayItem>),
}

impl Body {
    /// Returns the entries if this is a `Dictionary`.
    pub fn as_dictionary(&self) -> Option<&[Pair]> {
        match self {
            Body::Dictionary(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Returns the payload if this is a `Text` block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the items if this is an `Array`.
    pub fn as_array(&self) -> Option<&[ArrayItem]> {
        match self {
            Body::Array(items) => Some(items),
            _ => None,
        }
    }
}

fn enabled_default() -> bool {
    true
}

fn is_true(b: &bool) -> bool {
    *b
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// One dictionary line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub name: String,
    pub value: String,
    /// `false` when the line carries the `~` prefix.
    #[serde(default = "enabled_default", skip_serializing_if = "is_true")]
    pub enabled: bool,
    /// `true` when the line carries the `@` prefix.
    #[serde(default, skip_serializing_if = "is_false")]
    pub local: bool,
}

impl Pair {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            enabled: true,
            local: false,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }
}

/// One array block entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayItem {
    pub name: String,
    #[serde(default = "enabled_default", skip_serializing_if = "is_true")]
    pub enabled: bool,
}

impl ArrayItem {
    pub fn new(name: &str, enabled: bool) -> Self {
        Self {
            name: name.to_string(),
            enabled,
        }
    }
}

/// Lookup helpers over dictionary entries.
pub trait PairsExt {
    /// Value of the first entry named `name`.
    fn value_of(&self, name: &str) -> Option<&str>;
}

impl PairsExt for [Pair] {
    fn value_of(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}
