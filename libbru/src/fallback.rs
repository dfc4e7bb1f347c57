//! Opaque fallback for blocks the line syntax cannot carry faithfully.
//!
//! A dictionary is embedded when it has a repeated name, a name that collides
//! with a reserved word, or a key or value the line syntax would misread
//! (`'''` lines, carriage returns, surrounding whitespace, quotes inside a
//! quoted key). An array is embedded when an item name contains a separator
//! or starts with `~`. Either is written as a tagged text block carrying
//! `encoding=toml`, one table per entry, in order, so nothing is merged or
//! dropped. Strings are always written as single-line basic strings, so no
//! payload line can be mistaken for an end marker.
//!
//! ```text
//! headers(encoding=toml)
//! [[entries]]
//! name = "x-id"
//! value = "1"
//! enabled = true
//!
//! [[entries]]
//! name = "x-id"
//! value = "2"
//! enabled = false
//! /headers
//! ```

use crate::ast::{ArrayItem, Body, Pair};
use crate::error::{Location, ParseError, Result};
use crate::lexer::MULTILINE_QUOTE;
use crate::writer::key_needs_quotes;
use std::collections::HashSet;
use toml_edit::{value, ArrayOfTables, DocumentMut, Item, Table};

/// Names that must not appear as plain dictionary keys.
pub const RESERVED_NAMES: &[&str] = &["disabled", "description", "enum"];

/// Header parameter marking an embedded block.
pub const ENCODING_PARAM: &str = "encoding";

/// Value of [`ENCODING_PARAM`] for the TOML embedding.
pub const TOML_ENCODING: &str = "toml";

const ENTRIES_KEY: &str = "entries";
const ITEMS_KEY: &str = "items";

/// Whether a dictionary has to be written through the fallback.
pub fn needs_fallback(pairs: &[Pair]) -> bool {
    let mut seen = HashSet::new();
    pairs.iter().any(|p| {
        RESERVED_NAMES.contains(&p.name.as_str())
            || !seen.insert(p.name.as_str())
            || unsafe_key(&p.name)
            || unsafe_value(&p.value)
    })
}

fn unsafe_key(key: &str) -> bool {
    key.contains(['\n', '\r']) || (key_needs_quotes(key) && key.contains('"'))
}

fn unsafe_value(value: &str) -> bool {
    if value.contains('\r') {
        return true;
    }
    if !value.contains('\n') && value.trim() != value {
        return true;
    }
    value.split('\n').any(|line| line.trim() == MULTILINE_QUOTE)
}

/// Whether an array has to be written through the fallback.
pub fn items_need_fallback(items: &[ArrayItem]) -> bool {
    items.iter().any(|item| {
        let name = item.name.as_str();
        name.is_empty()
            || name.trim() != name
            || name.starts_with('~')
            || name == "]"
            || name.contains([',', '\n', '\r'])
    })
}

/// A TOML basic string kept on one line. Control characters, including
/// newlines and DEL, are written as `\uXXXX` escapes.
fn one_line(s: &str) -> Item {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04X}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    match quoted.parse::<toml_edit::Value>() {
        Ok(mut v) => {
            v.decor_mut().clear();
            Item::Value(v)
        }
        Err(_) => value(s),
    }
}

fn render(key: &str, tables: Vec<Table>) -> String {
    let mut entries = ArrayOfTables::new();
    for table in tables {
        entries.push(table);
    }
    let mut doc = DocumentMut::new();
    doc[key] = Item::ArrayOfTables(entries);
    doc.to_string()
}

/// Encode dictionary entries as a TOML document.
pub fn encode_entries(pairs: &[Pair]) -> String {
    let tables = pairs
        .iter()
        .map(|pair| {
            let mut table = Table::new();
            table["name"] = one_line(&pair.name);
            table["value"] = one_line(&pair.value);
            table["enabled"] = value(pair.enabled);
            if pair.local {
                table["local"] = value(true);
            }
            table
        })
        .collect();
    render(ENTRIES_KEY, tables)
}

/// Encode array items as a TOML document.
pub fn encode_items(items: &[ArrayItem]) -> String {
    let tables = items
        .iter()
        .map(|item| {
            let mut table = Table::new();
            table["name"] = one_line(&item.name);
            table["enabled"] = value(item.enabled);
            table
        })
        .collect();
    render(ITEMS_KEY, tables)
}

/// Decode a payload written by [`encode_entries`] or [`encode_items`].
///
/// `location` points at the header of the embedding block.
pub fn decode_embedded(payload: &str, location: Location) -> Result<Body> {
    let invalid = |msg: String| ParseError::InvalidEmbedded(msg, location.clone());

    let doc: DocumentMut = payload
        .parse()
        .map_err(|e: toml_edit::TomlError| invalid(e.message().to_string()))?;

    let (key, item) = match (doc.get(ITEMS_KEY), doc.get(ENTRIES_KEY)) {
        (Some(item), None) => (ITEMS_KEY, item),
        (None, Some(item)) => (ENTRIES_KEY, item),
        (None, None) => return Ok(Body::Dictionary(Vec::new())),
        (Some(_), Some(_)) => {
            return Err(invalid("both \"items\" and \"entries\" present".to_string()))
        }
    };
    let tables = item
        .as_array_of_tables()
        .ok_or_else(|| invalid(format!("\"{}\" must be an array of tables", key)))?;

    let name_of = |index: usize, table: &Table| {
        table
            .get("name")
            .and_then(Item::as_str)
            .map(String::from)
            .ok_or_else(|| invalid(format!("entry {} has no name", index + 1)))
    };
    let enabled_of =
        |table: &Table| table.get("enabled").and_then(Item::as_bool).unwrap_or(true);

    if key == ITEMS_KEY {
        let mut items = Vec::with_capacity(tables.len());
        for (index, table) in tables.iter().enumerate() {
            items.push(ArrayItem::new(&name_of(index, table)?, enabled_of(table)));
        }
        return Ok(Body::Array(items));
    }

    let mut pairs = Vec::with_capacity(tables.len());
    for (index, table) in tables.iter().enumerate() {
        pairs.push(Pair {
            name: name_of(index, table)?,
            value: table
                .get("value")
                .and_then(Item::as_str)
                .unwrap_or_default()
                .to_string(),
            enabled: enabled_of(table),
            local: table.get("local").and_then(Item::as_bool).unwrap_or(false),
        });
    }
    Ok(Body::Dictionary(pairs))
}
