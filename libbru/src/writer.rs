//! Write a block tree back to Bru text.
//!
//! Output is canonical: two-space indentation inside dictionaries and
//! arrays, one blank line between blocks, exactly one trailing newline. An
//! array block directly following a dictionary of the same name (`vars` then
//! `vars:secret`) is attached to it without a blank line.

use crate::ast::{ArrayItem, Ast, Block, Body, Pair, Param};
use crate::fallback::{
    encode_entries, encode_items, items_need_fallback, needs_fallback, ENCODING_PARAM,
    TOML_ENCODING,
};
use crate::lexer::MULTILINE_QUOTE;

/// Render a block tree.
pub fn write_ast(ast: &Ast) -> String {
    let mut out = String::new();
    let mut previous: Option<&Block> = None;

    for block in &ast.blocks {
        if let Some(prev) = previous {
            if !is_attached(prev, block) {
                out.push('\n');
            }
        }
        out.push_str(&write_block(block));
        previous = Some(block);
    }
    out
}

fn is_attached(prev: &Block, block: &Block) -> bool {
    matches!(block.body, Body::Array(_))
        && matches!(prev.body, Body::Dictionary(_))
        && prev.name == block.name
}

/// Render one block, ending with a newline.
pub fn write_block(block: &Block) -> String {
    match &block.body {
        Body::Dictionary(pairs) if needs_fallback(pairs) => {
            write_embedded(block, &encode_entries(pairs))
        }
        Body::Dictionary(pairs) => write_dictionary(block, pairs),
        Body::Text(payload) => write_tagged(&block.full_name(), &block.params, payload),
        Body::Array(items) if items_need_fallback(items) => {
            write_embedded(block, &encode_items(items))
        }
        Body::Array(items) => write_array(block, items),
    }
}

fn write_embedded(block: &Block, payload: &str) -> String {
    let mut params = block.params.clone();
    params.push(Param::new(ENCODING_PARAM, TOML_ENCODING));
    write_tagged(&block.full_name(), &params, payload)
}

fn write_header(full_name: &str, params: &[Param]) -> String {
    if params.is_empty() {
        return full_name.to_string();
    }
    let items: Vec<String> = params
        .iter()
        .map(|p| format!("{}={}", p.key, p.value))
        .collect();
    format!("{}({})", full_name, items.join(", "))
}

// =============================================================================
// Dictionary
// =============================================================================

fn write_dictionary(block: &Block, pairs: &[Pair]) -> String {
    let mut out = format!("{} {{\n", write_header(&block.full_name(), &block.params));
    for pair in pairs {
        out.push_str(&write_pair(pair));
    }
    out.push_str("}\n");
    out
}

fn write_pair(pair: &Pair) -> String {
    let mut line = String::from("  ");
    if !pair.enabled {
        line.push('~');
    }
    if pair.local {
        line.push('@');
    }
    line.push_str(&write_key(&pair.name));
    line.push(':');

    if pair.value.contains('\n') {
        line.push(' ');
        line.push_str(MULTILINE_QUOTE);
        line.push('\n');
        for value_line in pair.value.split('\n') {
            if !value_line.is_empty() {
                line.push_str("    ");
                line.push_str(value_line);
            }
            line.push('\n');
        }
        line.push_str("  ");
        line.push_str(MULTILINE_QUOTE);
    } else if !pair.value.is_empty() {
        line.push(' ');
        line.push_str(&pair.value);
    }
    line.push('\n');
    line
}

/// Whether a key must be written inside double quotes.
pub(crate) fn key_needs_quotes(key: &str) -> bool {
    key.is_empty()
        || key.contains(':')
        || key.starts_with(['"', '~', '@'])
        || key.trim() != key
}

fn write_key(key: &str) -> String {
    if key_needs_quotes(key) {
        format!("\"{}\"", key)
    } else {
        key.to_string()
    }
}

// =============================================================================
// Tagged text
// =============================================================================

fn write_tagged(full_name: &str, params: &[Param], payload: &str) -> String {
    let mut out = write_header(full_name, params);
    out.push('\n');
    out.push_str(payload);
    if !payload.is_empty() && !payload.ends_with('\n') {
        out.push('\n');
    }
    out.push('/');
    out.push_str(full_name);
    out.push('\n');
    out
}

// =============================================================================
// Array
// =============================================================================

fn write_array(block: &Block, items: &[ArrayItem]) -> String {
    let mut out = format!("{} [\n", write_header(&block.full_name(), &block.params));
    let lines: Vec<String> = items
        .iter()
        .map(|item| {
            if item.enabled {
                format!("  {}", item.name)
            } else {
                format!("  ~{}", item.name)
            }
        })
        .collect();
    if !lines.is_empty() {
        out.push_str(&lines.join(",\n"));
        out.push('\n');
    }
    out.push_str("]\n");
    out
}
