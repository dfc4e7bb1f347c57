//! Phase 2: Block Lexer
//!
//! The block lexer walks scan lines with a small state machine. Outside a
//! block it expects headers; each header selects the state used to consume
//! the body:
//! - Dictionary: `[~][@]key: value` lines up to `}`, with `'''` multi-line values
//! - Array: comma or newline separated names up to `]`
//! - Tagged: verbatim lines up to `/name`

use crate::ast::{ArrayItem, Body, Pair};
use crate::error::{ParseContext, ParseError, Result};
use crate::scanner::{parse_header, starts_header, Header, Opener, ScanLine};

/// Delimiter of multi-line dictionary values.
pub(crate) const MULTILINE_QUOTE: &str = "'''";

/// Indentation stripped from multi-line value lines.
const MULTILINE_INDENT: &str = "    ";

/// A block as it appears in the source, before document-level checks.
#[derive(Debug, Clone)]
pub struct RawBlock {
    pub header: Header,
    pub body: Body,
    /// Zero-based line of the header.
    pub line_num: usize,
}

/// Convert scan lines into blocks.
pub fn lex_blocks(lines: &[ScanLine], ctx: &ParseContext) -> Result<Vec<RawBlock>> {
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let sl = &lines[i];
        let trimmed = sl.text.trim();

        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        if !starts_header(trimmed) {
            return Err(ParseError::UnexpectedContent(ctx.at(sl.line_num, indent_of(&sl.text))));
        }

        let header = parse_header(sl, ctx)?;
        let (body, next) = match header.opener {
            Opener::Brace => {
                let (pairs, next) = lex_dictionary(lines, i, &header, ctx)?;
                (Body::Dictionary(pairs), next)
            }
            Opener::Bracket => {
                let (items, next) = lex_array(lines, i, &header, ctx)?;
                (Body::Array(items), next)
            }
            Opener::Tagged => {
                let (payload, next) = lex_tagged(lines, i, &header, ctx)?;
                (Body::Text(payload), next)
            }
        };

        blocks.push(RawBlock {
            header,
            body,
            line_num: sl.line_num,
        });
        i = next;
    }

    Ok(blocks)
}

fn indent_of(text: &str) -> usize {
    text.len() - text.trim_start().len()
}

fn unterminated(header: &Header, start: &ScanLine, ctx: &ParseContext) -> ParseError {
    ParseError::UnterminatedBlock(header.full_name(), ctx.at(start.line_num, 0))
}

// ============================================================================
// Dictionary
// ============================================================================

/// Consume dictionary lines starting after the header at `start`.
fn lex_dictionary(
    lines: &[ScanLine],
    start: usize,
    header: &Header,
    ctx: &ParseContext,
) -> Result<(Vec<Pair>, usize)> {
    let mut pairs = Vec::new();
    let mut i = start + 1;

    while i < lines.len() {
        let sl = &lines[i];
        let trimmed = sl.text.trim();

        if trimmed == "}" {
            return Ok((pairs, i + 1));
        }
        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        let mut pair = parse_entry(sl, ctx)?;
        if pair.value == MULTILINE_QUOTE {
            let (value, next) = lex_multiline(lines, i, ctx)?;
            pair.value = value;
            i = next;
        } else {
            i += 1;
        }
        pairs.push(pair);
    }

    Err(unterminated(header, &lines[start], ctx))
}

/// Parse `[~][@]key: value`. Multi-line openers come back with the raw `'''` value.
pub(crate) fn parse_entry(sl: &ScanLine, ctx: &ParseContext) -> Result<Pair> {
    let indent = indent_of(&sl.text);
    let mut rest = sl.text.trim();
    let mut col = indent;

    let mut enabled = true;
    if let Some(r) = rest.strip_prefix('~') {
        enabled = false;
        rest = r;
        col += 1;
    }
    let mut local = false;
    if let Some(r) = rest.strip_prefix('@') {
        local = true;
        rest = r;
        col += 1;
    }

    let (name, after_key) = if let Some(quoted) = rest.strip_prefix('"') {
        let close = quoted
            .find('"')
            .ok_or_else(|| ParseError::UnterminatedKey(ctx.at(sl.line_num, col)))?;
        let after = quoted[close + 1..].trim_start();
        let after = after
            .strip_prefix(':')
            .ok_or_else(|| ParseError::ExpectedColon(ctx.at(sl.line_num, col + close + 2)))?;
        (quoted[..close].to_string(), after)
    } else {
        let colon = rest
            .find(':')
            .ok_or_else(|| ParseError::ExpectedColon(ctx.at(sl.line_num, col + rest.len())))?;
        (rest[..colon].trim().to_string(), &rest[colon + 1..])
    };

    Ok(Pair {
        name,
        value: after_key.trim().to_string(),
        enabled,
        local,
    })
}

/// Collect a `'''` value whose opener is on line `start`.
fn lex_multiline(lines: &[ScanLine], start: usize, ctx: &ParseContext) -> Result<(String, usize)> {
    let mut collected: Vec<&str> = Vec::new();
    let mut i = start + 1;

    while i < lines.len() {
        let text = lines[i].text.as_str();
        if text.trim() == MULTILINE_QUOTE {
            return Ok((collected.join("\n"), i + 1));
        }
        collected.push(text.strip_prefix(MULTILINE_INDENT).unwrap_or(text.trim_start()));
        i += 1;
    }

    Err(ParseError::UnterminatedMultiline(ctx.at(
        lines[start].line_num,
        indent_of(&lines[start].text),
    )))
}

// ============================================================================
// Array
// ============================================================================

fn lex_array(
    lines: &[ScanLine],
    start: usize,
    header: &Header,
    ctx: &ParseContext,
) -> Result<(Vec<ArrayItem>, usize)> {
    let mut items = Vec::new();
    let mut i = start + 1;

    while i < lines.len() {
        let trimmed = lines[i].text.trim();
        if trimmed == "]" {
            return Ok((items, i + 1));
        }
        for entry in trimmed.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            items.push(match entry.strip_prefix('~') {
                Some(name) => ArrayItem::new(name.trim(), false),
                None => ArrayItem::new(entry, true),
            });
        }
        i += 1;
    }

    Err(unterminated(header, &lines[start], ctx))
}

// ============================================================================
// Tagged text
// ============================================================================

fn lex_tagged(
    lines: &[ScanLine],
    start: usize,
    header: &Header,
    ctx: &ParseContext,
) -> Result<(String, usize)> {
    let marker = format!("/{}", header.full_name());
    let mut payload = String::new();
    let mut i = start + 1;

    while i < lines.len() {
        let text = lines[i].text.as_str();
        if text.trim_end() == marker {
            return Ok((payload, i + 1));
        }
        payload.push_str(text);
        payload.push('\n');
        i += 1;
    }

    Err(unterminated(header, &lines[start], ctx))
}
