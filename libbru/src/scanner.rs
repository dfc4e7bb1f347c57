//! Phase 1: Scanner
//!
//! The scanner splits source text into lines and recognizes block headers.
//! It performs:
//! - Line splitting with CRLF tolerance
//! - Header recognition: `name[:qualifier][(key=value, ...)] [{|[]`

use crate::ast::Param;
use crate::error::{ParseContext, ParseError, Result};

/// A single source line.
#[derive(Debug, Clone)]
pub struct ScanLine {
    /// Line content without the line terminator.
    pub text: String,
    /// Zero-based line number for error reporting.
    pub line_num: usize,
}

/// What follows the header name and parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opener {
    /// ` {`: a dictionary block.
    Brace,
    /// ` [`: an array block.
    Bracket,
    /// Nothing: a tagged text block closed by `/name`.
    Tagged,
}

/// A recognized block header.
#[derive(Debug, Clone)]
pub struct Header {
    pub name: String,
    pub qualifier: Option<String>,
    pub params: Vec<Param>,
    pub opener: Opener,
}

impl Header {
    /// `name` or `name:qualifier`.
    pub fn full_name(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{}:{}", self.name, q),
            None => self.name.clone(),
        }
    }
}

/// Split source text into lines.
///
/// A `\r` before each `\n` is dropped on every line, including lines of a
/// tagged text payload, so a CRLF file reads the same as its LF copy and
/// payloads come back with LF endings. The writer never emits a bare `\r`
/// in line syntax; dictionaries and arrays holding one are embedded.
pub fn scan(source: &str) -> Vec<ScanLine> {
    let mut lines: Vec<ScanLine> = source
        .split('\n')
        .enumerate()
        .map(|(line_num, text)| ScanLine {
            text: text.strip_suffix('\r').unwrap_or(text).to_string(),
            line_num,
        })
        .collect();

    // A trailing newline does not start another line.
    if lines.last().map(|l| l.text.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    lines
}

pub(crate) fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_qualifier_char(c: char) -> bool {
    is_name_char(c) || c == '.'
}

/// Whether a line outside any block looks like the start of a header.
pub fn starts_header(line: &str) -> bool {
    line.chars().next().map(is_name_char).unwrap_or(false)
}

/// Parse a block header line.
pub fn parse_header(line: &ScanLine, ctx: &ParseContext) -> Result<Header> {
    let text = line.text.trim();
    let invalid = |col: usize| {
        ParseError::InvalidHeader(text.to_string(), ctx.at(line.line_num, col))
    };

    let name_end = text
        .char_indices()
        .find(|&(_, c)| !is_name_char(c))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    if name_end == 0 {
        return Err(invalid(0));
    }
    let name = &text[..name_end];
    let mut rest = &text[name_end..];
    let mut col = name_end;

    let mut qualifier = None;
    if let Some(after) = rest.strip_prefix(':') {
        let q_end = after
            .char_indices()
            .find(|&(_, c)| !is_qualifier_char(c))
            .map(|(i, _)| i)
            .unwrap_or(after.len());
        if q_end == 0 {
            return Err(invalid(col + 1));
        }
        qualifier = Some(after[..q_end].to_string());
        rest = &after[q_end..];
        col += 1 + q_end;
    }

    let mut params = Vec::new();
    if let Some(after) = rest.strip_prefix('(') {
        let close = after.find(')').ok_or_else(|| invalid(col))?;
        params = parse_params(&after[..close]).ok_or_else(|| invalid(col + 1))?;
        rest = &after[close + 1..];
    }

    let opener = match rest.trim() {
        "" => Opener::Tagged,
        "{" => Opener::Brace,
        "[" => Opener::Bracket,
        _ => return Err(invalid(text.len() - rest.trim_start().len())),
    };

    Ok(Header {
        name: name.to_string(),
        qualifier,
        params,
        opener,
    })
}

/// Parse the inside of `( ... )`. Returns `None` on a malformed entry.
fn parse_params(inner: &str) -> Option<Vec<Param>> {
    let mut params = Vec::new();
    if inner.trim().is_empty() {
        return Some(params);
    }
    for part in inner.split(',') {
        let (key, value) = part.split_once('=')?;
        let key = key.trim();
        if key.is_empty() || !key.chars().all(is_name_char) {
            return None;
        }
        params.push(Param::new(key, value.trim()));
    }
    Some(params)
}
