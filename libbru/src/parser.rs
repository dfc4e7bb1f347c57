//! Phase 3: Tree Builder
//!
//! Turns lexed blocks into an [`Ast`], enforcing document-level rules:
//! - exactly one `meta` block, and it is a dictionary
//! - embedded (`encoding=toml`) blocks are decoded back into
//!   dictionary or array bodies

use crate::ast::{Ast, Block, Body};
use crate::error::{ParseContext, ParseError, Result};
use crate::fallback::{decode_embedded, ENCODING_PARAM, TOML_ENCODING};
use crate::lexer::{lex_blocks, RawBlock};
use crate::scanner::scan;

/// Parse source text into a block tree.
pub fn parse_ast(source: &str, ctx: &ParseContext) -> Result<Ast> {
    // Phase 1: Split source into lines
    let lines = scan(source);

    // Phase 2: Lex lines into blocks
    let raw = lex_blocks(&lines, ctx)?;

    // Phase 3: Build the tree, then validate it
    let built = raw
        .into_iter()
        .map(|rb| {
            let line_num = rb.line_num;
            build_block(rb, ctx).map(|block| (block, line_num))
        })
        .collect::<Result<Vec<_>>>()?;
    check_meta(&built, ctx)?;

    Ok(Ast {
        blocks: built.into_iter().map(|(block, _)| block).collect(),
    })
}

fn check_meta(blocks: &[(Block, usize)], ctx: &ParseContext) -> Result<()> {
    let mut metas = blocks
        .iter()
        .filter(|(b, _)| b.name == "meta" && b.qualifier.is_none());
    let Some((first, line_num)) = metas.next() else {
        return Err(ParseError::MissingMeta(ctx.at(0, 0)));
    };
    if !matches!(first.body, Body::Dictionary(_)) {
        return Err(ParseError::InvalidMeta(ctx.at(*line_num, 0)));
    }
    if let Some((_, dup_line)) = metas.next() {
        return Err(ParseError::DuplicateMeta(ctx.at(*dup_line, 0)));
    }
    Ok(())
}

fn build_block(rb: RawBlock, ctx: &ParseContext) -> Result<Block> {
    let RawBlock {
        header,
        body,
        line_num,
    } = rb;

    let embedded = header
        .params
        .iter()
        .any(|p| p.key == ENCODING_PARAM && p.value == TOML_ENCODING);

    let (params, body) = match body {
        Body::Text(payload) if embedded => {
            let body = decode_embedded(&payload, ctx.at(line_num, 0))?;
            let params = header
                .params
                .into_iter()
                .filter(|p| p.key != ENCODING_PARAM)
                .collect();
            (params, body)
        }
        body => (header.params, body),
    };

    Ok(Block {
        name: header.name,
        qualifier: header.qualifier,
        params,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Pair;

    fn parse(source: &str) -> Result<Ast> {
        parse_ast(source, &ParseContext::new(None))
    }

    #[test]
    fn test_missing_meta() {
        let err = parse("headers {\n  a: b\n}\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingMeta(_)));
    }

    #[test]
    fn test_duplicate_meta() {
        let err = parse("meta {\n  name: a\n}\n\nmeta {\n  name: b\n}\n").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateMeta(_)));
        assert_eq!(err.line(), 5);
    }

    #[test]
    fn test_meta_must_be_a_dictionary() {
        let err = parse("meta\nhello\n/meta\n\nget {\n  url: /a\n}\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidMeta(_)));
        assert_eq!(err.line(), 1);

        let err = parse("meta [\n  a\n]\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidMeta(_)));
    }

    #[test]
    fn test_embedded_meta_counts_as_dictionary() {
        let src = "meta(encoding=toml)\n[[entries]]\nname = \"name\"\nvalue = \"a\"\n\n[[entries]]\nname = \"enum\"\nvalue = \"b\"\n/meta\n";
        let ast = parse(src).unwrap();
        assert_eq!(
            ast.blocks[0].body.as_dictionary().unwrap(),
            &[Pair::new("name", "a"), Pair::new("enum", "b")]
        );
    }

    #[test]
    fn test_embedded_dictionary_is_decoded() {
        let src = "meta {\n  name: a\n}\n\nheaders(encoding=toml)\n[[entries]]\nname = \"x\"\nvalue = \"1\"\nenabled = true\n\n[[entries]]\nname = \"x\"\nvalue = \"2\"\nenabled = false\n/headers\n";
        let ast = parse(src).unwrap();
        let headers = ast.find("headers", None).unwrap();
        assert!(headers.params.is_empty());
        assert_eq!(
            headers.body.as_dictionary().unwrap(),
            &[Pair::new("x", "1"), Pair::new("x", "2").disabled()]
        );
    }

    #[test]
    fn test_order_is_kept() {
        let ast = parse("docs\nhello\n/docs\n\nmeta {\n  name: a\n}\n").unwrap();
        assert_eq!(ast.blocks[0].name, "docs");
        assert_eq!(ast.blocks[1].name, "meta");
    }
}
