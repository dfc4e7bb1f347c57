//! Bru collection file format.
//!
//! Bru is a plain-text, diff-friendly format for API requests, folders,
//! collections and environments. A file is a flat list of blocks:
//! dictionaries (`headers { ... }`), tagged text (`body(type=json)` ...
//! `/body`) and arrays (`vars:secret [ ... ]`).
//!
//! # Parsing Pipeline
//!
//! 1. **Scanner**: Splits source text into lines and recognizes block
//!    headers.
//!
//! 2. **Block Lexer**: Groups lines into raw blocks by their delimiters and
//!    reads dictionary entries, array items and verbatim text.
//!
//! 3. **Tree Builder**: Checks document-level rules and produces an [`Ast`].
//!
//! 4. **Assembly**: Maps the block tree onto a typed [`Document`] for the
//!    requested [`DocumentKind`].
//!
//! Writing runs the other way: document, block tree, canonical text.
//!
//! # Scheduling
//!
//! [`Engine`] runs conversions off the caller's task, routed by payload
//! size through a [`LaneRouter`] into per-lane [`WorkerQueue`]s. The
//! [`cache`] module keeps parsed results keyed by modification time.

mod assemble;
mod ast;
pub mod cache;
mod collection;
mod config;
mod engine;
mod environment;
mod error;
mod fallback;
mod lanes;
mod lexer;
mod model;
mod parser;
mod request;
mod scanner;
mod worker;
mod writer;

pub use ast::{ArrayItem, Ast, Block, Body, Pair, PairsExt, Param};
pub use config::{CacheConfig, ConfigError, EngineConfig, LaneConfig};
pub use engine::{payload_size_mb, Engine};
pub use error::{EngineError, Location, ParseError, Result};
pub use lanes::LaneRouter;
pub use model::{
    Auth, Collection, Document, DocumentKind, Environment, Http, Meta, Request, RequestBody,
    RequestVars, Scripts, Variable, HTTP_METHODS,
};
pub use worker::{ConversionExecutor, Executor, Operation, Output, Task, WorkerQueue};
pub use writer::{write_ast, write_block};

/// Parse a Bru document of the given kind.
///
/// # Example
///
/// ```
/// use libbru::{parse, DocumentKind};
///
/// let doc = parse("meta {\n  name: local\n}\n", DocumentKind::Environment).unwrap();
/// assert_eq!(doc.name(), "local");
/// ```
pub fn parse(input: &str, kind: DocumentKind) -> Result<Document> {
    parse_with_filename(input, kind, None)
}

/// Parse a Bru document with a filename for error messages.
pub fn parse_with_filename(
    input: &str,
    kind: DocumentKind,
    filename: Option<&str>,
) -> Result<Document> {
    let ctx = error::ParseContext::new(filename);
    let ast = parser::parse_ast(input, &ctx)?;

    Ok(match kind {
        DocumentKind::Request => Document::Request(request::request_from_ast(ast)),
        DocumentKind::Folder => Document::Folder(collection::collection_from_ast(ast)),
        DocumentKind::Collection => Document::Collection(collection::collection_from_ast(ast)),
        DocumentKind::Environment => {
            Document::Environment(environment::environment_from_ast(ast))
        }
    })
}

/// Parse source text into a block tree without assembling a document.
pub fn parse_ast(input: &str) -> Result<Ast> {
    parser::parse_ast(input, &error::ParseContext::new(None))
}

/// Write a document as canonical Bru text.
///
/// Secret environment variables are written by name only.
pub fn stringify(doc: &Document) -> String {
    write_ast(&to_ast(doc))
}

/// Map a document onto its block tree.
pub fn to_ast(doc: &Document) -> Ast {
    match doc {
        Document::Request(req) => request::request_to_ast(req),
        Document::Folder(coll) | Document::Collection(coll) => {
            collection::collection_to_ast(coll)
        }
        Document::Environment(env) => environment::environment_to_ast(env),
    }
}
