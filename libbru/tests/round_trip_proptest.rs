//! Property-based round-trip tests.
//!
//! Documents are generated with names, values and array items that collide
//! with the line syntax: multi-line quotes, double quotes, colons, commas,
//! `~` and `@` prefixes, carriage returns and newlines. Writing any of them
//! and reading the text back must give the same document.

use libbru::{
    parse, parse_ast, stringify, write_ast, ArrayItem, Ast, Block, Collection, Document,
    DocumentKind, Environment, Http, Meta, Pair, Request, RequestBody, RequestVars, Variable,
};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

/// Text that is awkward for at least one part of the line syntax.
fn awkward_text() -> impl Strategy<Value = String> {
    prop_oneof![
        // Plain
        "[a-zA-Z0-9._-]{0,12}",
        "[a-z]{1,4}( [a-z]{1,4}){0,2}",
        // Multi-line quotes, alone or inside other text
        Just("'''".to_string()),
        " {0,2}''' {0,2}",
        "[a-z]{0,3}'''[a-z]{0,3}",
        // Quotes and colons, as in keys that need quoting
        "[a-z\"]{0,4}:[a-z\" ]{0,4}",
        "\"[a-z]{0,4}",
        // Array separators and prefixes
        "[a-z,~@\\]\\[ ]{0,8}",
        "~[a-z]{1,4}",
        // Carriage returns
        "[a-z]{0,4}\\r[a-z]{0,4}",
        "[a-z]{0,4}\\r\\n[a-z]{0,4}",
        // Surrounding whitespace
        "[ \\t]{1,2}[a-z]{1,4}[ \\t]{0,2}",
        // Anything printable
        "\\PC{0,10}",
    ]
}

/// Multi-line values, some with a line that is only `'''`.
fn multiline_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "([ a-z']{0,5}\\n){1,3}[ a-z]{0,3}",
        "([a-z{}:]{0,6}\\n){1,3}",
        "[a-z]{0,3}\\n'''\\n[a-z]{0,3}",
    ]
}

fn pair() -> impl Strategy<Value = Pair> {
    (
        awkward_text(),
        prop_oneof![3 => awkward_text(), 1 => multiline_text()],
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(name, value, enabled, local)| Pair {
            name,
            value,
            enabled,
            local,
        })
}

fn pairs() -> impl Strategy<Value = Vec<Pair>> {
    prop::collection::vec(pair(), 0..5)
}

fn items() -> impl Strategy<Value = Vec<ArrayItem>> {
    prop::collection::vec(
        (awkward_text(), any::<bool>()).prop_map(|(name, enabled)| ArrayItem::new(&name, enabled)),
        0..5,
    )
}

/// Tagged payloads. They always end with a newline and never hold an end
/// marker line.
fn payload() -> impl Strategy<Value = Option<String>> {
    prop::option::of("([a-z {}();=\"',:]{0,16}\\n){1,4}")
}

fn request() -> impl Strategy<Value = Request> {
    (
        awkward_text(),
        pairs(),
        pairs(),
        pairs(),
        (pairs(), pairs()),
        pairs(),
        payload(),
    )
        .prop_map(|(name, query, headers, form, (req, res), assertions, docs)| Request {
            meta: Meta {
                kind: Some("http".to_string()),
                seq: Some(1),
                ..Meta::named(&name)
            },
            http: Some(Http {
                method: "post".to_string(),
                url: "https://api.example.com/items".to_string(),
                body: "formUrlEncoded".to_string(),
                auth: "none".to_string(),
                extra: vec![],
            }),
            query_params: query,
            headers,
            body: RequestBody {
                form_url_encoded: form,
                ..RequestBody::default()
            },
            vars: RequestVars { req, res },
            assertions,
            docs,
            ..Request::default()
        })
}

fn collection() -> impl Strategy<Value = Collection> {
    (awkward_text(), pairs(), pairs(), payload()).prop_map(|(name, headers, req, docs)| {
        Collection {
            meta: Meta::named(&name),
            headers,
            vars: RequestVars {
                req,
                res: vec![],
            },
            docs,
            ..Collection::default()
        }
    })
}

/// Plain variables followed by secrets. Secrets carry no value, which is
/// how they come back from the text.
fn environment() -> impl Strategy<Value = Environment> {
    let plain = prop::collection::vec(
        (awkward_text(), awkward_text(), any::<bool>()).prop_map(|(name, value, enabled)| {
            Variable {
                enabled,
                ..Variable::new(&name, &value)
            }
        }),
        0..5,
    );
    let secret = prop::collection::vec(
        (awkward_text(), any::<bool>()).prop_map(|(name, enabled)| Variable {
            name,
            value: None,
            enabled,
            secret: true,
        }),
        0..4,
    );
    (awkward_text(), plain, secret).prop_map(|(name, plain, secret)| Environment {
        name,
        variables: plain.into_iter().chain(secret).collect(),
        extra: vec![],
    })
}

fn assert_round_trips(doc: Document, kind: DocumentKind) -> Result<(), TestCaseError> {
    let text = stringify(&doc);
    let back = parse(&text, kind)
        .map_err(|e| TestCaseError::fail(format!("{e}\n--- written text ---\n{text}")))?;
    prop_assert_eq!(back, doc, "written text:\n{}", text);
    Ok(())
}

proptest! {
    #[test]
    fn test_blocks_round_trip(meta in pairs(), headers in pairs(), secrets in items()) {
        let mut meta = meta;
        meta.insert(0, Pair::new("name", "generated"));
        let ast = Ast {
            blocks: vec![
                Block::dictionary("meta", None, meta),
                Block::dictionary("headers", None, headers),
                Block::array("vars", Some("secret"), secrets),
            ],
        };
        let text = write_ast(&ast);
        let back = parse_ast(&text)
            .map_err(|e| TestCaseError::fail(format!("{e}\n--- written text ---\n{text}")))?;
        prop_assert_eq!(back, ast, "written text:\n{}", text);
    }

    #[test]
    fn test_requests_round_trip(req in request()) {
        assert_round_trips(Document::Request(req), DocumentKind::Request)?;
    }

    #[test]
    fn test_collections_round_trip(coll in collection()) {
        assert_round_trips(Document::Collection(coll), DocumentKind::Collection)?;
    }

    #[test]
    fn test_environments_round_trip(env in environment()) {
        assert_round_trips(Document::Environment(env), DocumentKind::Environment)?;
    }
}
