//! Request files: `meta`, the method block, params, headers, auth, body
//! sections, vars, assertions, scripts, tests, settings and docs.

use crate::assemble::{
    auth_block, meta_block, meta_from_pairs, non_empty, push_pairs, push_scripts, push_text,
    push_vars, take_vars_or_script, Slots,
};
use crate::ast::{Ast, Block, Body, Pair};
use crate::model::{Auth, Http, Request, HTTP_METHODS};

/// Body modes written as tagged text blocks, in output order.
const TEXT_BODY_MODES: &[&str] = &["json", "text", "xml", "sparql", "graphql", "graphql-vars"];

pub(crate) fn request_from_ast(ast: Ast) -> Request {
    let mut req = Request::default();
    let mut slots = Slots::default();

    for block in ast.blocks {
        if !slots.claim(&block) || !take_block(&mut req, &block) {
            req.extra.push(block);
        }
    }
    req
}

/// Store a block in its field. Returns `false` if the block has no field.
fn take_block(req: &mut Request, block: &Block) -> bool {
    let name = block.name.as_str();
    match (name, block.qualifier.as_deref(), &block.body) {
        ("meta", None, Body::Dictionary(pairs)) => req.meta = meta_from_pairs(pairs),
        (method, None, Body::Dictionary(pairs)) if HTTP_METHODS.contains(&method) => {
            req.http = Some(http_from_pairs(method, pairs))
        }
        ("params", Some("query"), Body::Dictionary(pairs)) => req.query_params = pairs.clone(),
        ("params", Some("path"), Body::Dictionary(pairs)) => req.path_params = pairs.clone(),
        ("headers", None, Body::Dictionary(pairs)) => req.headers = pairs.clone(),
        ("auth", Some(mode), Body::Dictionary(pairs)) => {
            req.auth = Some(Auth {
                mode: mode.to_string(),
                fields: pairs.clone(),
            })
        }
        ("body", None, Body::Text(text)) => {
            let slot = match block.param("type") {
                Some("json") => &mut req.body.json,
                Some("text") => &mut req.body.text,
                Some("xml") => &mut req.body.xml,
                Some("sparql") => &mut req.body.sparql,
                Some("graphql") => &mut req.body.graphql,
                Some("graphql-vars") => &mut req.body.graphql_vars,
                _ => return false,
            };
            *slot = non_empty(text);
        }
        ("body", Some("form-urlencoded"), Body::Dictionary(pairs)) => {
            req.body.form_url_encoded = pairs.clone()
        }
        ("body", Some("multipart-form"), Body::Dictionary(pairs)) => {
            req.body.multipart_form = pairs.clone()
        }
        ("assert", None, Body::Dictionary(pairs)) => req.assertions = pairs.clone(),
        ("tests", None, Body::Text(text)) => req.tests = non_empty(text),
        ("settings", None, Body::Dictionary(pairs)) => req.settings = pairs.clone(),
        ("docs", None, Body::Text(text)) => req.docs = non_empty(text),
        _ => return take_vars_or_script(block, &mut req.vars, &mut req.script),
    }
    true
}

fn http_from_pairs(method: &str, pairs: &[Pair]) -> Http {
    let mut http = Http {
        method: method.to_string(),
        url: String::new(),
        body: "none".to_string(),
        auth: "none".to_string(),
        extra: Vec::new(),
    };
    for pair in pairs {
        match pair.name.as_str() {
            "url" => http.url = pair.value.clone(),
            "body" => http.body = pair.value.clone(),
            "auth" => http.auth = pair.value.clone(),
            _ => http.extra.push(pair.clone()),
        }
    }
    http
}

fn http_block(http: &Http) -> Block {
    let mut pairs = vec![
        Pair::new("url", &http.url),
        Pair::new("body", &http.body),
        Pair::new("auth", &http.auth),
    ];
    pairs.extend(http.extra.iter().cloned());
    Block::dictionary(&http.method.to_lowercase(), None, pairs)
}

pub(crate) fn request_to_ast(req: &Request) -> Ast {
    let mut blocks = vec![meta_block(&req.meta)];

    if let Some(http) = &req.http {
        blocks.push(http_block(http));
    }
    push_pairs(&mut blocks, "params", Some("query"), &req.query_params);
    push_pairs(&mut blocks, "params", Some("path"), &req.path_params);
    push_pairs(&mut blocks, "headers", None, &req.headers);
    if let Some(auth) = &req.auth {
        blocks.push(auth_block(auth));
    }

    let body = &req.body;
    let texts = [
        &body.json,
        &body.text,
        &body.xml,
        &body.sparql,
        &body.graphql,
        &body.graphql_vars,
    ];
    for (mode, payload) in TEXT_BODY_MODES.iter().zip(texts) {
        push_text(&mut blocks, "body", Some(mode), payload);
    }
    push_pairs(&mut blocks, "body", Some("form-urlencoded"), &body.form_url_encoded);
    push_pairs(&mut blocks, "body", Some("multipart-form"), &body.multipart_form);

    push_vars(&mut blocks, &req.vars);
    push_pairs(&mut blocks, "assert", None, &req.assertions);
    push_scripts(&mut blocks, &req.script);
    push_text(&mut blocks, "tests", None, &req.tests);
    push_pairs(&mut blocks, "settings", None, &req.settings);
    push_text(&mut blocks, "docs", None, &req.docs);

    blocks.extend(req.extra.iter().cloned());
    Ast { blocks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseContext;
    use crate::parser::parse_ast;

    const GET_USERS: &str = "meta {
  name: Get users
  type: http
  seq: 2
}

get {
  url: https://api.example.com/users
  body: json
  auth: bearer
}

params:query {
  page: 1
  ~limit: 10
}

auth:bearer {
  token: {{token}}
}

body(type=json)
{ \"active\": true }
/body

script(type=pre-request)
bru.setVar(\"a\", 1);
/script

beta {
  unknown: kept
}
";

    #[test]
    fn test_request_fields() {
        let ast = parse_ast(GET_USERS, &ParseContext::new(None)).unwrap();
        let req = request_from_ast(ast);
        assert_eq!(req.meta.seq, Some(2));
        let http = req.http.as_ref().unwrap();
        assert_eq!(http.method, "get");
        assert_eq!(http.url, "https://api.example.com/users");
        assert_eq!(http.auth, "bearer");
        assert_eq!(req.query_params[1], Pair::new("limit", "10").disabled());
        assert_eq!(req.auth.as_ref().unwrap().mode, "bearer");
        assert_eq!(req.body.json.as_deref(), Some("{ \"active\": true }\n"));
        assert_eq!(req.script.req.as_deref(), Some("bru.setVar(\"a\", 1);\n"));
        assert_eq!(req.extra.len(), 1);
        assert_eq!(req.extra[0].name, "beta");
    }

    #[test]
    fn test_request_writes_canonical_text() {
        let ast = parse_ast(GET_USERS, &ParseContext::new(None)).unwrap();
        let text = crate::writer::write_ast(&request_to_ast(&request_from_ast(ast)));
        assert_eq!(text, GET_USERS);
    }

    #[test]
    fn test_second_method_block_is_kept_aside() {
        let src = "meta {\n  name: a\n}\n\nget {\n  url: /a\n}\n\npost {\n  url: /b\n}\n";
        let req = request_from_ast(parse_ast(src, &ParseContext::new(None)).unwrap());
        assert_eq!(req.http.unwrap().method, "get");
        assert_eq!(req.extra[0].name, "post");
    }
}
