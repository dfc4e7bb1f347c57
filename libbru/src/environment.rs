//! Environment files: `meta { name }`, `vars` and `vars:secret`.
//!
//! Secret values never reach the text: a secret variable is written by
//! name in the `vars:secret` array and comes back with no value.

use crate::assemble::{meta_from_pairs, Slots};
use crate::ast::{ArrayItem, Ast, Block, Body, Pair};
use crate::model::{Environment, Variable};

pub(crate) fn environment_from_ast(ast: Ast) -> Environment {
    let mut env = Environment::default();
    let mut secrets = Vec::new();
    let mut slots = Slots::default();

    for block in ast.blocks {
        if !slots.claim(&block) {
            env.extra.push(block);
            continue;
        }
        match (block.name.as_str(), block.qualifier.as_deref(), &block.body) {
            ("meta", None, Body::Dictionary(pairs)) => env.name = meta_from_pairs(pairs).name,
            ("vars", None, Body::Dictionary(pairs)) => {
                env.variables = pairs.iter().map(variable_from_pair).collect()
            }
            ("vars", Some("secret"), Body::Array(items)) => {
                secrets = items.iter().map(secret_from_item).collect()
            }
            _ => env.extra.push(block),
        }
    }
    env.variables.extend(secrets);
    env
}

fn variable_from_pair(pair: &Pair) -> Variable {
    Variable {
        name: pair.name.clone(),
        value: Some(pair.value.clone()),
        enabled: pair.enabled,
        secret: false,
    }
}

fn secret_from_item(item: &ArrayItem) -> Variable {
    Variable {
        name: item.name.clone(),
        value: None,
        enabled: item.enabled,
        secret: true,
    }
}

pub(crate) fn environment_to_ast(env: &Environment) -> Ast {
    let (secrets, plain): (Vec<&Variable>, Vec<&Variable>) =
        env.variables.iter().partition(|v| v.secret);

    let pairs = plain
        .iter()
        .map(|v| Pair {
            name: v.name.clone(),
            value: v.value.clone().unwrap_or_default(),
            enabled: v.enabled,
            local: false,
        })
        .collect();

    let mut blocks = vec![
        Block::dictionary("meta", None, vec![Pair::new("name", &env.name)]),
        Block::dictionary("vars", None, pairs),
    ];
    if !secrets.is_empty() {
        let items = secrets
            .iter()
            .map(|v| ArrayItem::new(&v.name, v.enabled))
            .collect();
        blocks.push(Block::array("vars", Some("secret"), items));
    }

    blocks.extend(env.extra.iter().cloned());
    Ast { blocks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseContext;
    use crate::parser::parse_ast;
    use crate::writer::write_ast;

    fn parse(src: &str) -> Environment {
        environment_from_ast(parse_ast(src, &ParseContext::new(None)).unwrap())
    }

    #[test]
    fn test_secret_value_is_never_written() {
        let env = Environment {
            name: "prod".to_string(),
            variables: vec![
                Variable::new("host", "api.example.com"),
                Variable::new("token", "abracadabra").secret(),
            ],
            extra: vec![],
        };
        let text = write_ast(&environment_to_ast(&env));
        assert!(!text.contains("abracadabra"));
        assert_eq!(
            text,
            "meta {\n  name: prod\n}\n\nvars {\n  host: api.example.com\n}\nvars:secret [\n  token\n]\n"
        );
    }

    #[test]
    fn test_empty_vars_block_is_written() {
        let env = Environment {
            name: "empty".to_string(),
            ..Environment::default()
        };
        assert_eq!(
            write_ast(&environment_to_ast(&env)),
            "meta {\n  name: empty\n}\n\nvars {\n}\n"
        );
    }

    #[test]
    fn test_disabled_secret() {
        let env = parse("meta {\n  name: a\n}\n\nvars {\n}\nvars:secret [\n  ~key,\n  pass\n]\n");
        assert_eq!(
            env.variables,
            vec![
                Variable {
                    name: "key".to_string(),
                    value: None,
                    enabled: false,
                    secret: true,
                },
                Variable {
                    name: "pass".to_string(),
                    value: None,
                    enabled: true,
                    secret: true,
                },
            ]
        );
    }

    #[test]
    fn test_unknown_blocks_survive() {
        let src = "meta {\n  name: a\n}\n\nvars {\n  x: 1\n}\n\ncolor {\n  tint: red\n}\n";
        let env = parse(src);
        assert_eq!(env.extra.len(), 1);
        assert_eq!(write_ast(&environment_to_ast(&env)), src);
    }
}
