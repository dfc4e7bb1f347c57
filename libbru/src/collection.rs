//! `collection.bru` and `folder.bru`: shared settings inherited by the
//! requests below them.

use crate::assemble::{
    auth_block, meta_block, meta_from_pairs, non_empty, push_pairs, push_scripts, push_text,
    push_vars, take_vars_or_script, Slots,
};
use crate::ast::{Ast, Block, Body, Pair, PairsExt};
use crate::model::{Auth, Collection};

pub(crate) fn collection_from_ast(ast: Ast) -> Collection {
    let mut coll = Collection::default();
    let mut slots = Slots::default();

    for block in ast.blocks {
        if !slots.claim(&block) || !take_block(&mut coll, &block) {
            coll.extra.push(block);
        }
    }
    coll
}

fn take_block(coll: &mut Collection, block: &Block) -> bool {
    match (block.name.as_str(), block.qualifier.as_deref(), &block.body) {
        ("meta", None, Body::Dictionary(pairs)) => coll.meta = meta_from_pairs(pairs),
        ("headers", None, Body::Dictionary(pairs)) => coll.headers = pairs.clone(),
        // A plain `auth` block carries only `mode`.
        ("auth", None, Body::Dictionary(pairs)) if is_plain_mode(pairs) => {
            coll.auth_mode = pairs.value_of("mode").map(String::from)
        }
        ("auth", Some(mode), Body::Dictionary(pairs)) => {
            coll.auth = Some(Auth {
                mode: mode.to_string(),
                fields: pairs.clone(),
            })
        }
        ("tests", None, Body::Text(text)) => coll.tests = non_empty(text),
        ("docs", None, Body::Text(text)) => coll.docs = non_empty(text),
        _ => return take_vars_or_script(block, &mut coll.vars, &mut coll.script),
    }
    true
}

fn is_plain_mode(pairs: &[Pair]) -> bool {
    matches!(pairs, [p] if p.name == "mode" && p.enabled && !p.local)
}

pub(crate) fn collection_to_ast(coll: &Collection) -> Ast {
    let mut blocks = vec![meta_block(&coll.meta)];

    push_pairs(&mut blocks, "headers", None, &coll.headers);
    if let Some(mode) = &coll.auth_mode {
        blocks.push(Block::dictionary("auth", None, vec![Pair::new("mode", mode)]));
    }
    if let Some(auth) = &coll.auth {
        blocks.push(auth_block(auth));
    }
    push_vars(&mut blocks, &coll.vars);
    push_scripts(&mut blocks, &coll.script);
    push_text(&mut blocks, "tests", None, &coll.tests);
    push_text(&mut blocks, "docs", None, &coll.docs);

    blocks.extend(coll.extra.iter().cloned());
    Ast { blocks }
}
