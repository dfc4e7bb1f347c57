//! Building blocks shared by the document assemblies.
//!
//! Every assembly walks the block list once. The first block for each slot
//! fills it; repeats and unknown blocks land in the document's `extra` list
//! so they are written back instead of lost.

use crate::ast::{Block, Body, Pair, Param};
use crate::model::{Auth, Meta, RequestVars, Scripts, HTTP_METHODS};
use std::collections::HashSet;

/// Tracks which slots have been filled.
#[derive(Default)]
pub(crate) struct Slots(HashSet<String>);

impl Slots {
    /// Claim the slot of `block`; `false` if it was already taken.
    pub fn claim(&mut self, block: &Block) -> bool {
        self.0.insert(slot_key(block))
    }
}

fn slot_key(block: &Block) -> String {
    if block.qualifier.is_none() && HTTP_METHODS.contains(&block.name.as_str()) {
        return "http".to_string();
    }
    if block.name == "auth" && block.qualifier.is_some() {
        return "auth:*".to_string();
    }
    match (&block.body, block.param("type")) {
        (Body::Text(_), Some(t)) => format!("{}({})", block.full_name(), t),
        _ => block.full_name(),
    }
}

/// Text payloads: empty means absent.
pub(crate) fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

// ============================================================================
// meta
// ============================================================================

pub(crate) fn meta_from_pairs(pairs: &[Pair]) -> Meta {
    let mut meta = Meta::default();
    let mut seen = HashSet::new();

    for pair in pairs {
        if !seen.insert(pair.name.as_str()) {
            meta.extra.push(pair.clone());
            continue;
        }
        match pair.name.as_str() {
            "name" => meta.name = pair.value.clone(),
            "type" => meta.kind = Some(pair.value.clone()),
            // Non-numeric sequence numbers fall back to 1.
            "seq" => meta.seq = Some(pair.value.parse().unwrap_or(1)),
            "tags" => {
                meta.tags = pair
                    .value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect()
            }
            _ => meta.extra.push(pair.clone()),
        }
    }
    meta
}

pub(crate) fn meta_block(meta: &Meta) -> Block {
    let mut pairs = vec![Pair::new("name", &meta.name)];
    if let Some(kind) = &meta.kind {
        pairs.push(Pair::new("type", kind));
    }
    if let Some(seq) = meta.seq {
        pairs.push(Pair::new("seq", &seq.to_string()));
    }
    if !meta.tags.is_empty() {
        pairs.push(Pair::new("tags", &meta.tags.join(", ")));
    }
    pairs.extend(meta.extra.iter().cloned());
    Block::dictionary("meta", None, pairs)
}

// ============================================================================
// auth, vars, scripts
// ============================================================================

pub(crate) fn auth_block(auth: &Auth) -> Block {
    Block::dictionary("auth", Some(&auth.mode), auth.fields.clone())
}

/// Dictionary block, omitted when empty.
pub(crate) fn push_pairs(
    blocks: &mut Vec<Block>,
    name: &str,
    qualifier: Option<&str>,
    pairs: &[Pair],
) {
    if !pairs.is_empty() {
        blocks.push(Block::dictionary(name, qualifier, pairs.to_vec()));
    }
}

/// Tagged text block, omitted when empty.
pub(crate) fn push_text(
    blocks: &mut Vec<Block>,
    name: &str,
    kind: Option<&str>,
    payload: &Option<String>,
) {
    if let Some(payload) = payload.as_deref().filter(|p| !p.is_empty()) {
        let params = kind.map(|k| vec![Param::new("type", k)]).unwrap_or_default();
        blocks.push(Block::text(name, params, payload));
    }
}

pub(crate) fn push_vars(blocks: &mut Vec<Block>, vars: &RequestVars) {
    push_pairs(blocks, "vars", Some("pre-request"), &vars.req);
    push_pairs(blocks, "vars", Some("post-response"), &vars.res);
}

pub(crate) fn push_scripts(blocks: &mut Vec<Block>, script: &Scripts) {
    push_text(blocks, "script", Some("pre-request"), &script.req);
    push_text(blocks, "script", Some("post-response"), &script.res);
}

/// Fill request variables and scripts. Returns `false` if the block is not
/// one of them.
pub(crate) fn take_vars_or_script(
    block: &Block,
    vars: &mut RequestVars,
    script: &mut Scripts,
) -> bool {
    match (block.name.as_str(), block.qualifier.as_deref(), &block.body) {
        ("vars", Some("pre-request"), Body::Dictionary(pairs)) => vars.req = pairs.clone(),
        ("vars", Some("post-response"), Body::Dictionary(pairs)) => vars.res = pairs.clone(),
        ("script", None, Body::Text(text)) => match block.param("type") {
            Some("pre-request") => script.req = non_empty(text),
            Some("post-response") => script.res = non_empty(text),
            _ => return false,
        },
        _ => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_fields() {
        let pairs = vec![
            Pair::new("name", "Get users"),
            Pair::new("type", "http"),
            Pair::new("seq", "x"),
            Pair::new("tags", "smoke, regression"),
            Pair::new("owner", "api-team"),
        ];
        let meta = meta_from_pairs(&pairs);
        assert_eq!(meta.name, "Get users");
        assert_eq!(meta.kind.as_deref(), Some("http"));
        assert_eq!(meta.seq, Some(1));
        assert_eq!(meta.tags, vec!["smoke", "regression"]);
        assert_eq!(meta.extra, vec![Pair::new("owner", "api-team")]);
    }

    #[test]
    fn test_slots() {
        let mut slots = Slots::default();
        let get = Block::dictionary("get", None, vec![]);
        let post = Block::dictionary("post", None, vec![]);
        assert!(slots.claim(&get));
        assert!(!slots.claim(&post));

        let json = Block::text("body", vec![Param::new("type", "json")], "{}");
        let xml = Block::text("body", vec![Param::new("type", "xml")], "<a/>");
        assert!(slots.claim(&json));
        assert!(slots.claim(&xml));
        assert!(!slots.claim(&json));
    }
}
