//! Loading a program from its JSON serialization

use super::{Attr, Node, NodeId, NodeKind};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::rc::Rc;
use thiserror::Error;

/// Errors raised while decoding a serialized program
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("malformed AST: {0}")]
    Json(#[from] serde_json::Error),

    #[error("top-level node {index} is a {kind}, expected a declaration")]
    NotADeclaration { index: usize, kind: String },
}

#[derive(Deserialize)]
struct RawNode(String, FxHashMap<String, Attr>, Vec<RawNode>);

/// A loaded translation unit: its top-level declarations, in order
#[derive(Debug, Clone)]
pub struct Program {
    pub decls: Vec<Rc<Node>>,
    next_id: NodeId,
}

impl Program {
    /// Decode a JSON array of top-level declaration nodes
    pub fn from_json(source: &str) -> Result<Program, LoadError> {
        let raw: Vec<RawNode> = serde_json::from_str(source)?;
        Program::from_raw(raw)
    }

    /// Decode an already-parsed JSON value (handy with `serde_json::json!`)
    pub fn from_value(value: serde_json::Value) -> Result<Program, LoadError> {
        let raw: Vec<RawNode> = serde_json::from_value(value)?;
        Program::from_raw(raw)
    }

    fn from_raw(raw: Vec<RawNode>) -> Result<Program, LoadError> {
        let mut next_id = 0;
        let mut decls = Vec::with_capacity(raw.len());
        for (index, node) in raw.into_iter().enumerate() {
            let node = number(node, &mut next_id);
            if !node.kind.as_str().ends_with("Decl") {
                return Err(LoadError::NotADeclaration {
                    index,
                    kind: node.kind.to_string(),
                });
            }
            decls.push(node);
        }
        Ok(Program { decls, next_id })
    }

    /// Build a node outside the loaded tree, with a fresh id
    pub fn synthesize(
        &mut self,
        kind: NodeKind,
        attrs: FxHashMap<String, Attr>,
        children: Vec<Rc<Node>>,
    ) -> Rc<Node> {
        let id = self.next_id;
        self.next_id += 1;
        Rc::new(Node {
            id,
            kind,
            attrs,
            children,
        })
    }

    /// Number of ids handed out so far
    pub fn node_count(&self) -> usize {
        self.next_id
    }
}

fn number(raw: RawNode, next_id: &mut NodeId) -> Rc<Node> {
    let RawNode(tag, attrs, children) = raw;
    let id = *next_id;
    *next_id += 1;
    let children = children
        .into_iter()
        .map(|child| number(child, next_id))
        .collect();
    let kind = tag.parse().unwrap_or_else(|never| match never {});
    Rc::new(Node {
        id,
        kind,
        attrs,
        children,
    })
}
