//! Containment queries over the parent-pointer forest.
//!
//! Nodes are addressed by id through an index built once per snapshot; no
//! query holds on to a node between calls, so a fresh [`Hierarchy`] is
//! built whenever the editing surface hands in a new collection.

use std::collections::{HashMap, HashSet};

use crate::ir::Node;

#[derive(Debug, Clone)]
pub struct Hierarchy<'a> {
    nodes: &'a [Node],
    index: HashMap<&'a str, usize>,
}

impl<'a> Hierarchy<'a> {
    pub fn new(nodes: &'a [Node]) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        for (idx, node) in nodes.iter().enumerate() {
            // First occurrence wins on duplicate ids.
            index.entry(node.id.as_str()).or_insert(idx);
        }
        Self { nodes, index }
    }

    pub fn nodes(&self) -> &'a [Node] {
        self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&'a Node> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Parent id, only if the parent exists in the collection.
    pub fn parent_of(&self, id: &str) -> Option<&'a str> {
        let node = self.node(id)?;
        let parent = node.parent_id.as_deref()?;
        self.node(parent).map(|parent| parent.id.as_str())
    }

    /// Ancestors of `id`, nearest first. Empty for root-level or unknown
    /// nodes. The walk stops at a dangling parent or a repeated id.
    pub fn ancestor_chain(&self, id: &str) -> Vec<&'a str> {
        let mut chain = Vec::new();
        let Some(start) = self.node(id) else {
            return chain;
        };
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(start.id.as_str());
        let mut current = start.id.as_str();
        while let Some(parent) = self.parent_of(current) {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Nesting depth; root-level nodes have depth 0.
    pub fn depth(&self, id: &str) -> usize {
        self.ancestor_chain(id).len()
    }

    pub fn containing_boundary(&self, id: &str) -> Option<&'a str> {
        self.ancestor_chain(id).first().copied()
    }

    /// True when both nodes share the same immediate container, including
    /// both being root-level.
    pub fn are_siblings_of_same_boundary(&self, a: &str, b: &str) -> bool {
        self.containing_boundary(a) == self.containing_boundary(b)
    }

    /// Deepest ancestor shared by both chains.
    pub fn common_ancestor(&self, a: &str, b: &str) -> Option<&'a str> {
        let chain_b: HashSet<&str> = self.ancestor_chain(b).into_iter().collect();
        self.ancestor_chain(a)
            .into_iter()
            .find(|candidate| chain_b.contains(candidate))
    }

    pub fn is_ancestor_of(&self, ancestor: &str, id: &str) -> bool {
        self.ancestor_chain(id).contains(&ancestor)
    }

    /// Direct children of `parent` (root-level nodes for `None`), in
    /// collection order.
    pub fn children_of(&self, parent: Option<&str>) -> Vec<&'a Node> {
        self.nodes
            .iter()
            .filter(|node| {
                let own = self.parent_of(&node.id);
                match parent {
                    Some(parent) => own == Some(parent),
                    None => own.is_none(),
                }
            })
            .collect()
    }

    /// Every node below `id`, in collection order.
    pub fn descendants_of(&self, id: &str) -> Vec<&'a str> {
        self.nodes
            .iter()
            .filter(|node| node.id != id && self.is_ancestor_of(id, &node.id))
            .map(|node| node.id.as_str())
            .collect()
    }
}
