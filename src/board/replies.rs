//! Reply forest reconstruction from a flat parent-pointer list.
//!
//! Replies arrive as a flat list where each entry may name a parent reply.
//! The tree is rebuilt with an arena of indices: one pass maps ids to positions,
//! a second wires every reply to its parent (or to the root level), and the
//! nested nodes are then assembled bottom-up without recursion. Sibling order
//! at every level is the order the replies arrived in.

use std::collections::HashMap;

use serde::Serialize;

use super::{Id, Reply};

/// A reply with its nested answers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyNode {
    #[serde(flatten)]
    pub reply: Reply,
    pub children: Vec<ReplyNode>,
    /// Pre-computed count of all descendants (cached during tree construction)
    #[serde(skip)]
    pub descendant_count: usize,
}

// Deep reply chains would otherwise recurse once per level on drop
impl Drop for ReplyNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

/// Reply flattened for non-recursive rendering.
#[derive(Debug, Clone, Serialize)]
pub struct FlatReply<'a> {
    pub reply: &'a Reply,
    pub depth: usize,
    /// Depth capped for display
    pub indent: usize,
    pub descendant_count: usize,
}

/// Nested replies for one message.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplyTree {
    pub roots: Vec<ReplyNode>,
    #[serde(skip)]
    len: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unseen,
    Walking,
    Done,
}

/// Build the reply forest.
///
/// Replies whose parent id is not in the set become roots. A reply that is
/// its own ancestor through parent ids cannot hang off a root, so each such
/// cycle is cut at its member that arrived first, which then becomes a root.
/// Every input reply ends up as exactly one node.
pub fn build_tree(replies: Vec<Reply>) -> Vec<ReplyNode> {
    let n = replies.len();

    let mut parent: Vec<Option<usize>> = {
        // First occurrence wins for duplicate ids
        let mut index: HashMap<&Id, usize> = HashMap::with_capacity(n);
        for (i, reply) in replies.iter().enumerate() {
            index.entry(&reply.id).or_insert(i);
        }

        replies
            .iter()
            .map(|reply| reply.parent_id.as_ref().and_then(|p| index.get(p).copied()))
            .collect()
    };

    let orphans = replies
        .iter()
        .zip(&parent)
        .filter(|(reply, resolved)| reply.parent_id.is_some() && resolved.is_none())
        .count();
    if orphans > 0 {
        tracing::debug!(orphans, "Replies with unknown parent promoted to root");
    }

    break_cycles(&mut parent);

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots: Vec<usize> = Vec::new();
    for (i, p) in parent.iter().enumerate() {
        match p {
            Some(p) => children[*p].push(i),
            None => roots.push(i),
        }
    }

    // Post-order over the forest so children are assembled before their parents
    let mut order = Vec::with_capacity(n);
    let mut stack: Vec<(usize, bool)> = roots.iter().rev().map(|&r| (r, false)).collect();
    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            order.push(node);
            continue;
        }
        stack.push((node, true));
        for &child in children[node].iter().rev() {
            stack.push((child, false));
        }
    }

    let mut slots: Vec<Option<Reply>> = replies.into_iter().map(Some).collect();
    let mut built: Vec<Option<ReplyNode>> = (0..n).map(|_| None).collect();
    for node in order {
        let kids: Vec<ReplyNode> = children[node]
            .iter()
            .filter_map(|&c| built[c].take())
            .collect();
        let descendant_count = kids.iter().map(|k| 1 + k.descendant_count).sum();

        if let Some(reply) = slots[node].take() {
            built[node] = Some(ReplyNode {
                reply,
                children: kids,
                descendant_count,
            });
        }
    }

    roots.iter().filter_map(|&r| built[r].take()).collect()
}

/// Detach one member of every parent-pointer cycle so each reply reaches a root.
fn break_cycles(parent: &mut [Option<usize>]) {
    let mut marks = vec![Mark::Unseen; parent.len()];

    for start in 0..parent.len() {
        if marks[start] != Mark::Unseen {
            continue;
        }

        let mut path = Vec::new();
        let mut current = start;
        loop {
            match marks[current] {
                Mark::Done => break,
                Mark::Walking => {
                    // Walked back into our own path: everything from `current` on is a cycle
                    let cycle_start = path.iter().position(|&p| p == current).unwrap_or(0);
                    if let Some(&head) = path[cycle_start..].iter().min() {
                        tracing::debug!(position = head, "Reply cycle cut");
                        parent[head] = None;
                    }
                    break;
                }
                Mark::Unseen => {
                    marks[current] = Mark::Walking;
                    path.push(current);
                    match parent[current] {
                        Some(p) => current = p,
                        None => break,
                    }
                }
            }
        }

        for node in path {
            marks[node] = Mark::Done;
        }
    }
}

impl ReplyTree {
    pub fn build(replies: Vec<Reply>) -> Self {
        let len = replies.len();
        Self {
            roots: build_tree(replies),
            len,
        }
    }

    pub fn roots(&self) -> &[ReplyNode] {
        &self.roots
    }

    /// Total number of replies in the forest
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Find a reply anywhere in the forest.
    /// Uses iteration instead of recursion to avoid stack overflow.
    pub fn find(&self, id: &Id) -> Option<&ReplyNode> {
        let mut stack: Vec<&ReplyNode> = self.roots.iter().collect();
        while let Some(node) = stack.pop() {
            if &node.reply.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter());
        }
        None
    }

    /// Flatten the forest in display order (pre-order, siblings in arrival order).
    pub fn flatten(&self, indent_cap: usize) -> Vec<FlatReply<'_>> {
        let mut result = Vec::with_capacity(self.len);
        // Stack of (node, depth)
        let mut stack: Vec<(&ReplyNode, usize)> = self.roots.iter().rev().map(|n| (n, 0)).collect();

        while let Some((node, depth)) = stack.pop() {
            result.push(FlatReply {
                reply: &node.reply,
                depth,
                indent: depth.min(indent_cap),
                descendant_count: node.descendant_count,
            });

            // Add children in reverse order so they're processed in correct order
            for child in node.children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }

        result
    }
}
