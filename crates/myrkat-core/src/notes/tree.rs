//! Parent/child note hierarchy
//!
//! Roots are notes with no parent, a parent missing from the list, or
//! themselves as parent. Notes whose ancestry loops never reach a root; the
//! first of them in list order is promoted to a root, and so on until every
//! note has been placed exactly once.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::warn;

use super::model::Note;

/// A note and its children, in list order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteTree {
    #[serde(flatten)]
    pub note: Note,
    pub children: Vec<NoteTree>,
}

impl NoteTree {
    /// Notes in this subtree, including this one
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(NoteTree::size).sum::<usize>()
    }

    /// Depth-first search by id
    pub fn find(&self, id: &str) -> Option<&NoteTree> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.note.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }
}

fn index_by_id(notes: &[Note]) -> HashMap<&str, usize> {
    let mut index = HashMap::with_capacity(notes.len());
    for (position, note) in notes.iter().enumerate() {
        index.entry(note.id.as_str()).or_insert(position);
    }
    index
}

/// Iterative preorder walk from `root`, recording which children each node adopts.
fn walk(
    root: usize,
    children: &[Vec<usize>],
    visited: &mut [bool],
    tree_children: &mut [Vec<usize>],
    preorder: &mut Vec<usize>,
) {
    visited[root] = true;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        preorder.push(node);

        let mut adopted = Vec::new();
        for &child in &children[node] {
            if !visited[child] {
                visited[child] = true;
                adopted.push(child);
            }
        }
        stack.extend(adopted.iter().rev());
        tree_children[node] = adopted;
    }
}

/// Build the note forest.
pub fn build_note_tree(notes: &[Note]) -> Vec<NoteTree> {
    let index = index_by_id(notes);

    let parent_of: Vec<Option<usize>> = notes
        .iter()
        .enumerate()
        .map(|(position, note)| {
            note.parent()
                .and_then(|parent| index.get(parent).copied())
                .filter(|&parent| parent != position)
        })
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); notes.len()];
    for (position, parent) in parent_of.iter().enumerate() {
        if let Some(parent) = parent {
            children[*parent].push(position);
        }
    }

    let mut visited = vec![false; notes.len()];
    let mut tree_children: Vec<Vec<usize>> = vec![Vec::new(); notes.len()];
    let mut preorder = Vec::with_capacity(notes.len());
    let mut roots = Vec::new();

    for position in 0..notes.len() {
        if parent_of[position].is_none() {
            roots.push(position);
            walk(position, &children, &mut visited, &mut tree_children, &mut preorder);
        }
    }

    for position in 0..notes.len() {
        if !visited[position] {
            warn!(
                "Note '{}' is part of a parent cycle; showing it as a root",
                notes[position].id
            );
            roots.push(position);
            walk(position, &children, &mut visited, &mut tree_children, &mut preorder);
        }
    }

    // Children always follow their parent in preorder, so build back to front.
    let mut built: Vec<Option<NoteTree>> = vec![None; notes.len()];
    for &node in preorder.iter().rev() {
        let subtrees = tree_children[node]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        built[node] = Some(NoteTree {
            note: notes[node].clone(),
            children: subtrees,
        });
    }

    roots
        .into_iter()
        .filter_map(|root| built[root].take())
        .collect()
}

/// Ids of `id`'s ancestors, nearest first. Stops at a root, a missing parent or a cycle.
pub fn ancestor_ids(notes: &[Note], id: &str) -> Vec<String> {
    let index = index_by_id(notes);
    let mut seen = HashSet::new();
    let mut ancestors = Vec::new();

    let mut current = index.get(id).copied();
    seen.insert(id.to_string());
    while let Some(position) = current {
        let Some(parent) = notes[position].parent() else {
            break;
        };
        if !seen.insert(parent.to_string()) {
            break;
        }
        match index.get(parent) {
            Some(&next) => {
                ancestors.push(parent.to_string());
                current = Some(next);
            }
            None => break,
        }
    }
    ancestors
}
