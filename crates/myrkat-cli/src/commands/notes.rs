use anyhow::{bail, Context, Result};
use myrkat_core::{AppContext, NoteTree};

use super::to_pretty;
use crate::cli::NoteCommands;

/// Render the note hierarchy, two spaces per level.
pub async fn tree(context: &AppContext) -> Result<String> {
    let roots = context
        .notes()
        .tree()
        .await
        .context("Failed to load notes")?;

    let mut lines = Vec::new();
    for root in &roots {
        render(root, 0, &mut lines);
    }
    Ok(lines.join("\n"))
}

fn render(node: &NoteTree, depth: usize, lines: &mut Vec<String>) {
    let title = if node.note.title.is_empty() {
        "(untitled)"
    } else {
        node.note.title.as_str()
    };
    lines.push(format!("{}- {} [{}]", "  ".repeat(depth), title, node.note.id));
    for child in &node.children {
        render(child, depth + 1, lines);
    }
}

pub async fn execute(context: &AppContext, command: NoteCommands) -> Result<String> {
    let notes = context.notes();

    match command {
        NoteCommands::New { parent, title } => {
            if let Some(parent) = parent.as_deref() {
                if notes.get(parent).await?.is_none() {
                    bail!("Parent note '{}' does not exist", parent);
                }
            }

            let mut note = notes
                .create(parent.as_deref())
                .await
                .context("Failed to create note")?;
            if let Some(title) = title {
                if let Some(renamed) = notes.rename(&note.id, &title).await? {
                    note = renamed;
                }
            }
            to_pretty(&note)
        }
        NoteCommands::Rename { id, title } => match notes.rename(&id, &title).await? {
            Some(note) => to_pretty(&note),
            None => Ok(format!("Note '{}' unchanged", id)),
        },
        NoteCommands::Rm { id } => {
            if notes.remove(&id).await? {
                Ok(format!("Deleted note '{}'", id))
            } else {
                bail!("Note '{}' does not exist", id)
            }
        }
    }
}
