//! Notes: the data behind the built-in notes plugin

pub mod controller;
pub mod model;
pub mod tree;

pub use controller::{NotesController, NotesError, NotesResult, SelectionTracker};
pub use model::Note;
pub use tree::{ancestor_ids, build_note_tree, NoteTree};
