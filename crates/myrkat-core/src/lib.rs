//! Myrkat core
//!
//! Embedded document store and its event-mediated request/reply transport,
//! plus the plugin registry of the Myrkat note-taking shell.
//!
//! ```text
//! caller ──publish/request──▶ EventBus ──storage:request──▶ StorageService
//!                                                             │
//!                                     CollectionStore ◀───────┘
//!                                        │  MutationLanes (one FIFO lane per collection)
//!                                        ▼
//!                                  CollectionBackend (FileBackend / MemoryBackend)
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use myrkat_config::MyrkatConfig;
//! use myrkat_core::{AppContext, WhereClause};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let context = AppContext::bootstrap(&MyrkatConfig::default()).await?;
//! let notes = context.client().find("notes", WhereClause::all()).await?;
//! println!("{} notes", notes.len());
//! context.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod document;
pub mod events;
pub mod notes;
pub mod plugins;
pub mod service;
pub mod storage;

pub use context::AppContext;
pub use document::{Document, DocumentInput, Fields, InsertOutput, WhereClause};
pub use events::{BusError, EventBus, Notification, PublishReport, SubscriptionId};
pub use notes::{build_note_tree, Note, NoteTree, NotesController, NotesError};
pub use plugins::{PluginDescriptor, PluginError, PluginRegistry};
pub use service::{ClientError, StorageClient, StorageRequest, StorageService};
pub use storage::{CollectionStore, StorageError, StorageResult};
