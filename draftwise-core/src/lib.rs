//! # draftwise-core
//!
//! Editor engine for structured rich-text documents.
//!
//! This crate provides the schema registry, the immutable document tree,
//! step-based transactions with undo/redo, the command layer, the editor
//! instance that hosts AI generations, and the HTML, Markdown and JSON
//! codecs.

pub mod commands;
pub mod config;
pub mod editor;
pub mod error;
pub mod format;
pub mod history;
pub mod model;
pub mod schema;
pub mod selection;
pub mod transaction;
pub mod transform;

pub use commands::{Chain, Command, Content};
pub use config::{AiConfig, Config, ExportConfig, HistoryConfig, OutputFormat};
pub use editor::{Editor, EditorState, GenerationSnapshot};
pub use error::{EditorError, ImportParseError, Result, SchemaError};
pub use format::{Export, Metadata};
pub use history::{History, HistoryEntry};
pub use model::{Document, Fragment, Mark, Node, ResolvedPos, Slice};
pub use schema::{standard, Attrs, MarkSpec, NodeSpec, Schema, SchemaBuilder, AI_GENERATION};
pub use selection::Selection;
pub use transaction::{Commit, Transaction};
pub use transform::{Mapping, Step};

pub use draftwise_types::{FormatKind, GenerationId, OperationKind};
