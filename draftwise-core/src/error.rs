//! Error types for the editor engine.

use draftwise_types::{FormatKind, GenerationId};

/// Errors raised while declaring or validating against a schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Duplicate type name: {0}")]
    DuplicateType(String),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Unknown mark type: {0}")]
    UnknownMarkType(String),

    #[error("Invalid content expression {expr:?}: {message}")]
    InvalidContentExpr { expr: String, message: String },

    #[error("Missing required attribute {attr:?} on {type_name}")]
    MissingAttribute { type_name: String, attr: String },

    #[error("Unknown attribute {attr:?} on {type_name}")]
    UnknownAttribute { type_name: String, attr: String },

    #[error("Schema has no {0} type")]
    MissingRequiredType(&'static str),
}

/// Failure to turn serialized input into a document.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Failed to import {format} document: {message}")]
pub struct ImportParseError {
    pub format: FormatKind,
    pub message: String,
}

impl ImportParseError {
    pub fn new(format: FormatKind, message: impl Into<String>) -> Self {
        Self {
            format,
            message: message.into(),
        }
    }
}

/// Errors that can occur while reading or mutating a document
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditorError {
    #[error("Content violation in {type_name}: {message}")]
    ContentViolation { type_name: String, message: String },

    #[error("Position {pos} falls inside an atomic node")]
    AtomicBoundary { pos: usize },

    #[error("Position {pos} out of range (document size {size})")]
    OutOfRange { pos: usize, size: usize },

    #[error("Invalid step: {0}")]
    InvalidStep(String),

    #[error("An AI operation is already in progress ({0})")]
    OperationInProgress(GenerationId),

    #[error("No active generation with id {0}")]
    UnknownGeneration(GenerationId),

    #[error("The in-progress generation placeholder can only be removed by its pipeline")]
    PlaceholderLocked,

    #[error("Failed to export {format} document: {message}")]
    Export { format: FormatKind, message: String },

    #[error(transparent)]
    Import(#[from] ImportParseError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl EditorError {
    pub(crate) fn violation(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        EditorError::ContentViolation {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Errors that indicate a caller bug rather than bad input.
    pub fn is_programming_error(&self) -> bool {
        matches!(self, EditorError::OutOfRange { .. })
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;
