//! Shared types for draftwise
//!
//! This crate provides common types used across the draftwise crates:
//! document format identifiers, the AI operation catalogue and
//! generation identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Serialized document formats understood by import and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Html,
    Markdown,
    Json,
}

impl FormatKind {
    pub const ALL: [FormatKind; 3] = [FormatKind::Html, FormatKind::Markdown, FormatKind::Json];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::Html => "html",
            FormatKind::Markdown => "markdown",
            FormatKind::Json => "json",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "html" | "htm" => Some(FormatKind::Html),
            "markdown" | "md" => Some(FormatKind::Markdown),
            "json" => Some(FormatKind::Json),
            _ => None,
        }
    }

    /// File extension used on export, including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FormatKind::Html => ".html",
            FormatKind::Markdown => ".md",
            FormatKind::Json => ".json",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            FormatKind::Html => "text/html",
            FormatKind::Markdown => "text/markdown",
            FormatKind::Json => "application/json",
        }
    }

    /// Classify a MIME type. Parameters such as `; charset=utf-8` are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "text/html" | "application/xhtml+xml" => Some(FormatKind::Html),
            "text/markdown" | "text/x-markdown" => Some(FormatKind::Markdown),
            "application/json" | "text/json" => Some(FormatKind::Json),
            _ => None,
        }
    }

    /// Classify a file name by its extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_lowercase().as_str() {
            "html" | "htm" => Some(FormatKind::Html),
            "md" | "markdown" => Some(FormatKind::Markdown),
            "json" => Some(FormatKind::Json),
            _ => None,
        }
    }

    /// Classify an uploaded file: the MIME type wins, the extension is the fallback.
    pub fn classify(mime: Option<&str>, file_name: Option<&str>) -> Option<Self> {
        mime.and_then(Self::from_mime)
            .or_else(|| file_name.and_then(Self::from_file_name))
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The AI operations an editor can run against a selection or prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Generate,
    Improve,
    Fix,
    Longer,
    Shorter,
    Summarize,
    ToneFormal,
    ToneCasual,
    Translate,
}

impl OperationKind {
    pub const ALL: [OperationKind; 9] = [
        OperationKind::Generate,
        OperationKind::Improve,
        OperationKind::Fix,
        OperationKind::Longer,
        OperationKind::Shorter,
        OperationKind::Summarize,
        OperationKind::ToneFormal,
        OperationKind::ToneCasual,
        OperationKind::Translate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Generate => "generate",
            OperationKind::Improve => "improve",
            OperationKind::Fix => "fix",
            OperationKind::Longer => "longer",
            OperationKind::Shorter => "shorter",
            OperationKind::Summarize => "summarize",
            OperationKind::ToneFormal => "tone-formal",
            OperationKind::ToneCasual => "tone-casual",
            OperationKind::Translate => "translate",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Progress text shown by the placeholder view while content streams in.
    pub fn progress_label(&self) -> &'static str {
        match self {
            OperationKind::Generate => "Crafting your content...",
            OperationKind::Improve => "Enhancing your text...",
            OperationKind::Fix => "Fixing errors and grammar...",
            OperationKind::Longer => "Expanding your text...",
            OperationKind::Shorter => "Condensing your text...",
            OperationKind::Summarize => "Creating concise version...",
            OperationKind::ToneFormal => "Making your tone more formal...",
            OperationKind::ToneCasual => "Making your tone more casual...",
            OperationKind::Translate => "Converting to new language...",
        }
    }

    /// Whether the operation needs a non-empty selection to work on.
    pub fn requires_selection(&self) -> bool {
        !matches!(self, OperationKind::Generate)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of one AI generation run against an editor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationId(pub uuid::Uuid);

impl GenerationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for GenerationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_takes_precedence_over_extension() {
        let kind = FormatKind::classify(Some("application/json"), Some("notes.md"));
        assert_eq!(kind, Some(FormatKind::Json));
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(
            FormatKind::classify(Some("application/octet-stream"), Some("Post.MD")),
            Some(FormatKind::Markdown)
        );
        assert_eq!(FormatKind::classify(None, Some("index.htm")), Some(FormatKind::Html));
        assert_eq!(FormatKind::classify(None, Some("archive.zip")), None);
        assert_eq!(FormatKind::classify(None, None), None);
    }

    #[test]
    fn test_mime_parameters_ignored() {
        assert_eq!(
            FormatKind::from_mime("text/html; charset=utf-8"),
            Some(FormatKind::Html)
        );
    }

    #[test]
    fn test_operation_kind_names() {
        for kind in OperationKind::ALL {
            assert_eq!(OperationKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(OperationKind::from_str("tone-formal"), Some(OperationKind::ToneFormal));
        assert!(!OperationKind::Generate.requires_selection());
        assert!(OperationKind::Summarize.requires_selection());
    }
}
