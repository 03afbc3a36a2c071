//! Format codecs: HTML, Markdown and portable JSON.
//!
//! Import turns serialized input into a validated [`Document`]; any failure
//! is reported as an [`ImportParseError`] and nothing else is touched.
//! Export always works on a copy of the document with transient nodes
//! (the AI generation placeholder) removed.

pub mod html;
pub mod json;
pub mod markdown;

use crate::config::ExportConfig;
use crate::error::{EditorError, ImportParseError, Result};
use crate::model::{Document, Fragment, Mark, Node};
use crate::schema::{NodeType, Schema};
use chrono::{DateTime, Utc};
use draftwise_types::FormatKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Document metadata carried by Markdown front matter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Metadata {
    pub fn new(title: Option<String>, description: Option<String>) -> Self {
        let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        Self {
            title: non_empty(title),
            description: non_empty(description),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

/// A serialized document ready to be written out.
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub extension: &'static str,
    pub file_name: String,
}

/// Parse `input` as `kind` against `schema`.
pub fn import(schema: &Arc<Schema>, kind: FormatKind, input: &[u8]) -> Result<(Document, Metadata)> {
    let text = std::str::from_utf8(input)
        .map_err(|e| ImportParseError::new(kind, format!("input is not valid UTF-8: {e}")))?;
    let parsed = match kind {
        FormatKind::Html => html::parse(schema, text).map(|root| (root, Metadata::default())),
        FormatKind::Markdown => markdown::parse(schema, text),
        FormatKind::Json => json::parse(schema, text).map(|root| (root, Metadata::default())),
    };
    let (root, metadata) = parsed.map_err(|e| into_import_error(kind, e))?;
    let root = strip_transient(schema, &root).map_err(|e| into_import_error(kind, e))?;
    let doc = Document::new(schema.clone(), root).map_err(|e| into_import_error(kind, e))?;
    debug!(format = %kind, size = doc.size(), "document imported");
    Ok((doc, metadata))
}

/// Serialize a document. Transient nodes are left out.
pub fn export(
    doc: &Document,
    kind: FormatKind,
    metadata: &Metadata,
    config: &ExportConfig,
) -> Result<Export> {
    let root = strip_transient(doc.schema(), doc.root())?;
    let body = match kind {
        FormatKind::Html => html::serialize(&root),
        FormatKind::Markdown => {
            let mut out = markdown::metadata_header(metadata);
            out.push_str(&markdown::serialize(&root));
            out
        }
        FormatKind::Json => json::to_string(&root, config.pretty_json)?,
    };
    debug!(format = %kind, bytes = body.len(), "document exported");
    Ok(Export {
        bytes: body.into_bytes(),
        mime: kind.mime(),
        extension: kind.extension(),
        file_name: default_file_name(kind, Utc::now()),
    })
}

/// `2024-05-01-09-30-00.md` style name for an export made at `at`.
pub fn default_file_name(kind: FormatKind, at: DateTime<Utc>) -> String {
    format!("{}{}", at.format("%Y-%m-%d-%H-%M-%S"), kind.extension())
}

fn into_import_error(kind: FormatKind, err: EditorError) -> EditorError {
    match err {
        EditorError::Import(_) => err,
        other => ImportParseError::new(kind, other.to_string()).into(),
    }
}

/// Remove every transient node. A parent left with content it cannot hold
/// (a `doc` or list item emptied by the removal) is refilled with the
/// minimal content its type requires.
pub fn strip_transient(schema: &Schema, node: &Node) -> Result<Node> {
    if node.is_leaf() || node.is_text() {
        return Ok(node.clone());
    }
    let mut changed = false;
    let mut children = Vec::with_capacity(node.child_count());
    for child in node.content().iter() {
        if child.node_type().is_transient() {
            changed = true;
            continue;
        }
        let stripped = strip_transient(schema, child)?;
        changed |= stripped != *child;
        children.push(stripped);
    }
    if !changed {
        return Ok(node.clone());
    }
    let content = Fragment::from_vec(children);
    if node.node_type().valid_content(&content) {
        return Ok(node.copy(content));
    }
    if content.is_empty() {
        let filled = schema.create_and_fill(node.type_name())?;
        return Ok(node.copy(filled.content().clone()));
    }
    node.node_type().check_content(&content)?;
    Ok(node.copy(content))
}

/// A run of inline content collected by a parser before it is turned into
/// nodes.
#[derive(Debug, Clone)]
pub(crate) enum Piece {
    Text(String, Vec<Mark>),
    Node(Node),
}

/// Build the inline children of a `parent` node, dropping marks it does
/// not allow.
pub(crate) fn inline_nodes(schema: &Schema, parent: &NodeType, pieces: Vec<Piece>) -> Result<Fragment> {
    let mut nodes = Vec::with_capacity(pieces.len());
    for piece in pieces {
        match piece {
            Piece::Text(text, _) if text.is_empty() => {}
            Piece::Text(text, marks) => {
                let marks = marks
                    .into_iter()
                    .filter(|m| parent.allows_mark_type(m.mark_type()))
                    .collect();
                nodes.push(schema.text(&text, marks)?);
            }
            Piece::Node(node) => {
                let marks = node
                    .marks()
                    .iter()
                    .filter(|m| parent.allows_mark_type(m.mark_type()))
                    .cloned()
                    .collect();
                nodes.push(node.with_marks(marks));
            }
        }
    }
    Ok(Fragment::from_vec(nodes))
}

/// A list item's content must open with a paragraph.
pub(crate) fn list_item(schema: &Schema, mut blocks: Vec<Node>) -> Result<Node> {
    let paragraph = schema.default_textblock()?.name().to_string();
    if blocks.first().map_or(true, |b| b.type_name() != paragraph) {
        blocks.insert(0, schema.node_with_defaults(&paragraph, Fragment::empty())?);
    }
    schema.node_with_defaults("listItem", Fragment::from_vec(blocks))
}

/// Blocks for a container that needs at least one child.
pub(crate) fn non_empty_blocks(schema: &Schema, blocks: Vec<Node>) -> Result<Fragment> {
    if blocks.is_empty() {
        let paragraph = schema.default_textblock()?.name().to_string();
        return Ok(Fragment::from(schema.node_with_defaults(&paragraph, Fragment::empty())?));
    }
    Ok(Fragment::from_vec(blocks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::*;
    use crate::schema::{standard, Attrs, AI_GENERATION};
    use serde_json::json;

    fn placeholder() -> Node {
        let mut attrs = Attrs::new();
        attrs.insert("text".into(), json!("Hello wor"));
        standard()
            .node(AI_GENERATION, attrs, Fragment::empty(), vec![])
            .unwrap()
    }

    fn document(root: Node) -> Document {
        Document::new(standard(), root).unwrap()
    }

    #[test]
    fn test_strip_transient_removes_placeholder() {
        let root = doc(vec![p("a"), placeholder(), p("b")]);
        let stripped = strip_transient(&standard(), &root).unwrap();
        assert_eq!(stripped, doc(vec![p("a"), p("b")]));
    }

    #[test]
    fn test_strip_transient_refills_empty_doc() {
        let root = doc(vec![placeholder()]);
        let stripped = strip_transient(&standard(), &root).unwrap();
        assert_eq!(stripped, doc(vec![p("")]));
    }

    #[test]
    fn test_export_never_contains_placeholder() {
        let d = document(doc(vec![p("keep"), placeholder()]));
        for kind in FormatKind::ALL {
            let export = export(&d, kind, &Metadata::default(), &ExportConfig::default()).unwrap();
            let text = String::from_utf8(export.bytes).unwrap();
            assert!(!text.contains(AI_GENERATION), "{kind} export leaked: {text}");
            assert!(!text.contains("ai-generation"), "{kind} export leaked: {text}");
            assert!(!text.contains("Hello wor"), "{kind} export leaked: {text}");
            assert!(text.contains("keep"));
        }
    }

    #[test]
    fn test_export_file_name_and_mime() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(default_file_name(FormatKind::Markdown, at), "2024-05-01-09-30-00.md");

        let d = document(doc(vec![p("x")]));
        let export = export(&d, FormatKind::Json, &Metadata::default(), &ExportConfig::default()).unwrap();
        assert_eq!(export.mime, "application/json");
        assert_eq!(export.extension, ".json");
        assert!(export.file_name.ends_with(".json"));
    }

    #[test]
    fn test_import_failure_is_parse_error() {
        let err = import(&standard(), FormatKind::Json, b"{\"type\": \"doc\", \"content\": [").unwrap_err();
        assert!(matches!(err, EditorError::Import(ImportParseError { format: FormatKind::Json, .. })));

        let bad_content = br#"{"type": "doc", "content": [{"type": "listItem"}]}"#;
        let err = import(&standard(), FormatKind::Json, bad_content).unwrap_err();
        assert!(matches!(err, EditorError::Import(_)));

        let err = import(&standard(), FormatKind::Html, &[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, EditorError::Import(_)));
    }

    #[test]
    fn test_import_drops_placeholders() {
        let input = br#"{"type":"doc","content":[{"type":"aiGeneration","attrs":{"text":"x","operationKind":"generate"}}]}"#;
        let (d, _) = import(&standard(), FormatKind::Json, input).unwrap();
        assert_eq!(d.root(), &doc(vec![p("")]));
    }

    #[test]
    fn test_metadata_ignores_blank_fields() {
        let metadata = Metadata::new(Some("  ".into()), Some("About".into()));
        assert_eq!(metadata.title, None);
        assert_eq!(metadata.description.as_deref(), Some("About"));
        assert!(Metadata::default().is_empty());
    }
}
