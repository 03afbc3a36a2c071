use super::Command;
use crate::editor::EditorState;
use crate::error::{EditorError, Result};
use crate::format::{html, json, markdown};
use crate::model::{Fragment, Node};
use crate::schema::{Attrs, Schema};
use crate::selection::Selection;
use crate::transaction::Transaction;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

static YOUTUBE_URL: OnceLock<Regex> = OnceLock::new();

fn youtube_url() -> &'static Regex {
    YOUTUBE_URL.get_or_init(|| {
        Regex::new(r"^(https?://)?(www\.)?(youtube\.com|youtu\.be)/.+").unwrap()
    })
}

/// Content accepted by the insert commands. Serialized forms are parsed
/// against the editor's schema when the command is built.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Nodes(Fragment),
    /// Plain text. More than one line becomes one paragraph per line.
    Text(String),
    Html(String),
    Markdown(String),
    /// Portable JSON: a node, an array of nodes or a whole document.
    Json(Value),
}

impl Content {
    pub fn to_fragment(&self, schema: &Schema) -> Result<Fragment> {
        match self {
            Content::Nodes(fragment) => {
                for node in fragment.iter() {
                    schema.validate(node)?;
                }
                Ok(fragment.clone())
            }
            Content::Text(text) => text_fragment(schema, text),
            Content::Html(source) => Ok(open_single_textblock(
                schema,
                html::parse_fragment(schema, source)?,
            )),
            Content::Markdown(source) => Ok(open_single_textblock(
                schema,
                markdown::parse_fragment(schema, source)?,
            )),
            Content::Json(value) => json::fragment_from_value(schema, value),
        }
    }
}

impl From<Fragment> for Content {
    fn from(fragment: Fragment) -> Self {
        Content::Nodes(fragment)
    }
}

impl From<Node> for Content {
    fn from(node: Node) -> Self {
        Content::Nodes(Fragment::from(node))
    }
}

impl From<Vec<Node>> for Content {
    fn from(nodes: Vec<Node>) -> Self {
        Content::Nodes(Fragment::from_vec(nodes))
    }
}

fn text_fragment(schema: &Schema, text: &str) -> Result<Fragment> {
    if !text.contains('\n') {
        if text.is_empty() {
            return Ok(Fragment::empty());
        }
        return Ok(Fragment::from(schema.text(text, vec![])?));
    }
    let paragraph = schema.default_textblock()?.name().to_string();
    let blocks = text
        .lines()
        .map(|line| {
            let content = if line.is_empty() {
                Fragment::empty()
            } else {
                Fragment::from(schema.text(line, vec![])?)
            };
            schema.node_with_defaults(&paragraph, content)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Fragment::from_vec(blocks))
}

/// A lone paragraph is inserted as its inline content so that it flows
/// into the textblock at the insertion point.
fn open_single_textblock(schema: &Schema, fragment: Fragment) -> Fragment {
    let default = schema.default_textblock().ok().map(|t| t.name().to_string());
    match (fragment.child_count(), fragment.first_child()) {
        (1, Some(only)) if Some(only.type_name()) == default.as_deref() => only.content().clone(),
        _ => fragment,
    }
}

/// Content that does not fit the target turns the command into a no-op.
fn fits<T>(result: Result<T>) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(EditorError::ContentViolation { .. } | EditorError::AtomicBoundary { .. }) => Ok(false),
        Err(err) => Err(err),
    }
}

/// Delete a range given in base coordinates. When the two ends sit at
/// different depths the range is cleared in three parts instead: the tail
/// of the first textblock, the whole blocks in between and the head of the
/// last textblock. Returns `false` when neither works.
fn delete_range(tr: &mut Transaction, from: usize, to: usize) -> Result<bool> {
    let mut attempt = tr.clone();
    match attempt.delete(from, to) {
        Ok(_) => {
            *tr = attempt;
            return Ok(true);
        }
        Err(EditorError::ContentViolation { .. } | EditorError::InvalidStep(_)) => {}
        Err(err) => return Err(err),
    }
    if clear_parent(tr, from, to)? {
        return Ok(true);
    }

    let base = tr.base().root().clone();
    let rfrom = base.resolve(from)?;
    let rto = base.resolve(to)?;
    let shared = rfrom.shared_depth(to);
    let mut attempt = tr.clone();
    let outcome = (|| -> Result<()> {
        if rto.parent().is_textblock() {
            attempt.delete(rto.start(rto.depth()), to)?;
        }
        if rfrom.depth() > shared && rto.depth() > shared {
            let between_from = rfrom.after(shared + 1)?;
            let between_to = rto.before(shared + 1)?;
            if between_from < between_to {
                attempt.delete(between_from, between_to)?;
            }
        }
        if rfrom.parent().is_textblock() {
            attempt.delete(from, rfrom.end(rfrom.depth()))?;
        }
        Ok(())
    })();
    match outcome {
        Ok(()) => {
            *tr = attempt;
            Ok(true)
        }
        Err(EditorError::ContentViolation { .. } | EditorError::InvalidStep(_)) => Ok(false),
        Err(err) => Err(err),
    }
}

/// A range spanning the whole content of a node that cannot be empty is
/// replaced by that node's minimal fill, so clearing the document leaves a
/// single empty paragraph.
fn clear_parent(tr: &mut Transaction, from: usize, to: usize) -> Result<bool> {
    let base = tr.base().root().clone();
    let rfrom = base.resolve(from)?;
    let depth = rfrom.shared_depth(to);
    if from != rfrom.start(depth) || to != rfrom.end(depth) {
        return Ok(false);
    }
    let schema = tr.base().schema().clone();
    let filled = match schema.create_and_fill(rfrom.node(depth).type_name()) {
        Ok(filled) => filled,
        Err(EditorError::ContentViolation { .. }) => return Ok(false),
        Err(err) => return Err(err),
    };
    if filled.content().is_empty() {
        return Ok(false);
    }
    let mut attempt = tr.clone();
    if !fits(attempt.replace_with(from, to, filled.content().clone()))? {
        return Ok(false);
    }
    *tr = attempt;
    Ok(true)
}

fn insert_content(
    state: &EditorState,
    from: usize,
    to: usize,
    content: &Content,
) -> Result<Option<Transaction>> {
    let fragment = content.to_fragment(state.schema())?;
    if fragment.is_empty() && from == to {
        return Ok(None);
    }
    let mut tr = state.tr();
    if !fits(tr.replace_with(from, to, fragment))? {
        return Ok(None);
    }
    let end = tr.map(to, 1)?;
    tr.set_selection(Selection::caret(end))?;
    Ok(Some(tr))
}

fn insert_node(state: &EditorState, type_name: &str, attrs: Attrs) -> Result<Option<Transaction>> {
    let node = state.schema().node(type_name, attrs, Fragment::empty(), vec![])?;
    let sel = state.selection();
    insert_content(state, sel.from(), sel.to(), &Content::from(node))
}

/// Replace `from..to` (a caret when equal) with content and put the caret
/// after it.
pub struct InsertContentAt {
    from: usize,
    to: usize,
    content: Content,
}

impl InsertContentAt {
    pub fn new(pos: usize, content: impl Into<Content>) -> Self {
        Self::range(pos, pos, content)
    }

    pub fn range(from: usize, to: usize, content: impl Into<Content>) -> Self {
        Self {
            from,
            to,
            content: content.into(),
        }
    }
}

impl Command for InsertContentAt {
    fn name(&self) -> &'static str {
        "insertContentAt"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        insert_content(state, self.from, self.to, &self.content)
    }
}

/// Replace the selection with content.
pub struct InsertContent {
    content: Content,
}

impl InsertContent {
    pub fn new(content: impl Into<Content>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl Command for InsertContent {
    fn name(&self) -> &'static str {
        "insertContent"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        let sel = state.selection();
        insert_content(state, sel.from(), sel.to(), &self.content)
    }
}

/// Type text over the selection, or at a fixed position. Typed text takes
/// the marks active at the insertion point.
pub struct InsertText {
    text: String,
    at: Option<usize>,
}

impl InsertText {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            at: None,
        }
    }

    pub fn at(pos: usize, text: &str) -> Self {
        Self {
            text: text.to_string(),
            at: Some(pos),
        }
    }
}

impl Command for InsertText {
    fn name(&self) -> &'static str {
        "insertText"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        if self.text.is_empty() {
            return Ok(None);
        }
        let sel = state.selection();
        let (from, to) = match self.at {
            Some(pos) => (pos, pos),
            None => (sel.from(), sel.to()),
        };
        let mut tr = state.tr();
        if from != to && !delete_range(&mut tr, from, to)? {
            return Ok(None);
        }
        if !fits(tr.insert_text(from, &self.text))? {
            return Ok(None);
        }
        if self.at.is_none() {
            let end = tr.map(to, 1)?;
            tr.set_selection(Selection::caret(end))?;
        }
        Ok(Some(tr))
    }
}

pub struct InsertHorizontalRule;

impl Command for InsertHorizontalRule {
    fn name(&self) -> &'static str {
        "insertHorizontalRule"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        insert_node(state, "horizontalRule", Attrs::new())
    }
}

pub struct InsertImage {
    src: String,
    alt: Option<String>,
    title: Option<String>,
}

impl InsertImage {
    pub fn new(src: &str) -> Self {
        Self {
            src: src.trim().to_string(),
            alt: None,
            title: None,
        }
    }

    pub fn alt(mut self, alt: &str) -> Self {
        self.alt = Some(alt.to_string());
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }
}

impl Command for InsertImage {
    fn name(&self) -> &'static str {
        "insertImage"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        if self.src.is_empty() {
            return Ok(None);
        }
        let mut attrs = Attrs::new();
        attrs.insert("src".into(), json!(self.src));
        if let Some(alt) = &self.alt {
            attrs.insert("alt".into(), json!(alt));
        }
        if let Some(title) = &self.title {
            attrs.insert("title".into(), json!(title));
        }
        insert_node(state, "image", attrs)
    }
}

/// Embed a YouTube video. URLs that do not point at YouTube are refused.
pub struct InsertYoutube {
    src: String,
    width: Option<u32>,
    height: Option<u32>,
    start: Option<u32>,
}

impl InsertYoutube {
    pub fn new(src: &str) -> Self {
        Self {
            src: src.trim().to_string(),
            width: None,
            height: None,
            start: None,
        }
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Start offset in seconds.
    pub fn start(mut self, seconds: u32) -> Self {
        self.start = Some(seconds);
        self
    }
}

impl Command for InsertYoutube {
    fn name(&self) -> &'static str {
        "insertYoutube"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        if !youtube_url().is_match(&self.src) {
            return Ok(None);
        }
        let mut attrs = Attrs::new();
        attrs.insert("src".into(), json!(self.src));
        for (key, value) in [("width", self.width), ("height", self.height), ("start", self.start)] {
            if let Some(value) = value {
                attrs.insert(key.into(), json!(value));
            }
        }
        insert_node(state, "youtube", attrs)
    }
}

pub struct InsertIframe {
    src: String,
    width: Option<String>,
    height: Option<String>,
}

impl InsertIframe {
    pub fn new(src: &str) -> Self {
        Self {
            src: src.trim().to_string(),
            width: None,
            height: None,
        }
    }

    pub fn size(mut self, width: &str, height: &str) -> Self {
        self.width = Some(width.to_string());
        self.height = Some(height.to_string());
        self
    }
}

impl Command for InsertIframe {
    fn name(&self) -> &'static str {
        "insertIframe"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        if self.src.is_empty() {
            return Ok(None);
        }
        let mut attrs = Attrs::new();
        attrs.insert("src".into(), json!(self.src));
        if let Some(width) = &self.width {
            attrs.insert("width".into(), json!(width));
        }
        if let Some(height) = &self.height {
            attrs.insert("height".into(), json!(height));
        }
        insert_node(state, "iframe", attrs)
    }
}

/// Embed a tweet given its id or a status URL.
pub struct InsertTweet {
    id: String,
}

impl InsertTweet {
    pub fn new(id_or_url: &str) -> Self {
        let input = id_or_url.trim();
        let id = match input.split_once("status/") {
            Some((_, rest)) => rest.split('?').next().unwrap_or_default(),
            None => input,
        };
        Self {
            id: id.trim_end_matches('/').to_string(),
        }
    }
}

impl Command for InsertTweet {
    fn name(&self) -> &'static str {
        "insertTweet"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        if self.id.is_empty() {
            return Ok(None);
        }
        let mut attrs = Attrs::new();
        attrs.insert("id".into(), json!(self.id));
        insert_node(state, "tweetEmbed", attrs)
    }
}

/// Insert a mention badge for a handle; a leading `@` is optional.
pub struct InsertMention {
    username: String,
}

impl InsertMention {
    pub fn new(username: &str) -> Self {
        let username = username.trim();
        Self {
            username: username.strip_prefix('@').unwrap_or(username).to_string(),
        }
    }
}

impl Command for InsertMention {
    fn name(&self) -> &'static str {
        "insertMention"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        if self.username.is_empty() {
            return Ok(None);
        }
        let mut attrs = Attrs::new();
        attrs.insert("username".into(), json!(self.username));
        insert_node(state, "twitterBadge", attrs)
    }
}

pub struct DeleteSelection;

impl Command for DeleteSelection {
    fn name(&self) -> &'static str {
        "deleteSelection"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        let sel = state.selection();
        if sel.is_empty() {
            return Ok(None);
        }
        let mut tr = state.tr();
        if !delete_range(&mut tr, sel.from(), sel.to())? {
            return Ok(None);
        }
        let mut caret = tr.map(sel.from(), -1)?;
        if tr.doc().node_at(caret).is_some_and(|n| n.is_textblock()) {
            caret += 1;
        }
        tr.set_selection(Selection::caret(caret))?;
        Ok(tr.doc_changed().then_some(tr))
    }
}

pub struct SelectAll;

impl Command for SelectAll {
    fn name(&self) -> &'static str {
        "selectAll"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        let all = Selection::range(0, state.doc().size());
        if state.selection() == all {
            return Ok(None);
        }
        let mut tr = state.tr();
        tr.set_selection(all)?;
        Ok(Some(tr))
    }
}
