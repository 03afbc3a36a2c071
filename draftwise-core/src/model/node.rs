use super::fragment::Fragment;
use super::mark::Mark;
use super::replace::replace;
use super::resolve::ResolvedPos;
use super::slice::Slice;
use crate::error::{EditorError, Result};
use crate::schema::{Attrs, NodeType};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
struct NodeInner {
    node_type: Arc<NodeType>,
    attrs: Attrs,
    content: Fragment,
    marks: Vec<Mark>,
    text: Option<String>,
}

/// A node in the document tree.
///
/// Nodes are immutable values; cloning shares the underlying data, so
/// unchanged subtrees are shared between document versions.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.same_markup(other)
                && self.0.text == other.0.text
                && self.0.content == other.0.content)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wrap_marks = |f: &mut fmt::Formatter<'_>, inner: String| -> fmt::Result {
            let mut out = inner;
            for mark in self.marks().iter().rev() {
                out = format!("{}({out})", mark.type_name());
            }
            f.write_str(&out)
        };
        if let Some(text) = self.text() {
            return wrap_marks(f, format!("{text:?}"));
        }
        let mut out = self.type_name().to_string();
        if self.child_count() > 0 {
            let children: Vec<String> = self.content().iter().map(|c| c.to_string()).collect();
            out = format!("{out}({})", children.join(", "));
        }
        wrap_marks(f, out)
    }
}

impl Node {
    pub(crate) fn new(node_type: Arc<NodeType>, attrs: Attrs, content: Fragment, marks: Vec<Mark>) -> Self {
        Node(Arc::new(NodeInner {
            node_type,
            attrs,
            content,
            marks,
            text: None,
        }))
    }

    pub(crate) fn new_text(node_type: Arc<NodeType>, text: &str, marks: Vec<Mark>) -> Self {
        Node(Arc::new(NodeInner {
            node_type,
            attrs: Attrs::new(),
            content: Fragment::empty(),
            marks,
            text: Some(text.to_string()),
        }))
    }

    pub fn node_type(&self) -> &Arc<NodeType> {
        &self.0.node_type
    }

    pub fn type_name(&self) -> &str {
        self.0.node_type.name()
    }

    pub fn attrs(&self) -> &Attrs {
        &self.0.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.0.attrs.get(name)
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attr(name).and_then(Value::as_str)
    }

    pub fn content(&self) -> &Fragment {
        &self.0.content
    }

    pub fn marks(&self) -> &[Mark] {
        &self.0.marks
    }

    pub fn text(&self) -> Option<&str> {
        self.0.text.as_deref()
    }

    pub fn is_text(&self) -> bool {
        self.0.node_type.is_text()
    }

    pub fn is_inline(&self) -> bool {
        self.0.node_type.is_inline()
    }

    pub fn is_block(&self) -> bool {
        self.0.node_type.is_block()
    }

    pub fn is_textblock(&self) -> bool {
        self.0.node_type.is_textblock()
    }

    pub fn is_leaf(&self) -> bool {
        self.0.node_type.is_leaf()
    }

    pub fn is_atom(&self) -> bool {
        self.0.node_type.is_atom()
    }

    pub fn inline_content(&self) -> bool {
        self.0.node_type.inline_content()
    }

    /// Number of positions this node occupies in its parent.
    pub fn node_size(&self) -> usize {
        match &self.0.text {
            Some(text) => text.chars().count(),
            None if self.is_leaf() => 1,
            None => self.0.content.size() + 2,
        }
    }

    pub fn child_count(&self) -> usize {
        self.0.content.child_count()
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.0.content.child(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.0.content.first_child()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.0.content.last_child()
    }

    pub fn same_markup(&self, other: &Node) -> bool {
        self.has_markup(other.node_type(), other.attrs(), other.marks())
    }

    pub fn has_markup(&self, node_type: &NodeType, attrs: &Attrs, marks: &[Mark]) -> bool {
        self.type_name() == node_type.name() && &self.0.attrs == attrs && self.0.marks == marks
    }

    /// Same type, attributes and marks with new content.
    pub fn copy(&self, content: Fragment) -> Node {
        Node(Arc::new(NodeInner {
            node_type: self.0.node_type.clone(),
            attrs: self.0.attrs.clone(),
            content,
            marks: self.0.marks.clone(),
            text: self.0.text.clone(),
        }))
    }

    pub fn with_marks(&self, marks: Vec<Mark>) -> Node {
        if self.0.marks == marks {
            return self.clone();
        }
        Node(Arc::new(NodeInner {
            node_type: self.0.node_type.clone(),
            attrs: self.0.attrs.clone(),
            content: self.0.content.clone(),
            marks,
            text: self.0.text.clone(),
        }))
    }

    pub fn with_attrs(&self, attrs: Attrs) -> Node {
        Node(Arc::new(NodeInner {
            node_type: self.0.node_type.clone(),
            attrs,
            content: self.0.content.clone(),
            marks: self.0.marks.clone(),
            text: self.0.text.clone(),
        }))
    }

    /// Same content and marks under a different type.
    pub fn with_type(&self, node_type: Arc<NodeType>, attrs: Attrs) -> Node {
        Node(Arc::new(NodeInner {
            node_type,
            attrs,
            content: self.0.content.clone(),
            marks: self.0.marks.clone(),
            text: self.0.text.clone(),
        }))
    }

    pub fn with_text(&self, text: &str) -> Node {
        Node(Arc::new(NodeInner {
            node_type: self.0.node_type.clone(),
            attrs: self.0.attrs.clone(),
            content: Fragment::empty(),
            marks: self.0.marks.clone(),
            text: Some(text.to_string()),
        }))
    }

    /// The part of this node between two content offsets (characters for
    /// text nodes).
    pub fn cut(&self, from: usize, to: usize) -> Node {
        if let Some(text) = self.text() {
            if from == 0 && to >= self.node_size() {
                return self.clone();
            }
            let piece: String = text.chars().skip(from).take(to.saturating_sub(from)).collect();
            return self.with_text(&piece);
        }
        if from == 0 && to >= self.content().size() {
            return self.clone();
        }
        self.copy(self.content().cut(from, to))
    }

    pub fn text_content(&self) -> String {
        match self.text() {
            Some(text) => text.to_string(),
            None => self.content().text_between(0, self.content().size(), ""),
        }
    }

    pub fn text_between(&self, from: usize, to: usize, block_separator: &str) -> String {
        self.content().text_between(from, to, block_separator)
    }

    pub fn nodes_between<F>(&self, from: usize, to: usize, f: &mut F)
    where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        self.content().nodes_between(from, to, f, 0, Some(self))
    }

    pub fn descendants<F>(&self, f: &mut F)
    where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        self.nodes_between(0, self.content().size(), f)
    }

    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos> {
        ResolvedPos::resolve(self, pos)
    }

    /// The node starting directly at `pos`, if any.
    pub fn node_at(&self, pos: usize) -> Option<Node> {
        let mut node = self.clone();
        let mut pos = pos;
        loop {
            let (index, offset) = node.content().find_index(pos, -1).ok()?;
            let child = node.child(index)?.clone();
            if offset == pos || child.is_text() {
                return Some(child);
            }
            pos -= offset + 1;
            node = child;
        }
    }

    pub fn slice(&self, from: usize, to: usize) -> Result<Slice> {
        if from == to {
            self.check_pos(from)?;
            return Ok(Slice::empty());
        }
        let rfrom = self.resolve(from)?;
        let rto = self.resolve(to)?;
        let depth = rfrom.shared_depth(to);
        let start = rfrom.start(depth);
        let node = rfrom.node(depth);
        let content = node.content().cut(from - start, to - start);
        Ok(Slice::new(content, rfrom.depth() - depth, rto.depth() - depth))
    }

    /// Replace `from..to` with a slice, closing and joining nodes on both
    /// sides. Fails with a content violation when the result is invalid.
    pub fn replace(&self, from: usize, to: usize, slice: &Slice) -> Result<Node> {
        if to < from {
            return Err(EditorError::InvalidStep(format!(
                "replace range {from}..{to} is inverted"
            )));
        }
        let rfrom = self.resolve(from)?;
        let rto = self.resolve(to)?;
        replace(&rfrom, &rto, slice)
    }

    /// Whether any inline node in `from..to` carries a mark of this type.
    pub fn range_has_mark(&self, from: usize, to: usize, mark_type: &str) -> bool {
        let mut found = false;
        if to > from {
            self.nodes_between(from, to, &mut |node: &Node, _, _, _| {
                if Mark::find_type(node.marks(), mark_type).is_some() {
                    found = true;
                }
                !found
            });
        }
        found
    }

    fn check_pos(&self, pos: usize) -> Result<()> {
        if pos > self.content().size() {
            return Err(EditorError::OutOfRange {
                pos,
                size: self.content().size(),
            });
        }
        Ok(())
    }
}
