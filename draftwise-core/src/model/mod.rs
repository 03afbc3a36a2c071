//! The document tree: immutable nodes, fragments, marks and positions.

mod fragment;
mod mark;
mod node;
mod replace;
mod resolve;
mod slice;

pub use fragment::Fragment;
pub use mark::Mark;
pub use node::Node;
pub use resolve::ResolvedPos;
pub use slice::Slice;

use crate::error::{EditorError, Result};
use crate::schema::Schema;
use std::sync::Arc;

/// A root node together with the schema it was built against.
#[derive(Debug, Clone)]
pub struct Document {
    root: Node,
    schema: Arc<Schema>,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl Document {
    /// Wrap a root node, validating the whole tree against the schema.
    pub fn new(schema: Arc<Schema>, root: Node) -> Result<Self> {
        schema.validate(&root)?;
        if root.type_name() != "doc" {
            return Err(EditorError::violation(
                root.type_name(),
                "the root node must be a doc",
            ));
        }
        Ok(Self { root, schema })
    }

    /// A document holding a single empty textblock.
    pub fn empty(schema: Arc<Schema>) -> Result<Self> {
        let root = schema.create_and_fill("doc")?;
        Ok(Self { root, schema })
    }

    pub(crate) fn from_parts_unchecked(schema: Arc<Schema>, root: Node) -> Self {
        Self { root, schema }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Number of addressable positions inside the root.
    pub fn size(&self) -> usize {
        self.root.content().size()
    }

    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos> {
        self.root.resolve(pos)
    }

    pub fn slice(&self, from: usize, to: usize) -> Result<Slice> {
        self.check_range(from, to)?;
        self.root.slice(from, to)
    }

    pub fn node_at(&self, pos: usize) -> Result<Option<Node>> {
        self.check_range(pos, pos)?;
        Ok(self.root.node_at(pos))
    }

    /// Plain text between two positions, blocks separated by newlines.
    pub fn text_between(&self, from: usize, to: usize) -> Result<String> {
        self.check_range(from, to)?;
        Ok(self.root.text_between(from, to, "\n"))
    }

    pub fn text_content(&self) -> String {
        self.root.text_between(0, self.size(), "\n")
    }

    pub fn validate(&self) -> Result<()> {
        self.schema.validate(&self.root)
    }

    fn check_range(&self, from: usize, to: usize) -> Result<()> {
        let size = self.size();
        if from > size {
            return Err(EditorError::OutOfRange { pos: from, size });
        }
        if to > size {
            return Err(EditorError::OutOfRange { pos: to, size });
        }
        if to < from {
            return Err(EditorError::InvalidStep(format!(
                "range {from}..{to} is inverted"
            )));
        }
        Ok(())
    }
}
