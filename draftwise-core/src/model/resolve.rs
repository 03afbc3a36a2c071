use super::mark::Mark;
use super::node::Node;
use crate::error::{EditorError, Result};

#[derive(Debug, Clone)]
struct PathEntry {
    node: Node,
    index: usize,
    /// Absolute position at which the child at `index` starts.
    offset: usize,
}

/// A position resolved against a document: the chain of ancestors that
/// contain it and the index and offset within each.
#[derive(Debug, Clone)]
pub struct ResolvedPos {
    pos: usize,
    path: Vec<PathEntry>,
    parent_offset: usize,
}

impl ResolvedPos {
    pub fn resolve(doc: &Node, pos: usize) -> Result<Self> {
        let size = doc.content().size();
        if pos > size {
            return Err(EditorError::OutOfRange { pos, size });
        }
        let mut path = Vec::new();
        let mut start = 0;
        let mut parent_offset = pos;
        let mut node = doc.clone();
        loop {
            let (index, offset) = node.content().find_index(parent_offset, -1)?;
            let rem = parent_offset - offset;
            path.push(PathEntry {
                node: node.clone(),
                index,
                offset: start + offset,
            });
            if rem == 0 {
                break;
            }
            let Some(child) = node.child(index).cloned() else {
                break;
            };
            if child.is_text() {
                break;
            }
            parent_offset = rem - 1;
            start += offset + 1;
            node = child;
        }
        Ok(Self {
            pos,
            path,
            parent_offset,
        })
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Number of ancestors below the root.
    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    pub fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    pub fn parent(&self) -> &Node {
        self.node(self.depth())
    }

    pub fn doc(&self) -> &Node {
        self.node(0)
    }

    /// The ancestor at the given depth; clamped to the innermost one.
    pub fn node(&self, depth: usize) -> &Node {
        &self.path[depth.min(self.depth())].node
    }

    pub fn index(&self, depth: usize) -> usize {
        self.path[depth.min(self.depth())].index
    }

    pub fn index_after(&self, depth: usize) -> usize {
        let at_boundary = depth == self.depth() && self.text_offset() == 0;
        self.index(depth) + if at_boundary { 0 } else { 1 }
    }

    /// Position at which the content of the ancestor at `depth` starts.
    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.path[depth - 1].offset + 1
        }
    }

    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content().size()
    }

    /// Position directly before the ancestor at `depth` (depth >= 1).
    pub fn before(&self, depth: usize) -> Result<usize> {
        if depth == 0 {
            return Err(EditorError::InvalidStep(
                "there is no position before the top-level node".into(),
            ));
        }
        if depth == self.depth() + 1 {
            return Ok(self.pos);
        }
        Ok(self.path[depth - 1].offset)
    }

    pub fn after(&self, depth: usize) -> Result<usize> {
        if depth == 0 {
            return Err(EditorError::InvalidStep(
                "there is no position after the top-level node".into(),
            ));
        }
        if depth == self.depth() + 1 {
            return Ok(self.pos);
        }
        Ok(self.path[depth - 1].offset + self.node(depth).node_size())
    }

    /// Offset into the text node the position points into, or 0.
    pub fn text_offset(&self) -> usize {
        self.pos - self.path[self.depth()].offset
    }

    pub fn node_after(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        let child = parent.child(index)?;
        let d_off = self.text_offset();
        if d_off > 0 {
            Some(child.cut(d_off, child.node_size()))
        } else {
            Some(child.clone())
        }
    }

    pub fn node_before(&self) -> Option<Node> {
        let index = self.index(self.depth());
        let d_off = self.text_offset();
        if d_off > 0 {
            return self.parent().child(index).map(|c| c.cut(0, d_off));
        }
        if index == 0 {
            None
        } else {
            self.parent().child(index - 1).cloned()
        }
    }

    /// Marks that text typed at this position would receive.
    pub fn marks(&self) -> Vec<Mark> {
        let parent = self.parent();
        let index = self.index(self.depth());
        if parent.content().size() == 0 {
            return Vec::new();
        }
        if self.text_offset() > 0 {
            return parent
                .child(index)
                .map(|c| c.marks().to_vec())
                .unwrap_or_default();
        }
        let before = index.checked_sub(1).and_then(|i| parent.child(i));
        let after = parent.child(index);
        let (main, other) = match before {
            Some(b) => (Some(b), after),
            None => (after, None),
        };
        let Some(main) = main else {
            return Vec::new();
        };
        let mut marks = main.marks().to_vec();
        marks.retain(|m| {
            m.mark_type().is_inclusive() || other.map_or(false, |o| m.is_in_set(o.marks()))
        });
        marks
    }

    /// Deepest depth whose ancestor contains both this position and `pos`.
    pub fn shared_depth(&self, pos: usize) -> usize {
        (1..=self.depth())
            .rev()
            .find(|&d| self.start(d) <= pos && self.end(d) >= pos)
            .unwrap_or(0)
    }

    pub fn same_parent(&self, other: &ResolvedPos) -> bool {
        self.depth() == other.depth() && self.start(self.depth()) == other.start(other.depth())
    }

    /// Outermost depth (>= 1) whose ancestor is atomic, if any.
    pub fn atomic_ancestor(&self) -> Option<usize> {
        (1..=self.depth()).find(|&d| self.node(d).node_type().is_declared_atom())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::test_support::*;

    #[test]
    fn test_resolve_inside_text() {
        let d = doc(vec![p("ab"), p("cd")]);
        let r = d.resolve(2).unwrap();
        assert_eq!(r.depth(), 1);
        assert_eq!(r.parent().type_name(), "paragraph");
        assert_eq!(r.parent_offset(), 1);
        assert_eq!(r.text_offset(), 1);
        assert_eq!(r.start(1), 1);
        assert_eq!(r.end(1), 3);
        assert_eq!(r.before(1).unwrap(), 0);
        assert_eq!(r.after(1).unwrap(), 4);
        assert_eq!(r.node_after().unwrap().text(), Some("b"));
        assert_eq!(r.node_before().unwrap().text(), Some("a"));
    }

    #[test]
    fn test_resolve_between_blocks() {
        let d = doc(vec![p("ab"), p("cd")]);
        let r = d.resolve(4).unwrap();
        assert_eq!(r.depth(), 0);
        assert_eq!(r.index(0), 1);
        assert_eq!(r.node_after().unwrap().type_name(), "paragraph");
        assert!(d.resolve(9).is_err());
    }

    #[test]
    fn test_nested_positions() {
        let d = doc(vec![ul(vec![li(vec![p("x")])])]);
        let r = d.resolve(3).unwrap();
        assert_eq!(r.depth(), 3);
        assert_eq!(r.node(1).type_name(), "bulletList");
        assert_eq!(r.node(2).type_name(), "listItem");
        assert_eq!(r.start(3), 3);
        assert_eq!(r.shared_depth(4), 3);
        assert_eq!(r.shared_depth(6), 1);
    }

    #[test]
    fn test_marks_at_boundary() {
        let d = doc(vec![para(vec![bold("ab"), txt("cd")])]);
        let inside = d.resolve(2).unwrap();
        assert_eq!(inside.marks().len(), 1);
        // At the end of the bold run, the mark is inherited from the left.
        let edge = d.resolve(3).unwrap();
        assert_eq!(edge.marks().len(), 1);
        let plain = d.resolve(4).unwrap();
        assert!(plain.marks().is_empty());
    }
}
