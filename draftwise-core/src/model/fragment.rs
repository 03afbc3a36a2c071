use super::node::Node;
use crate::error::{EditorError, Result};
use std::sync::Arc;

/// An ordered, immutable sequence of sibling nodes.
///
/// Adjacent text nodes with identical marks are always merged, and empty
/// text nodes never appear.
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    nodes: Arc<Vec<Node>>,
    size: usize,
}

impl PartialEq for Fragment {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.nodes, &other.nodes) || self.nodes == other.nodes
    }
}

impl From<Vec<Node>> for Fragment {
    fn from(nodes: Vec<Node>) -> Self {
        Fragment::from_vec(nodes)
    }
}

impl From<Node> for Fragment {
    fn from(node: Node) -> Self {
        Fragment::from_vec(vec![node])
    }
}

impl Fragment {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a fragment, joining adjacent text nodes with the same marks.
    pub fn from_vec(nodes: Vec<Node>) -> Self {
        let mut joined: Vec<Node> = Vec::with_capacity(nodes.len());
        for node in nodes {
            if node.is_text() && node.text().map_or(true, str::is_empty) {
                continue;
            }
            match joined.last_mut() {
                Some(last) if last.is_text() && node.is_text() && last.same_markup(&node) => {
                    let text = format!(
                        "{}{}",
                        last.text().unwrap_or_default(),
                        node.text().unwrap_or_default()
                    );
                    *last = last.with_text(&text);
                }
                _ => joined.push(node),
            }
        }
        let size = joined.iter().map(Node::node_size).sum();
        Self {
            nodes: Arc::new(joined),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn child_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.nodes.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn to_vec(&self) -> Vec<Node> {
        self.nodes.as_ref().clone()
    }

    /// Locate the child containing `pos`. Returns the child index and the
    /// offset at which that child starts. A position on a boundary rounds
    /// to the following child, or past the end when `round` is positive.
    pub fn find_index(&self, pos: usize, round: i8) -> Result<(usize, usize)> {
        if pos == 0 {
            return Ok((0, 0));
        }
        if pos == self.size {
            return Ok((self.nodes.len(), pos));
        }
        if pos > self.size {
            return Err(EditorError::OutOfRange {
                pos,
                size: self.size,
            });
        }
        let mut cur = 0;
        for (i, child) in self.nodes.iter().enumerate() {
            let end = cur + child.node_size();
            if end >= pos {
                if end == pos || round > 0 {
                    return Ok((i + 1, end));
                }
                return Ok((i, cur));
            }
            cur = end;
        }
        Err(EditorError::OutOfRange {
            pos,
            size: self.size,
        })
    }

    /// The part of this fragment between two offsets, cutting through
    /// children where needed.
    pub fn cut(&self, from: usize, to: usize) -> Fragment {
        if from == 0 && to >= self.size {
            return self.clone();
        }
        let mut result = Vec::new();
        if to > from {
            let mut pos = 0;
            for child in self.nodes.iter() {
                if pos >= to {
                    break;
                }
                let end = pos + child.node_size();
                if end > from {
                    let piece = if pos < from || end > to {
                        if child.is_text() {
                            child.cut(from.saturating_sub(pos), (to - pos).min(child.node_size()))
                        } else {
                            child.cut(
                                from.saturating_sub(pos + 1),
                                (to - pos - 1).min(child.content().size()),
                            )
                        }
                    } else {
                        child.clone()
                    };
                    result.push(piece);
                }
                pos = end;
            }
        }
        Fragment::from_vec(result)
    }

    /// Concatenate, merging the text nodes at the seam.
    pub fn append(&self, other: &Fragment) -> Fragment {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut nodes = self.to_vec();
        nodes.extend(other.iter().cloned());
        Fragment::from_vec(nodes)
    }

    pub fn replace_child(&self, index: usize, node: Node) -> Fragment {
        let mut nodes = self.to_vec();
        if index < nodes.len() {
            nodes[index] = node;
        }
        Fragment::from_vec(nodes)
    }

    pub fn add_to_start(&self, node: Node) -> Fragment {
        let mut nodes = vec![node];
        nodes.extend(self.iter().cloned());
        Fragment::from_vec(nodes)
    }

    pub fn add_to_end(&self, node: Node) -> Fragment {
        let mut nodes = self.to_vec();
        nodes.push(node);
        Fragment::from_vec(nodes)
    }

    /// Visit every descendant overlapping `from..to`. `f` receives the node,
    /// its absolute position, its parent and its index in the parent, and
    /// returns whether to descend into it.
    pub fn nodes_between<F>(&self, from: usize, to: usize, f: &mut F, node_start: usize, parent: Option<&Node>)
    where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        let mut pos = 0;
        for (i, child) in self.nodes.iter().enumerate() {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from && f(child, node_start + pos, parent, i) && child.content().size() > 0 {
                let start = pos + 1;
                child.content().nodes_between(
                    from.saturating_sub(start),
                    child.content().size().min(to.saturating_sub(start)),
                    f,
                    node_start + start,
                    Some(child),
                );
            }
            pos = end;
        }
    }

    pub fn descendants<F>(&self, f: &mut F)
    where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        self.nodes_between(0, self.size, f, 0, None)
    }

    /// Plain text between two offsets. Textblocks and text-bearing block
    /// leaves are separated by `block_separator`.
    pub fn text_between(&self, from: usize, to: usize, block_separator: &str) -> String {
        let mut text = String::new();
        let mut first = true;
        self.nodes_between(
            from,
            to,
            &mut |node: &Node, pos: usize, _parent: Option<&Node>, _index: usize| {
                let node_text = if let Some(t) = node.text() {
                    let start = from.saturating_sub(pos);
                    let end = (to - pos).min(node.node_size());
                    t.chars().skip(start).take(end.saturating_sub(start)).collect()
                } else if node.is_leaf() {
                    node.node_type().leaf_text().unwrap_or_default().to_string()
                } else {
                    String::new()
                };
                if node.is_block()
                    && ((node.is_leaf() && !node_text.is_empty()) || node.is_textblock())
                    && !block_separator.is_empty()
                {
                    if first {
                        first = false;
                    } else {
                        text.push_str(block_separator);
                    }
                }
                text.push_str(&node_text);
                true
            },
            0,
            None,
        );
        text
    }
}
