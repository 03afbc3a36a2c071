use super::fragment::Fragment;

/// A piece of a document: a fragment plus the depth to which its first and
/// last nodes are open (cut through rather than whole).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Slice {
    content: Fragment,
    open_start: usize,
    open_end: usize,
}

impl Slice {
    pub fn new(content: Fragment, open_start: usize, open_end: usize) -> Self {
        Self {
            content,
            open_start,
            open_end,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// A closed slice holding whole nodes.
    pub fn closed(content: impl Into<Fragment>) -> Self {
        Self::new(content.into(), 0, 0)
    }

    /// A slice opened as deeply as the fragment's edge nodes allow.
    pub fn max_open(content: Fragment) -> Self {
        let mut open_start = 0;
        let mut node = content.first_child().cloned();
        while let Some(n) = node.filter(|n| !n.is_leaf() && !n.node_type().is_declared_atom()) {
            open_start += 1;
            node = n.first_child().cloned();
        }
        let mut open_end = 0;
        let mut node = content.last_child().cloned();
        while let Some(n) = node.filter(|n| !n.is_leaf() && !n.node_type().is_declared_atom()) {
            open_end += 1;
            node = n.last_child().cloned();
        }
        Self::new(content, open_start, open_end)
    }

    pub fn content(&self) -> &Fragment {
        &self.content
    }

    pub fn open_start(&self) -> usize {
        self.open_start
    }

    pub fn open_end(&self) -> usize {
        self.open_end
    }

    /// Number of positions the slice adds when inserted.
    pub fn size(&self) -> usize {
        self.content
            .size()
            .saturating_sub(self.open_start + self.open_end)
    }

    pub fn is_empty(&self) -> bool {
        self.content.size() == 0
    }
}
