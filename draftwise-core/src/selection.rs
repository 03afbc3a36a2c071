//! Text selections.

use crate::transform::Mapping;
use serde::{Deserialize, Serialize};

/// An anchor/head pair of positions. The anchor stays put while the head
/// moves, so `anchor > head` is a backwards selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    pub fn caret(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    /// A forward selection over `from..to`.
    pub fn range(from: usize, to: usize) -> Self {
        Self::new(from, to)
    }

    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Map both ends through a change, clamping to the new document size.
    pub fn map(&self, mapping: &Mapping, size: usize) -> Selection {
        let map = |pos: usize| mapping.map(pos, 1).min(size);
        Selection::new(map(self.anchor), map(self.head))
    }

    pub fn clamp(&self, size: usize) -> Selection {
        Selection::new(self.anchor.min(size), self.head.min(size))
    }
}

impl Default for Selection {
    fn default() -> Self {
        Selection::caret(0)
    }
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "caret({})", self.head)
        } else {
            write!(f, "{}..{}", self.anchor, self.head)
        }
    }
}
