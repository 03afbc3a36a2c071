//! Undo and redo stacks.
//!
//! Each entry holds the steps that revert one recorded transaction, ready
//! to apply to the document as it stands when the entry reaches the top of
//! its stack. Changes that bypass history (streamed placeholder updates,
//! an aborted generation) would leave those steps pointing at stale
//! positions, so entries are rebased through the mapping of every such
//! change.

use crate::selection::Selection;
use crate::transform::{Mapping, Step};
use draftwise_types::GenerationId;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    steps: Vec<Step>,
    selection: Selection,
    group: Option<GenerationId>,
}

impl HistoryEntry {
    pub fn new(steps: Vec<Step>, selection: Selection) -> Self {
        Self {
            steps,
            selection,
            group: None,
        }
    }

    /// Steps to apply, in order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Selection to restore once the steps are applied.
    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// The generation this entry is waiting on, if it is still open.
    pub fn group(&self) -> Option<GenerationId> {
        self.group
    }

    pub fn is_pending(&self) -> bool {
        self.group.is_some()
    }

    /// Express the entry in the coordinates after `mapping`, which must
    /// start from the document the entry applies to. Returns the entry and
    /// the mapping onward from the document the entry produces.
    fn rebase(&self, mapping: &Mapping) -> (HistoryEntry, Mapping) {
        let mut current = mapping.clone();
        let mut steps = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let mut next = Mapping::from_maps(vec![step.get_map().invert()]);
            next.append(&current);
            if let Some(mapped) = step.map(&current) {
                next.push(mapped.get_map());
                steps.push(mapped);
            }
            current = next;
        }
        let entry = HistoryEntry {
            steps,
            selection: self.selection.map(&current, usize::MAX),
            group: self.group,
        };
        (entry, current)
    }
}

#[derive(Debug, Clone, Default)]
pub struct History {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    max_depth: usize,
}

impl History {
    /// `max_depth` of 0 keeps every entry.
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            max_depth,
        }
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn undo_entries(&self) -> &[HistoryEntry] {
        &self.undo
    }

    /// Undo is blocked while the newest entry belongs to an open generation.
    pub fn can_undo(&self) -> bool {
        self.undo.last().is_some_and(|e| !e.is_pending())
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Record a fresh transaction. Clears the redo stack.
    pub fn record(&mut self, steps: Vec<Step>, selection: Selection) {
        if steps.is_empty() {
            return;
        }
        self.redo.clear();
        self.undo.push(HistoryEntry::new(steps, selection));
        self.trim();
        debug!(depth = self.undo.len(), "history entry recorded");
    }

    /// Record the opening of a generation; the entry stays pending until
    /// the generation is finished or aborted.
    pub fn open_group(&mut self, id: GenerationId, steps: Vec<Step>, selection: Selection) {
        self.redo.clear();
        self.undo.push(HistoryEntry {
            steps,
            selection,
            group: Some(id),
        });
        self.trim();
        debug!(generation = %id, "history group opened");
    }

    pub(crate) fn pop_undo(&mut self) -> Option<HistoryEntry> {
        if !self.can_undo() {
            return None;
        }
        self.undo.pop()
    }

    pub(crate) fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.redo.pop()
    }

    pub(crate) fn push_redo(&mut self, entry: HistoryEntry) {
        self.redo.push(entry);
    }

    /// Push an entry produced by redo; unlike `record` it leaves the redo
    /// stack alone.
    pub(crate) fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo.push(entry);
        self.trim();
    }

    /// Rebase every entry through a change made outside history.
    pub fn rebase(&mut self, mapping: &Mapping) {
        if mapping.is_identity() {
            return;
        }
        rebase_from(&mut self.undo, 0, mapping);
        rebase_from(&mut self.redo, 0, mapping);
    }

    /// Close a finished generation: entries recorded after it was opened
    /// are rebased through `restore`, which removes the placeholder, and
    /// the pending entry is dropped. The caller records the finished
    /// operation as a new entry on top.
    pub fn finish_group(&mut self, id: GenerationId, restore: &Mapping) -> bool {
        let Some(index) = self.group_index(id) else {
            return false;
        };
        rebase_from(&mut self.undo, index + 1, restore);
        self.undo.remove(index);
        debug!(generation = %id, "history group finished");
        true
    }

    /// Drop the pending entry of an aborted generation whose placeholder
    /// was already removed by `restore`.
    pub fn abort_group(&mut self, id: GenerationId, restore: &Mapping) -> bool {
        let Some(index) = self.group_index(id) else {
            return false;
        };
        rebase_from(&mut self.undo, index + 1, restore);
        rebase_from(&mut self.redo, 0, restore);
        self.undo.remove(index);
        debug!(generation = %id, "history group aborted");
        true
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn group_index(&self, id: GenerationId) -> Option<usize> {
        self.undo.iter().rposition(|e| e.group == Some(id))
    }

    fn trim(&mut self) {
        if self.max_depth == 0 {
            return;
        }
        while self.undo.len() > self.max_depth {
            match self.undo.iter().position(|e| !e.is_pending()) {
                Some(oldest) => {
                    self.undo.remove(oldest);
                }
                None => break,
            }
        }
    }
}

/// Rebase `stack[floor..]` top-down. The top entry applies to the current
/// document, each one below to the document the one above it produces.
fn rebase_from(stack: &mut Vec<HistoryEntry>, floor: usize, mapping: &Mapping) {
    if mapping.is_identity() {
        return;
    }
    let mut current = mapping.clone();
    for index in (floor..stack.len()).rev() {
        let (entry, next) = stack[index].rebase(&current);
        stack[index] = entry;
        current = next;
    }
    // Entries whose every step was swallowed by the change have nothing
    // left to undo.
    let mut index = floor;
    while index < stack.len() {
        if stack[index].steps.is_empty() && !stack[index].is_pending() {
            stack.remove(index);
        } else {
            index += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Slice;
    use crate::transform::StepMap;

    fn delete(from: usize, to: usize) -> Step {
        Step::replace(from, to, Slice::empty())
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = History::new(10);
        history.record(vec![delete(1, 2)], Selection::caret(1));
        let entry = history.pop_undo().unwrap();
        history.push_redo(entry);
        assert!(history.can_redo());

        history.record(vec![delete(1, 2)], Selection::caret(1));
        assert!(!history.can_redo());
        assert_eq!(history.undo_depth(), 1);
    }

    #[test]
    fn test_trim_keeps_newest() {
        let mut history = History::new(2);
        for i in 1..=3 {
            history.record(vec![delete(i, i + 1)], Selection::caret(i));
        }
        assert_eq!(history.undo_depth(), 2);
        assert_eq!(history.undo_entries()[0].selection(), Selection::caret(2));
    }

    #[test]
    fn test_pending_entry_blocks_undo() {
        let mut history = History::new(0);
        history.record(vec![delete(1, 2)], Selection::caret(1));
        history.open_group(GenerationId::new(), vec![delete(3, 4)], Selection::caret(3));
        assert!(!history.can_undo());
        assert!(history.pop_undo().is_none());
    }

    #[test]
    fn test_rebase_shifts_positions() {
        let mut history = History::new(0);
        history.record(vec![delete(10, 12)], Selection::range(10, 12));
        // Three positions inserted at the start of the document.
        history.rebase(&Mapping::from_maps(vec![StepMap::single(0, 0, 3)]));
        let entry = &history.undo_entries()[0];
        assert_eq!(entry.steps(), &[delete(13, 15)]);
        assert_eq!(entry.selection(), Selection::range(13, 15));
    }

    #[test]
    fn test_rebase_reaches_older_entries() {
        let mut history = History::new(0);
        history.record(vec![delete(5, 7)], Selection::caret(5));
        history.record(vec![delete(20, 21)], Selection::caret(20));
        history.rebase(&Mapping::from_maps(vec![StepMap::single(1, 0, 1)]));
        let entries = history.undo_entries();
        assert_eq!(entries[1].steps(), &[delete(21, 22)]);
        assert_eq!(entries[0].steps(), &[delete(6, 8)]);
    }

    #[test]
    fn test_finish_group_removes_pending_entry() {
        let id = GenerationId::new();
        let mut history = History::new(0);
        history.open_group(id, vec![delete(4, 5)], Selection::caret(4));
        history.record(vec![delete(10, 11)], Selection::caret(10));
        // The placeholder at 4 is swapped back for six positions of text.
        let restore = Mapping::from_maps(vec![StepMap::single(4, 1, 6)]);
        assert!(history.finish_group(id, &restore));
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.undo_entries()[0].steps(), &[delete(15, 16)]);
        assert!(!history.finish_group(id, &restore));
    }
}
