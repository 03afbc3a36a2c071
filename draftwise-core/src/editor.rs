//! The editor instance: current state, history and the slot for one
//! in-flight AI generation.
//!
//! All document changes go through [`Editor::dispatch`] or one of the
//! generation methods, which commit a transaction and keep history and
//! the generation's positions in step with the new document.

use crate::commands::Command;
use crate::config::Config;
use crate::error::{EditorError, Result};
use crate::format::{self, Export, Metadata};
use crate::history::{History, HistoryEntry};
use crate::model::{Document, Fragment, Node, Slice};
use crate::schema::{Attrs, Schema, AI_GENERATION};
use crate::selection::Selection;
use crate::transaction::{Commit, Transaction};
use crate::transform::{Mapping, Step};
use draftwise_types::{FormatKind, GenerationId, OperationKind};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A document and a selection, the input every command reads.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    doc: Document,
    selection: Selection,
}

impl EditorState {
    pub fn new(doc: Document, selection: Selection) -> Self {
        let selection = selection.clamp(doc.size());
        Self { doc, selection }
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.doc.schema()
    }

    /// Start a transaction against this state.
    pub fn tr(&self) -> Transaction {
        Transaction::new(&self.doc, self.selection)
    }

    pub(crate) fn apply(&self, commit: &Commit) -> EditorState {
        EditorState {
            doc: commit.doc.clone(),
            selection: commit.selection,
        }
    }
}

/// What an in-flight generation captured when it was requested.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSnapshot {
    pub id: GenerationId,
    pub kind: OperationKind,
    /// Range the output will replace.
    pub from: usize,
    pub to: usize,
    /// Plain text of the range when the generation was requested.
    pub text: String,
    pub prompt: Option<String>,
    pub selection: Selection,
}

#[derive(Debug, Clone)]
struct Placeholder {
    pos: usize,
    /// Replace step that swaps the placeholder back for the original
    /// content, kept in current coordinates.
    restore: Step,
    /// Pre-generation selection relative to the start of `restore`.
    anchor_offset: usize,
    head_offset: usize,
}

impl Placeholder {
    fn restore_from(&self) -> usize {
        match &self.restore {
            Step::Replace { from, .. } => *from,
            _ => self.pos,
        }
    }

    fn original_selection(&self) -> Selection {
        let from = self.restore_from();
        Selection::new(from + self.anchor_offset, from + self.head_offset)
    }
}

#[derive(Debug, Clone)]
struct ActiveGeneration {
    snapshot: GenerationSnapshot,
    placeholder: Option<Placeholder>,
}

impl ActiveGeneration {
    fn map(&mut self, mapping: &Mapping) {
        if mapping.is_identity() {
            return;
        }
        let snapshot = &mut self.snapshot;
        snapshot.from = mapping.map(snapshot.from, 1);
        snapshot.to = mapping.map(snapshot.to, -1).max(snapshot.from);
        if let Some(placeholder) = &mut self.placeholder {
            placeholder.pos = mapping.map(placeholder.pos, 1);
            match placeholder.restore.map(mapping) {
                Some(restore) => placeholder.restore = restore,
                None => warn!(generation = %snapshot.id, "placeholder restore step lost"),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Editor {
    state: EditorState,
    history: History,
    config: Config,
    generation: Option<ActiveGeneration>,
}

impl Editor {
    pub fn new(doc: Document) -> Self {
        Self::with_config(doc, Config::default())
    }

    pub fn with_config(doc: Document, config: Config) -> Self {
        let selection = Selection::caret(first_text_position(doc.root()));
        Self {
            state: EditorState::new(doc, selection),
            history: History::new(config.history.max_depth),
            config,
            generation: None,
        }
    }

    /// An editor over an empty document in the given schema.
    pub fn empty(schema: Arc<Schema>) -> Result<Self> {
        Ok(Self::new(Document::empty(schema)?))
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn doc(&self) -> &Document {
        &self.state.doc
    }

    pub fn selection(&self) -> Selection {
        self.state.selection
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.state.schema()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transaction(&self) -> Transaction {
        self.state.tr()
    }

    pub fn set_selection(&mut self, selection: Selection) -> Result<()> {
        let size = self.doc().size();
        for pos in [selection.anchor, selection.head] {
            if pos > size {
                return Err(EditorError::OutOfRange { pos, size });
            }
        }
        self.state.selection = selection;
        Ok(())
    }

    /// Commit a transaction built against the current state.
    pub fn dispatch(&mut self, tr: Transaction) -> Result<Commit> {
        if tr.base().root() != self.doc().root() {
            return Err(EditorError::InvalidStep(
                "transaction was built against a different document version".into(),
            ));
        }
        self.check_placeholder(&tr)?;
        let commit = tr.commit()?;
        let before = self.selection();
        self.apply_commit(&commit);
        if commit.ephemeral {
            self.history.rebase(&commit.mapping);
        } else {
            self.history.record(commit.inverted_steps(), before);
        }
        Ok(commit)
    }

    /// Run a command. Returns `Ok(false)` when it does not apply.
    pub fn run(&mut self, command: &dyn Command) -> Result<bool> {
        let tr = match command.build(&self.state) {
            Ok(Some(tr)) => tr,
            Ok(None) => {
                debug!(command = command.name(), "command not applicable");
                return Ok(false);
            }
            Err(err) => return self.contain(command.name(), err),
        };
        match self.dispatch(tr) {
            Ok(_) => {
                debug!(command = command.name(), "command applied");
                Ok(true)
            }
            Err(err) => self.contain(command.name(), err),
        }
    }

    /// Dry-run a command against the current state without committing.
    pub fn can_apply(&self, command: &dyn Command) -> bool {
        match command.build(&self.state) {
            Ok(Some(tr)) => self.check_placeholder(&tr).is_ok() && tr.commit().is_ok(),
            _ => false,
        }
    }

    /// Bad positions are a caller bug: loud in debug builds, a logged no-op
    /// otherwise.
    fn contain(&self, command: &str, err: EditorError) -> Result<bool> {
        if err.is_programming_error() && !cfg!(debug_assertions) {
            warn!(command, error = %err, "command ignored");
            return Ok(false);
        }
        Err(err)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> Result<bool> {
        let Some(entry) = self.history.pop_undo() else {
            return Ok(false);
        };
        match self.replay(&entry) {
            Ok(commit) => {
                let before = self.selection();
                self.apply_commit(&commit);
                self.history
                    .push_redo(HistoryEntry::new(commit.inverted_steps(), before));
                debug!(undo_depth = self.history.undo_depth(), "undo");
                Ok(true)
            }
            Err(err) => {
                self.history.push_undo(entry);
                Err(err)
            }
        }
    }

    pub fn redo(&mut self) -> Result<bool> {
        let Some(entry) = self.history.pop_redo() else {
            return Ok(false);
        };
        match self.replay(&entry) {
            Ok(commit) => {
                let before = self.selection();
                self.apply_commit(&commit);
                self.history
                    .push_undo(HistoryEntry::new(commit.inverted_steps(), before));
                debug!(redo_depth = self.history.redo_depth(), "redo");
                Ok(true)
            }
            Err(err) => {
                self.history.push_redo(entry);
                Err(err)
            }
        }
    }

    fn replay(&self, entry: &HistoryEntry) -> Result<Commit> {
        let mut tr = self.transaction();
        for step in entry.steps() {
            tr.step(step.clone())?;
        }
        let selection = entry.selection().clamp(tr.doc().content().size());
        tr.set_selection(selection)?;
        tr.commit()
    }

    /// Replace the whole document. Recorded in history as one change.
    pub fn set_content(&mut self, doc: Document) -> Result<()> {
        if let Some(active) = &self.generation {
            return Err(EditorError::OperationInProgress(active.snapshot.id));
        }
        if !Arc::ptr_eq(doc.schema(), self.schema()) {
            self.schema().validate(doc.root())?;
        }
        let mut tr = self.transaction();
        let size = self.doc().size();
        tr.step(Step::replace(0, size, Slice::closed(doc.root().content().clone())))?;
        tr.set_selection(Selection::caret(first_text_position(doc.root())))?;
        self.dispatch(tr)?;
        info!(size = self.doc().size(), "document content replaced");
        Ok(())
    }

    /// Parse serialized input and make it the current document. The
    /// current document is untouched when parsing fails.
    pub fn import(&mut self, kind: FormatKind, input: &[u8]) -> Result<Metadata> {
        let (doc, metadata) = format::import(self.schema(), kind, input)?;
        self.set_content(doc)?;
        Ok(metadata)
    }

    pub fn export(&self, kind: FormatKind, metadata: &Metadata) -> Result<Export> {
        format::export(self.doc(), kind, metadata, &self.config.export)
    }

    pub fn is_generating(&self) -> bool {
        self.generation.is_some()
    }

    pub fn active_generation(&self) -> Option<&GenerationSnapshot> {
        self.generation.as_ref().map(|g| &g.snapshot)
    }

    /// Position of the live placeholder of generation `id`.
    pub fn placeholder_pos(&self, id: GenerationId) -> Option<usize> {
        self.generation
            .as_ref()
            .filter(|g| g.snapshot.id == id)
            .and_then(|g| g.placeholder.as_ref())
            .map(|p| p.pos)
    }

    /// Reserve the editor for a generation and snapshot the selection it
    /// will replace.
    pub fn begin_generation(
        &mut self,
        kind: OperationKind,
        prompt: Option<String>,
    ) -> Result<GenerationSnapshot> {
        if let Some(active) = &self.generation {
            return Err(EditorError::OperationInProgress(active.snapshot.id));
        }
        let selection = self.selection();
        let snapshot = GenerationSnapshot {
            id: GenerationId::new(),
            kind,
            from: selection.from(),
            to: selection.to(),
            text: self.doc().text_between(selection.from(), selection.to())?,
            prompt,
            selection,
        };
        info!(generation = %snapshot.id, kind = %kind, from = snapshot.from, to = snapshot.to, "generation requested");
        self.generation = Some(ActiveGeneration {
            snapshot: snapshot.clone(),
            placeholder: None,
        });
        Ok(snapshot)
    }

    /// Swap the snapshot range for a placeholder in one transaction.
    pub fn install_placeholder(&mut self, id: GenerationId) -> Result<usize> {
        let active = self.active(id)?;
        if active.placeholder.is_some() {
            return Err(EditorError::InvalidStep(format!(
                "generation {id} already has a placeholder"
            )));
        }
        let snapshot = active.snapshot.clone();
        let mut attrs = Attrs::new();
        attrs.insert("text".into(), json!(""));
        attrs.insert("operationKind".into(), json!(snapshot.kind.as_str()));
        let node = self.schema().node(AI_GENERATION, attrs, Fragment::empty(), vec![])?;

        let mut tr = self.transaction();
        tr.replace_with(snapshot.from, snapshot.to, node)?;
        // The fitted step may have been lifted out of the textblock, so
        // search the range it actually inserted.
        let (start, end) = match tr.steps().last() {
            Some(Step::Replace { from, slice, .. }) => (*from, from + slice.size()),
            _ => (tr.map(snapshot.from, -1)?, tr.map(snapshot.to, 1)?),
        };
        let pos = find_placeholder(tr.doc(), start, end).ok_or_else(|| {
            EditorError::InvalidStep("placeholder missing after insertion".into())
        })?;
        tr.set_selection(Selection::caret(pos + 1))?;
        let before = self.selection();
        let commit = tr.commit()?;
        let restore = commit.inverses.first().cloned().ok_or_else(|| {
            EditorError::InvalidStep("placeholder insertion produced no steps".into())
        })?;

        self.apply_commit(&commit);
        self.history.open_group(id, commit.inverted_steps(), before);

        let restore_from = match &restore {
            Step::Replace { from, .. } => *from,
            _ => pos,
        };
        if let Some(active) = self.generation.as_mut() {
            active.placeholder = Some(Placeholder {
                pos,
                restore,
                anchor_offset: before.anchor.saturating_sub(restore_from),
                head_offset: before.head.saturating_sub(restore_from),
            });
        }
        info!(generation = %id, pos, "placeholder installed");
        Ok(pos)
    }

    /// Show the cumulative text streamed so far. Kept out of history.
    pub fn update_placeholder(&mut self, id: GenerationId, text: &str) -> Result<()> {
        let pos = self.placeholder(id)?.pos;
        let mut tr = self.transaction();
        tr.set_node_attribute(pos, "text", text)?.set_ephemeral();
        let commit = tr.commit()?;
        self.apply_commit(&commit);
        self.history.rebase(&commit.mapping);
        Ok(())
    }

    /// Replace the placeholder with the generated content. The whole
    /// operation becomes a single undo entry.
    pub fn finalize_generation(&mut self, id: GenerationId, content: Fragment) -> Result<()> {
        let placeholder = self.placeholder(id)?.clone();
        let tr = match self.splice_into_textblock(&placeholder, &content) {
            Some(tr) => tr,
            None => self.replace_placeholder(id, placeholder.pos, content)?,
        };
        let commit = tr.commit()?;

        let restore_map = Mapping::from_maps(vec![placeholder.restore.get_map()]);
        self.history.finish_group(id, &restore_map);
        self.apply_commit(&commit);

        let mut undo_steps = commit.inverted_steps();
        undo_steps.push(placeholder.restore.clone());
        self.history
            .record(undo_steps, placeholder.original_selection());
        self.generation = None;
        info!(generation = %id, "generation finalized");
        Ok(())
    }

    /// Swap the placeholder for block content, or for an empty textblock
    /// when the content does not fit.
    fn replace_placeholder(
        &self,
        id: GenerationId,
        pos: usize,
        content: Fragment,
    ) -> Result<Transaction> {
        let mut tr = self.transaction();
        let replaced = !content.is_empty() && tr.replace_with(pos, pos + 1, content).is_ok();
        if !replaced {
            warn!(generation = %id, "generated content did not fit; leaving an empty block");
            tr = self.transaction();
            let empty = self.schema().default_textblock()?.name().to_string();
            let fill = self.schema().create_and_fill(&empty)?;
            tr.replace_with(pos, pos + 1, fill)?;
        }
        let end = tr.map(pos + 1, 1)?;
        tr.set_selection(Selection::caret(end))?;
        Ok(tr)
    }

    /// A single textblock generated for a range inside one textblock goes
    /// back in as inline content, rejoining the text around it.
    fn splice_into_textblock(
        &self,
        placeholder: &Placeholder,
        content: &Fragment,
    ) -> Option<Transaction> {
        let block = content.first_child()?;
        if content.child_count() != 1 || !block.is_textblock() || block.content().is_empty() {
            return None;
        }
        let original = placeholder.original_selection();
        let (from, to) = (original.from(), original.to());
        if from == to {
            return None;
        }
        let mut tr = self.transaction();
        tr.step(placeholder.restore.clone()).ok()?;
        let rfrom = tr.doc().resolve(from).ok()?;
        let rto = tr.doc().resolve(to).ok()?;
        if !rfrom.parent().is_textblock() || !rfrom.same_parent(&rto) {
            return None;
        }
        tr.replace_current(from, to, block.content().clone()).ok()?;
        tr.set_selection(Selection::caret(from + block.content().size()))
            .ok()?;
        Some(tr)
    }

    /// Remove the placeholder and restore the original content, leaving
    /// history as it was before the generation started.
    pub fn abort_generation(&mut self, id: GenerationId) -> Result<()> {
        let active = self.active(id)?.clone();
        let Some(placeholder) = active.placeholder else {
            self.generation = None;
            info!(generation = %id, "generation released before placeholder");
            return Ok(());
        };
        let mut tr = self.transaction();
        tr.step(placeholder.restore.clone())?.set_ephemeral();
        let size = tr.doc().content().size();
        tr.set_selection(placeholder.original_selection().clamp(size))?;
        let commit = tr.commit()?;

        self.state = self.state.apply(&commit);
        self.history.abort_group(id, &commit.mapping);
        self.generation = None;
        info!(generation = %id, "generation aborted; content restored");
        Ok(())
    }

    fn active(&self, id: GenerationId) -> Result<&ActiveGeneration> {
        self.generation
            .as_ref()
            .filter(|g| g.snapshot.id == id)
            .ok_or(EditorError::UnknownGeneration(id))
    }

    fn placeholder(&self, id: GenerationId) -> Result<&Placeholder> {
        self.active(id)?
            .placeholder
            .as_ref()
            .ok_or(EditorError::UnknownGeneration(id))
    }

    /// User transactions may not remove or retype a live placeholder.
    fn check_placeholder(&self, tr: &Transaction) -> Result<()> {
        let Some(pos) = self
            .generation
            .as_ref()
            .and_then(|g| g.placeholder.as_ref())
            .map(|p| p.pos)
        else {
            return Ok(());
        };
        let mapped = tr.mapping().map_result(pos, 1);
        let intact = !mapped.deleted_after()
            && tr
                .doc()
                .node_at(mapped.pos)
                .is_some_and(|n| n.type_name() == AI_GENERATION);
        if intact {
            Ok(())
        } else {
            Err(EditorError::PlaceholderLocked)
        }
    }

    fn apply_commit(&mut self, commit: &Commit) {
        self.state = self.state.apply(commit);
        if let Some(active) = self.generation.as_mut() {
            active.map(&commit.mapping);
        }
        debug!(
            steps = commit.steps.len(),
            ephemeral = commit.ephemeral,
            size = self.state.doc.size(),
            "transaction committed"
        );
    }
}

/// First position inside a textblock, or 0.
fn first_text_position(root: &Node) -> usize {
    let mut found = None;
    root.descendants(&mut |node: &Node, pos, _, _| {
        if found.is_some() {
            return false;
        }
        if node.is_textblock() {
            found = Some(pos + 1);
            return false;
        }
        true
    });
    found.unwrap_or(0)
}

fn find_placeholder(doc: &Node, from: usize, to: usize) -> Option<usize> {
    let mut found = None;
    let end = to.max(from + 1).min(doc.content().size());
    doc.nodes_between(from, end, &mut |node: &Node, pos, _, _| {
        if found.is_none() && node.type_name() == AI_GENERATION {
            found = Some(pos);
        }
        found.is_none()
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::InsertText;
    use crate::model::test_support::*;
    use crate::schema::standard;

    fn editor(root: Node) -> Editor {
        Editor::new(Document::new(standard(), root).unwrap())
    }

    fn insert(editor: &mut Editor, pos: usize, text: &str) {
        let mut tr = editor.transaction();
        tr.insert_text(pos, text).unwrap();
        editor.dispatch(tr).unwrap();
    }

    #[test]
    fn test_undo_restores_doc_and_selection() {
        let mut ed = editor(doc(vec![p("hello")]));
        ed.set_selection(Selection::caret(6)).unwrap();
        insert(&mut ed, 6, " world");
        assert_eq!(ed.doc().root(), &doc(vec![p("hello world")]));
        assert_eq!(ed.selection(), Selection::caret(12));

        assert!(ed.undo().unwrap());
        assert_eq!(ed.doc().root(), &doc(vec![p("hello")]));
        assert_eq!(ed.selection(), Selection::caret(6));

        assert!(ed.redo().unwrap());
        assert_eq!(ed.doc().root(), &doc(vec![p("hello world")]));
        assert_eq!(ed.selection(), Selection::caret(12));
        assert!(!ed.redo().unwrap());
    }

    #[test]
    fn test_fresh_transaction_clears_redo() {
        let mut ed = editor(doc(vec![p("a")]));
        insert(&mut ed, 2, "b");
        ed.undo().unwrap();
        assert!(ed.can_redo());
        insert(&mut ed, 2, "c");
        assert!(!ed.can_redo());
    }

    #[test]
    fn test_stale_transaction_rejected() {
        let mut ed = editor(doc(vec![p("a")]));
        let mut stale = ed.transaction();
        stale.insert_text(1, "x").unwrap();
        insert(&mut ed, 1, "y");
        assert!(matches!(ed.dispatch(stale), Err(EditorError::InvalidStep(_))));
    }

    #[test]
    fn test_run_reports_out_of_range_in_debug() {
        let mut ed = editor(doc(vec![p("a")]));
        let result = ed.run(&InsertText::at(50, "x"));
        if cfg!(debug_assertions) {
            assert!(matches!(result, Err(EditorError::OutOfRange { .. })));
        } else {
            assert_eq!(result, Ok(false));
        }
        assert_eq!(ed.doc().root(), &doc(vec![p("a")]));
    }

    #[test]
    fn test_generation_single_undo_entry() {
        let mut ed = editor(doc(vec![p("intro"), p("replace me")]));
        ed.set_selection(Selection::range(8, 18)).unwrap();
        let before = ed.doc().clone();
        let depth = ed.history().undo_depth();

        let snapshot = ed.begin_generation(OperationKind::Improve, None).unwrap();
        assert_eq!(snapshot.text, "replace me");
        let pos = ed.install_placeholder(snapshot.id).unwrap();
        assert_eq!(pos, 7);
        ed.update_placeholder(snapshot.id, "Better").unwrap();
        ed.update_placeholder(snapshot.id, "Better text").unwrap();
        assert_eq!(
            ed.doc().root().child(1).unwrap().attr_str("text"),
            Some("Better text")
        );

        ed.finalize_generation(snapshot.id, Fragment::from(p("Better text")))
            .unwrap();
        assert_eq!(ed.doc().root(), &doc(vec![p("intro"), p("Better text")]));
        assert_eq!(ed.history().undo_depth(), depth + 1);
        assert!(!ed.is_generating());

        ed.undo().unwrap();
        assert_eq!(ed.doc(), &before);
        assert_eq!(ed.selection(), Selection::range(8, 18));
    }

    #[test]
    fn test_abort_restores_without_history() {
        let mut ed = editor(doc(vec![p("abcd")]));
        insert(&mut ed, 1, "x");
        let before = ed.doc().clone();
        ed.set_selection(Selection::caret(3)).unwrap();

        let snapshot = ed.begin_generation(OperationKind::Generate, Some("poem".into())).unwrap();
        ed.install_placeholder(snapshot.id).unwrap();
        assert_eq!(
            ed.doc().root(),
            &doc(vec![p("xa"), node_with_placeholder(), p("bcd")])
        );
        ed.update_placeholder(snapshot.id, "Roses").unwrap();
        ed.abort_generation(snapshot.id).unwrap();

        assert_eq!(ed.doc(), &before);
        assert_eq!(ed.selection(), Selection::caret(3));
        assert_eq!(ed.history().undo_depth(), 1);
        ed.undo().unwrap();
        assert_eq!(ed.doc().root(), &doc(vec![p("abcd")]));
    }

    fn node_with_placeholder() -> Node {
        let mut attrs = Attrs::new();
        attrs.insert("text".into(), json!(""));
        attrs.insert("operationKind".into(), json!("generate"));
        standard()
            .node(AI_GENERATION, attrs, Fragment::empty(), vec![])
            .unwrap()
    }

    #[test]
    fn test_second_generation_rejected() {
        let mut ed = editor(doc(vec![p("a")]));
        let first = ed.begin_generation(OperationKind::Generate, None).unwrap();
        let err = ed.begin_generation(OperationKind::Fix, None).unwrap_err();
        assert_eq!(err, EditorError::OperationInProgress(first.id));
    }

    #[test]
    fn test_placeholder_is_locked_against_user_edits() {
        let mut ed = editor(doc(vec![p("one"), p("two")]));
        ed.set_selection(Selection::range(6, 9)).unwrap();
        let snapshot = ed.begin_generation(OperationKind::Shorter, None).unwrap();
        let pos = ed.install_placeholder(snapshot.id).unwrap();

        let mut tr = ed.transaction();
        tr.delete(pos, pos + 1).unwrap();
        assert_eq!(ed.dispatch(tr).unwrap_err(), EditorError::PlaceholderLocked);

        // Edits elsewhere go through and stay undoable on their own.
        insert(&mut ed, 1, "zero ");
        assert_eq!(ed.placeholder_pos(snapshot.id), Some(pos + 5));
        ed.finalize_generation(snapshot.id, Fragment::from(p("2"))).unwrap();
        assert_eq!(ed.doc().root(), &doc(vec![p("zero one"), p("2")]));

        ed.undo().unwrap();
        assert_eq!(ed.doc().root(), &doc(vec![p("zero one"), p("two")]));
        ed.undo().unwrap();
        assert_eq!(ed.doc().root(), &doc(vec![p("one"), p("two")]));
    }

    #[test]
    fn test_undo_blocked_while_placeholder_pending() {
        let mut ed = editor(doc(vec![p("a")]));
        let snapshot = ed.begin_generation(OperationKind::Generate, None).unwrap();
        ed.install_placeholder(snapshot.id).unwrap();
        assert!(!ed.can_undo());
        assert_eq!(ed.undo(), Ok(false));
    }

    #[test]
    fn test_placeholder_at_paragraph_start() {
        let mut ed = editor(doc(vec![p("a")]));
        ed.set_selection(Selection::caret(1)).unwrap();
        let snapshot = ed.begin_generation(OperationKind::Generate, None).unwrap();
        let pos = ed.install_placeholder(snapshot.id).unwrap();
        assert_eq!(pos, 0);
        assert_eq!(ed.doc().root(), &doc(vec![node_with_placeholder(), p("a")]));

        ed.finalize_generation(snapshot.id, Fragment::from(p("b"))).unwrap();
        assert_eq!(ed.doc().root(), &doc(vec![p("b"), p("a")]));
        ed.undo().unwrap();
        assert_eq!(ed.doc().root(), &doc(vec![p("a")]));
        assert_eq!(ed.selection(), Selection::caret(1));
    }

    #[test]
    fn test_placeholder_at_paragraph_end() {
        let mut ed = editor(doc(vec![p("a")]));
        ed.set_selection(Selection::caret(2)).unwrap();
        let before = ed.doc().clone();
        let snapshot = ed.begin_generation(OperationKind::Generate, None).unwrap();
        let pos = ed.install_placeholder(snapshot.id).unwrap();
        assert_eq!(pos, 3);
        assert_eq!(ed.doc().root(), &doc(vec![p("a"), node_with_placeholder()]));
        assert_eq!(ed.placeholder_pos(snapshot.id), Some(3));

        ed.abort_generation(snapshot.id).unwrap();
        assert_eq!(ed.doc(), &before);
        assert_eq!(ed.selection(), Selection::caret(2));
    }

    #[test]
    fn test_rewrite_inside_paragraph_rejoins_text() {
        let mut ed = editor(doc(vec![p("The quick brown fox jumps.")]));
        ed.set_selection(Selection::range(5, 16)).unwrap();
        let before = ed.doc().clone();
        let depth = ed.history().undo_depth();

        let snapshot = ed.begin_generation(OperationKind::Improve, None).unwrap();
        assert_eq!(snapshot.text, "quick brown");
        ed.install_placeholder(snapshot.id).unwrap();
        ed.update_placeholder(snapshot.id, "slow red").unwrap();
        ed.finalize_generation(snapshot.id, Fragment::from(p("slow red")))
            .unwrap();

        assert_eq!(ed.doc().root(), &doc(vec![p("The slow red fox jumps.")]));
        assert_eq!(ed.selection(), Selection::caret(13));
        assert_eq!(ed.history().undo_depth(), depth + 1);

        ed.undo().unwrap();
        assert_eq!(ed.doc(), &before);
        assert_eq!(ed.selection(), Selection::range(5, 16));
        ed.redo().unwrap();
        assert_eq!(ed.doc().root(), &doc(vec![p("The slow red fox jumps.")]));
    }

    #[test]
    fn test_multi_block_rewrite_inside_paragraph_splits() {
        let mut ed = editor(doc(vec![p("abcd")]));
        ed.set_selection(Selection::range(2, 4)).unwrap();
        let snapshot = ed.begin_generation(OperationKind::Longer, None).unwrap();
        ed.install_placeholder(snapshot.id).unwrap();
        ed.finalize_generation(snapshot.id, Fragment::from_vec(vec![p("x"), p("y")]))
            .unwrap();
        assert_eq!(
            ed.doc().root(),
            &doc(vec![p("a"), p("x"), p("y"), p("d")])
        );
    }

    #[test]
    fn test_set_content_is_undoable() {
        let mut ed = editor(doc(vec![p("old")]));
        let replacement = Document::new(standard(), doc(vec![h(1, "new"), p("body")])).unwrap();
        ed.set_content(replacement.clone()).unwrap();
        assert_eq!(ed.doc(), &replacement);
        assert_eq!(ed.selection(), Selection::caret(1));
        ed.undo().unwrap();
        assert_eq!(ed.doc().root(), &doc(vec![p("old")]));
    }
}
