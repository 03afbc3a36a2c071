//! Transactions: ordered batches of steps against one document version.
//!
//! Builder methods take positions in the base document and map them
//! through the steps already added, so a transaction reads as one coherent
//! edit of the version it started from. Every step is checked as it is
//! added; if any step fails the transaction is simply dropped and the base
//! document is untouched.

use crate::error::{EditorError, Result};
use crate::model::{Document, Fragment, Mark, Node};
use crate::selection::Selection;
use crate::transform::{
    add_mark_steps, fit_replacement, remove_mark_steps, Mapping, Step,
};
use crate::schema::Attrs;
use serde_json::Value;

/// The result of committing a transaction.
#[derive(Debug, Clone)]
pub struct Commit {
    pub doc: Document,
    pub selection: Selection,
    pub steps: Vec<Step>,
    /// Inverse of each step, in application order.
    pub inverses: Vec<Step>,
    pub mapping: Mapping,
    pub ephemeral: bool,
}

impl Commit {
    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Steps that undo the whole commit, in application order.
    pub fn inverted_steps(&self) -> Vec<Step> {
        self.inverses.iter().rev().cloned().collect()
    }
}

#[derive(Debug, Clone)]
pub struct Transaction {
    base: Document,
    base_selection: Selection,
    doc: Node,
    steps: Vec<Step>,
    inverses: Vec<Step>,
    mapping: Mapping,
    selection: Option<Selection>,
    ephemeral: bool,
}

impl Transaction {
    pub fn new(base: &Document, selection: Selection) -> Self {
        Self {
            doc: base.root().clone(),
            base: base.clone(),
            base_selection: selection,
            steps: Vec::new(),
            inverses: Vec::new(),
            mapping: Mapping::new(),
            selection: None,
            ephemeral: false,
        }
    }

    pub fn base(&self) -> &Document {
        &self.base
    }

    /// The document as it stands after the steps added so far.
    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Keep this transaction out of the undo history.
    pub fn set_ephemeral(&mut self) -> &mut Self {
        self.ephemeral = true;
        self
    }

    /// The selection after the steps so far: the explicit one if set,
    /// otherwise the base selection mapped forward.
    pub fn selection(&self) -> Selection {
        self.selection.unwrap_or_else(|| {
            self.base_selection
                .map(&self.mapping, self.doc.content().size())
        })
    }

    /// Set the selection, in the coordinates of the current document.
    pub fn set_selection(&mut self, selection: Selection) -> Result<&mut Self> {
        let size = self.doc.content().size();
        for pos in [selection.anchor, selection.head] {
            if pos > size {
                return Err(EditorError::OutOfRange { pos, size });
            }
        }
        self.selection = Some(selection);
        Ok(self)
    }

    /// Map a base-document position into the current document.
    pub fn map(&self, pos: usize, assoc: i8) -> Result<usize> {
        let size = self.base.size();
        if pos > size {
            return Err(EditorError::OutOfRange { pos, size });
        }
        Ok(self.mapping.map(pos, assoc))
    }

    fn map_range(&self, from: usize, to: usize) -> Result<(usize, usize)> {
        if to < from {
            return Err(EditorError::InvalidStep(format!(
                "range {from}..{to} is inverted"
            )));
        }
        let from = self.map(from, 1)?;
        let to = self.map(to, -1)?;
        Ok((from, from.max(to)))
    }

    /// Apply a step given in current-document coordinates.
    pub fn step(&mut self, step: Step) -> Result<&mut Self> {
        for pos in step.boundaries() {
            let rpos = self.doc.resolve(pos)?;
            if rpos.atomic_ancestor().is_some() {
                return Err(EditorError::AtomicBoundary { pos });
            }
        }
        let next = step.apply(&self.doc, self.base.schema())?;
        let inverse = step.invert(&self.doc)?;
        self.mapping.push(step.get_map());
        self.inverses.push(inverse);
        self.steps.push(step);
        self.doc = next;
        Ok(self)
    }

    /// Apply the steps of a transaction that was built on top of this
    /// one's current document.
    pub fn append(&mut self, other: Transaction) -> Result<&mut Self> {
        for step in other.steps {
            self.step(step)?;
        }
        if let Some(selection) = other.selection {
            self.set_selection(selection)?;
        }
        self.ephemeral |= other.ephemeral;
        Ok(self)
    }

    pub fn insert_text(&mut self, pos: usize, text: &str) -> Result<&mut Self> {
        if text.is_empty() {
            return Ok(self);
        }
        let at = self.map(pos, 1)?;
        let rpos = self.doc.resolve(at)?;
        let parent = rpos.parent().node_type().clone();
        let marks: Vec<Mark> = rpos
            .marks()
            .into_iter()
            .filter(|m| parent.allows_mark_type(m.mark_type()))
            .collect();
        let node = self.base.schema().text(text, marks)?;
        self.replace_current(at, at, Fragment::from(node))
    }

    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self> {
        let (from, to) = self.map_range(from, to)?;
        if from == to {
            return Ok(self);
        }
        self.step(Step::replace(from, to, crate::model::Slice::empty()))
    }

    /// Replace `from..to` with content, splitting or wrapping as needed to
    /// keep the document valid.
    pub fn replace_with(
        &mut self,
        from: usize,
        to: usize,
        content: impl Into<Fragment>,
    ) -> Result<&mut Self> {
        let (from, to) = self.map_range(from, to)?;
        self.replace_current(from, to, content.into())
    }

    pub fn insert(&mut self, pos: usize, content: impl Into<Fragment>) -> Result<&mut Self> {
        self.replace_with(pos, pos, content)
    }

    /// `replace_with` in current-document coordinates.
    pub(crate) fn replace_current(
        &mut self,
        from: usize,
        to: usize,
        content: Fragment,
    ) -> Result<&mut Self> {
        if from == to && content.is_empty() {
            return Ok(self);
        }
        let fitted = fit_replacement(&self.doc, self.base.schema(), from, to, &content)?;
        self.step(Step::replace(fitted.from, fitted.to, fitted.slice))
    }

    pub fn set_node_attribute(
        &mut self,
        pos: usize,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        let pos = self.map(pos, 1)?;
        self.step(Step::SetAttr {
            pos,
            attr: key.to_string(),
            value: value.into(),
        })
    }

    pub fn set_node_markup(&mut self, pos: usize, type_name: &str, attrs: Attrs) -> Result<&mut Self> {
        let pos = self.map(pos, 1)?;
        self.step(Step::SetMarkup {
            pos,
            node_type: type_name.to_string(),
            attrs,
        })
    }

    pub fn add_mark(&mut self, from: usize, to: usize, mark: &Mark) -> Result<&mut Self> {
        let (from, to) = self.map_range(from, to)?;
        for step in add_mark_steps(&self.doc, from, to, mark) {
            self.step(step)?;
        }
        Ok(self)
    }

    /// Remove every mark of the named type from the range.
    pub fn remove_mark(&mut self, from: usize, to: usize, mark_type: &str) -> Result<&mut Self> {
        self.base.schema().mark_type(mark_type)?;
        let (from, to) = self.map_range(from, to)?;
        for step in remove_mark_steps(&self.doc, from, to, |m| m.type_name() == mark_type) {
            self.step(step)?;
        }
        Ok(self)
    }

    /// Remove one specific mark (type and attributes) from the range.
    pub fn remove_exact_mark(&mut self, from: usize, to: usize, mark: &Mark) -> Result<&mut Self> {
        let (from, to) = self.map_range(from, to)?;
        for step in remove_mark_steps(&self.doc, from, to, |m| m == mark) {
            self.step(step)?;
        }
        Ok(self)
    }

    /// Validate the resulting document and produce the commit.
    pub fn commit(self) -> Result<Commit> {
        let schema = self.base.schema().clone();
        schema.validate(&self.doc)?;
        let selection = self.selection();
        let doc = Document::from_parts_unchecked(schema, self.doc);
        Ok(Commit {
            doc,
            selection,
            steps: self.steps,
            inverses: self.inverses,
            mapping: self.mapping,
            ephemeral: self.ephemeral,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::*;
    use crate::schema::{standard, MarkSpec, NodeSpec, Schema};
    use serde_json::json;

    fn document(root: Node) -> Document {
        Document::new(standard(), root).unwrap()
    }

    #[test]
    fn test_positions_are_base_coordinates() {
        let d = document(doc(vec![p("abcdef")]));
        let mut tr = Transaction::new(&d, Selection::caret(7));
        tr.insert_text(1, "XY").unwrap();
        // Still addresses "cd" in the base document.
        tr.delete(3, 5).unwrap();
        let commit = tr.commit().unwrap();
        assert_eq!(commit.doc.root(), &doc(vec![p("XYabef")]));
        assert_eq!(commit.selection, Selection::caret(7));
    }

    #[test]
    fn test_insert_text_inherits_marks() {
        let d = document(doc(vec![para(vec![bold("ab")])]));
        let mut tr = Transaction::new(&d, Selection::caret(3));
        tr.insert_text(3, "c").unwrap();
        let commit = tr.commit().unwrap();
        assert_eq!(commit.doc.root(), &doc(vec![para(vec![bold("abc")])]));
    }

    #[test]
    fn test_failed_step_leaves_base_untouched() {
        let d = document(doc(vec![p("only")]));
        let mut tr = Transaction::new(&d, Selection::caret(1));
        assert!(tr.delete(0, 6).is_err());
        assert_eq!(d.root(), &doc(vec![p("only")]));
    }

    #[test]
    fn test_out_of_range() {
        let d = document(doc(vec![p("ab")]));
        let mut tr = Transaction::new(&d, Selection::caret(1));
        let err = tr.insert_text(99, "x").unwrap_err();
        assert_eq!(err, EditorError::OutOfRange { pos: 99, size: 4 });
    }

    #[test]
    fn test_inverses_restore_base() {
        let d = document(doc(vec![h(1, "title"), p("body")]));
        let mut tr = Transaction::new(&d, Selection::caret(1));
        tr.set_node_attribute(0, "level", json!(2)).unwrap();
        tr.replace_with(8, 12, vec![hr()]).unwrap();
        let commit = tr.commit().unwrap();

        let mut undo = Transaction::new(&commit.doc, commit.selection);
        for step in commit.inverted_steps() {
            undo.step(step).unwrap();
        }
        assert_eq!(undo.commit().unwrap().doc, d);
    }

    #[test]
    fn test_remove_mark_by_type() {
        let d = document(doc(vec![para(vec![txt("a"), bold("bc")])]));
        let mut tr = Transaction::new(&d, Selection::caret(1));
        tr.remove_mark(1, 4, "bold").unwrap();
        assert_eq!(tr.commit().unwrap().doc.root(), &doc(vec![p("abc")]));
    }

    fn figure_schema() -> std::sync::Arc<Schema> {
        Schema::builder()
            .node("doc", NodeSpec::new().content("block+"))
            .and_then(|b| b.node("paragraph", NodeSpec::new().content("inline*").group("block")))
            .and_then(|b| {
                b.node(
                    "figure",
                    NodeSpec::new().content("inline*").group("block").atom(),
                )
            })
            .and_then(|b| b.node("text", NodeSpec::new().group("inline")))
            .and_then(|b| b.mark("bold", MarkSpec::new()))
            .and_then(|b| b.build())
            .unwrap()
    }

    #[test]
    fn test_rejects_steps_inside_atomic_nodes() {
        let schema = figure_schema();
        let caption = schema.text("caption", vec![]).unwrap();
        let figure = schema
            .node("figure", Attrs::new(), Fragment::from(caption), vec![])
            .unwrap();
        let root = schema
            .node("doc", Attrs::new(), Fragment::from(figure), vec![])
            .unwrap();
        let d = Document::new(schema, root).unwrap();

        let mut tr = Transaction::new(&d, Selection::caret(0));
        let err = tr.insert_text(3, "x").unwrap_err();
        assert_eq!(err, EditorError::AtomicBoundary { pos: 3 });
        assert!(!tr.doc_changed());

        // Replacing the figure wholesale is allowed.
        let mut tr = Transaction::new(&d, Selection::caret(0));
        let para = d.schema().create_and_fill("paragraph").unwrap();
        tr.replace_with(0, 9, para).unwrap();
        assert!(tr.commit().is_ok());
    }
}
