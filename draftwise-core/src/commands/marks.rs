use super::Command;
use crate::editor::EditorState;
use crate::error::Result;
use crate::model::{Mark, Node};
use crate::schema::Attrs;
use crate::transaction::Transaction;
use serde_json::{json, Value};

/// How many inline nodes in the range can carry the mark, and how many
/// already do.
fn coverage(doc: &Node, from: usize, to: usize, mark: &Mark) -> (usize, usize) {
    let (mut applicable, mut marked) = (0, 0);
    doc.nodes_between(from, to, &mut |node: &Node, _, parent, _| {
        if !node.is_inline() {
            return true;
        }
        if parent.is_some_and(|p| p.node_type().allows_mark_type(mark.mark_type())) {
            applicable += 1;
            if Mark::find_type(node.marks(), mark.type_name()).is_some() {
                marked += 1;
            }
        }
        false
    });
    (applicable, marked)
}

/// The run of text around `pos` carrying a mark of this type.
pub(crate) fn mark_extent(doc: &Node, pos: usize, mark_type: &str) -> Option<(usize, usize, Mark)> {
    let rpos = doc.resolve(pos).ok()?;
    let parent = rpos.parent();
    let start = rpos.start(rpos.depth());
    let mut index = rpos.index(rpos.depth());
    let probe = parent
        .child(index)
        .and_then(|c| Mark::find_type(c.marks(), mark_type).cloned())
        .or_else(|| {
            let before = index.checked_sub(1)?;
            let mark = Mark::find_type(parent.child(before)?.marks(), mark_type).cloned()?;
            index = before;
            Some(mark)
        })?;

    let offsets: Vec<usize> = parent
        .content()
        .iter()
        .scan(start, |pos, child| {
            let at = *pos;
            *pos += child.node_size();
            Some(at)
        })
        .collect();
    let has = |i: usize| parent.child(i).is_some_and(|c| probe.is_in_set(c.marks()));
    let mut first = index;
    while first > 0 && has(first - 1) {
        first -= 1;
    }
    let mut last = index;
    while has(last + 1) {
        last += 1;
    }
    let end = offsets[last] + parent.child(last)?.node_size();
    Some((offsets[first], end, probe))
}

/// Adds the mark when it is not present across the whole selection,
/// removes it otherwise.
pub struct ToggleMark {
    mark: String,
    attrs: Attrs,
}

impl ToggleMark {
    pub fn new(mark: &str) -> Self {
        Self::with_attrs(mark, Attrs::new())
    }

    pub fn with_attrs(mark: &str, attrs: Attrs) -> Self {
        Self {
            mark: mark.to_string(),
            attrs,
        }
    }
}

impl Command for ToggleMark {
    fn name(&self) -> &'static str {
        "toggleMark"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        let sel = state.selection();
        if sel.is_empty() {
            return Ok(None);
        }
        let mark = state.schema().mark(&self.mark, self.attrs.clone())?;
        let doc = state.doc().root();
        let (applicable, marked) = coverage(doc, sel.from(), sel.to(), &mark);
        if applicable == 0 {
            return Ok(None);
        }
        let mut tr = state.tr();
        if marked == applicable {
            tr.remove_mark(sel.from(), sel.to(), &self.mark)?;
        } else {
            tr.add_mark(sel.from(), sel.to(), &mark)?;
        }
        Ok(tr.doc_changed().then_some(tr))
    }
}

pub struct SetMark {
    mark: String,
    attrs: Attrs,
}

impl SetMark {
    pub fn new(mark: &str, attrs: Attrs) -> Self {
        Self {
            mark: mark.to_string(),
            attrs,
        }
    }
}

impl Command for SetMark {
    fn name(&self) -> &'static str {
        "setMark"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        let sel = state.selection();
        if sel.is_empty() {
            return Ok(None);
        }
        let mark = state.schema().mark(&self.mark, self.attrs.clone())?;
        let mut tr = state.tr();
        tr.add_mark(sel.from(), sel.to(), &mark)?;
        Ok(tr.doc_changed().then_some(tr))
    }
}

pub struct UnsetMark {
    mark: String,
}

impl UnsetMark {
    pub fn new(mark: &str) -> Self {
        Self {
            mark: mark.to_string(),
        }
    }
}

impl Command for UnsetMark {
    fn name(&self) -> &'static str {
        "unsetMark"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        let sel = state.selection();
        let mut tr = state.tr();
        tr.remove_mark(sel.from(), sel.to(), &self.mark)?;
        Ok(tr.doc_changed().then_some(tr))
    }
}

/// Link the selection, or the link under the caret. With `text`, the
/// range is replaced by that text carrying the link.
pub struct SetLink {
    href: String,
    title: Option<String>,
    text: Option<String>,
}

impl SetLink {
    pub fn new(href: &str) -> Self {
        Self {
            href: href.trim().to_string(),
            title: None,
            text: None,
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }
}

impl Command for SetLink {
    fn name(&self) -> &'static str {
        "setLink"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        if self.href.is_empty() {
            return Ok(None);
        }
        let mut attrs = Attrs::new();
        attrs.insert("href".into(), json!(self.href));
        if let Some(title) = &self.title {
            attrs.insert("title".into(), json!(title));
        }
        let mark = state.schema().mark("link", attrs)?;

        let doc = state.doc().root();
        let sel = state.selection();
        let (from, to) = if sel.is_empty() {
            mark_extent(doc, sel.head, "link")
                .map(|(from, to, _)| (from, to))
                .unwrap_or((sel.from(), sel.to()))
        } else {
            (sel.from(), sel.to())
        };

        let mut tr = state.tr();
        match self.text.as_deref().filter(|t| !t.is_empty()) {
            Some(text) => {
                let parent_allows = doc
                    .resolve(from)?
                    .parent()
                    .node_type()
                    .allows_mark_type(mark.mark_type());
                let marks = if parent_allows { vec![mark] } else { vec![] };
                let node = state.schema().text(text, marks)?;
                tr.replace_with(from, to, node)?;
            }
            None if from == to => return Ok(None),
            None => {
                tr.add_mark(from, to, &mark)?;
            }
        }
        Ok(tr.doc_changed().then_some(tr))
    }
}

/// Remove the link from the selection, or from the whole link under the
/// caret.
pub struct UnsetLink;

impl Command for UnsetLink {
    fn name(&self) -> &'static str {
        "unsetLink"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        let sel = state.selection();
        let (from, to) = if sel.is_empty() {
            match mark_extent(state.doc().root(), sel.head, "link") {
                Some((from, to, _)) => (from, to),
                None => return Ok(None),
            }
        } else {
            (sel.from(), sel.to())
        };
        let mut tr = state.tr();
        tr.remove_mark(from, to, "link")?;
        Ok(tr.doc_changed().then_some(tr))
    }
}

/// Current `href` of the link under the selection start, if any.
pub fn active_link(state: &EditorState) -> Option<String> {
    let sel = state.selection();
    let (_, _, mark) = mark_extent(state.doc().root(), sel.from(), "link")?;
    match mark.attr("href") {
        Some(Value::String(href)) => Some(href.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Editor;
    use crate::model::test_support::*;
    use crate::model::Document;
    use crate::schema::standard;
    use crate::selection::Selection;

    fn editor(root: Node, selection: Selection) -> Editor {
        let mut editor = Editor::new(Document::new(standard(), root).unwrap());
        editor.set_selection(selection).unwrap();
        editor
    }

    fn link(text: &str, href: &str) -> Node {
        let schema = standard();
        let mut attrs = Attrs::new();
        attrs.insert("href".into(), json!(href));
        let mark = schema.mark("link", attrs).unwrap();
        schema.text(text, vec![mark]).unwrap()
    }

    #[test]
    fn test_toggle_adds_when_partially_marked() {
        let mut ed = editor(doc(vec![para(vec![bold("ab"), txt("cd")])]), Selection::range(1, 5));
        assert!(ed.run(&ToggleMark::new("bold")).unwrap());
        assert_eq!(ed.doc().root(), &doc(vec![para(vec![bold("abcd")])]));

        assert!(ed.run(&ToggleMark::new("bold")).unwrap());
        assert_eq!(ed.doc().root(), &doc(vec![p("abcd")]));
    }

    #[test]
    fn test_toggle_in_code_block_is_noop() {
        let ed = editor(doc(vec![node("codeBlock", vec![txt("fn")])]), Selection::range(1, 3));
        assert!(!ed.can_apply(&ToggleMark::new("italic")));
    }

    #[test]
    fn test_toggle_over_atom_only_is_noop() {
        let ed = editor(doc(vec![p("a"), youtube("https://youtu.be/x")]), Selection::range(3, 4));
        assert!(!ed.can_apply(&ToggleMark::new("bold")));
    }

    #[test]
    fn test_code_mark_replaces_other_marks() {
        let mut ed = editor(doc(vec![para(vec![bold("ab")])]), Selection::range(1, 3));
        assert!(ed.run(&ToggleMark::new("code")).unwrap());
        assert_eq!(ed.doc().root(), &doc(vec![para(vec![marked("ab", &["code"])])]));
        ed.undo().unwrap();
        assert_eq!(ed.doc().root(), &doc(vec![para(vec![bold("ab")])]));
    }

    #[test]
    fn test_set_link_with_text_replaces_selection() {
        let mut ed = editor(doc(vec![p("see here")]), Selection::range(5, 9));
        let cmd = SetLink::new("https://example.com").text("docs");
        assert!(ed.run(&cmd).unwrap());
        assert_eq!(
            ed.doc().root(),
            &doc(vec![para(vec![txt("see "), link("docs", "https://example.com")])])
        );
    }

    #[test]
    fn test_unset_link_at_caret_removes_whole_link() {
        let root = doc(vec![para(vec![txt("a "), link("site", "https://x.dev"), txt(".")])]);
        let mut ed = editor(root, Selection::caret(5));
        assert_eq!(active_link(ed.state()).as_deref(), Some("https://x.dev"));
        assert!(ed.run(&UnsetLink).unwrap());
        assert_eq!(ed.doc().root(), &doc(vec![p("a site.")]));
    }

    #[test]
    fn test_set_link_requires_href() {
        let ed = editor(doc(vec![p("abc")]), Selection::range(1, 3));
        assert!(!ed.can_apply(&SetLink::new("  ")));
    }
}
