use super::Command;
use crate::editor::EditorState;
use crate::error::{EditorError, Result};
use crate::model::{Fragment, Node, ResolvedPos, Slice};
use crate::schema::Attrs;
use crate::selection::Selection;
use crate::transaction::Transaction;
use crate::transform::{remove_mark_steps, Step};
use serde_json::json;

/// Sibling blocks covered by a selection.
struct BlockRange {
    parent: Node,
    start_index: usize,
    end_index: usize,
    /// Position before the first block.
    start: usize,
}

impl BlockRange {
    fn find(doc: &Node, from: usize, to: usize) -> Result<Option<BlockRange>> {
        let rfrom = doc.resolve(from)?;
        let rto = doc.resolve(to)?;
        let mut depth = rfrom.shared_depth(to);
        while depth > 0 && rfrom.node(depth).inline_content() {
            depth -= 1;
        }
        let parent = rfrom.node(depth).clone();
        let start_index = rfrom.index(depth);
        let end_index = if rto.depth() > depth {
            rto.index(depth) + 1
        } else {
            rto.index(depth)
        };
        let end_index = end_index.max(start_index + 1).min(parent.child_count());
        if start_index >= end_index {
            return Ok(None);
        }
        let start = rfrom.start(depth) + child_offset(&parent, start_index);
        Ok(Some(BlockRange {
            parent,
            start_index,
            end_index,
            start,
        }))
    }

    fn blocks(&self) -> impl Iterator<Item = &Node> {
        (self.start_index..self.end_index).filter_map(|i| self.parent.child(i))
    }

    fn end(&self) -> usize {
        self.start + self.blocks().map(Node::node_size).sum::<usize>()
    }

    /// Index among the covered blocks of the one containing `pos`.
    fn block_at(&self, pos: usize) -> Option<usize> {
        let mut at = self.start;
        for (k, block) in self.blocks().enumerate() {
            let end = at + block.node_size();
            if pos > at && pos < end {
                return Some(k);
            }
            at = end;
        }
        None
    }
}

fn child_offset(parent: &Node, index: usize) -> usize {
    parent
        .content()
        .iter()
        .take(index)
        .map(Node::node_size)
        .sum()
}

/// Textblocks touched by the selection, with their positions.
fn textblocks(doc: &Node, from: usize, to: usize) -> Vec<(usize, Node)> {
    let mut found = Vec::new();
    let to = (if from == to { to + 1 } else { to }).min(doc.content().size());
    doc.nodes_between(from.min(to), to, &mut |node: &Node, pos, _, _| {
        if node.is_textblock() {
            found.push((pos, node.clone()));
            return false;
        }
        !node.is_inline()
    });
    found
}

/// Move a selection across a rewrap of `range`: positions inside block `k`
/// shift by `inner(k)`, positions after the range by `total`.
fn shift_positions(
    selection: Selection,
    range: &BlockRange,
    inner: impl Fn(usize) -> isize,
    total: isize,
) -> Selection {
    let end = range.end();
    let shift = |pos: usize| -> usize {
        let delta = if pos <= range.start {
            0
        } else if pos >= end {
            total
        } else {
            range.block_at(pos).map_or(0, &inner)
        };
        (pos as isize + delta).max(0) as usize
    };
    Selection::new(shift(selection.anchor), shift(selection.head))
}

/// Convert every textblock touched by the selection.
pub struct SetBlockType {
    node_type: String,
    attrs: Attrs,
}

impl SetBlockType {
    pub fn new(node_type: &str, attrs: Attrs) -> Self {
        Self {
            node_type: node_type.to_string(),
            attrs,
        }
    }
}

impl Command for SetBlockType {
    fn name(&self) -> &'static str {
        "setBlockType"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        set_block_type(state, &self.node_type, &self.attrs)
    }
}

fn set_block_type(state: &EditorState, type_name: &str, attrs: &Attrs) -> Result<Option<Transaction>> {
    let schema = state.schema();
    let target = schema.node_type(type_name)?.clone();
    if !target.is_textblock() {
        return Ok(None);
    }
    let attrs = target.compute_attrs(attrs)?;
    let sel = state.selection();
    let doc = state.doc().root();
    let mut tr = state.tr();
    for (pos, block) in textblocks(doc, sel.from(), sel.to()) {
        if block.has_markup(&target, &attrs, block.marks()) {
            continue;
        }
        if block.node_type().is_declared_atom() {
            continue;
        }
        let content_start = pos + 1;
        let content_end = content_start + block.content().size();
        let mut attempt = tr.clone();
        let retyped = (|| -> Result<()> {
            // Strip marks the target type refuses before retyping.
            let refused = |m: &crate::model::Mark| !target.allows_mark_type(m.mark_type());
            let (from, to) = (attempt.map(content_start, 1)?, attempt.map(content_end, -1)?);
            for step in remove_mark_steps(attempt.doc(), from, to, refused) {
                attempt.step(step)?;
            }
            let mapped = attempt.map(pos, 1)?;
            attempt.step(Step::SetMarkup {
                pos: mapped,
                node_type: type_name.to_string(),
                attrs: attrs.clone(),
            })?;
            Ok(())
        })();
        match retyped {
            Ok(()) => tr = attempt,
            // The parent refuses the new type here; leave this block alone.
            Err(EditorError::ContentViolation { .. }) => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(tr.doc_changed().then_some(tr))
}

/// True when every textblock touched by the selection has this type and
/// these attributes.
fn all_blocks_are(state: &EditorState, type_name: &str, attrs: &Attrs) -> bool {
    let sel = state.selection();
    let blocks = textblocks(state.doc().root(), sel.from(), sel.to());
    !blocks.is_empty()
        && blocks.iter().all(|(_, b)| {
            b.type_name() == type_name && attrs.iter().all(|(k, v)| b.attr(k) == Some(v))
        })
}

fn default_block(state: &EditorState) -> Result<String> {
    Ok(state.schema().default_textblock()?.name().to_string())
}

pub struct ToggleHeading {
    level: u8,
}

impl ToggleHeading {
    pub fn new(level: u8) -> Self {
        Self {
            level: level.clamp(1, 6),
        }
    }
}

impl Command for ToggleHeading {
    fn name(&self) -> &'static str {
        "toggleHeading"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        let mut attrs = Attrs::new();
        attrs.insert("level".into(), json!(self.level));
        if all_blocks_are(state, "heading", &attrs) {
            set_block_type(state, &default_block(state)?, &Attrs::new())
        } else {
            set_block_type(state, "heading", &attrs)
        }
    }
}

pub struct ToggleCodeBlock;

impl Command for ToggleCodeBlock {
    fn name(&self) -> &'static str {
        "toggleCodeBlock"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        if all_blocks_are(state, "codeBlock", &Attrs::new()) {
            set_block_type(state, &default_block(state)?, &Attrs::new())
        } else {
            set_block_type(state, "codeBlock", &Attrs::new())
        }
    }
}

/// Innermost ancestor of both ends of the selection with one of the given
/// types.
fn enclosing(rfrom: &ResolvedPos, to: usize, types: &[&str]) -> Option<usize> {
    let shared = rfrom.shared_depth(to);
    (1..=shared)
        .rev()
        .find(|&d| types.contains(&rfrom.node(d).type_name()))
}

pub struct ToggleBlockquote;

impl Command for ToggleBlockquote {
    fn name(&self) -> &'static str {
        "toggleBlockquote"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        let sel = state.selection();
        let doc = state.doc().root();
        let rfrom = doc.resolve(sel.from())?;
        let mut tr = state.tr();

        if let Some(depth) = enclosing(&rfrom, sel.to(), &["blockquote"]) {
            let quote = rfrom.node(depth).clone();
            let (start, end) = (rfrom.before(depth)?, rfrom.after(depth)?);
            if replace_blocks(&mut tr, start, end, quote.content().clone())?.is_none() {
                return Ok(None);
            }
            let shift = |pos: usize| {
                if pos >= end {
                    pos - 2
                } else if pos > start {
                    pos - 1
                } else {
                    pos
                }
            };
            tr.set_selection(Selection::new(shift(sel.anchor), shift(sel.head)))?;
            return Ok(Some(tr));
        }

        let Some(range) = BlockRange::find(doc, sel.from(), sel.to())? else {
            return Ok(None);
        };
        let inner: Vec<Node> = range.blocks().cloned().collect();
        let quote = state
            .schema()
            .node_with_defaults("blockquote", Fragment::from_vec(inner))?;
        if replace_blocks(&mut tr, range.start, range.end(), Fragment::from(quote))?.is_none() {
            return Ok(None);
        }
        tr.set_selection(shift_positions(sel, &range, |_| 1, 2))?;
        Ok(Some(tr))
    }
}

/// Replace whole blocks, treating an invalid result as "does not apply".
fn replace_blocks(tr: &mut Transaction, start: usize, end: usize, content: Fragment) -> Result<Option<()>> {
    match tr.step(Step::replace(start, end, Slice::closed(content))) {
        Ok(_) => Ok(Some(())),
        Err(EditorError::ContentViolation { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

const LIST_TYPES: [&str; 2] = ["bulletList", "orderedList"];

fn toggle_list(state: &EditorState, list_type: &str) -> Result<Option<Transaction>> {
    let sel = state.selection();
    let doc = state.doc().root();
    let rfrom = doc.resolve(sel.from())?;
    let schema = state.schema();
    let mut tr = state.tr();

    if let Some(depth) = enclosing(&rfrom, sel.to(), &LIST_TYPES) {
        let list = rfrom.node(depth).clone();
        let pos = rfrom.before(depth)?;
        if list.type_name() != list_type {
            tr.step(Step::SetMarkup {
                pos,
                node_type: list_type.to_string(),
                attrs: Attrs::new(),
            })?;
            return Ok(Some(tr));
        }
        // Lift every item's content out of the list.
        let lifted: Vec<Node> = list
            .content()
            .iter()
            .flat_map(|item| item.content().to_vec())
            .collect();
        let end = pos + list.node_size();
        if replace_blocks(&mut tr, pos, end, Fragment::from_vec(lifted))?.is_none() {
            return Ok(None);
        }
        let range = BlockRange {
            start_index: 0,
            end_index: list.child_count(),
            parent: list,
            start: pos + 1,
        };
        let shift = |p: usize| -> usize {
            if p <= pos {
                p
            } else if p >= end {
                p - 2 - 2 * range.parent.child_count()
            } else {
                let k = range.block_at(p).unwrap_or(0);
                p.saturating_sub(2 + 2 * k)
            }
        };
        tr.set_selection(Selection::new(shift(sel.anchor), shift(sel.head)))?;
        return Ok(Some(tr));
    }

    let Some(range) = BlockRange::find(doc, sel.from(), sel.to())? else {
        return Ok(None);
    };
    let paragraph = default_block(state)?;
    let mut items = Vec::new();
    for block in range.blocks() {
        let block = if block.is_textblock() && block.type_name() != paragraph {
            match schema.node(&paragraph, Attrs::new(), block.content().clone(), vec![]) {
                Ok(p) => p,
                Err(_) => return Ok(None),
            }
        } else {
            block.clone()
        };
        match schema.node("listItem", Attrs::new(), Fragment::from(block), vec![]) {
            Ok(item) => items.push(item),
            Err(_) => return Ok(None),
        }
    }
    let count = items.len() as isize;
    let list = schema.node_with_defaults(list_type, Fragment::from_vec(items))?;
    if replace_blocks(&mut tr, range.start, range.end(), Fragment::from(list))?.is_none() {
        return Ok(None);
    }
    tr.set_selection(shift_positions(sel, &range, |k| 2 + 2 * k as isize, 2 + 2 * count))?;
    Ok(Some(tr))
}

pub struct ToggleBulletList;

impl Command for ToggleBulletList {
    fn name(&self) -> &'static str {
        "toggleBulletList"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        toggle_list(state, "bulletList")
    }
}

pub struct ToggleOrderedList;

impl Command for ToggleOrderedList {
    fn name(&self) -> &'static str {
        "toggleOrderedList"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        toggle_list(state, "orderedList")
    }
}
