//! Replacing a range of a document with a slice.
//!
//! The range and the slice are walked from the root down. Along the way
//! nodes that the range cuts through are joined with the open edges of the
//! slice, and every node whose content changes is re-checked against its
//! content expression.

use super::fragment::Fragment;
use super::node::Node;
use super::resolve::ResolvedPos;
use super::slice::Slice;
use crate::error::{EditorError, Result};

pub(crate) fn replace(from: &ResolvedPos, to: &ResolvedPos, slice: &Slice) -> Result<Node> {
    if slice.open_start() > from.depth() || slice.open_end() > to.depth() {
        return Err(EditorError::InvalidStep(
            "inserted content deeper than insertion position".into(),
        ));
    }
    if from.depth() - slice.open_start() != to.depth() - slice.open_end() {
        return Err(EditorError::InvalidStep("inconsistent open depths".into()));
    }
    replace_outer(from, to, slice, 0)
}

fn replace_outer(from: &ResolvedPos, to: &ResolvedPos, slice: &Slice, depth: usize) -> Result<Node> {
    let index = from.index(depth);
    let node = from.node(depth);

    if index == to.index(depth) && depth < from.depth() - slice.open_start() {
        let inner = replace_outer(from, to, slice, depth + 1)?;
        return Ok(node.copy(node.content().replace_child(index, inner)));
    }

    if slice.content().size() == 0 {
        return close(node, replace_two_way(from, to, depth)?);
    }

    if slice.open_start() == 0
        && slice.open_end() == 0
        && from.depth() == depth
        && to.depth() == depth
    {
        let parent = from.parent();
        let content = parent.content();
        let joined = content
            .cut(0, from.parent_offset())
            .append(slice.content())
            .append(&content.cut(to.parent_offset(), content.size()));
        return close(parent, joined);
    }

    let (start, end) = prepare_slice_for_replace(slice, from)?;
    close(node, replace_three_way(from, &start, &end, to, depth)?)
}

fn check_join(main: &Node, sub: &Node) -> Result<()> {
    if !sub.node_type().compatible_content(main.node_type()) {
        return Err(EditorError::violation(
            main.type_name(),
            format!("cannot join {} onto {}", sub.type_name(), main.type_name()),
        ));
    }
    Ok(())
}

fn joinable(before: &ResolvedPos, after: &ResolvedPos, depth: usize) -> Result<Node> {
    let node = before.node(depth);
    check_join(node, after.node(depth))?;
    Ok(node.clone())
}

fn add_node(child: Node, target: &mut Vec<Node>) {
    if let Some(last) = target.last_mut() {
        if child.is_text() && last.is_text() && child.same_markup(last) {
            let text = format!(
                "{}{}",
                last.text().unwrap_or_default(),
                child.text().unwrap_or_default()
            );
            *last = last.with_text(&text);
            return;
        }
    }
    target.push(child);
}

fn add_range(
    start: Option<&ResolvedPos>,
    end: Option<&ResolvedPos>,
    depth: usize,
    target: &mut Vec<Node>,
) {
    let Some(node) = end.or(start).map(|r| r.node(depth)) else {
        return;
    };
    let mut start_index = 0;
    let end_index = end.map_or(node.child_count(), |e| e.index(depth));
    if let Some(s) = start {
        start_index = s.index(depth);
        if s.depth() > depth {
            start_index += 1;
        } else if s.text_offset() > 0 {
            if let Some(after) = s.node_after() {
                add_node(after, target);
            }
            start_index += 1;
        }
    }
    for i in start_index..end_index {
        if let Some(child) = node.child(i) {
            add_node(child.clone(), target);
        }
    }
    if let Some(e) = end {
        if e.depth() == depth && e.text_offset() > 0 {
            if let Some(before) = e.node_before() {
                add_node(before, target);
            }
        }
    }
}

fn close(node: &Node, content: Fragment) -> Result<Node> {
    node.node_type().check_content(&content)?;
    Ok(node.copy(content))
}

fn replace_three_way(
    from: &ResolvedPos,
    start: &ResolvedPos,
    end: &ResolvedPos,
    to: &ResolvedPos,
    depth: usize,
) -> Result<Fragment> {
    let open_start = if from.depth() > depth {
        Some(joinable(from, start, depth + 1)?)
    } else {
        None
    };
    let open_end = if to.depth() > depth {
        Some(joinable(end, to, depth + 1)?)
    } else {
        None
    };

    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    match (&open_start, &open_end) {
        (Some(os), Some(oe)) if start.index(depth) == end.index(depth) => {
            check_join(os, oe)?;
            let inner = replace_three_way(from, start, end, to, depth + 1)?;
            add_node(close(os, inner)?, &mut content);
        }
        _ => {
            if let Some(os) = &open_start {
                add_node(close(os, replace_two_way(from, start, depth + 1)?)?, &mut content);
            }
            add_range(Some(start), Some(end), depth, &mut content);
            if let Some(oe) = &open_end {
                add_node(close(oe, replace_two_way(end, to, depth + 1)?)?, &mut content);
            }
        }
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::from_vec(content))
}

fn replace_two_way(from: &ResolvedPos, to: &ResolvedPos, depth: usize) -> Result<Fragment> {
    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    if from.depth() > depth {
        let joined = joinable(from, to, depth + 1)?;
        add_node(close(&joined, replace_two_way(from, to, depth + 1)?)?, &mut content);
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::from_vec(content))
}

/// Wrap the slice in copies of the ancestors of `along` so its open edges
/// can be resolved like positions in a real document.
fn prepare_slice_for_replace(slice: &Slice, along: &ResolvedPos) -> Result<(ResolvedPos, ResolvedPos)> {
    let extra = along.depth() - slice.open_start();
    let parent = along.node(extra);
    let mut node = parent.copy(slice.content().clone());
    for depth in (0..extra).rev() {
        node = along.node(depth).copy(Fragment::from(node));
    }
    let start = node.resolve(slice.open_start() + extra)?;
    let end = node.resolve(node.content().size() - slice.open_end() - extra)?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use crate::model::test_support::*;
    use crate::model::{Fragment, Slice};

    #[test]
    fn test_delete_within_paragraph() {
        let d = doc(vec![p("hello")]);
        let out = d.replace(2, 4, &Slice::empty()).unwrap();
        assert_eq!(out, doc(vec![p("hlo")]));
    }

    #[test]
    fn test_delete_across_paragraphs_joins() {
        let d = doc(vec![p("hello"), p("world")]);
        let out = d.replace(3, 10, &Slice::empty()).unwrap();
        assert_eq!(out, doc(vec![p("herld")]));
    }

    #[test]
    fn test_insert_open_slice_splits() {
        let d = doc(vec![p("abcd")]);
        let slice = Slice::new(Fragment::from_vec(vec![p(""), hr(), p("")]), 1, 1);
        let out = d.replace(3, 3, &slice).unwrap();
        assert_eq!(out, doc(vec![p("ab"), hr(), p("cd")]));
    }

    #[test]
    fn test_reinsert_slice_restores() {
        let d = doc(vec![p("hello"), p("world")]);
        let removed = d.slice(3, 10).unwrap();
        let joined = d.replace(3, 10, &Slice::empty()).unwrap();
        let restored = joined.replace(3, 3, &removed).unwrap();
        assert_eq!(restored, d);
    }

    #[test]
    fn test_invalid_content_rejected() {
        let d = doc(vec![p("only")]);
        // Removing the last block would leave the document empty.
        let err = d.replace(0, 6, &Slice::empty()).unwrap_err();
        assert!(matches!(err, crate::error::EditorError::ContentViolation { .. }));
    }

    #[test]
    fn test_inconsistent_depths_rejected() {
        let d = doc(vec![p("ab"), ul(vec![li(vec![p("cd")])])]);
        assert!(d.replace(2, 7, &Slice::empty()).is_err());
    }
}
