//! Fitting arbitrary content into a replaced range.
//!
//! Inline content dropped into a textblock is spliced in directly. Block
//! content dropped into a textblock splits it, and inline content at block
//! level is wrapped in the schema's default textblock first.

use crate::error::Result;
use crate::model::{Fragment, Node, ResolvedPos, Slice};
use crate::schema::Schema;

/// A replacement that is known to produce a valid document.
#[derive(Debug, Clone, PartialEq)]
pub struct Fitted {
    pub from: usize,
    pub to: usize,
    pub slice: Slice,
}

pub fn fit_replacement(
    doc: &Node,
    schema: &Schema,
    from: usize,
    to: usize,
    content: &Fragment,
) -> Result<Fitted> {
    let rfrom = doc.resolve(from)?;
    let rto = doc.resolve(to)?;

    if content.is_empty() {
        let delete = Fitted {
            from,
            to,
            slice: Slice::empty(),
        };
        return first_valid(doc, vec![delete]);
    }

    let all_inline = content.iter().all(Node::is_inline);
    if all_inline && rfrom.parent().inline_content() && rto.parent().inline_content() {
        return first_valid(doc, vec![fit_inline(&rfrom, &rto, content)]);
    }

    let blocks = wrap_inline_runs(schema, content)?;
    let candidates = [true, false]
        .into_iter()
        .map(|lift_edges| fit_blocks(doc, &rfrom, &rto, &blocks, lift_edges))
        .collect::<Result<Vec<_>>>()?;
    first_valid(doc, candidates)
}

fn first_valid(doc: &Node, candidates: Vec<Fitted>) -> Result<Fitted> {
    let mut first_err = None;
    for candidate in candidates {
        match doc.replace(candidate.from, candidate.to, &candidate.slice) {
            Ok(_) => return Ok(candidate),
            Err(err) => {
                first_err.get_or_insert(err);
            }
        }
    }
    Err(first_err.unwrap_or_else(|| {
        crate::error::EditorError::InvalidStep("no way to fit the content".into())
    }))
}

fn fit_inline(rfrom: &ResolvedPos, rto: &ResolvedPos, content: &Fragment) -> Fitted {
    let (from, to) = (rfrom.pos(), rto.pos());
    if rfrom.same_parent(rto) {
        return Fitted {
            from,
            to,
            slice: Slice::closed(content.clone()),
        };
    }
    let base = rfrom.shared_depth(to);
    let slice = if rfrom.depth() == rto.depth() {
        let left = chain(rfrom, base, content.clone());
        let open = rfrom.depth() - base;
        Slice::new(Fragment::from(left), open, open)
    } else {
        let left = chain(rfrom, base, content.clone());
        let right = chain(rto, base, Fragment::empty());
        Slice::new(
            Fragment::from_vec(vec![left, right]),
            rfrom.depth() - base,
            rto.depth() - base,
        )
    };
    Fitted { from, to, slice }
}

fn fit_blocks(
    doc: &Node,
    rfrom: &ResolvedPos,
    rto: &ResolvedPos,
    blocks: &Fragment,
    lift_edges: bool,
) -> Result<Fitted> {
    let mut from = rfrom.pos();
    let mut to = rto.pos();
    if lift_edges {
        let depth = rfrom.depth();
        if depth > 0 && rfrom.parent().is_textblock() && rfrom.parent_offset() == 0 {
            from = rfrom.before(depth)?;
        }
        let depth = rto.depth();
        if depth > 0
            && rto.parent().is_textblock()
            && rto.parent_offset() == rto.parent().content().size()
        {
            to = rto.after(depth)?;
        }
    }

    let ra = doc.resolve(from)?;
    let rb = doc.resolve(to)?;
    let mut base = ra.shared_depth(to);
    while base > 0 && (ra.node(base).inline_content() || ra.node(base).is_atom()) {
        base -= 1;
    }

    let mut nodes = Vec::new();
    if ra.depth() > base {
        nodes.push(chain(&ra, base, Fragment::empty()));
    }
    nodes.extend(blocks.iter().cloned());
    if rb.depth() > base {
        nodes.push(chain(&rb, base, Fragment::empty()));
    }

    Ok(Fitted {
        from,
        to,
        slice: Slice::new(
            Fragment::from_vec(nodes),
            ra.depth() - base,
            rb.depth() - base,
        ),
    })
}

/// Copies of the ancestors of `rpos` below `base`, nested, with `inner` as
/// the content of the innermost one.
fn chain(rpos: &ResolvedPos, base: usize, inner: Fragment) -> Node {
    let mut node = rpos.parent().copy(inner);
    for depth in (base + 1..rpos.depth()).rev() {
        node = rpos.node(depth).copy(Fragment::from(node));
    }
    node
}

/// Wrap every run of inline nodes in the default textblock.
pub fn wrap_inline_runs(schema: &Schema, content: &Fragment) -> Result<Fragment> {
    if content.iter().all(Node::is_block) {
        return Ok(content.clone());
    }
    let textblock = schema.default_textblock()?.name().to_string();
    let mut out = Vec::new();
    let mut run = Vec::new();
    for node in content.iter() {
        if node.is_inline() {
            run.push(node.clone());
        } else {
            if !run.is_empty() {
                let inline = Fragment::from_vec(std::mem::take(&mut run));
                out.push(schema.node_with_defaults(&textblock, inline)?);
            }
            out.push(node.clone());
        }
    }
    if !run.is_empty() {
        out.push(schema.node_with_defaults(&textblock, Fragment::from_vec(run))?);
    }
    Ok(Fragment::from_vec(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::*;
    use crate::schema::standard;

    fn apply(doc: &Node, from: usize, to: usize, content: Vec<Node>) -> Node {
        let fitted = fit_replacement(doc, &standard(), from, to, &Fragment::from_vec(content)).unwrap();
        doc.replace(fitted.from, fitted.to, &fitted.slice).unwrap()
    }

    #[test]
    fn test_inline_into_textblock() {
        let d = doc(vec![p("ad")]);
        assert_eq!(apply(&d, 2, 2, vec![txt("bc")]), doc(vec![p("abcd")]));
    }

    #[test]
    fn test_inline_across_paragraphs_joins() {
        let d = doc(vec![p("ab"), p("cd")]);
        assert_eq!(apply(&d, 2, 6, vec![txt("X")]), doc(vec![p("aXd")]));
    }

    #[test]
    fn test_block_splits_paragraph() {
        let d = doc(vec![p("abcd")]);
        assert_eq!(apply(&d, 3, 3, vec![hr()]), doc(vec![p("ab"), hr(), p("cd")]));
    }

    #[test]
    fn test_block_replaces_whole_paragraph() {
        let d = doc(vec![p("keep"), p("gone")]);
        assert_eq!(apply(&d, 7, 11, vec![hr()]), doc(vec![p("keep"), hr()]));
    }

    #[test]
    fn test_block_in_empty_paragraph() {
        let d = doc(vec![p("")]);
        assert_eq!(apply(&d, 1, 1, vec![hr()]), doc(vec![hr()]));
    }

    #[test]
    fn test_block_at_start_of_list_item_keeps_paragraph_first() {
        let d = doc(vec![ul(vec![li(vec![p("xy")])])]);
        let out = apply(&d, 3, 3, vec![hr()]);
        assert_eq!(out, doc(vec![ul(vec![li(vec![p(""), hr(), p("xy")])])]));
    }

    #[test]
    fn test_inline_at_block_level_is_wrapped() {
        let d = doc(vec![p("a"), p("b")]);
        assert_eq!(apply(&d, 3, 3, vec![txt("mid")]), doc(vec![p("a"), p("mid"), p("b")]));
    }
}
