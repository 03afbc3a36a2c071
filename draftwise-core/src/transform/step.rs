//! Primitive document mutations.

use super::map::{Mapping, StepMap};
use crate::error::{EditorError, Result};
use crate::model::{Fragment, Mark, Node, Slice};
use crate::schema::{Attrs, Schema};
use serde_json::Value;
use std::sync::Arc;

/// A single primitive change to a document. Steps are the only way a
/// document is ever modified; every step can be inverted and mapped
/// through later changes.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Replace `from..to` with a slice.
    Replace { from: usize, to: usize, slice: Slice },
    /// Set one attribute of the node starting at `pos`.
    SetAttr { pos: usize, attr: String, value: Value },
    /// Change the type and attributes of the node at `pos`, keeping its content.
    SetMarkup {
        pos: usize,
        node_type: String,
        attrs: Attrs,
    },
    AddMark { from: usize, to: usize, mark: Mark },
    RemoveMark { from: usize, to: usize, mark: Mark },
}

impl Step {
    pub fn replace(from: usize, to: usize, slice: Slice) -> Self {
        Step::Replace { from, to, slice }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Step::Replace { .. } => "replace",
            Step::SetAttr { .. } => "setAttr",
            Step::SetMarkup { .. } => "setMarkup",
            Step::AddMark { .. } => "addMark",
            Step::RemoveMark { .. } => "removeMark",
        }
    }

    /// Positions this step touches, used for the atomic boundary check.
    pub fn boundaries(&self) -> Vec<usize> {
        match self {
            Step::Replace { from, to, .. }
            | Step::AddMark { from, to, .. }
            | Step::RemoveMark { from, to, .. } => vec![*from, *to],
            Step::SetAttr { pos, .. } | Step::SetMarkup { pos, .. } => vec![*pos],
        }
    }

    pub fn apply(&self, doc: &Node, schema: &Schema) -> Result<Node> {
        match self {
            Step::Replace { from, to, slice } => doc.replace(*from, *to, slice),
            Step::SetAttr { pos, attr, value } => update_node_at(doc, *pos, |node| {
                if node.is_text() {
                    return Err(EditorError::InvalidStep("text nodes have no attributes".into()));
                }
                let mut attrs = node.attrs().clone();
                attrs.insert(attr.clone(), value.clone());
                let attrs = node.node_type().compute_attrs(&attrs)?;
                Ok(node.with_attrs(attrs))
            }),
            Step::SetMarkup {
                pos,
                node_type,
                attrs,
            } => {
                let target = schema.node_type(node_type)?.clone();
                update_node_at(doc, *pos, |node| {
                    if node.is_text() || target.is_text() {
                        return Err(EditorError::InvalidStep("cannot change the type of text".into()));
                    }
                    let attrs = target.compute_attrs(attrs)?;
                    target.check_content(node.content())?;
                    Ok(node.with_type(Arc::clone(&target), attrs))
                })
            }
            Step::AddMark { from, to, mark } => {
                let old = doc.slice(*from, *to)?;
                let rfrom = doc.resolve(*from)?;
                let parent = rfrom.node(rfrom.shared_depth(*to)).clone();
                let content = map_fragment(old.content(), &parent, &|node: &Node, parent: &Node| {
                    if !node.is_atom() || !parent.node_type().allows_mark_type(mark.mark_type()) {
                        return node.clone();
                    }
                    node.with_marks(mark.add_to_set(node.marks()))
                });
                let slice = Slice::new(content, old.open_start(), old.open_end());
                doc.replace(*from, *to, &slice)
            }
            Step::RemoveMark { from, to, mark } => {
                let old = doc.slice(*from, *to)?;
                let content = map_fragment(old.content(), doc, &|node: &Node, _: &Node| {
                    node.with_marks(mark.remove_from_set(node.marks()))
                });
                let slice = Slice::new(content, old.open_start(), old.open_end());
                doc.replace(*from, *to, &slice)
            }
        }
    }

    /// The step that undoes this one, given the document it applied to.
    pub fn invert(&self, doc: &Node) -> Result<Step> {
        Ok(match self {
            Step::Replace { from, to, slice } => Step::Replace {
                from: *from,
                to: from + slice.size(),
                slice: doc.slice(*from, *to)?,
            },
            Step::SetAttr { pos, attr, .. } => {
                let node = doc.node_at(*pos).ok_or_else(|| {
                    EditorError::InvalidStep(format!("no node at position {pos}"))
                })?;
                Step::SetAttr {
                    pos: *pos,
                    attr: attr.clone(),
                    value: node.attr(attr).cloned().unwrap_or(Value::Null),
                }
            }
            Step::SetMarkup { pos, .. } => {
                let node = doc.node_at(*pos).ok_or_else(|| {
                    EditorError::InvalidStep(format!("no node at position {pos}"))
                })?;
                Step::SetMarkup {
                    pos: *pos,
                    node_type: node.type_name().to_string(),
                    attrs: node.attrs().clone(),
                }
            }
            Step::AddMark { from, to, mark } => Step::RemoveMark {
                from: *from,
                to: *to,
                mark: mark.clone(),
            },
            Step::RemoveMark { from, to, mark } => Step::AddMark {
                from: *from,
                to: *to,
                mark: mark.clone(),
            },
        })
    }

    pub fn get_map(&self) -> StepMap {
        match self {
            Step::Replace { from, to, slice } => StepMap::single(*from, to - from, slice.size()),
            _ => StepMap::empty(),
        }
    }

    /// This step expressed in the coordinates after `mapping`. `None` when
    /// the content it applied to was deleted.
    pub fn map(&self, mapping: &Mapping) -> Option<Step> {
        match self {
            Step::Replace { from, to, slice } => {
                let from = mapping.map_result(*from, 1);
                let to = mapping.map_result(*to, -1);
                if from.deleted_across() && to.deleted_across() {
                    return None;
                }
                Some(Step::Replace {
                    from: from.pos,
                    to: from.pos.max(to.pos),
                    slice: slice.clone(),
                })
            }
            Step::SetAttr { pos, attr, value } => {
                let pos = mapping.map_result(*pos, 1);
                (!pos.deleted_after()).then(|| Step::SetAttr {
                    pos: pos.pos,
                    attr: attr.clone(),
                    value: value.clone(),
                })
            }
            Step::SetMarkup {
                pos,
                node_type,
                attrs,
            } => {
                let pos = mapping.map_result(*pos, 1);
                (!pos.deleted_after()).then(|| Step::SetMarkup {
                    pos: pos.pos,
                    node_type: node_type.clone(),
                    attrs: attrs.clone(),
                })
            }
            Step::AddMark { from, to, mark } | Step::RemoveMark { from, to, mark } => {
                let mfrom = mapping.map_result(*from, 1);
                let mto = mapping.map_result(*to, -1);
                if (mfrom.deleted() && mto.deleted()) || mfrom.pos >= mto.pos {
                    return None;
                }
                Some(match self {
                    Step::AddMark { .. } => Step::AddMark {
                        from: mfrom.pos,
                        to: mto.pos,
                        mark: mark.clone(),
                    },
                    _ => Step::RemoveMark {
                        from: mfrom.pos,
                        to: mto.pos,
                        mark: mark.clone(),
                    },
                })
            }
        }
    }
}

/// Rebuild the path from the root to the node at `pos`, swapping that node
/// for `f(node)`.
fn update_node_at<F>(doc: &Node, pos: usize, f: F) -> Result<Node>
where
    F: FnOnce(&Node) -> Result<Node>,
{
    let rpos = doc.resolve(pos)?;
    if rpos.text_offset() > 0 {
        return Err(EditorError::InvalidStep(format!(
            "position {pos} points into text"
        )));
    }
    let target = rpos
        .node_after()
        .ok_or_else(|| EditorError::InvalidStep(format!("no node at position {pos}")))?;
    let mut updated = f(&target)?;
    for depth in (0..=rpos.depth()).rev() {
        let parent = rpos.node(depth);
        let content = parent.content().replace_child(rpos.index(depth), updated);
        if depth == rpos.depth() {
            parent.node_type().check_content(&content)?;
        }
        updated = parent.copy(content);
    }
    Ok(updated)
}

fn map_fragment<F>(fragment: &Fragment, parent: &Node, f: &F) -> Fragment
where
    F: Fn(&Node, &Node) -> Node,
{
    let mapped = fragment
        .iter()
        .map(|child| {
            let mut child = child.clone();
            if child.content().size() > 0 {
                let inner = map_fragment(child.content(), &child, f);
                child = child.copy(inner);
            }
            if child.is_inline() {
                child = f(&child, parent);
            }
            child
        })
        .collect();
    Fragment::from_vec(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::*;
    use crate::schema::standard;
    use serde_json::json;

    #[test]
    fn test_replace_invert() {
        let d = doc(vec![p("hello"), p("world")]);
        let step = Step::replace(3, 10, Slice::empty());
        let inverse = step.invert(&d).unwrap();
        let changed = step.apply(&d, &standard()).unwrap();
        assert_eq!(changed, doc(vec![p("herld")]));
        assert_eq!(inverse.apply(&changed, &standard()).unwrap(), d);
    }

    #[test]
    fn test_set_attr() {
        let d = doc(vec![h(1, "title"), p("x")]);
        let step = Step::SetAttr {
            pos: 0,
            attr: "level".into(),
            value: json!(3),
        };
        let changed = step.apply(&d, &standard()).unwrap();
        assert_eq!(changed.child(0).unwrap().attr("level"), Some(&json!(3)));
        let undone = step.invert(&d).unwrap().apply(&changed, &standard()).unwrap();
        assert_eq!(undone, d);
    }

    #[test]
    fn test_set_attr_rejects_unknown_attribute() {
        let d = doc(vec![p("x")]);
        let step = Step::SetAttr {
            pos: 0,
            attr: "color".into(),
            value: json!("red"),
        };
        assert!(step.apply(&d, &standard()).is_err());
    }

    #[test]
    fn test_set_markup() {
        let d = doc(vec![p("x")]);
        let mut attrs = Attrs::new();
        attrs.insert("level".into(), json!(2));
        let step = Step::SetMarkup {
            pos: 0,
            node_type: "heading".into(),
            attrs,
        };
        let changed = step.apply(&d, &standard()).unwrap();
        assert_eq!(changed, doc(vec![h(2, "x")]));
        assert_eq!(step.invert(&d).unwrap().apply(&changed, &standard()).unwrap(), d);
    }

    #[test]
    fn test_add_and_remove_mark() {
        let schema = standard();
        let d = doc(vec![p("hello")]);
        let mark = schema.mark("bold", Attrs::new()).unwrap();
        let add = Step::AddMark {
            from: 2,
            to: 4,
            mark: mark.clone(),
        };
        let changed = add.apply(&d, &schema).unwrap();
        assert_eq!(changed, doc(vec![para(vec![txt("h"), bold("el"), txt("lo")])]));
        let removed = add.invert(&d).unwrap().apply(&changed, &schema).unwrap();
        assert_eq!(removed, d);
    }

    #[test]
    fn test_map_drops_deleted_attr_step() {
        let step = Step::SetAttr {
            pos: 4,
            attr: "level".into(),
            value: json!(2),
        };
        let mut mapping = Mapping::new();
        mapping.push(StepMap::single(0, 4, 0));
        assert_eq!(
            step.map(&mapping),
            Some(Step::SetAttr {
                pos: 0,
                attr: "level".into(),
                value: json!(2)
            })
        );

        let mut covering = Mapping::new();
        covering.push(StepMap::single(2, 5, 0));
        assert_eq!(step.map(&covering), None);
    }
}
