//! Step generation for adding and removing marks over a range.

use super::step::Step;
use crate::model::{Mark, Node};

struct Run {
    from: usize,
    to: usize,
    mark: Mark,
}

fn extend_or_push(runs: &mut Vec<Run>, from: usize, to: usize, mark: &Mark) {
    if let Some(run) = runs
        .iter_mut()
        .rev()
        .find(|r| r.to == from && &r.mark == mark)
    {
        run.to = to;
        return;
    }
    runs.push(Run {
        from,
        to,
        mark: mark.clone(),
    });
}

/// Steps that add `mark` to every inline node in `from..to` whose parent
/// allows it. Marks the new one excludes are removed first so the steps
/// stay invertible.
pub fn add_mark_steps(doc: &Node, from: usize, to: usize, mark: &Mark) -> Vec<Step> {
    let mut removed: Vec<Run> = Vec::new();
    let mut added: Vec<Run> = Vec::new();
    doc.nodes_between(from, to, &mut |node: &Node, pos, parent, _| {
        if !node.is_inline() {
            return true;
        }
        let allowed = parent.map_or(false, |p| p.node_type().allows_mark_type(mark.mark_type()));
        if allowed && !mark.is_in_set(node.marks()) {
            let start = pos.max(from);
            let end = (pos + node.node_size()).min(to);
            let new_set = mark.add_to_set(node.marks());
            for old in node.marks() {
                if !old.is_in_set(&new_set) {
                    extend_or_push(&mut removed, start, end, old);
                }
            }
            extend_or_push(&mut added, start, end, mark);
        }
        true
    });

    removed
        .into_iter()
        .map(|r| Step::RemoveMark {
            from: r.from,
            to: r.to,
            mark: r.mark,
        })
        .chain(added.into_iter().map(|r| Step::AddMark {
            from: r.from,
            to: r.to,
            mark: r.mark,
        }))
        .collect()
}

/// Steps that remove every mark matching `matches` from `from..to`, one
/// step per contiguous run of the same mark.
pub fn remove_mark_steps<P>(doc: &Node, from: usize, to: usize, matches: P) -> Vec<Step>
where
    P: Fn(&Mark) -> bool,
{
    let mut runs: Vec<Run> = Vec::new();
    doc.nodes_between(from, to, &mut |node: &Node, pos, _, _| {
        if !node.is_inline() {
            return true;
        }
        let start = pos.max(from);
        let end = (pos + node.node_size()).min(to);
        for mark in node.marks().iter().filter(|m| matches(m)) {
            extend_or_push(&mut runs, start, end, mark);
        }
        true
    });
    runs.into_iter()
        .map(|r| Step::RemoveMark {
            from: r.from,
            to: r.to,
            mark: r.mark,
        })
        .collect()
}
