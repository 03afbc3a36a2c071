use crate::schema::{Attrs, MarkType};
use std::sync::Arc;

/// A formatting annotation on inline content.
///
/// Mark sets are kept sorted by the rank of their type so that two sets
/// with the same marks compare equal.
#[derive(Debug, Clone)]
pub struct Mark {
    mark_type: Arc<MarkType>,
    attrs: Attrs,
}

impl PartialEq for Mark {
    fn eq(&self, other: &Self) -> bool {
        self.type_name() == other.type_name() && self.attrs == other.attrs
    }
}

impl Eq for Mark {}

impl Mark {
    pub(crate) fn new(mark_type: Arc<MarkType>, attrs: Attrs) -> Self {
        Self { mark_type, attrs }
    }

    pub fn mark_type(&self) -> &Arc<MarkType> {
        &self.mark_type
    }

    pub fn type_name(&self) -> &str {
        self.mark_type.name()
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&serde_json::Value> {
        self.attrs.get(name)
    }

    pub fn is_in_set(&self, set: &[Mark]) -> bool {
        set.iter().any(|m| m == self)
    }

    /// Add this mark to a set, dropping marks it excludes. Returns the set
    /// unchanged when the mark is already present or is excluded itself.
    pub fn add_to_set(&self, set: &[Mark]) -> Vec<Mark> {
        let mut copy: Option<Vec<Mark>> = None;
        let mut placed = false;
        for (i, other) in set.iter().enumerate() {
            if self == other {
                return set.to_vec();
            }
            if self.mark_type.excludes(&other.mark_type) {
                if copy.is_none() {
                    copy = Some(set[..i].to_vec());
                }
            } else if other.mark_type.excludes(&self.mark_type) {
                return set.to_vec();
            } else {
                if !placed && other.mark_type.rank() > self.mark_type.rank() {
                    let c = copy.get_or_insert_with(|| set[..i].to_vec());
                    c.push(self.clone());
                    placed = true;
                }
                if let Some(c) = copy.as_mut() {
                    c.push(other.clone());
                }
            }
        }
        let mut copy = copy.unwrap_or_else(|| set.to_vec());
        if !placed {
            copy.push(self.clone());
        }
        copy
    }

    pub fn remove_from_set(&self, set: &[Mark]) -> Vec<Mark> {
        set.iter().filter(|m| *m != self).cloned().collect()
    }

    /// Sort a set by type rank.
    pub fn sort_set(mut marks: Vec<Mark>) -> Vec<Mark> {
        marks.sort_by_key(|m| m.mark_type.rank());
        marks
    }

    pub fn same_set(a: &[Mark], b: &[Mark]) -> bool {
        a == b
    }

    /// The first mark of the given type in a set.
    pub fn find_type<'a>(set: &'a [Mark], type_name: &str) -> Option<&'a Mark> {
        set.iter().find(|m| m.type_name() == type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::standard;
    use serde_json::json;

    fn mark(name: &str) -> Mark {
        standard().mark(name, Attrs::new()).unwrap()
    }

    fn link(href: &str) -> Mark {
        let mut attrs = Attrs::new();
        attrs.insert("href".into(), json!(href));
        standard().mark("link", attrs).unwrap()
    }

    #[test]
    fn test_add_keeps_rank_order() {
        let set = mark("strike").add_to_set(&[]);
        let set = mark("bold").add_to_set(&set);
        let names: Vec<_> = set.iter().map(Mark::type_name).collect();
        assert_eq!(names, vec!["bold", "strike"]);
    }

    #[test]
    fn test_link_replaces_link() {
        let set = link("https://a.example").add_to_set(&[mark("bold")]);
        let set = link("https://b.example").add_to_set(&set);
        assert_eq!(set.len(), 2);
        assert_eq!(set[0].attr("href"), Some(&json!("https://b.example")));
    }

    #[test]
    fn test_code_exclusivity() {
        let with_code = mark("code").add_to_set(&[mark("bold"), mark("italic")]);
        assert_eq!(with_code, vec![mark("code")]);
        // Nothing can be added on top of code.
        assert_eq!(mark("bold").add_to_set(&with_code), with_code);
    }

    #[test]
    fn test_remove() {
        let set = vec![mark("bold"), mark("italic")];
        assert_eq!(mark("bold").remove_from_set(&set), vec![mark("italic")]);
        assert!(!mark("bold").is_in_set(&mark("bold").remove_from_set(&set)));
    }
}
