//! Node Schema Registry.
//!
//! A [`Schema`] declares the node and mark types a document may contain,
//! their attributes and the content each node accepts. Schemas are built
//! once through a [`SchemaBuilder`] and are immutable afterwards.

pub mod content;
mod standard;

pub use content::ContentExpr;
pub use standard::{standard, AI_GENERATION, STANDARD};

use crate::error::{EditorError, Result, SchemaError};
use crate::model::{Fragment, Mark, Node};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Attribute values of a node or mark.
pub type Attrs = BTreeMap<String, Value>;

/// Declaration of a single attribute. `default: None` marks it required.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrSpec {
    pub default: Option<Value>,
}

/// Which marks a node allows on its inline children.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkAllowance {
    All,
    None,
    Only(Vec<String>),
}

/// Declaration of a node type, passed to [`SchemaBuilder::register_node_type`].
#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    pub content: Option<String>,
    pub group: Option<String>,
    pub inline: bool,
    pub atom: bool,
    pub code: bool,
    pub attrs: Vec<(String, AttrSpec)>,
    /// `"_"` allows every mark, `""` none, otherwise a space separated list
    /// of mark names or groups. Defaults to all marks for inline content.
    pub marks: Option<String>,
    pub leaf_text: Option<String>,
    /// Key the host UI uses to pick a renderer for opaque nodes.
    pub view_binding: Option<String>,
    /// Never persisted: stripped from every export.
    pub transient: bool,
}

impl NodeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, expr: &str) -> Self {
        self.content = Some(expr.to_string());
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    pub fn atom(mut self) -> Self {
        self.atom = true;
        self
    }

    pub fn code(mut self) -> Self {
        self.code = true;
        self
    }

    pub fn attr(mut self, name: &str, default: impl Into<Value>) -> Self {
        self.attrs.push((
            name.to_string(),
            AttrSpec {
                default: Some(default.into()),
            },
        ));
        self
    }

    pub fn required_attr(mut self, name: &str) -> Self {
        self.attrs
            .push((name.to_string(), AttrSpec { default: None }));
        self
    }

    pub fn marks(mut self, marks: &str) -> Self {
        self.marks = Some(marks.to_string());
        self
    }

    pub fn leaf_text(mut self, text: &str) -> Self {
        self.leaf_text = Some(text.to_string());
        self
    }

    pub fn view(mut self, key: &str) -> Self {
        self.view_binding = Some(key.to_string());
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }
}

/// Declaration of a mark type, passed to [`SchemaBuilder::register_mark_type`].
#[derive(Debug, Clone)]
pub struct MarkSpec {
    pub attrs: Vec<(String, AttrSpec)>,
    /// Marks this one cannot coexist with: `"_"` for all, otherwise names
    /// or groups. Defaults to the mark itself.
    pub excludes: Option<String>,
    pub group: Option<String>,
    pub inclusive: bool,
    pub code: bool,
}

impl Default for MarkSpec {
    fn default() -> Self {
        Self {
            attrs: Vec::new(),
            excludes: None,
            group: None,
            inclusive: true,
            code: false,
        }
    }
}

impl MarkSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &str, default: impl Into<Value>) -> Self {
        self.attrs.push((
            name.to_string(),
            AttrSpec {
                default: Some(default.into()),
            },
        ));
        self
    }

    pub fn required_attr(mut self, name: &str) -> Self {
        self.attrs
            .push((name.to_string(), AttrSpec { default: None }));
        self
    }

    pub fn excludes(mut self, excludes: &str) -> Self {
        self.excludes = Some(excludes.to_string());
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn non_inclusive(mut self) -> Self {
        self.inclusive = false;
        self
    }

    pub fn code(mut self) -> Self {
        self.code = true;
        self
    }
}

/// A registered node type.
#[derive(Debug)]
pub struct NodeType {
    name: String,
    groups: Vec<String>,
    content: ContentExpr,
    attrs: Vec<(String, AttrSpec)>,
    marks: MarkAllowance,
    inline: bool,
    atom: bool,
    text: bool,
    code: bool,
    inline_content: bool,
    leaf_text: Option<String>,
    view_binding: Option<String>,
    transient: bool,
}

impl NodeType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    pub fn content_expr(&self) -> &ContentExpr {
        &self.content
    }

    pub fn attr_specs(&self) -> &[(String, AttrSpec)] {
        &self.attrs
    }

    pub fn is_text(&self) -> bool {
        self.text
    }

    pub fn is_inline(&self) -> bool {
        self.inline
    }

    pub fn is_block(&self) -> bool {
        !self.inline
    }

    pub fn is_leaf(&self) -> bool {
        self.content.is_leaf()
    }

    /// Atomic nodes are opaque: no position may address their inside.
    /// Leaves are atomic by construction.
    pub fn is_atom(&self) -> bool {
        self.atom || self.is_leaf()
    }

    /// Whether the type itself was declared atomic.
    pub fn is_declared_atom(&self) -> bool {
        self.atom
    }

    pub fn is_code(&self) -> bool {
        self.code
    }

    pub fn inline_content(&self) -> bool {
        self.inline_content
    }

    pub fn is_textblock(&self) -> bool {
        self.is_block() && self.inline_content
    }

    pub fn leaf_text(&self) -> Option<&str> {
        self.leaf_text.as_deref()
    }

    pub fn view_binding(&self) -> Option<&str> {
        self.view_binding.as_deref()
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn has_required_attrs(&self) -> bool {
        self.attrs.iter().any(|(_, spec)| spec.default.is_none())
    }

    pub fn allows_mark_type(&self, mark: &MarkType) -> bool {
        match &self.marks {
            MarkAllowance::All => true,
            MarkAllowance::None => false,
            MarkAllowance::Only(names) => names.iter().any(|n| n == mark.name()),
        }
    }

    pub fn allows_marks(&self, marks: &[Mark]) -> bool {
        marks.iter().all(|m| self.allows_mark_type(m.mark_type()))
    }

    /// Whether a node of this type can be joined with one of `other`.
    pub fn compatible_content(&self, other: &NodeType) -> bool {
        self.name == other.name || self.content.compatible(&other.content)
    }

    /// Fill in defaults and reject unknown or missing attributes.
    pub fn compute_attrs(&self, given: &Attrs) -> std::result::Result<Attrs, SchemaError> {
        compute_attrs(&self.name, &self.attrs, given)
    }

    /// Check that `content` is valid for a node of this type: the children
    /// match the content expression and carry only allowed marks.
    pub fn check_content(&self, content: &Fragment) -> Result<()> {
        let names: Vec<&str> = content.iter().map(|n| n.type_name()).collect();
        if !self.content.matches(&names) {
            return Err(EditorError::violation(
                &self.name,
                format!(
                    "children [{}] do not match {:?}",
                    names.join(", "),
                    self.content.source()
                ),
            ));
        }
        for child in content.iter() {
            if !self.allows_marks(child.marks()) {
                return Err(EditorError::violation(
                    &self.name,
                    format!("marks not allowed on {}", child.type_name()),
                ));
            }
        }
        Ok(())
    }

    pub fn valid_content(&self, content: &Fragment) -> bool {
        self.check_content(content).is_ok()
    }
}

/// A registered mark type.
#[derive(Debug)]
pub struct MarkType {
    name: String,
    rank: usize,
    attrs: Vec<(String, AttrSpec)>,
    excluded: Vec<String>,
    group: Option<String>,
    inclusive: bool,
    code: bool,
}

impl MarkType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn attr_specs(&self) -> &[(String, AttrSpec)] {
        &self.attrs
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn is_inclusive(&self) -> bool {
        self.inclusive
    }

    pub fn is_code(&self) -> bool {
        self.code
    }

    pub fn excludes(&self, other: &MarkType) -> bool {
        self.excluded.iter().any(|n| n == other.name())
    }

    pub fn compute_attrs(&self, given: &Attrs) -> std::result::Result<Attrs, SchemaError> {
        compute_attrs(&self.name, &self.attrs, given)
    }
}

fn compute_attrs(
    type_name: &str,
    specs: &[(String, AttrSpec)],
    given: &Attrs,
) -> std::result::Result<Attrs, SchemaError> {
    if let Some(unknown) = given.keys().find(|k| !specs.iter().any(|(n, _)| n == *k)) {
        return Err(SchemaError::UnknownAttribute {
            type_name: type_name.to_string(),
            attr: unknown.clone(),
        });
    }

    let mut attrs = Attrs::new();
    for (name, spec) in specs {
        let value = match (given.get(name), &spec.default) {
            (Some(v), None) if v.is_null() => None,
            (Some(v), _) => Some(v.clone()),
            (None, Some(default)) => Some(default.clone()),
            (None, None) => None,
        };
        match value {
            Some(v) => {
                attrs.insert(name.clone(), v);
            }
            None => {
                return Err(SchemaError::MissingAttribute {
                    type_name: type_name.to_string(),
                    attr: name.clone(),
                })
            }
        }
    }
    Ok(attrs)
}

/// Collects node and mark declarations before the schema is frozen.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    nodes: Vec<(String, NodeSpec)>,
    marks: Vec<(String, MarkSpec)>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_node_type(
        &mut self,
        name: &str,
        spec: NodeSpec,
    ) -> std::result::Result<&mut Self, SchemaError> {
        if self.nodes.iter().any(|(n, _)| n == name) {
            return Err(SchemaError::DuplicateType(name.to_string()));
        }
        self.nodes.push((name.to_string(), spec));
        Ok(self)
    }

    pub fn register_mark_type(
        &mut self,
        name: &str,
        spec: MarkSpec,
    ) -> std::result::Result<&mut Self, SchemaError> {
        if self.marks.iter().any(|(n, _)| n == name) {
            return Err(SchemaError::DuplicateType(name.to_string()));
        }
        self.marks.push((name.to_string(), spec));
        Ok(self)
    }

    /// Chaining variant of [`register_node_type`](Self::register_node_type)
    /// for statically known schemas.
    pub fn node(mut self, name: &str, spec: NodeSpec) -> std::result::Result<Self, SchemaError> {
        self.register_node_type(name, spec)?;
        Ok(self)
    }

    pub fn mark(mut self, name: &str, spec: MarkSpec) -> std::result::Result<Self, SchemaError> {
        self.register_mark_type(name, spec)?;
        Ok(self)
    }

    /// Resolve every declaration and freeze the registry.
    pub fn build(self) -> std::result::Result<Arc<Schema>, SchemaError> {
        if !self.nodes.iter().any(|(n, _)| n == "doc") {
            return Err(SchemaError::MissingRequiredType("doc"));
        }
        if !self.nodes.iter().any(|(n, _)| n == "text") {
            return Err(SchemaError::MissingRequiredType("text"));
        }

        let groups_of = |spec: &NodeSpec| -> Vec<String> {
            spec.group
                .as_deref()
                .unwrap_or("")
                .split_whitespace()
                .map(str::to_string)
                .collect()
        };

        let lookup = |name: &str| -> Option<Vec<String>> {
            if self.nodes.iter().any(|(n, _)| n == name) {
                return Some(vec![name.to_string()]);
            }
            let members: Vec<String> = self
                .nodes
                .iter()
                .filter(|(_, spec)| groups_of(spec).iter().any(|g| g == name))
                .map(|(n, _)| n.clone())
                .collect();
            (!members.is_empty()).then_some(members)
        };

        let mark_lookup = |name: &str| -> Option<Vec<String>> {
            if self.marks.iter().any(|(n, _)| n == name) {
                return Some(vec![name.to_string()]);
            }
            let members: Vec<String> = self
                .marks
                .iter()
                .filter(|(_, spec)| spec.group.as_deref().unwrap_or("").split_whitespace().any(|g| g == name))
                .map(|(n, _)| n.clone())
                .collect();
            (!members.is_empty()).then_some(members)
        };

        let resolve_marks = |list: &str| -> std::result::Result<Vec<String>, SchemaError> {
            let mut out = Vec::new();
            for name in list.split_whitespace() {
                if name == "_" {
                    return Ok(self.marks.iter().map(|(n, _)| n.clone()).collect());
                }
                let found =
                    mark_lookup(name).ok_or_else(|| SchemaError::UnknownMarkType(name.to_string()))?;
                out.extend(found);
            }
            Ok(out)
        };

        let mut marks = Vec::new();
        let mut mark_index = HashMap::new();
        for (rank, (name, spec)) in self.marks.iter().enumerate() {
            let excluded = match spec.excludes.as_deref() {
                None => vec![name.clone()],
                Some(list) => resolve_marks(list)?,
            };
            mark_index.insert(name.clone(), rank);
            marks.push(Arc::new(MarkType {
                name: name.clone(),
                rank,
                attrs: spec.attrs.clone(),
                excluded,
                group: spec.group.clone(),
                inclusive: spec.inclusive,
                code: spec.code,
            }));
        }

        let mut nodes = Vec::new();
        let mut node_index = HashMap::new();
        for (i, (name, spec)) in self.nodes.iter().enumerate() {
            let mut content = match spec.content.as_deref() {
                Some(expr) if !expr.trim().is_empty() => ContentExpr::parse(expr)?,
                _ => ContentExpr::empty(),
            };
            content.resolve(&lookup)?;

            let inline_content = content.allowed_types().any(|child| {
                self.nodes
                    .iter()
                    .find(|(n, _)| n == child)
                    .map_or(false, |(n, s)| s.inline || n == "text")
            });

            let marks = match spec.marks.as_deref() {
                Some("_") => MarkAllowance::All,
                Some("") => MarkAllowance::None,
                Some(list) => MarkAllowance::Only(resolve_marks(list)?),
                None if inline_content => MarkAllowance::All,
                None => MarkAllowance::None,
            };

            node_index.insert(name.clone(), i);
            nodes.push(Arc::new(NodeType {
                name: name.clone(),
                groups: groups_of(spec),
                content,
                attrs: spec.attrs.clone(),
                marks,
                inline: spec.inline || name == "text",
                atom: spec.atom,
                text: name == "text",
                code: spec.code,
                inline_content,
                leaf_text: spec.leaf_text.clone(),
                view_binding: spec.view_binding.clone(),
                transient: spec.transient,
            }));
        }

        debug!(
            nodes = nodes.len(),
            marks = marks.len(),
            "schema registry built"
        );

        Ok(Arc::new(Schema {
            nodes,
            node_index,
            marks,
            mark_index,
        }))
    }
}

/// The frozen registry of node and mark types.
#[derive(Debug)]
pub struct Schema {
    nodes: Vec<Arc<NodeType>>,
    node_index: HashMap<String, usize>,
    marks: Vec<Arc<MarkType>>,
    mark_index: HashMap<String, usize>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn node_types(&self) -> impl Iterator<Item = &Arc<NodeType>> {
        self.nodes.iter()
    }

    pub fn mark_types(&self) -> impl Iterator<Item = &Arc<MarkType>> {
        self.marks.iter()
    }

    pub fn node_type(&self, name: &str) -> Result<&Arc<NodeType>> {
        self.node_index
            .get(name)
            .map(|&i| &self.nodes[i])
            .ok_or_else(|| SchemaError::UnknownNodeType(name.to_string()).into())
    }

    pub fn mark_type(&self, name: &str) -> Result<&Arc<MarkType>> {
        self.mark_index
            .get(name)
            .map(|&i| &self.marks[i])
            .ok_or_else(|| SchemaError::UnknownMarkType(name.to_string()).into())
    }

    pub fn has_node_type(&self, name: &str) -> bool {
        self.node_index.contains_key(name)
    }

    /// Create a node, filling attribute defaults and checking its content.
    pub fn node(
        &self,
        type_name: &str,
        attrs: Attrs,
        content: impl Into<Fragment>,
        marks: Vec<Mark>,
    ) -> Result<Node> {
        let node_type = self.node_type(type_name)?;
        if node_type.is_text() {
            return Err(EditorError::violation("text", "text nodes are created with Schema::text"));
        }
        let attrs = node_type.compute_attrs(&attrs)?;
        let content = content.into();
        node_type.check_content(&content)?;
        Ok(Node::new(node_type.clone(), attrs, content, marks))
    }

    /// Create a node from attribute defaults only.
    pub fn node_with_defaults(&self, type_name: &str, content: impl Into<Fragment>) -> Result<Node> {
        self.node(type_name, Attrs::new(), content, Vec::new())
    }

    pub fn text(&self, text: &str, marks: Vec<Mark>) -> Result<Node> {
        if text.is_empty() {
            return Err(EditorError::violation("text", "empty text nodes are not allowed"));
        }
        let node_type = self.node_type("text")?;
        Ok(Node::new_text(node_type.clone(), text, Mark::sort_set(marks)))
    }

    pub fn mark(&self, type_name: &str, attrs: Attrs) -> Result<Mark> {
        let mark_type = self.mark_type(type_name)?;
        let attrs = mark_type.compute_attrs(&attrs)?;
        Ok(Mark::new(mark_type.clone(), attrs))
    }

    /// The minimal valid node of the given type: required children are
    /// created recursively from their defaults.
    pub fn create_and_fill(&self, type_name: &str) -> Result<Node> {
        let node_type = self.node_type(type_name)?;
        let fill = node_type.content_expr().minimal_fill().ok_or_else(|| {
            EditorError::violation(type_name, "content expression cannot be filled")
        })?;
        let children = fill
            .into_iter()
            .map(|child| self.create_and_fill(child))
            .collect::<Result<Vec<_>>>()?;
        self.node_with_defaults(type_name, Fragment::from_vec(children))
    }

    /// The default textblock used to wrap loose inline content.
    pub fn default_textblock(&self) -> Result<&Arc<NodeType>> {
        self.nodes
            .iter()
            .find(|t| t.is_textblock() && !t.has_required_attrs())
            .ok_or_else(|| SchemaError::MissingRequiredType("textblock").into())
    }

    /// Validate a node and all of its descendants against this schema.
    pub fn validate(&self, node: &Node) -> Result<()> {
        let registered = self.node_type(node.type_name())?;
        if !Arc::ptr_eq(registered, node.node_type()) {
            return Err(EditorError::violation(
                node.type_name(),
                "node type belongs to a different schema",
            ));
        }

        let expected = registered.compute_attrs(node.attrs())?;
        if &expected != node.attrs() {
            return Err(EditorError::violation(
                node.type_name(),
                "attributes do not match declaration",
            ));
        }

        for mark in node.marks() {
            let registered = self.mark_type(mark.type_name())?;
            if !Arc::ptr_eq(registered, mark.mark_type()) {
                return Err(EditorError::violation(
                    mark.type_name(),
                    "mark type belongs to a different schema",
                ));
            }
            registered.compute_attrs(mark.attrs())?;
        }

        if node.is_text() {
            if node.text().map_or(true, str::is_empty) {
                return Err(EditorError::violation("text", "empty text node"));
            }
            return Ok(());
        }

        registered.check_content(node.content())?;
        for child in node.content().iter() {
            self.validate(child)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tiny() -> Arc<Schema> {
        Schema::builder()
            .node("doc", NodeSpec::new().content("block+"))
            .and_then(|b| b.node("paragraph", NodeSpec::new().content("inline*").group("block")))
            .and_then(|b| {
                b.node(
                    "figure",
                    NodeSpec::new()
                        .content("inline*")
                        .group("block")
                        .atom()
                        .required_attr("src"),
                )
            })
            .and_then(|b| b.node("text", NodeSpec::new().group("inline")))
            .and_then(|b| b.mark("em", MarkSpec::new()))
            .and_then(|b| b.build())
            .unwrap()
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut builder = SchemaBuilder::new();
        builder.register_node_type("doc", NodeSpec::new()).unwrap();
        let err = builder.register_node_type("doc", NodeSpec::new()).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateType("doc".into()));
    }

    #[test]
    fn test_unknown_content_name_rejected() {
        let err = Schema::builder()
            .node("doc", NodeSpec::new().content("section+"))
            .and_then(|b| b.node("text", NodeSpec::new()))
            .and_then(|b| b.build())
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidContentExpr { .. }));
    }

    #[test]
    fn test_type_flags() {
        let schema = tiny();
        let paragraph = schema.node_type("paragraph").unwrap();
        assert!(paragraph.is_textblock());
        assert!(!paragraph.is_atom());
        let figure = schema.node_type("figure").unwrap();
        assert!(figure.is_atom());
        assert!(figure.is_declared_atom());
        assert!(schema.node_type("text").unwrap().is_inline());
    }

    #[test]
    fn test_required_attribute() {
        let schema = tiny();
        let err = schema
            .node("figure", Attrs::new(), Fragment::empty(), vec![])
            .unwrap_err();
        assert!(matches!(
            err,
            EditorError::Schema(SchemaError::MissingAttribute { .. })
        ));

        let mut attrs = Attrs::new();
        attrs.insert("src".into(), json!("a.png"));
        assert!(schema.node("figure", attrs, Fragment::empty(), vec![]).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_content() {
        let schema = tiny();
        let text = schema.text("hi", vec![]).unwrap();
        let err = schema
            .node_with_defaults("doc", Fragment::from_vec(vec![text]))
            .unwrap_err();
        assert!(matches!(err, EditorError::ContentViolation { .. }));

        let doc = schema.create_and_fill("doc").unwrap();
        assert_eq!(doc.child_count(), 1);
        assert!(schema.validate(&doc).is_ok());
    }
}
