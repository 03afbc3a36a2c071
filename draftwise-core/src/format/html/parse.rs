//! HTML to document tree.
//!
//! Parsing runs in two passes: tokens are assembled into a loose element
//! tree (forgiving about unclosed and stray tags), and the tree is then
//! mapped onto schema nodes. Elements without a schema counterpart are
//! unwrapped so their text survives; `head`, `script` and similar are
//! dropped with their content.

use super::lexer::{tokenize, StartTag, Token};
use crate::error::Result;
use crate::format::{inline_nodes, list_item, non_empty_blocks, Piece};
use crate::model::{Fragment, Mark, Node};
use crate::schema::{Attrs, Schema};
use serde_json::{json, Value};

const VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const DROPPED: &[&str] = &["head", "title", "script", "style", "template", "noscript"];

/// Elements that start a new block when they appear among inline content.
const BLOCKS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "html", "iframe", "li", "main", "nav", "ol", "p", "pre", "section", "summary",
    "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

#[derive(Debug, Clone, PartialEq)]
enum Dom {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Dom>,
}

impl Element {
    fn new(tag: StartTag) -> Self {
        Self {
            name: tag.name,
            attrs: tag.attrs,
            children: Vec::new(),
        }
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|child| match child {
            Dom::Element(e) if e.name == name => Some(e),
            Dom::Element(e) => e.find(name),
            Dom::Text(_) => None,
        })
    }

    fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Dom::Text(t) => out.push_str(t),
                Dom::Element(e) if e.name == "br" => out.push('\n'),
                Dom::Element(e) => out.push_str(&e.text()),
            }
        }
        out
    }
}

fn build_tree(source: &str) -> Element {
    let mut stack = vec![Element {
        name: "#root".into(),
        attrs: Vec::new(),
        children: Vec::new(),
    }];
    let mut raw_until: Option<String> = None;

    for token in tokenize(source) {
        if let Some(name) = &raw_until {
            if matches!(&token, Token::EndTag(end) if end == name) {
                raw_until = None;
            }
            continue;
        }
        match token {
            Token::StartTag(tag) => {
                if matches!(tag.name.as_str(), "script" | "style") && !tag.self_closing {
                    raw_until = Some(tag.name);
                    continue;
                }
                close_implied(&mut stack, &tag.name);
                let void = tag.self_closing || VOID.contains(&tag.name.as_str());
                let element = Element::new(tag);
                if void {
                    push_child(&mut stack, Dom::Element(element));
                } else {
                    stack.push(element);
                }
            }
            Token::EndTag(name) => {
                if stack.iter().skip(1).any(|e| e.name == name) {
                    while let Some(element) = stack.pop() {
                        let done = element.name == name;
                        push_child(&mut stack, Dom::Element(element));
                        if done {
                            break;
                        }
                    }
                }
            }
            Token::Text(text) => push_text(&mut stack, &text),
            Token::Lt => push_text(&mut stack, "<"),
            Token::Comment | Token::Doctype => {}
        }
    }
    while stack.len() > 1 {
        if let Some(element) = stack.pop() {
            push_child(&mut stack, Dom::Element(element));
        }
    }
    stack.pop().unwrap_or(Element {
        name: "#root".into(),
        attrs: Vec::new(),
        children: Vec::new(),
    })
}

/// Close a `p` before a block starts inside it, and an open `li` before
/// its next sibling.
fn close_implied(stack: &mut Vec<Element>, name: &str) {
    let closes = |open: &str| match open {
        "p" => BLOCKS.contains(&name),
        "li" => name == "li",
        _ => false,
    };
    let boundary = |open: &str| matches!(open, "ul" | "ol" | "blockquote" | "div" | "td");
    loop {
        let Some(index) = stack
            .iter()
            .skip(1)
            .rposition(|e| closes(&e.name) || boundary(&e.name))
            .map(|i| i + 1)
        else {
            return;
        };
        if !closes(&stack[index].name) {
            return;
        }
        while stack.len() > index {
            if let Some(element) = stack.pop() {
                push_child(stack, Dom::Element(element));
            }
        }
    }
}

fn push_child(stack: &mut [Element], child: Dom) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(child);
    }
}

fn push_text(stack: &mut [Element], text: &str) {
    if let Some(parent) = stack.last_mut() {
        if let Some(Dom::Text(last)) = parent.children.last_mut() {
            last.push_str(text);
        } else {
            parent.children.push(Dom::Text(text.to_string()));
        }
    }
}

struct Converter<'a> {
    schema: &'a Schema,
}

impl Converter<'_> {
    fn blocks(&self, children: &[Dom]) -> Result<Vec<Node>> {
        let mut out = Vec::new();
        let mut run = Vec::new();
        for child in children {
            match child {
                Dom::Element(e) if BLOCKS.contains(&e.name.as_str()) => {
                    self.flush(&mut run, &mut out)?;
                    out.extend(self.block(e)?);
                }
                Dom::Element(e) if DROPPED.contains(&e.name.as_str()) => {}
                Dom::Element(e) => self.inline(e, &[], &mut run)?,
                Dom::Text(text) => run.push(Piece::Text(text.clone(), Vec::new())),
            }
        }
        self.flush(&mut run, &mut out)?;
        Ok(out)
    }

    /// Turn pending inline content into a paragraph, unless it is only
    /// whitespace between blocks.
    fn flush(&self, run: &mut Vec<Piece>, out: &mut Vec<Node>) -> Result<()> {
        let pieces = collapse_whitespace(std::mem::take(run));
        if pieces.is_empty() {
            return Ok(());
        }
        out.push(self.textblock("paragraph", Attrs::new(), pieces)?);
        Ok(())
    }

    fn textblock(&self, type_name: &str, attrs: Attrs, pieces: Vec<Piece>) -> Result<Node> {
        let node_type = self.schema.node_type(type_name)?;
        let content = inline_nodes(self.schema, node_type, pieces)?;
        self.schema.node(type_name, attrs, content, vec![])
    }

    fn inline_children(&self, element: &Element) -> Result<Vec<Piece>> {
        let mut pieces = Vec::new();
        for child in &element.children {
            match child {
                Dom::Text(text) => pieces.push(Piece::Text(text.clone(), Vec::new())),
                Dom::Element(e) => self.inline(e, &[], &mut pieces)?,
            }
        }
        Ok(collapse_whitespace(pieces))
    }

    fn block(&self, element: &Element) -> Result<Vec<Node>> {
        let name = element.name.as_str();
        let node = match name {
            "p" => self.textblock("paragraph", Attrs::new(), self.inline_children(element)?)?,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let mut attrs = Attrs::new();
                attrs.insert("level".into(), json!(name[1..].parse::<u8>().unwrap_or(1)));
                self.textblock("heading", attrs, self.inline_children(element)?)?
            }
            "blockquote" => {
                let content = non_empty_blocks(self.schema, self.blocks(&element.children)?)?;
                self.schema.node_with_defaults("blockquote", content)?
            }
            "ul" | "ol" => match self.list(element)? {
                Some(list) => list,
                None => return Ok(Vec::new()),
            },
            "pre" => self.code_block(element)?,
            "hr" => self.schema.node_with_defaults("horizontalRule", Fragment::empty())?,
            "iframe" => match self.embed("iframe", element, &["width", "height", "frameborder", "allowfullscreen"])? {
                Some(node) => node,
                None => return Ok(Vec::new()),
            },
            "div" if element.has_attr("data-youtube-video") => {
                let Some(frame) = element.find("iframe") else {
                    return Ok(Vec::new());
                };
                match self.embed("youtube", frame, &["width", "height", "start"])? {
                    Some(node) => node,
                    None => return Ok(Vec::new()),
                }
            }
            "div" if element.has_attr("data-tweet-embed") => {
                let Some(id) = element.attr("data-tweet-id").filter(|id| !id.is_empty()) else {
                    return Ok(Vec::new());
                };
                let mut attrs = Attrs::new();
                attrs.insert("id".into(), json!(id));
                self.schema.node("tweetEmbed", attrs, Fragment::empty(), vec![])?
            }
            "div" if element.attr("data-type") == Some("ai-generation") => return Ok(Vec::new()),
            _ => return self.blocks(&element.children),
        };
        Ok(vec![node])
    }

    fn list(&self, element: &Element) -> Result<Option<Node>> {
        let mut items = Vec::new();
        let mut loose = Vec::new();
        for child in &element.children {
            match child {
                Dom::Element(li) if li.name == "li" => {
                    if !loose.is_empty() {
                        items.push(list_item(self.schema, self.blocks(&std::mem::take(&mut loose))?)?);
                    }
                    items.push(list_item(self.schema, self.blocks(&li.children)?)?);
                }
                Dom::Text(text) if text.trim().is_empty() => {}
                other => loose.push(other.clone()),
            }
        }
        if !loose.is_empty() {
            items.push(list_item(self.schema, self.blocks(&loose)?)?);
        }
        if items.is_empty() {
            return Ok(None);
        }
        let mut attrs = Attrs::new();
        let type_name = if element.name == "ol" {
            if let Some(start) = element.attr("start").and_then(|s| s.trim().parse::<u64>().ok()) {
                attrs.insert("start".into(), json!(start));
            }
            "orderedList"
        } else {
            "bulletList"
        };
        Ok(Some(self.schema.node(type_name, attrs, Fragment::from_vec(items), vec![])?))
    }

    fn code_block(&self, element: &Element) -> Result<Node> {
        let code = element.find("code");
        let language = code
            .and_then(|c| c.attr("class"))
            .or_else(|| element.attr("class"))
            .and_then(|classes| {
                classes
                    .split_whitespace()
                    .find_map(|c| c.strip_prefix("language-"))
            });
        let text = element.text();
        let text = text.strip_prefix('\n').unwrap_or(&text);
        let mut attrs = Attrs::new();
        if let Some(language) = language {
            attrs.insert("language".into(), json!(language));
        }
        let content = if text.is_empty() {
            Fragment::empty()
        } else {
            Fragment::from(self.schema.text(text, vec![])?)
        };
        self.schema.node("codeBlock", attrs, content, vec![])
    }

    /// An opaque embed built from an element's `src` and the listed
    /// attributes. Numeric attributes are kept as numbers where the schema
    /// default is a number.
    fn embed(&self, type_name: &str, element: &Element, keys: &[&str]) -> Result<Option<Node>> {
        let Some(src) = element.attr("src").filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        let node_type = self.schema.node_type(type_name)?;
        let mut attrs = Attrs::new();
        attrs.insert("src".into(), json!(src));
        for key in keys {
            let Some(value) = element.attr(key) else {
                continue;
            };
            let Some((name, spec)) = node_type
                .attr_specs()
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(key))
            else {
                continue;
            };
            let value = match &spec.default {
                Some(Value::Number(_)) => match value.parse::<u64>() {
                    Ok(n) => json!(n),
                    Err(_) => continue,
                },
                _ => json!(value),
            };
            attrs.insert(name.clone(), value);
        }
        Ok(Some(self.schema.node(type_name, attrs, Fragment::empty(), vec![])?))
    }

    fn inline(&self, element: &Element, marks: &[Mark], out: &mut Vec<Piece>) -> Result<()> {
        let leaf = |type_name: &str, attrs: Attrs| -> Result<Piece> {
            let node = self.schema.node(type_name, attrs, Fragment::empty(), vec![])?;
            Ok(Piece::Node(node.with_marks(marks.to_vec())))
        };
        match element.name.as_str() {
            "br" => out.push(leaf("hardBreak", Attrs::new())?),
            "img" => {
                if let Some(src) = element.attr("src").filter(|s| !s.is_empty()) {
                    let mut attrs = Attrs::new();
                    attrs.insert("src".into(), json!(src));
                    for key in ["alt", "title"] {
                        if let Some(value) = element.attr(key) {
                            attrs.insert(key.into(), json!(value));
                        }
                    }
                    out.push(leaf("image", attrs)?);
                }
            }
            "span" if element.attr("data-type") == Some("twitter-badge") => {
                if let Some(username) = element.attr("username").filter(|u| !u.is_empty()) {
                    let mut attrs = Attrs::new();
                    attrs.insert("username".into(), json!(username));
                    out.push(leaf("twitterBadge", attrs)?);
                }
            }
            name if DROPPED.contains(&name) => {}
            _ => {
                let marks = match self.mark_for(element)? {
                    Some(mark) => mark.add_to_set(marks),
                    None => marks.to_vec(),
                };
                for child in &element.children {
                    match child {
                        Dom::Text(text) => out.push(Piece::Text(text.clone(), marks.clone())),
                        Dom::Element(e) => self.inline(e, &marks, out)?,
                    }
                }
            }
        }
        Ok(())
    }

    fn mark_for(&self, element: &Element) -> Result<Option<Mark>> {
        let name = match element.name.as_str() {
            "strong" | "b" => "bold",
            "em" | "i" => "italic",
            "u" => "underline",
            "s" | "del" | "strike" => "strike",
            "code" => "code",
            "a" => {
                let Some(href) = element.attr("href").filter(|h| !h.is_empty()) else {
                    return Ok(None);
                };
                let mut attrs = Attrs::new();
                attrs.insert("href".into(), json!(href));
                for key in ["title", "target"] {
                    if let Some(value) = element.attr(key) {
                        attrs.insert(key.into(), json!(value));
                    }
                }
                return self.schema.mark("link", attrs).map(Some);
            }
            _ => return Ok(None),
        };
        self.schema.mark(name, Attrs::new()).map(Some)
    }
}

/// Collapse whitespace the way a browser lays out normal text: runs become
/// one space, and space at the edges of the block or next to a line break
/// is dropped.
fn collapse_whitespace(pieces: Vec<Piece>) -> Vec<Piece> {
    let mut out: Vec<Piece> = Vec::with_capacity(pieces.len());
    let mut after_space = true;
    for piece in pieces {
        match piece {
            Piece::Text(text, marks) => {
                let mut collapsed = String::with_capacity(text.len());
                for c in text.chars() {
                    if c.is_ascii_whitespace() {
                        if !after_space {
                            collapsed.push(' ');
                            after_space = true;
                        }
                    } else {
                        collapsed.push(c);
                        after_space = false;
                    }
                }
                if !collapsed.is_empty() {
                    out.push(Piece::Text(collapsed, marks));
                }
            }
            Piece::Node(node) => {
                after_space = node.type_name() == "hardBreak";
                if after_space {
                    trim_trailing_space(&mut out);
                }
                out.push(Piece::Node(node));
            }
        }
    }
    trim_trailing_space(&mut out);
    out
}

fn trim_trailing_space(pieces: &mut Vec<Piece>) {
    if let Some(Piece::Text(text, _)) = pieces.last_mut() {
        if text.ends_with(' ') {
            text.pop();
            if text.is_empty() {
                pieces.pop();
            }
        }
    }
}

/// Parse HTML into block content.
pub fn parse_fragment(schema: &Schema, source: &str) -> Result<Fragment> {
    let root = build_tree(source);
    let converter = Converter { schema };
    Ok(Fragment::from_vec(converter.blocks(&root.children)?))
}

/// Parse a whole HTML document.
pub fn parse(schema: &Schema, source: &str) -> Result<Node> {
    let content = parse_fragment(schema, source)?;
    let content = if content.is_empty() {
        schema.create_and_fill("doc")?.content().clone()
    } else {
        content
    };
    schema.node_with_defaults("doc", content)
}
