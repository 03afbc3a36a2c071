//! Markdown to document tree, driven by pulldown-cmark events.

use crate::error::Result;
use crate::format::{html, inline_nodes, list_item, non_empty_blocks, Piece};
use crate::model::{Fragment, Mark, Node};
use crate::schema::{Attrs, Schema};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;

static INLINE_TAG_REGEX: OnceLock<Regex> = OnceLock::new();

fn inline_tag_regex() -> &'static Regex {
    INLINE_TAG_REGEX.get_or_init(|| Regex::new(r"^<(/?)([a-zA-Z]+)[^>]*?(/?)>$").unwrap())
}

static BADGE_USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn badge_username_regex() -> &'static Regex {
    BADGE_USERNAME_REGEX.get_or_init(|| Regex::new(r#"\busername="([^"]+)""#).unwrap())
}

#[derive(Debug)]
enum Frame {
    Container { kind: Container, children: Vec<Node> },
    Textblock { kind: Textblock, pieces: Vec<Piece> },
    Mark(Mark),
    Image { src: String, title: String, alt: String },
    Html(String),
    /// A construct with no node of its own; its content flows into the
    /// enclosing frame.
    Transparent,
}

#[derive(Debug)]
enum Container {
    Root,
    Blockquote,
    List(Option<u64>),
    Item,
}

#[derive(Debug)]
enum Textblock {
    /// `implicit` paragraphs wrap loose inline content, such as the text
    /// of a tight list item, and are closed by the next block boundary.
    Paragraph { implicit: bool },
    Heading(u8),
    Code(Option<String>),
}

struct MarkdownParser<'s> {
    schema: &'s Schema,
    stack: Vec<Frame>,
    /// Marks opened by inline HTML tags such as `<u>`.
    html_marks: Vec<(String, Mark)>,
}

impl<'s> MarkdownParser<'s> {
    fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            stack: vec![Frame::Container {
                kind: Container::Root,
                children: Vec::new(),
            }],
            html_marks: Vec::new(),
        }
    }

    fn run(mut self, source: &str) -> Result<Vec<Node>> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);

        for event in Parser::new_ext(source, options) {
            match event {
                Event::Start(tag) => self.start(tag)?,
                Event::End(_) => {
                    self.close_implicit()?;
                    self.pop()?;
                }
                Event::Text(text) => self.text(&text)?,
                Event::Code(code) => {
                    let mark = self.schema.mark("code", Attrs::new())?;
                    let marks = mark.add_to_set(&self.marks());
                    self.inline(Piece::Text(code.to_string(), marks))?;
                }
                Event::Html(source) => match self.stack.last_mut() {
                    Some(Frame::Html(buffer)) => buffer.push_str(&source),
                    _ => self.block_html(&source)?,
                },
                Event::InlineHtml(source) => self.inline_html(&source)?,
                Event::SoftBreak => self.text(" ")?,
                Event::HardBreak => {
                    let node = self.schema.node_with_defaults("hardBreak", Fragment::empty())?;
                    self.inline(Piece::Node(node.with_marks(self.marks())))?;
                }
                Event::Rule => {
                    let node = self.schema.node_with_defaults("horizontalRule", Fragment::empty())?;
                    self.block(node)?;
                }
                Event::FootnoteReference(label) => self.text(&format!("[^{label}]"))?,
                _ => {}
            }
        }

        self.close_implicit()?;
        while self.stack.len() > 1 {
            self.pop()?;
        }
        match self.stack.pop() {
            Some(Frame::Container { children, .. }) => Ok(children),
            _ => Ok(Vec::new()),
        }
    }

    fn start(&mut self, tag: Tag<'_>) -> Result<()> {
        let frame = match tag {
            Tag::Paragraph => Frame::Textblock {
                kind: Textblock::Paragraph { implicit: false },
                pieces: Vec::new(),
            },
            Tag::Heading { level, .. } => Frame::Textblock {
                kind: Textblock::Heading(level as u8),
                pieces: Vec::new(),
            },
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                Frame::Textblock {
                    kind: Textblock::Code(language),
                    pieces: Vec::new(),
                }
            }
            Tag::BlockQuote(_) => Frame::Container {
                kind: Container::Blockquote,
                children: Vec::new(),
            },
            Tag::List(start) => Frame::Container {
                kind: Container::List(start),
                children: Vec::new(),
            },
            Tag::Item => Frame::Container {
                kind: Container::Item,
                children: Vec::new(),
            },
            Tag::HtmlBlock => Frame::Html(String::new()),
            Tag::TableHead | Tag::TableRow => Frame::Textblock {
                kind: Textblock::Paragraph { implicit: false },
                pieces: Vec::new(),
            },
            Tag::TableCell => {
                if let Some(Frame::Textblock { pieces, .. }) = self.stack.last_mut() {
                    if !pieces.is_empty() {
                        pieces.push(Piece::Text(" | ".into(), Vec::new()));
                    }
                }
                Frame::Transparent
            }
            Tag::Emphasis => self.mark_frame("italic", Attrs::new())?,
            Tag::Strong => self.mark_frame("bold", Attrs::new())?,
            Tag::Strikethrough => self.mark_frame("strike", Attrs::new())?,
            Tag::Link {
                dest_url, title, ..
            } => {
                let mut attrs = Attrs::new();
                attrs.insert("href".into(), json!(dest_url.to_string()));
                if !title.is_empty() {
                    attrs.insert("title".into(), json!(title.to_string()));
                }
                self.mark_frame("link", attrs)?
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                self.ensure_inline()?;
                Frame::Image {
                    src: dest_url.to_string(),
                    title: title.to_string(),
                    alt: String::new(),
                }
            }
            _ => Frame::Transparent,
        };
        if matches!(
            frame,
            Frame::Container { .. } | Frame::Textblock { .. } | Frame::Html(_)
        ) {
            self.close_implicit()?;
        }
        self.stack.push(frame);
        Ok(())
    }

    fn mark_frame(&mut self, name: &str, attrs: Attrs) -> Result<Frame> {
        self.ensure_inline()?;
        Ok(Frame::Mark(self.schema.mark(name, attrs)?))
    }

    /// Marks in effect for inline content at the top of the stack.
    fn marks(&self) -> Vec<Mark> {
        let framed = self.stack.iter().filter_map(|frame| match frame {
            Frame::Mark(mark) => Some(mark),
            _ => None,
        });
        framed
            .chain(self.html_marks.iter().map(|(_, mark)| mark))
            .fold(Vec::new(), |set, mark| mark.add_to_set(&set))
    }

    fn text(&mut self, text: &str) -> Result<()> {
        for frame in self.stack.iter_mut().rev() {
            match frame {
                Frame::Mark(_) => continue,
                Frame::Image { alt, .. } => {
                    alt.push_str(text);
                    return Ok(());
                }
                Frame::Html(buffer) => {
                    buffer.push_str(text);
                    return Ok(());
                }
                Frame::Textblock {
                    kind: Textblock::Code(_),
                    pieces,
                } => {
                    pieces.push(Piece::Text(text.to_string(), Vec::new()));
                    return Ok(());
                }
                _ => break,
            }
        }
        let marks = self.marks();
        self.inline(Piece::Text(text.to_string(), marks))
    }

    fn inline(&mut self, piece: Piece) -> Result<()> {
        self.ensure_inline()?;
        if let Some(pieces) = self.inline_target() {
            pieces.push(piece);
        }
        Ok(())
    }

    fn inline_target(&mut self) -> Option<&mut Vec<Piece>> {
        for frame in self.stack.iter_mut().rev() {
            match frame {
                Frame::Textblock { pieces, .. } => return Some(pieces),
                Frame::Mark(_) | Frame::Transparent => continue,
                _ => return None,
            }
        }
        None
    }

    /// Open an implicit paragraph when inline content arrives directly in
    /// a container.
    fn ensure_inline(&mut self) -> Result<()> {
        let needs_paragraph = self
            .stack
            .iter()
            .rev()
            .find(|frame| !matches!(frame, Frame::Mark(_) | Frame::Transparent))
            .map_or(true, |frame| matches!(frame, Frame::Container { .. }));
        if needs_paragraph {
            self.stack.push(Frame::Textblock {
                kind: Textblock::Paragraph { implicit: true },
                pieces: Vec::new(),
            });
        }
        Ok(())
    }

    fn close_implicit(&mut self) -> Result<()> {
        if matches!(
            self.stack.last(),
            Some(Frame::Textblock {
                kind: Textblock::Paragraph { implicit: true },
                ..
            })
        ) {
            self.pop()?;
        }
        Ok(())
    }

    /// Add a finished block to the innermost container.
    fn block(&mut self, node: Node) -> Result<()> {
        self.close_implicit()?;
        for frame in self.stack.iter_mut().rev() {
            match frame {
                Frame::Container { children, .. } => {
                    children.push(node);
                    return Ok(());
                }
                Frame::Transparent => continue,
                _ => return Ok(()),
            }
        }
        Ok(())
    }

    fn block_html(&mut self, source: &str) -> Result<()> {
        for node in html::parse_fragment(self.schema, source)?.iter() {
            self.block(node.clone())?;
        }
        Ok(())
    }

    fn inline_html(&mut self, source: &str) -> Result<()> {
        let Some(captures) = inline_tag_regex().captures(source.trim()) else {
            return Ok(());
        };
        let closing = &captures[1] == "/";
        let tag = captures[2].to_ascii_lowercase();
        if tag == "br" {
            let node = self.schema.node_with_defaults("hardBreak", Fragment::empty())?;
            return self.inline(Piece::Node(node.with_marks(self.marks())));
        }
        if tag == "span" {
            if closing || !source.contains("data-type=\"twitter-badge\"") {
                return Ok(());
            }
            let Some(username) = badge_username_regex().captures(source) else {
                return Ok(());
            };
            let mut attrs = Attrs::new();
            attrs.insert("username".into(), json!(&username[1]));
            let node = self.schema.node("twitterBadge", attrs, Fragment::empty(), vec![])?;
            return self.inline(Piece::Node(node.with_marks(self.marks())));
        }
        let name = match tag.as_str() {
            "u" | "ins" => "underline",
            "s" | "del" | "strike" => "strike",
            "b" | "strong" => "bold",
            "i" | "em" => "italic",
            "code" => "code",
            _ => return Ok(()),
        };
        if closing {
            if let Some(index) = self.html_marks.iter().rposition(|(t, _)| *t == tag) {
                self.html_marks.remove(index);
            }
        } else if captures[3].is_empty() {
            let mark = self.schema.mark(name, Attrs::new())?;
            self.html_marks.push((tag, mark));
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<()> {
        if self.stack.len() <= 1 {
            return Ok(());
        }
        let Some(frame) = self.stack.pop() else {
            return Ok(());
        };
        match frame {
            Frame::Container { kind, children } => {
                let node = match kind {
                    Container::Root => return Ok(()),
                    Container::Blockquote => self
                        .schema
                        .node_with_defaults("blockquote", non_empty_blocks(self.schema, children)?)?,
                    Container::Item => list_item(self.schema, children)?,
                    Container::List(start) => {
                        if children.is_empty() {
                            return Ok(());
                        }
                        let mut attrs = Attrs::new();
                        let name = match start {
                            Some(start) => {
                                attrs.insert("start".into(), json!(start));
                                "orderedList"
                            }
                            None => "bulletList",
                        };
                        self.schema
                            .node(name, attrs, Fragment::from_vec(children), vec![])?
                    }
                };
                self.block(node)
            }
            Frame::Textblock { kind, pieces } => {
                let node = match kind {
                    Textblock::Paragraph { .. } => {
                        if pieces.is_empty() {
                            return Ok(());
                        }
                        self.textblock("paragraph", Attrs::new(), pieces)?
                    }
                    Textblock::Heading(level) => {
                        let mut attrs = Attrs::new();
                        attrs.insert("level".into(), json!(level));
                        self.textblock("heading", attrs, pieces)?
                    }
                    Textblock::Code(language) => {
                        let mut text: String = pieces
                            .into_iter()
                            .filter_map(|p| match p {
                                Piece::Text(t, _) => Some(t),
                                Piece::Node(_) => None,
                            })
                            .collect();
                        if text.ends_with('\n') {
                            text.pop();
                        }
                        let mut attrs = Attrs::new();
                        if let Some(language) = language {
                            attrs.insert("language".into(), json!(language));
                        }
                        let content = if text.is_empty() {
                            Fragment::empty()
                        } else {
                            Fragment::from(self.schema.text(&text, vec![])?)
                        };
                        self.schema.node("codeBlock", attrs, content, vec![])?
                    }
                };
                self.block(node)
            }
            Frame::Image { src, title, alt } => {
                let mut attrs = Attrs::new();
                attrs.insert("src".into(), json!(src));
                if !alt.is_empty() {
                    attrs.insert("alt".into(), json!(alt));
                }
                if !title.is_empty() {
                    attrs.insert("title".into(), json!(title));
                }
                let node = self.schema.node("image", attrs, Fragment::empty(), vec![])?;
                let marks = self.marks();
                self.inline(Piece::Node(node.with_marks(marks)))
            }
            Frame::Html(source) => self.block_html(&source),
            Frame::Mark(_) | Frame::Transparent => Ok(()),
        }
    }

    fn textblock(&self, name: &str, attrs: Attrs, pieces: Vec<Piece>) -> Result<Node> {
        let node_type = self.schema.node_type(name)?;
        let content = inline_nodes(self.schema, node_type, pieces)?;
        self.schema.node(name, attrs, content, vec![])
    }
}

/// Parse a Markdown body (without front matter) into block content.
pub fn parse_blocks(schema: &Schema, source: &str) -> Result<Fragment> {
    Ok(Fragment::from_vec(MarkdownParser::new(schema).run(source)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::*;
    use crate::schema::standard;

    fn md(source: &str) -> Node {
        let content = parse_blocks(&standard(), source).unwrap();
        standard().node_with_defaults("doc", content).unwrap()
    }

    #[test]
    fn test_headings_and_emphasis() {
        let d = md("# Title\n\nSome **bold** and *it* text.\n");
        assert_eq!(
            d,
            doc(vec![
                h(1, "Title"),
                para(vec![
                    txt("Some "),
                    bold("bold"),
                    txt(" and "),
                    marked("it", &["italic"]),
                    txt(" text."),
                ]),
            ])
        );
    }

    #[test]
    fn test_tight_and_nested_lists() {
        let d = md("- one\n- two\n  - deep\n\n3. three\n4. four\n");
        let ordered = d.child(1).unwrap();
        assert_eq!(
            d.child(0).unwrap(),
            &ul(vec![
                li(vec![p("one")]),
                li(vec![p("two"), ul(vec![li(vec![p("deep")])])]),
            ])
        );
        assert_eq!(ordered.type_name(), "orderedList");
        assert_eq!(ordered.attr("start"), Some(&json!(3)));
        assert_eq!(ordered.child_count(), 2);
    }

    #[test]
    fn test_code_block_and_inline_code() {
        let d = md("```rust\nfn main() {}\n```\n\nuse `x`\n");
        let code = d.child(0).unwrap();
        assert_eq!(code.attr_str("language"), Some("rust"));
        assert_eq!(code.text_content(), "fn main() {}");
        assert_eq!(d.child(1).unwrap(), &para(vec![txt("use "), marked("x", &["code"])]));
    }

    #[test]
    fn test_blockquote_rule_and_breaks() {
        let d = md("> quoted\n> line\n\n---\n\nhard  \nbreak\n");
        assert_eq!(d.child(0).unwrap(), &quote(vec![p("quoted line")]));
        assert_eq!(d.child(1).unwrap(), &hr());
        let para = d.child(2).unwrap();
        assert_eq!(para.child(1).unwrap().type_name(), "hardBreak");
    }

    #[test]
    fn test_links_images_and_underline() {
        let d = md("[site](https://x.dev \"X\") ![alt](/a.png) <u>under</u>\n");
        let para = d.child(0).unwrap();
        let link = &para.child(0).unwrap().marks()[0];
        assert_eq!(link.attr("href"), Some(&json!("https://x.dev")));
        assert_eq!(link.attr("title"), Some(&json!("X")));
        let image = para.child(2).unwrap();
        assert_eq!(image.type_name(), "image");
        assert_eq!(image.attr_str("alt"), Some("alt"));
        assert_eq!(para.child(4).unwrap(), &marked("under", &["underline"]));
    }

    #[test]
    fn test_html_blocks_become_nodes() {
        let d = md("<div data-tweet-embed=\"\" data-tweet-id=\"42\"></div>\n\nafter\n");
        assert_eq!(d.child(0).unwrap().type_name(), "tweetEmbed");
        assert_eq!(d.child(1).unwrap(), &p("after"));
    }

    #[test]
    fn test_empty_item_gets_paragraph() {
        let d = md("-\n- b\n");
        assert_eq!(d.child(0).unwrap(), &ul(vec![li(vec![p("")]), li(vec![p("b")])]));
    }
}
