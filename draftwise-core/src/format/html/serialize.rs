use crate::model::{Fragment, Mark, Node};
use serde_json::Value;
use std::fmt::Write;

/// Serialize a document's children as an HTML fragment.
pub fn serialize(doc: &Node) -> String {
    let mut out = String::new();
    for child in doc.content().iter() {
        block(child, &mut out);
    }
    out
}

/// Serialize a single block node.
pub fn serialize_block(node: &Node) -> String {
    let mut out = String::new();
    block(node, &mut out);
    out
}

/// Serialize a single inline node without its marks.
pub fn serialize_inline(node: &Node) -> String {
    let mut out = String::new();
    inline_node(node, &mut out);
    out
}

fn block(node: &Node, out: &mut String) {
    match node.type_name() {
        "paragraph" => wrap("p", &[], node, out),
        "heading" => {
            let level = node
                .attr("level")
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .clamp(1, 6);
            wrap(&format!("h{level}"), &[], node, out);
        }
        "blockquote" => wrap("blockquote", &[], node, out),
        "bulletList" => wrap("ul", &[], node, out),
        "orderedList" => {
            let start = node.attr("start").and_then(Value::as_u64).unwrap_or(1);
            let attrs = if start == 1 {
                Vec::new()
            } else {
                vec![("start", Some(start.to_string()))]
            };
            wrap("ol", &attrs, node, out);
        }
        "listItem" => wrap("li", &[], node, out),
        "codeBlock" => {
            let class = node
                .attr_str("language")
                .filter(|l| !l.is_empty())
                .map(|l| format!("language-{l}"));
            out.push_str("<pre>");
            open_tag("code", &[("class", class)], out);
            out.push_str(&escape_text(&node.text_content()));
            out.push_str("</code></pre>");
        }
        "horizontalRule" => out.push_str("<hr>"),
        "youtube" => {
            out.push_str("<div data-youtube-video=\"\">");
            let start = node.attr("start").and_then(Value::as_u64).filter(|s| *s > 0);
            open_tag(
                "iframe",
                &[
                    ("src", attr_text(node, "src")),
                    ("width", attr_text(node, "width")),
                    ("height", attr_text(node, "height")),
                    ("start", start.map(|s| s.to_string())),
                    ("allowfullscreen", Some("true".into())),
                ],
                out,
            );
            out.push_str("</iframe></div>");
        }
        "iframe" => {
            out.push_str("<div class=\"iframe-wrapper\">");
            open_tag(
                "iframe",
                &[
                    ("src", attr_text(node, "src")),
                    ("frameborder", attr_text(node, "frameBorder")),
                    ("allowfullscreen", attr_text(node, "allowFullscreen")),
                    ("width", attr_text(node, "width")),
                    ("height", attr_text(node, "height")),
                ],
                out,
            );
            out.push_str("</iframe></div>");
        }
        "tweetEmbed" => {
            open_tag(
                "div",
                &[
                    ("data-tweet-embed", Some(String::new())),
                    ("data-tweet-id", attr_text(node, "id")),
                ],
                out,
            );
            out.push_str("</div>");
        }
        "aiGeneration" => out.push_str("<div data-type=\"ai-generation\"></div>"),
        name => {
            let data_type = [("data-type", Some(name.to_string()))];
            if node.inline_content() {
                open_tag("p", &data_type, out);
                inline(node.content(), out);
                out.push_str("</p>");
            } else {
                wrap("div", &data_type, node, out);
            }
        }
    }
}

/// Open `tag`, render the node's children (inline or block), close `tag`.
fn wrap(tag: &str, attrs: &[(&str, Option<String>)], node: &Node, out: &mut String) {
    open_tag(tag, attrs, out);
    if node.inline_content() {
        inline(node.content(), out);
    } else {
        for child in node.content().iter() {
            block(child, out);
        }
    }
    let _ = write!(out, "</{tag}>");
}

/// Render inline content. Marks stay open across adjacent nodes that
/// share them, so `<strong>a<em>b</em></strong>` is not split.
fn inline(content: &Fragment, out: &mut String) {
    let mut open: Vec<&Mark> = Vec::new();
    for node in content.iter() {
        let marks = node.marks();
        let keep = open
            .iter()
            .zip(marks)
            .take_while(|(a, b)| **a == *b)
            .count();
        while open.len() > keep {
            if let Some(mark) = open.pop() {
                close_mark(mark, out);
            }
        }
        for mark in &marks[keep..] {
            open_mark(mark, out);
            open.push(mark);
        }
        inline_node(node, out);
    }
    while let Some(mark) = open.pop() {
        close_mark(mark, out);
    }
}

fn inline_node(node: &Node, out: &mut String) {
    if let Some(text) = node.text() {
        out.push_str(&escape_text(text));
        return;
    }
    match node.type_name() {
        "hardBreak" => out.push_str("<br>"),
        "image" => open_tag(
            "img",
            &[
                ("src", attr_text(node, "src")),
                ("alt", attr_text(node, "alt")),
                ("title", attr_text(node, "title")),
            ],
            out,
        ),
        "twitterBadge" => {
            open_tag(
                "span",
                &[
                    ("username", attr_text(node, "username")),
                    ("data-type", Some("twitter-badge".into())),
                ],
                out,
            );
            out.push_str("</span>");
        }
        name => {
            open_tag("span", &[("data-type", Some(name.to_string()))], out);
            inline(node.content(), out);
            out.push_str("</span>");
        }
    }
}

fn mark_tag(mark: &Mark) -> &str {
    match mark.type_name() {
        "bold" => "strong",
        "italic" => "em",
        "underline" => "u",
        "strike" => "s",
        "code" => "code",
        "link" => "a",
        _ => "span",
    }
}

fn open_mark(mark: &Mark, out: &mut String) {
    let tag = mark_tag(mark);
    match mark.type_name() {
        "link" => {
            let text = |name: &str| mark.attr(name).and_then(value_text);
            open_tag(
                tag,
                &[
                    ("href", text("href")),
                    ("target", text("target")),
                    ("rel", Some("noopener noreferrer nofollow".into())),
                    ("title", text("title")),
                ],
                out,
            );
        }
        "bold" | "italic" | "underline" | "strike" | "code" => open_tag(tag, &[], out),
        name => open_tag(tag, &[("data-mark", Some(name.to_string()))], out),
    }
}

fn close_mark(mark: &Mark, out: &mut String) {
    let _ = write!(out, "</{}>", mark_tag(mark));
}

fn open_tag(tag: &str, attrs: &[(&str, Option<String>)], out: &mut String) {
    out.push('<');
    out.push_str(tag);
    for (name, value) in attrs {
        if let Some(value) = value {
            let _ = write!(out, " {name}=\"{}\"", escape_attr(value));
        }
    }
    out.push('>');
}

fn attr_text(node: &Node, name: &str) -> Option<String> {
    node.attr(name).and_then(value_text)
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
    out
}

fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::html::parse;
    use crate::model::test_support::*;
    use crate::schema::{standard, Attrs};
    use serde_json::json;

    #[test]
    fn test_blocks_and_marks() {
        let d = doc(vec![
            h(2, "Title"),
            para(vec![
                txt("a "),
                marked("b", &["bold"]),
                marked("c", &["bold", "italic"]),
                txt(" <d>"),
            ]),
            hr(),
        ]);
        insta::assert_snapshot!(
            serialize(&d),
            @"<h2>Title</h2><p>a <strong>b<em>c</em></strong> &lt;d&gt;</p><hr>"
        );
    }

    #[test]
    fn test_lists_and_code() {
        let mut start = Attrs::new();
        start.insert("start".into(), json!(3));
        let ol = standard()
            .node("orderedList", start, vec![li(vec![p("three")])], vec![])
            .unwrap();
        let mut lang = Attrs::new();
        lang.insert("language".into(), json!("rust"));
        let code = standard()
            .node("codeBlock", lang, vec![txt("a < b")], vec![])
            .unwrap();
        let d = doc(vec![ul(vec![li(vec![p("one")])]), ol, code]);
        insta::assert_snapshot!(
            serialize(&d),
            @r#"<ul><li><p>one</p></li></ul><ol start="3"><li><p>three</p></li></ol><pre><code class="language-rust">a &lt; b</code></pre>"#
        );
    }

    #[test]
    fn test_embeds() {
        let schema = standard();
        let mut tweet = Attrs::new();
        tweet.insert("id".into(), json!("42"));
        let tweet = schema.node("tweetEmbed", tweet, Fragment::empty(), vec![]).unwrap();
        let d = doc(vec![youtube("https://youtu.be/abc"), tweet]);
        insta::assert_snapshot!(
            serialize(&d),
            @r#"<div data-youtube-video=""><iframe src="https://youtu.be/abc" width="640" height="480" allowfullscreen="true"></iframe></div><div data-tweet-embed="" data-tweet-id="42"></div>"#
        );
    }

    #[test]
    fn test_link_attributes_are_escaped() {
        let schema = standard();
        let mut attrs = Attrs::new();
        attrs.insert("href".into(), json!("https://x.dev/?a=1&b=\"2\""));
        let link = schema.mark("link", attrs).unwrap();
        let d = doc(vec![para(vec![schema.text("x", vec![link]).unwrap()])]);
        assert_eq!(
            serialize(&d),
            "<p><a href=\"https://x.dev/?a=1&amp;b=&quot;2&quot;\" target=\"_blank\" rel=\"noopener noreferrer nofollow\">x</a></p>"
        );
    }

    #[test]
    fn test_output_parses_back_to_same_tree() {
        let schema = standard();
        let mut badge = Attrs::new();
        badge.insert("username".into(), json!("jack"));
        let badge = schema.node("twitterBadge", badge, Fragment::empty(), vec![]).unwrap();
        let hard_break = schema.node_with_defaults("hardBreak", Fragment::empty()).unwrap();
        let d = doc(vec![
            h(1, "Title"),
            quote(vec![p("quoted")]),
            para(vec![
                txt("hi "),
                badge,
                hard_break,
                marked("under", &["underline", "strike"]),
            ]),
            ul(vec![li(vec![p("one"), ul(vec![li(vec![p("two")])])])]),
            youtube("https://youtu.be/abc"),
        ]);
        assert_eq!(parse(&schema, &serialize(&d)).unwrap(), d);
    }
}
