use crate::format::html;
use crate::model::{Fragment, Mark, Node};
use serde_json::Value;

/// Serialize a document's children as CommonMark. Nodes Markdown cannot
/// express (embeds) are written as HTML blocks.
pub fn serialize(doc: &Node) -> String {
    let mut out = blocks(doc.content()).join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

fn blocks(content: &Fragment) -> Vec<String> {
    content
        .iter()
        .map(block)
        .filter(|rendered| !rendered.is_empty())
        .collect()
}

fn block(node: &Node) -> String {
    match node.type_name() {
        "paragraph" => escape_block_start(inline(node.content())),
        "heading" => {
            let level = node
                .attr("level")
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .clamp(1, 6) as usize;
            format!("{} {}", "#".repeat(level), inline(node.content()))
        }
        "blockquote" => prefix_lines(&blocks(node.content()).join("\n\n"), "> ", ">"),
        "bulletList" => list(node, |_| "- ".to_string()),
        "orderedList" => {
            let start = node.attr("start").and_then(Value::as_u64).unwrap_or(1);
            list(node, |i| format!("{}. ", start + i as u64))
        }
        "listItem" => list_item(node),
        "codeBlock" => {
            let text = node.text_content();
            let mut fence = "```".to_string();
            while text.contains(&fence) {
                fence.push('`');
            }
            let language = node.attr_str("language").unwrap_or_default();
            if text.is_empty() {
                format!("{fence}{language}\n{fence}")
            } else {
                format!("{fence}{language}\n{text}\n{fence}")
            }
        }
        "horizontalRule" => "---".to_string(),
        _ if node.inline_content() => escape_block_start(inline(node.content())),
        _ => html::serialize_block(node),
    }
}

fn list(node: &Node, marker: impl Fn(usize) -> String) -> String {
    node.content()
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let marker = marker(i);
            let indent = " ".repeat(marker.len());
            let body = prefix_lines(&list_item(item), &indent, "");
            format!("{marker}{}", &body[indent.len().min(body.len())..])
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// An item's blocks. A nested list directly after the item's paragraph
/// stays attached to it so the list remains tight.
fn list_item(item: &Node) -> String {
    let mut out = String::new();
    let mut previous: Option<&Node> = None;
    for child in item.content().iter() {
        let rendered = block(child);
        if let Some(previous) = previous {
            let nested_list = matches!(child.type_name(), "bulletList" | "orderedList");
            out.push_str(if nested_list && previous.is_textblock() {
                "\n"
            } else {
                "\n\n"
            });
        }
        out.push_str(&rendered);
        previous = Some(child);
    }
    out
}

fn prefix_lines(text: &str, prefix: &str, blank: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                blank.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn inline(content: &Fragment) -> String {
    let mut out = String::new();
    let mut open: Vec<&Mark> = Vec::new();
    let mut pending_space = String::new();

    for node in content.iter() {
        let marks: Vec<&Mark> = node
            .marks()
            .iter()
            .filter(|m| m.type_name() != "code")
            .collect();
        let (lead, core, trail) = match node.text() {
            Some(text) => split_space(text),
            None => ("", "", ""),
        };
        if node.is_text() && core.is_empty() {
            pending_space.push_str(lead);
            continue;
        }

        let keep = open
            .iter()
            .zip(&marks)
            .take_while(|(a, b)| a == b)
            .count();
        while open.len() > keep {
            if let Some(mark) = open.pop() {
                out.push_str(&close_delimiter(mark));
            }
        }
        out.push_str(&pending_space);
        pending_space.clear();
        out.push_str(lead);
        for mark in &marks[keep..] {
            out.push_str(open_delimiter(mark));
            open.push(*mark);
        }

        if node.is_text() {
            if node.marks().iter().any(|m| m.type_name() == "code") {
                out.push_str(&code_span(core));
            } else {
                out.push_str(&escape_text(core));
            }
            pending_space.push_str(trail);
        } else {
            out.push_str(&inline_leaf(node));
        }
    }
    while let Some(mark) = open.pop() {
        out.push_str(&close_delimiter(mark));
    }
    out.push_str(&pending_space);
    out
}

fn inline_leaf(node: &Node) -> String {
    let attr = |name: &str| node.attr_str(name).unwrap_or_default();
    match node.type_name() {
        "hardBreak" => "\\\n".to_string(),
        "image" => {
            let alt = escape_text(attr("alt"));
            match node.attr_str("title") {
                Some(title) => format!("![{alt}]({} \"{}\")", attr("src"), escape_title(title)),
                None => format!("![{alt}]({})", attr("src")),
            }
        }
        "twitterBadge" => html::serialize_inline(node),
        _ => match node.node_type().leaf_text() {
            Some(text) => escape_text(text),
            None => escape_text(&node.text_content()),
        },
    }
}

fn open_delimiter(mark: &Mark) -> &'static str {
    match mark.type_name() {
        "bold" => "**",
        "italic" => "*",
        "strike" => "~~",
        "underline" => "<u>",
        "link" => "[",
        _ => "",
    }
}

fn close_delimiter(mark: &Mark) -> String {
    match mark.type_name() {
        "link" => {
            let href = mark.attr("href").and_then(Value::as_str).unwrap_or_default();
            match mark.attr("title").and_then(Value::as_str) {
                Some(title) => format!("]({href} \"{}\")", escape_title(title)),
                None => format!("]({href})"),
            }
        }
        "underline" => "</u>".to_string(),
        _ => open_delimiter(mark).to_string(),
    }
}

fn code_span(text: &str) -> String {
    let mut ticks = "`".to_string();
    while text.contains(&ticks) {
        ticks.push('`');
    }
    if ticks.len() > 1 || text.starts_with('`') || text.ends_with('`') {
        format!("{ticks} {text} {ticks}")
    } else {
        format!("{ticks}{text}{ticks}")
    }
}

fn split_space(text: &str) -> (&str, &str, &str) {
    let trimmed_start = text.trim_start();
    let lead = &text[..text.len() - trimmed_start.len()];
    let core = trimmed_start.trim_end();
    let trail = &trimmed_start[core.len()..];
    (lead, core, trail)
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' | '*' | '_' | '`' | '[' | ']' | '<' | '~' => {
                out.push('\\');
                out.push(c);
            }
            '&' if chars.peek().is_some_and(|n| n.is_ascii_alphanumeric() || *n == '#') => {
                out.push_str("\\&");
            }
            '\n' => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

fn escape_title(title: &str) -> String {
    title.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Escape text that would otherwise start a heading, quote, list item or
/// rule.
fn escape_block_start(text: String) -> String {
    let first = text.chars().next();
    let needs_escape = match first {
        Some('#' | '>' | '+' | '=') => true,
        Some('-') => text.len() == 1 || text[1..].starts_with([' ', '-']),
        Some(c) if c.is_ascii_digit() => {
            let digits = text.chars().take_while(char::is_ascii_digit).count();
            text[digits..].starts_with(['.', ')'])
        }
        _ => false,
    };
    if !needs_escape {
        return text;
    }
    match first {
        Some(c) if c.is_ascii_digit() => {
            let digits = text.chars().take_while(char::is_ascii_digit).count();
            format!("{}\\{}", &text[..digits], &text[digits..])
        }
        _ => format!("\\{text}"),
    }
}
