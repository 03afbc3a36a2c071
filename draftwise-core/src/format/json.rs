//! Portable JSON: `{ "type": "doc", "content": [...] }`, one object per node.
//!
//! This is the canonical persisted form and the only lossless codec.

use crate::error::{EditorError, ImportParseError, Result};
use crate::model::{Fragment, Mark, Node};
use crate::schema::{Attrs, Schema};
use draftwise_types::FormatKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonNode {
    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<JsonMark>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<JsonNode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonMark {
    #[serde(rename = "type")]
    pub mark_type: String,

    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
}

pub fn to_json(node: &Node) -> JsonNode {
    JsonNode {
        node_type: node.type_name().to_string(),
        attrs: node.attrs().clone(),
        marks: node
            .marks()
            .iter()
            .map(|m| JsonMark {
                mark_type: m.type_name().to_string(),
                attrs: m.attrs().clone(),
            })
            .collect(),
        content: node.content().iter().map(to_json).collect(),
        text: node.text().map(str::to_string),
    }
}

/// Rebuild a node, checking every type, attribute and content expression
/// against the schema.
pub fn from_json(schema: &Schema, json: &JsonNode) -> Result<Node> {
    let marks = json
        .marks
        .iter()
        .map(|m| schema.mark(&m.mark_type, m.attrs.clone()))
        .collect::<Result<Vec<Mark>>>()?;

    if schema.node_type(&json.node_type)?.is_text() {
        let text = json.text.as_deref().unwrap_or_default();
        return schema.text(text, marks);
    }
    let content = json
        .content
        .iter()
        .map(|child| from_json(schema, child))
        .collect::<Result<Vec<_>>>()?;
    schema.node(
        &json.node_type,
        json.attrs.clone(),
        Fragment::from_vec(content),
        Mark::sort_set(marks),
    )
}

pub fn to_value(node: &Node) -> Value {
    // A tree of strings, maps and arrays always serializes.
    serde_json::to_value(to_json(node)).unwrap_or(Value::Null)
}

pub fn to_string(node: &Node, pretty: bool) -> Result<String> {
    let json = to_json(node);
    let out = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    };
    out.map_err(|e| EditorError::Export {
        format: FormatKind::Json,
        message: e.to_string(),
    })
}

/// Parse a whole document.
pub fn parse(schema: &Schema, input: &str) -> Result<Node> {
    let json: JsonNode = serde_json::from_str(input)
        .map_err(|e| ImportParseError::new(FormatKind::Json, e.to_string()))?;
    if json.node_type != "doc" {
        return Err(ImportParseError::new(
            FormatKind::Json,
            format!("expected a doc at the top level, found {:?}", json.node_type),
        )
        .into());
    }
    from_json(schema, &json)
}

/// Content for insertion: a single node, an array of nodes, or a whole
/// document whose children are taken.
pub fn fragment_from_value(schema: &Schema, value: &Value) -> Result<Fragment> {
    let parse_error = |e: serde_json::Error| ImportParseError::new(FormatKind::Json, e.to_string());
    let nodes: Vec<JsonNode> = match value {
        Value::Array(_) => serde_json::from_value(value.clone()).map_err(parse_error)?,
        _ => {
            let node: JsonNode = serde_json::from_value(value.clone()).map_err(parse_error)?;
            if node.node_type == "doc" {
                node.content
            } else {
                vec![node]
            }
        }
    };
    let nodes = nodes
        .iter()
        .map(|n| from_json(schema, n))
        .collect::<Result<Vec<_>>>()?;
    Ok(Fragment::from_vec(nodes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::*;
    use crate::schema::standard;
    use serde_json::json;

    #[test]
    fn test_shape_matches_portable_layout() {
        let root = doc(vec![heading(2, vec![txt("Hi "), bold("there")])]);
        assert_eq!(
            to_value(&root),
            json!({
                "type": "doc",
                "content": [{
                    "type": "heading",
                    "attrs": {"level": 2},
                    "content": [
                        {"type": "text", "text": "Hi "},
                        {"type": "text", "text": "there", "marks": [{"type": "bold"}]}
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_round_trip_is_exact() {
        let schema = standard();
        let mut link = Attrs::new();
        link.insert("href".into(), json!("https://example.com"));
        link.insert("title".into(), json!("Example"));
        let link = schema.mark("link", link).unwrap();
        let root = doc(vec![
            h(1, "Title"),
            para(vec![
                txt("plain "),
                marked("both", &["bold", "italic"]),
                schema.text(" link", vec![link]).unwrap(),
            ]),
            ul(vec![li(vec![p("one"), ul(vec![li(vec![p("nested")])])])]),
            node("codeBlock", vec![txt("fn main() {}\n")]),
            youtube("https://youtu.be/abc"),
            p(""),
        ]);
        let text = to_string(&root, true).unwrap();
        assert_eq!(parse(&schema, &text).unwrap(), root);
        assert_eq!(from_json(&schema, &to_json(&root)).unwrap(), root);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = parse(&standard(), r#"{"type":"doc","content":[{"type":"table"}]}"#).unwrap_err();
        assert!(err.to_string().contains("table"));
    }

    #[test]
    fn test_top_level_must_be_doc() {
        let err = parse(&standard(), r#"{"type":"paragraph"}"#).unwrap_err();
        assert!(matches!(err, EditorError::Import(_)));
    }

    #[test]
    fn test_fragment_from_value_variants() {
        let schema = standard();
        let single = json!({"type": "paragraph", "content": [{"type": "text", "text": "a"}]});
        assert_eq!(fragment_from_value(&schema, &single).unwrap(), Fragment::from(p("a")));

        let many = json!([{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]);
        assert_eq!(fragment_from_value(&schema, &many).unwrap(), Fragment::from(txt("ab")));

        let whole = json!({"type": "doc", "content": [{"type": "horizontalRule"}]});
        assert_eq!(fragment_from_value(&schema, &whole).unwrap(), Fragment::from(hr()));
    }
}
