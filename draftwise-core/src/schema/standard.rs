//! The built-in editor schema.

use super::{MarkSpec, NodeSpec, Schema, SchemaError};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::sync::Arc;

/// Name of the transient placeholder node used by AI generations.
pub const AI_GENERATION: &str = "aiGeneration";

/// Process-wide standard schema, built on first use and never modified.
pub static STANDARD: Lazy<Arc<Schema>> =
    Lazy::new(|| build_standard().expect("built-in schema declarations are valid"));

pub fn standard() -> Arc<Schema> {
    STANDARD.clone()
}

fn build_standard() -> Result<Arc<Schema>, SchemaError> {
    Schema::builder()
        .node("doc", NodeSpec::new().content("block+"))?
        .node("paragraph", NodeSpec::new().content("inline*").group("block"))?
        .node(
            "heading",
            NodeSpec::new()
                .content("inline*")
                .group("block")
                .attr("level", 1),
        )?
        .node(
            "blockquote",
            NodeSpec::new().content("block+").group("block"),
        )?
        .node(
            "bulletList",
            NodeSpec::new().content("listItem+").group("block list"),
        )?
        .node(
            "orderedList",
            NodeSpec::new()
                .content("listItem+")
                .group("block list")
                .attr("start", 1),
        )?
        .node("listItem", NodeSpec::new().content("paragraph block*"))?
        .node(
            "codeBlock",
            NodeSpec::new()
                .content("text*")
                .group("block")
                .marks("")
                .code()
                .attr("language", Value::Null),
        )?
        .node("horizontalRule", NodeSpec::new().group("block"))?
        .node(
            "youtube",
            NodeSpec::new()
                .group("block")
                .atom()
                .view("youtube")
                .required_attr("src")
                .attr("width", 640)
                .attr("height", 480)
                .attr("start", 0),
        )?
        .node(
            "iframe",
            NodeSpec::new()
                .group("block")
                .atom()
                .view("iframe")
                .required_attr("src")
                .attr("frameBorder", "0")
                .attr("allowFullscreen", "true")
                .attr("width", "100%")
                .attr("height", "400px"),
        )?
        .node(
            "tweetEmbed",
            NodeSpec::new()
                .group("block")
                .atom()
                .view("tweet")
                .required_attr("id"),
        )?
        .node(
            AI_GENERATION,
            NodeSpec::new()
                .group("block")
                .atom()
                .marks("")
                .view("ai-generation")
                .transient()
                .attr("text", "")
                .attr("operationKind", "generate"),
        )?
        .node("text", NodeSpec::new().group("inline"))?
        .node(
            "hardBreak",
            NodeSpec::new().group("inline").inline().leaf_text("\n"),
        )?
        .node(
            "image",
            NodeSpec::new()
                .group("inline")
                .inline()
                .atom()
                .view("image")
                .required_attr("src")
                .attr("alt", Value::Null)
                .attr("title", Value::Null),
        )?
        .node(
            "twitterBadge",
            NodeSpec::new()
                .group("inline")
                .inline()
                .atom()
                .view("twitter-badge")
                .required_attr("username"),
        )?
        .mark(
            "link",
            MarkSpec::new()
                .group("link")
                .excludes("link")
                .non_inclusive()
                .required_attr("href")
                .attr("title", Value::Null)
                .attr("target", "_blank"),
        )?
        .mark("bold", MarkSpec::new())?
        .mark("italic", MarkSpec::new())?
        .mark("underline", MarkSpec::new())?
        .mark("strike", MarkSpec::new())?
        .mark("code", MarkSpec::new().excludes("_").code())?
        .build()
}
