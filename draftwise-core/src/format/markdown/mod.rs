//! Markdown codec (CommonMark with strikethrough and tables), plus YAML
//! front matter for the document title and description.

mod frontmatter;
mod parse;
mod serialize;

pub use frontmatter::{metadata_header, split_frontmatter};
pub use serialize::serialize;

use crate::error::Result;
use crate::format::Metadata;
use crate::model::{Fragment, Node};
use crate::schema::Schema;

/// Parse a whole Markdown file, front matter included.
pub fn parse(schema: &Schema, source: &str) -> Result<(Node, Metadata)> {
    let (metadata, body) = split_frontmatter(source)?;
    let mut content = parse_fragment(schema, body)?;
    if content.is_empty() {
        content = schema.create_and_fill("doc")?.content().clone();
    }
    Ok((schema.node_with_defaults("doc", content)?, metadata))
}

/// Parse Markdown into block content, for insertion.
pub fn parse_fragment(schema: &Schema, source: &str) -> Result<Fragment> {
    parse::parse_blocks(schema, source)
}
