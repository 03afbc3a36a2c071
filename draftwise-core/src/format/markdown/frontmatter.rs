//! YAML front matter at the top of a Markdown file.

use crate::error::ImportParseError;
use crate::format::Metadata;
use draftwise_types::FormatKind;
use regex::Regex;
use serde_yaml::Value;
use std::sync::OnceLock;

static FRONTMATTER_REGEX: OnceLock<Regex> = OnceLock::new();

fn frontmatter_regex() -> &'static Regex {
    FRONTMATTER_REGEX.get_or_init(|| {
        Regex::new(r"(?s)^\u{feff}?---[ \t]*\r?\n(.*?)\r?\n?---[ \t]*(?:\r?\n|$)(.*)$").unwrap()
    })
}

/// Split front matter from the body.
///
/// Returns the metadata and the remaining Markdown. Input without front
/// matter yields empty metadata and the whole input as body. Only `title`
/// and `description` are read; other keys are ignored.
pub fn split_frontmatter(content: &str) -> Result<(Metadata, &str), ImportParseError> {
    let Some(captures) = frontmatter_regex().captures(content) else {
        return Ok((Metadata::default(), content));
    };
    let yaml = captures.get(1).map_or("", |m| m.as_str());
    let body = captures.get(2).map_or("", |m| m.as_str());

    let value: Value = if yaml.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(yaml)
            .map_err(|e| ImportParseError::new(FormatKind::Markdown, format!("invalid front matter: {e}")))?
    };
    let map = match value {
        Value::Null => return Ok((Metadata::default(), body)),
        Value::Mapping(map) => map,
        // A leading thematic break, not front matter.
        _ => return Ok((Metadata::default(), content)),
    };
    let field = |key: &str| {
        map.get(key).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    };
    Ok((Metadata::new(field("title"), field("description")), body))
}

/// The header written before an exported document body, or an empty
/// string when there is no metadata.
pub fn metadata_header(metadata: &Metadata) -> String {
    if metadata.is_empty() {
        return String::new();
    }
    let quote = |s: &str| s.replace('\\', "\\\\").replace('"', "\\\"");
    let mut out = String::from("---\n");
    if let Some(title) = &metadata.title {
        out.push_str(&format!("title: \"{}\"\n", quote(title)));
    }
    if let Some(description) = &metadata.description {
        out.push_str(&format!("description: \"{}\"\n", quote(description)));
    }
    out.push_str("---\n\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_frontmatter() {
        let content = "---\ntitle: My Post\ndescription: About things\ntags: [a]\n---\n# Hello\n";
        let (metadata, body) = split_frontmatter(content).unwrap();
        assert_eq!(metadata.title.as_deref(), Some("My Post"));
        assert_eq!(metadata.description.as_deref(), Some("About things"));
        assert_eq!(body, "# Hello\n");
    }

    #[test]
    fn test_no_frontmatter() {
        let (metadata, body) = split_frontmatter("# Just a heading\n\n---\n").unwrap();
        assert!(metadata.is_empty());
        assert_eq!(body, "# Just a heading\n\n---\n");
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let err = split_frontmatter("---\ntitle: [unclosed\n---\nbody").unwrap_err();
        assert_eq!(err.format, FormatKind::Markdown);

    }

    #[test]
    fn test_leading_rule_is_not_frontmatter() {
        let content = "---\nJust text\n---\nbody";
        let (metadata, body) = split_frontmatter(content).unwrap();
        assert!(metadata.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_header_round_trips() {
        let metadata = Metadata::new(Some("Say \"hi\"".into()), Some("C:\\path".into()));
        let header = metadata_header(&metadata);
        assert_eq!(header, "---\ntitle: \"Say \\\"hi\\\"\"\ndescription: \"C:\\\\path\"\n---\n\n");
        let (parsed, body) = split_frontmatter(&header).unwrap();
        assert_eq!(parsed, metadata);
        assert_eq!(body, "\n");
    }

    #[test]
    fn test_empty_metadata_has_no_header() {
        assert_eq!(metadata_header(&Metadata::default()), "");
    }
}
