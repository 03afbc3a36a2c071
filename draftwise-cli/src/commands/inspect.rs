//! Validate a document and summarize its structure.

use anyhow::{Context, Result};
use draftwise_core::{Metadata, Node};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Serialize)]
struct Inspection {
    size: usize,
    characters: usize,
    blocks: usize,
    nodes: BTreeMap<String, usize>,
    marks: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    metadata: Metadata,
}

pub fn inspect(config_path: &Path, input: &Path, json: bool) -> Result<()> {
    let (editor, metadata) = super::open(config_path, input)?;
    let doc = editor.doc();
    doc.validate().context("Document failed validation")?;

    let summary = Inspection {
        size: doc.size(),
        characters: doc.text_content().chars().count(),
        blocks: doc.root().child_count(),
        nodes: count_nodes(doc.root()),
        marks: count_marks(doc.root()),
        metadata,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Valid document: {} blocks, {} characters, size {}",
            summary.blocks, summary.characters, summary.size
        );
        if let Some(title) = &summary.metadata.title {
            println!("title: {title}");
        }
        println!("nodes:");
        for (name, count) in &summary.nodes {
            println!("  {name}: {count}");
        }
        if !summary.marks.is_empty() {
            println!("marks:");
            for (name, count) in &summary.marks {
                println!("  {name}: {count}");
            }
        }
    }
    Ok(())
}

fn count_nodes(root: &Node) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    root.descendants(&mut |node: &Node, _, _, _| {
        *counts.entry(node.type_name().to_string()).or_insert(0) += 1;
        true
    });
    counts
}

/// Marks are counted once per text run.
fn count_marks(root: &Node) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    root.descendants(&mut |node: &Node, _, _, _| {
        for mark in node.marks() {
            *counts.entry(mark.type_name().to_string()).or_insert(0) += 1;
        }
        true
    });
    counts
}
