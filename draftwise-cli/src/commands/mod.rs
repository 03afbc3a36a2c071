//! CLI command implementations.

pub mod convert;
pub mod inspect;

pub use convert::convert;
pub use inspect::inspect;

use anyhow::{anyhow, Context, Result};
use draftwise_core::{format, standard, Config, Editor, Metadata};
use draftwise_types::FormatKind;
use std::path::Path;

/// Load the config and read `input` into an editor, classifying it by
/// extension.
pub(crate) fn open(config_path: &Path, input: &Path) -> Result<(Editor, Metadata)> {
    let config = Config::load_or_default(config_path).context("Failed to load configuration")?;
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let kind = FormatKind::from_file_name(&name)
        .ok_or_else(|| anyhow!("Unsupported file type: {}", input.display()))?;
    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let (doc, metadata) = format::import(&standard(), kind, &bytes)
        .with_context(|| format!("Failed to import {}", input.display()))?;
    tracing::debug!(input = %input.display(), %kind, size = doc.size(), "document imported");
    Ok((Editor::with_config(doc, config), metadata))
}
