//! Convert a document between formats.

use anyhow::{Context, Result};
use draftwise_core::Metadata;
use draftwise_types::FormatKind;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn convert(
    config_path: &Path,
    input: &Path,
    to: Option<FormatKind>,
    output: Option<&Path>,
    title: Option<String>,
    description: Option<String>,
) -> Result<()> {
    let (editor, imported) = super::open(config_path, input)?;
    let kind = to.unwrap_or(editor.config().export.default_format);
    let metadata = Metadata::new(
        title.or(imported.title),
        description.or(imported.description),
    );
    let export = editor
        .export(kind, &metadata)
        .with_context(|| format!("Failed to export as {kind}"))?;

    match output {
        Some(path) if path == Path::new("-") => {
            std::io::stdout()
                .write_all(&export.bytes)
                .context("Failed to write to stdout")?;
        }
        _ => {
            let path = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(&export.file_name));
            std::fs::write(&path, &export.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} ({})", path.display(), export.mime);
        }
    }
    Ok(())
}
