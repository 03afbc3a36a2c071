use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

#[test]
fn convert_markdown_to_html_on_stdout() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("post.md"),
        "---\ntitle: Notes\n---\n# Hello\n\nSome **bold** text.\n",
    )?;

    #[allow(deprecated)]
    Command::cargo_bin("draftwise")?
        .current_dir(dir.path())
        .args(["convert", "post.md", "--to", "html", "--output", "-"])
        .assert()
        .success()
        .stdout("<h1>Hello</h1><p>Some <strong>bold</strong> text.</p>");

    Ok(())
}

#[test]
fn convert_html_to_markdown_file_with_metadata() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("page.html"),
        "<h2>Intro</h2><ul><li>one</li><li>two</li></ul>",
    )?;

    #[allow(deprecated)]
    Command::cargo_bin("draftwise")?
        .current_dir(dir.path())
        .args([
            "convert",
            "page.html",
            "--to",
            "markdown",
            "--output",
            "page.md",
            "--title",
            "Intro page",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("page.md"));

    let written = fs::read_to_string(dir.path().join("page.md"))?;
    assert_eq!(
        written,
        "---\ntitle: \"Intro page\"\n---\n\n## Intro\n\n- one\n- two\n"
    );

    Ok(())
}

#[test]
fn convert_uses_configured_default_format() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("draftwise.yml"), "export:\n  default_format: json\n  pretty_json: false\n")?;
    fs::write(dir.path().join("note.md"), "hi\n")?;

    #[allow(deprecated)]
    let assert = Command::cargo_bin("draftwise")?
        .current_dir(dir.path())
        .args(["convert", "note.md", "-o", "-"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    assert!(!stdout.contains('\n'), "expected compact JSON: {stdout}");
    let value: Value = serde_json::from_str(&stdout)?;
    assert_eq!(value["type"], "doc");
    assert_eq!(value["content"][0]["content"][0]["text"], "hi");

    Ok(())
}

#[test]
fn convert_rejects_unknown_extension() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("notes.txt"), "plain")?;

    #[allow(deprecated)]
    Command::cargo_bin("draftwise")?
        .current_dir(dir.path())
        .args(["convert", "notes.txt", "--to", "html"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported file type"));

    Ok(())
}

#[test]
fn inspect_json_reports_counts() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("doc.md"),
        "# Title\n\n*a* and *b*\n\n- x\n- y\n",
    )?;

    #[allow(deprecated)]
    let assert = Command::cargo_bin("draftwise")?
        .current_dir(dir.path())
        .args(["inspect", "doc.md", "--json"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let value: Value = serde_json::from_str(&stdout)?;
    assert_eq!(value["blocks"], 3);
    assert_eq!(value["nodes"]["heading"], 1);
    assert_eq!(value["nodes"]["listItem"], 2);
    assert_eq!(value["marks"]["italic"], 2);

    Ok(())
}

#[test]
fn inspect_reports_invalid_json_document() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("bad.json"),
        r#"{"type":"doc","content":[{"type":"mystery"}]}"#,
    )?;

    #[allow(deprecated)]
    Command::cargo_bin("draftwise")?
        .current_dir(dir.path())
        .args(["inspect", "bad.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to import bad.json"));

    Ok(())
}
