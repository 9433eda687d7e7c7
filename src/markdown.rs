//! Markdown rendering via the external tool contract.
//!
//! The markdown-to-HTML converter is a black-box subprocess: raw text on
//! stdin, HTML5 on stdout, a fixed set of extensions on the command line.
//! Anything on stderr is logged as a warning but does not fail the
//! conversion; a non-zero exit does, and is fatal to that item only — the
//! caller drops the one post and the build continues.

use std::io::Write;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum MarkdownError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("markdown tool exited with {0}")]
    ToolFailed(String),
}

const TOOL: &str = "cmark-gfm";

/// The markdown service seam. Handlers render through this trait so tests
/// can substitute a pure stand-in for the external tool.
pub trait Markdown: Sync {
    fn render(&self, raw: &str) -> Result<String, MarkdownError>;
}

/// Production implementation: the external tool, per the contract above.
pub struct ToolMarkdown;

impl Markdown for ToolMarkdown {
    fn render(&self, raw: &str) -> Result<String, MarkdownError> {
        render_markdown(raw)
    }
}

/// Extensions enabled on every invocation. Fixed — post content relies on
/// all of them, so they are not configurable per item.
const EXTENSIONS: &[&str] = &["table", "strikethrough", "autolink", "tasklist"];

/// Render raw markdown to HTML5 through the standard tool.
pub fn render_markdown(raw: &str) -> Result<String, MarkdownError> {
    let mut command = Command::new(TOOL);
    command.args(["-t", "html", "--unsafe"]);
    for ext in EXTENSIONS {
        command.args(["-e", ext]);
    }
    render_with_command(&mut command, raw)
}

/// Drive an arbitrary stdin→stdout command through the tool contract.
/// Split out so tests can substitute a trivial filter for the real tool.
pub fn render_with_command(command: &mut Command, raw: &str) -> Result<String, MarkdownError> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // stdin is dropped after the write so the child sees EOF.
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(raw.as_bytes())?;
    }

    let output = child.wait_with_output()?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        warn!(tool = TOOL, "markdown tool stderr: {}", stderr.trim());
    }

    if !output.status.success() {
        return Err(MarkdownError::ToolFailed(output.status.to_string()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
