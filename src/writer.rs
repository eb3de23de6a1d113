use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

pub const LINT_HEADER: &str = "/* eslint-disable */ \n\n";
pub const SEPARATOR: &str = "\n\n";
pub const CODE_FENCE: &str = "```";

static FENCE_TO_EOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"```.*").unwrap());

/// Drop every code-fence marker together with the rest of its line.
pub fn remove_code_block(content: &str) -> String {
    FENCE_TO_EOL.replace_all(content, "").into_owned()
}

pub fn contains_code_fence(content: &str) -> bool {
    content.contains(CODE_FENCE)
}

/// The exact bytes `write_content` adds for one call.
pub fn render_chunk(content: &str, is_markdown: bool) -> String {
    if is_markdown {
        format!("{}{}", content, SEPARATOR)
    } else {
        format!("{}{}{}", LINT_HEADER, remove_code_block(content), SEPARATOR)
    }
}

/// Create `path` (and its parents) or append to it.
///
/// JavaScript content loses any code fences and gains the eslint-disable
/// header; Markdown goes through untouched. Calls are not idempotent:
/// writing the same content twice leaves it in the file twice.
pub fn write_content(path: &Path, content: &str, is_markdown: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    file.write_all(render_chunk(content, is_markdown).as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
