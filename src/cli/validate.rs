use anyhow::{bail, Result};
use std::fs;
use std::path::Path;

use crate::schema::parse_packages;

/// Shape-check a schema file the way model answers are checked.
pub fn run(path: &str) -> Result<()> {
    let file = Path::new(path);
    if !file.is_file() {
        bail!("File not found: {}", path);
    }
    let text = fs::read_to_string(file)?;
    let packages = parse_packages(&text)?;
    for package in &packages {
        println!("✓ {} ({} function(s))", package.name, package.functions.len());
    }
    Ok(())
}
