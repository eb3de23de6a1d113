use anyhow::{bail, Result};
use std::path::Path;
use tracing::info;

use crate::pipeline::assembler::{finalize, Manifest};

/// Rebuild `index.js`, `tests.js` and the test script of a package directory.
pub fn run(path: &str) -> Result<()> {
    let dir = Path::new(path);
    if !dir.is_dir() {
        bail!("Not a package directory: {}", path);
    }
    if !dir.join("package.json").is_file() {
        bail!("No package.json in {}", path);
    }

    let manifest = match Manifest::load(dir)? {
        Some(manifest) => manifest,
        None => {
            info!("No manifest found, using functions/ in name order");
            Manifest::from_dir(dir)?
        }
    };
    finalize(dir, &manifest)
}
