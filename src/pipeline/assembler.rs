use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use super::synthesizer::{function_path, test_path, FUNCTIONS_DIR};
use crate::llm::prompts::TEST_ENTRY_POINT;
use crate::writer::LINT_HEADER;

pub const MANIFEST_FILE: &str = "herogen.manifest.json";
pub const TEST_SCRIPT: &str = "node tests.js";

/// Ordered list of the functions accepted during generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub package: String,
    pub functions: Vec<String>,
}

impl Manifest {
    pub fn new(package: &str) -> Self {
        Self {
            package: package.to_string(),
            functions: Vec::new(),
        }
    }

    pub fn push(&mut self, function: String) {
        if !self.functions.contains(&function) {
            self.functions.push(function);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn load(package_dir: &Path) -> Result<Option<Self>> {
        let path = package_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        let manifest = serde_json::from_str(&text)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;
        Ok(Some(manifest))
    }

    pub fn save(&self, package_dir: &Path) -> Result<()> {
        let path = package_dir.join(MANIFEST_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Rebuild a manifest for a directory generated without one: the
    /// `functions/*.js` stems, sorted by name.
    pub fn from_dir(package_dir: &Path) -> Result<Self> {
        let package = package_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let functions_dir = package_dir.join(FUNCTIONS_DIR);
        let mut functions = Vec::new();
        if functions_dir.is_dir() {
            for entry in fs::read_dir(&functions_dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("js") {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    functions.push(stem.to_string());
                }
            }
        }
        functions.sort();
        Ok(Self { package, functions })
    }
}

/// One `module.exports.<name>` line per function, in manifest order.
pub fn build_index(functions: &[String]) -> String {
    let mut index = String::from(LINT_HEADER);
    for name in functions {
        index.push_str(&format!(
            "module.exports.{name} = require(\"./{dir}/{name}.js\").{name};\n",
            name = name,
            dir = FUNCTIONS_DIR
        ));
    }
    index
}

/// Require each test module and call its registered entry point.
pub fn build_tests(functions_with_tests: &[String]) -> String {
    let mut tests = String::from(LINT_HEADER);
    for name in functions_with_tests {
        tests.push_str(&format!(
            "require(\"./tests/{}.js\").{}();\n",
            name, TEST_ENTRY_POINT
        ));
    }
    tests
}

/// Set `scripts.test` while keeping every other key of package.json.
pub fn patch_package_json(path: &Path) -> Result<()> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut json: Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;

    let Some(root) = json.as_object_mut() else {
        bail!("{} is not a JSON object", path.display());
    };
    let scripts = root
        .entry("scripts")
        .or_insert_with(|| Value::Object(Map::new()));
    if !scripts.is_object() {
        *scripts = Value::Object(Map::new());
    }
    if let Some(scripts) = scripts.as_object_mut() {
        scripts.insert("test".to_string(), Value::String(TEST_SCRIPT.to_string()));
    }

    let mut out = serde_json::to_string_pretty(&json)?;
    out.push('\n');
    fs::write(path, out).with_context(|| format!("Failed to write {}", path.display()))
}

/// Write `index.js`, `tests.js`, the manifest, and point `npm test` at
/// `tests.js`. Functions whose file is missing are left out with a warning.
pub fn finalize(package_dir: &Path, manifest: &Manifest) -> Result<()> {
    let mut functions = Vec::new();
    let mut with_tests = Vec::new();
    for name in &manifest.functions {
        if !function_path(package_dir, name).is_file() {
            warn!("{} is in the manifest but has no function file", name);
            continue;
        }
        if test_path(package_dir, name).is_file() {
            with_tests.push(name.clone());
        } else {
            warn!("{} has no test file; it will not run under npm test", name);
        }
        functions.push(name.clone());
    }

    fs::write(package_dir.join("index.js"), build_index(&functions))?;
    fs::write(package_dir.join("tests.js"), build_tests(&with_tests))?;
    manifest.save(package_dir)?;
    patch_package_json(&package_dir.join("package.json"))?;

    info!(
        "Assembled {}: {} function(s), {} test(s)",
        package_dir.display(),
        functions.len(),
        with_tests.len()
    );
    Ok(())
}
