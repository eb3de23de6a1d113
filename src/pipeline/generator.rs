use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::llm::client::LlmClient;
use crate::llm::prompts;
use crate::schema::{parse_packages, Idea, PackageSchema};
use crate::util::{sanitize_function_name, sanitize_package_name};

/// Turns an idea into package proposals.
pub struct PackageGenerator<'a> {
    client: &'a dyn LlmClient,
    schemas_dir: PathBuf,
}

impl<'a> PackageGenerator<'a> {
    pub fn new(client: &'a dyn LlmClient, schemas_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            schemas_dir: schemas_dir.into(),
        }
    }

    /// Ask the model for package ideas. An unparseable or misshapen answer
    /// drops the idea (empty result); only completion failures are errors.
    pub async fn propose(&self, idea: &Idea) -> Result<Vec<PackageSchema>> {
        info!("Thinking of a package for: {}", idea.prompt);
        let response = self
            .client
            .complete(&prompts::package_idea_prompt(idea))
            .await?;

        let packages = match parse_packages(&response) {
            Ok(packages) => packages,
            Err(e) => {
                warn!("Dropping idea {:?}: {}", idea.prompt, e);
                return Ok(Vec::new());
            }
        };

        if let Some(problem) = packages.iter().find_map(unsafe_name) {
            warn!("Dropping idea {:?}: {}", idea.prompt, problem);
            return Ok(Vec::new());
        }

        for package in &packages {
            if let Err(e) = self.save_schema(package) {
                warn!("Could not save schema for {}: {:#}", package.name, e);
            }
        }

        info!(
            "Proposed {} package(s): {}",
            packages.len(),
            packages
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(packages)
    }

    pub fn schema_path(&self, name: &str) -> PathBuf {
        self.schemas_dir.join(format!("{}.json", name))
    }

    fn save_schema(&self, package: &PackageSchema) -> Result<()> {
        fs::create_dir_all(&self.schemas_dir)?;
        let path = self.schema_path(&package.name);
        fs::write(&path, serde_json::to_string_pretty(package)?)?;
        info!("Saved schema to {}", path.display());
        Ok(())
    }
}

/// Names become paths, JS identifiers and command arguments.
fn unsafe_name(package: &PackageSchema) -> Option<String> {
    if let Err(e) = sanitize_package_name(&package.name) {
        return Some(e);
    }
    package
        .functions
        .iter()
        .find_map(|f| sanitize_function_name(&f.function_name).err())
}

/// Read back a persisted schema file.
pub fn load_schema(path: &Path) -> Result<PackageSchema> {
    let text = fs::read_to_string(path)?;
    let mut packages = parse_packages(&text)?;
    match packages.len() {
        1 => Ok(packages.remove(0)),
        n => anyhow::bail!("{} holds {} packages, expected 1", path.display(), n),
    }
}
