use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use super::assembler::{finalize, Manifest};
use super::generator::PackageGenerator;
use super::scaffold::{scaffold_package, write_readme};
use super::synthesizer::Synthesizer;
use crate::config::{Config, PathsConfig};
use crate::llm::client::LlmClient;
use crate::llm::error::LlmError;
use crate::publish::Publisher;
use crate::schema::{Idea, PackageSchema};

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub proposed: usize,
    pub assembled: usize,
    pub published: usize,
    pub failed: usize,
}

/// Drives ideas through proposal, generation, assembly and publishing, one
/// idea and one package at a time.
pub struct Pipeline<'a> {
    client: &'a dyn LlmClient,
    config: &'a Config,
    paths: PathsConfig,
    publisher: Option<Publisher<'a>>,
    function_delay: Duration,
}

impl<'a> Pipeline<'a> {
    pub fn new(client: &'a dyn LlmClient, config: &'a Config, root: &Path) -> Self {
        Self {
            client,
            config,
            paths: config.paths.rooted_at(root),
            publisher: None,
            function_delay: Duration::from_millis(config.generation.function_delay_ms),
        }
    }

    /// Publish every package right after it is assembled.
    pub fn with_publisher(mut self, publisher: Publisher<'a>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_function_delay(mut self, delay: Duration) -> Self {
        self.function_delay = delay;
        self
    }

    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.paths.staging_dir.join(name)
    }

    /// Scaffold, generate and assemble one package. Returns its manifest.
    pub async fn build_package(&self, schema: &PackageSchema, prefix: &str) -> Result<Manifest> {
        let dir = self.package_dir(&schema.name);
        if dir.exists() {
            bail!("{} already exists in the staging directory", schema.name);
        }
        scaffold_package(&dir, schema, prefix, self.config)
            .with_context(|| format!("Failed to scaffold {}", schema.name))?;

        let synthesizer = Synthesizer::new(self.client);
        let meta = schema.meta();
        let mut manifest = Manifest::new(&schema.name);
        for (i, descriptor) in schema.functions.iter().enumerate() {
            if i > 0 && !self.function_delay.is_zero() {
                tokio::time::sleep(self.function_delay).await;
            }
            if let Some(name) = synthesizer.synthesize(descriptor, &meta, &dir).await? {
                manifest.push(name);
            }
        }

        write_readme(&dir, schema, &manifest.functions, self.config)?;
        finalize(&dir, &manifest)?;
        Ok(manifest)
    }

    /// Run every idea in order. Completion and publish failures end the run;
    /// a package that fails to build is counted and skipped.
    pub async fn run_ideas(&self, ideas: &[Idea]) -> Result<RunSummary> {
        let generator = PackageGenerator::new(self.client, &self.paths.schemas_dir);
        let mut summary = RunSummary::default();

        for idea in ideas {
            let packages = generator.propose(idea).await?;
            summary.proposed += packages.len();

            for schema in &packages {
                let manifest = match self.build_package(schema, &idea.name_prefix).await {
                    Ok(manifest) => manifest,
                    Err(e) if e.downcast_ref::<LlmError>().is_some() => return Err(e),
                    Err(e) => {
                        error!("Failed to build {}: {:#}", schema.name, e);
                        summary.failed += 1;
                        continue;
                    }
                };
                summary.assembled += 1;

                if manifest.is_empty() {
                    warn!("{} has no functions, not publishing", schema.name);
                    continue;
                }
                let Some(publisher) = &self.publisher else {
                    continue;
                };
                publisher
                    .publish_fresh(&schema.name)
                    .with_context(|| format!("Publishing stopped at {}", schema.name))?;
                summary.published += 1;
            }
        }

        info!(
            "Run complete: {} proposed, {} assembled, {} published, {} failed",
            summary.proposed, summary.assembled, summary.published, summary.failed
        );
        Ok(summary)
    }
}
