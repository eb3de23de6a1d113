use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::llm::factory;
use crate::pipeline::runner::Pipeline;
use crate::publish::{PublishSettings, Publisher, StateStore, SystemCommandRunner};
use crate::schema::{Idea, IdeasFile};

/// Ideas from a TOML (`[[ideas]]`) or JSON (`{"ideas": [...]}`) file.
pub fn load_ideas(path: &Path) -> Result<Vec<Idea>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read ideas file {}", path.display()))?;
    let file: IdeasFile = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&text)
            .with_context(|| format!("Invalid ideas file {}", path.display()))?,
        _ => toml::from_str(&text)
            .with_context(|| format!("Invalid ideas file {}", path.display()))?,
    };
    Ok(file.ideas)
}

/// One idea from the flags, or a whole file of them.
pub fn collect_ideas(
    prompt: Option<String>,
    functions: usize,
    prefix: Option<String>,
    ideas_file: Option<String>,
) -> Result<Vec<Idea>> {
    let ideas = match (prompt, ideas_file) {
        (Some(_), Some(_)) => bail!("Use either --prompt or --ideas, not both"),
        (Some(prompt), None) => vec![Idea::new(
            &prompt,
            functions,
            prefix.as_deref().unwrap_or_default(),
        )],
        (None, Some(file)) => load_ideas(Path::new(&file))?,
        (None, None) => bail!("Nothing to generate: pass --prompt or --ideas"),
    };
    if ideas.is_empty() {
        bail!("The ideas file holds no ideas");
    }
    if let Some(idea) = ideas.iter().find(|i| i.number_of_functions == 0) {
        bail!("Idea {:?} asks for zero functions", idea.prompt);
    }
    Ok(ideas)
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    prompt: Option<String>,
    functions: usize,
    prefix: Option<String>,
    ideas_file: Option<String>,
    config_path: Option<String>,
    model_override: Option<String>,
    no_publish: bool,
    dry_run: bool,
) -> Result<()> {
    let ideas = collect_ideas(prompt, functions, prefix, ideas_file)?;
    info!("Ideas: {}", ideas.len());
    if let Some(ref cfg) = config_path {
        info!("Config: {}", cfg);
    }
    info!("Dry run: {}", dry_run);

    let mut config = Config::load_with_path(config_path)?;
    config.apply_env_overrides()?;

    if let Some(ref model) = model_override {
        info!("CLI override: model = {}", model);
        config.llm.model = model.clone();
    }

    // The mock client never gets real tests to pass; keep dry runs local.
    let publish = !no_publish && !dry_run;
    if dry_run && !no_publish {
        info!("Dry run: publishing disabled");
    }
    if publish {
        config.check_publish_identity()?;
    }

    let client = factory::create_client(&config, dry_run)?;
    if dry_run {
        info!("Using mock LLM client");
    } else {
        info!(
            "Using {} LLM provider (model: {})",
            config.llm.provider, config.llm.model
        );
    }

    let root = env::current_dir()?;
    let runner = SystemCommandRunner::new(Duration::from_secs(config.publish.command_timeout_secs));
    let mut pipeline = Pipeline::new(client.as_ref(), &config, &root);
    if dry_run {
        pipeline = pipeline.with_function_delay(Duration::ZERO);
    }
    if publish {
        let settings = PublishSettings::from_config(&config, &root)?;
        let store = StateStore::new(config.paths.rooted_at(&root).state_dir);
        pipeline = pipeline.with_publisher(Publisher::new(settings, &runner, store));
    }

    let summary = pipeline.run_ideas(&ideas).await?;
    info!(
        "✓ {} package(s) assembled, {} published",
        summary.assembled, summary.published
    );
    if summary.failed > 0 {
        bail!("{} package(s) failed", summary.failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_single_idea() {
        let ideas =
            collect_ideas(Some("string utilities".into()), 2, Some("demo".into()), None).unwrap();
        assert_eq!(ideas, vec![Idea::new("string utilities", 2, "demo")]);
    }

    #[test]
    fn test_collect_requires_a_source() {
        assert!(collect_ideas(None, 2, None, None).is_err());
        assert!(collect_ideas(Some("x".into()), 2, None, Some("ideas.toml".into())).is_err());
        assert!(collect_ideas(Some("x".into()), 0, None, None).is_err());
    }

    #[test]
    fn test_load_ideas_toml_and_json() {
        let dir = TempDir::new().unwrap();
        let toml_path = dir.path().join("ideas.toml");
        fs::write(
            &toml_path,
            r#"
[[ideas]]
prompt = "string utilities"
number_of_functions = 2
name_prefix = "demo"

[[ideas]]
prompt = "date helpers"
number_of_functions = 3
name_prefix = "demo"
"#,
        )
        .unwrap();
        let ideas = load_ideas(&toml_path).unwrap();
        assert_eq!(ideas.len(), 2);
        assert_eq!(ideas[1].number_of_functions, 3);

        let json_path = dir.path().join("ideas.json");
        fs::write(
            &json_path,
            r#"{"ideas":[{"prompt":"p","number_of_functions":1,"name_prefix":"x"}]}"#,
        )
        .unwrap();
        assert_eq!(load_ideas(&json_path).unwrap()[0].prompt, "p");
    }

    #[test]
    fn test_empty_ideas_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ideas.toml");
        fs::write(&path, "").unwrap();
        let result = collect_ideas(None, 1, None, Some(path.to_string_lossy().to_string()));
        assert!(result.is_err());
    }
}
