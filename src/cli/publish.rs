use anyhow::Result;
use std::env;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::publish::{PublishSettings, Publisher, StateStore, SystemCommandRunner};

/// Publish (or resume publishing) staged packages. With no names, every
/// package in the staging directory plus any half-published one is taken.
pub fn run(packages: Vec<String>, config_path: Option<String>) -> Result<()> {
    let mut config = Config::load_with_path(config_path)?;
    config.apply_env_overrides()?;
    config.check_publish_identity()?;

    let root = env::current_dir()?;
    let settings = PublishSettings::from_config(&config, &root)?;
    let store = StateStore::new(config.paths.rooted_at(&root).state_dir);
    let runner = SystemCommandRunner::new(Duration::from_secs(config.publish.command_timeout_secs));
    let publisher = Publisher::new(settings, &runner, store);

    let packages = if packages.is_empty() {
        publisher.candidates()?
    } else {
        packages
    };
    if packages.is_empty() {
        info!("Nothing to publish");
        return Ok(());
    }
    info!("Publishing {} package(s): {}", packages.len(), packages.join(", "));

    let published = publisher.publish_all(&packages)?;
    info!("✓ Published {} package(s)", published.len());
    Ok(())
}
