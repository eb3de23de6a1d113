// Publisher: runs the tests, creates the GitHub repository, pushes, moves the
// package to the published location and optionally uploads it to npm.
//
// Each package walks a fixed state machine whose progress is persisted, so a
// run that died halfway resumes at the first unfinished step.

pub mod command;
pub mod state;

pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemCommandRunner};
pub use state::{PublishRecord, PublishState, StateStore};

use anyhow::Result;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Config;

const CREATE_REPOSITORY_MUTATION: &str = "mutation($name: String!, $ownerId: ID!, $visibility: RepositoryVisibility!) { createRepository(input: {name: $name, ownerId: $ownerId, visibility: $visibility}) { repository { url } } }";

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("{package}: step {state} failed: `{command}` exited with {code:?}: {stderr}")]
    Command {
        package: String,
        state: PublishState,
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{package}: step {state} failed: {source:#}")]
    Step {
        package: String,
        state: PublishState,
        #[source]
        source: anyhow::Error,
    },
    #[error("{package}: {reason}")]
    NotReady { package: String, reason: String },
}

impl PublishError {
    pub fn state(&self) -> Option<PublishState> {
        match self {
            PublishError::Command { state, .. } | PublishError::Step { state, .. } => Some(*state),
            PublishError::NotReady { .. } => None,
        }
    }
}

/// Everything the publisher reads from the config
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub staging_root: PathBuf,
    pub published_root: PathBuf,
    pub github_username: String,
    pub github_owner_id: String,
    pub visibility: String,
    pub publish_to_npm: bool,
}

impl PublishSettings {
    pub fn from_config(config: &Config, root: &Path) -> Result<Self> {
        let paths = config.paths.rooted_at(root);
        Ok(Self {
            staging_root: paths.staging_dir,
            published_root: paths.published_dir,
            github_username: config.github.username.clone(),
            github_owner_id: config.github.owner_id.clone(),
            visibility: config.github.normalized_visibility()?,
            publish_to_npm: config.publish.npm,
        })
    }

    pub fn remote_url(&self, package: &str) -> String {
        format!("https://github.com/{}/{}.git", self.github_username, package)
    }
}

pub struct Publisher<'a> {
    settings: PublishSettings,
    runner: &'a dyn CommandRunner,
    store: StateStore,
}

impl<'a> Publisher<'a> {
    pub fn new(settings: PublishSettings, runner: &'a dyn CommandRunner, store: StateStore) -> Self {
        Self {
            settings,
            runner,
            store,
        }
    }

    /// Commands of one command-backed step.
    pub fn commands_for(&self, state: PublishState, record: &PublishRecord) -> Vec<CommandSpec> {
        let dir = record.current_dir();
        match state {
            PublishState::TestRun => vec![CommandSpec::new("npm", &["run", "test"], dir)],
            PublishState::RepoCreate => {
                let query = format!("query={}", CREATE_REPOSITORY_MUTATION);
                let name = format!("name={}", record.package);
                let owner = format!("ownerId={}", self.settings.github_owner_id);
                let visibility = format!("visibility={}", self.settings.visibility);
                vec![CommandSpec::new(
                    "gh",
                    &[
                        "api",
                        "graphql",
                        "-f",
                        query.as_str(),
                        "-f",
                        name.as_str(),
                        "-f",
                        owner.as_str(),
                        "-f",
                        visibility.as_str(),
                    ],
                    dir,
                )]
            }
            PublishState::GitPush => {
                let remote = self.settings.remote_url(&record.package);
                vec![
                    CommandSpec::new("git", &["init"], dir),
                    CommandSpec::new("git", &["add", "."], dir),
                    CommandSpec::new("git", &["commit", "--allow-empty", "-m", "first commit"], dir),
                    CommandSpec::new("git", &["branch", "-M", "main"], dir),
                    // a resumed run may already have the remote
                    CommandSpec::new("git", &["remote", "remove", "origin"], dir).allowing_failure(),
                    CommandSpec::new("git", &["remote", "add", "origin", remote.as_str()], dir),
                    CommandSpec::new("git", &["push", "-u", "origin", "main"], dir),
                ]
            }
            PublishState::Publish if self.settings.publish_to_npm => {
                vec![CommandSpec::new("npm", &["publish", "--access", "public"], dir)]
            }
            PublishState::Move | PublishState::Publish | PublishState::Done => Vec::new(),
        }
    }

    fn run_commands(&self, state: PublishState, record: &PublishRecord) -> Result<(), PublishError> {
        for spec in self.commands_for(state, record) {
            info!("[{}] {}", record.package, spec);
            let output = self.runner.run(&spec).map_err(|source| PublishError::Step {
                package: record.package.clone(),
                state,
                source,
            })?;
            if output.success {
                continue;
            }
            if spec.allow_failure {
                warn!("[{}] `{}` failed, continuing", record.package, spec);
                continue;
            }
            return Err(PublishError::Command {
                package: record.package.clone(),
                state,
                command: spec.to_string(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    fn move_package(&self, record: &PublishRecord) -> Result<(), PublishError> {
        let step = |source: anyhow::Error| PublishError::Step {
            package: record.package.clone(),
            state: PublishState::Move,
            source,
        };
        if record.published_dir.exists() {
            return Err(step(anyhow::anyhow!(
                "{} already exists",
                record.published_dir.display()
            )));
        }
        if let Some(parent) = record.published_dir.parent() {
            fs::create_dir_all(parent).map_err(|e| step(e.into()))?;
        }
        fs::rename(&record.staging_dir, &record.published_dir).map_err(|e| step(e.into()))?;
        info!(
            "[{}] moved to {}",
            record.package,
            record.published_dir.display()
        );
        Ok(())
    }

    fn run_state(&self, record: &PublishRecord) -> Result<(), PublishError> {
        match record.next {
            PublishState::Move => self.move_package(record),
            PublishState::Publish if !self.settings.publish_to_npm => {
                info!("[{}] npm publish disabled, skipping", record.package);
                Ok(())
            }
            state => self.run_commands(state, record),
        }
    }

    fn persist(&self, record: &PublishRecord) -> Result<(), PublishError> {
        self.store.save(record).map_err(|source| PublishError::Step {
            package: record.package.clone(),
            state: record.next,
            source,
        })
    }

    /// Drive one package to `Done`, resuming from stored progress. On the
    /// first failing step the rest of the chain is abandoned and nothing
    /// already done is undone.
    pub fn publish_package(&self, package: &str) -> Result<PublishRecord, PublishError> {
        let stored = self.store.load(package).map_err(|source| PublishError::Step {
            package: package.to_string(),
            state: PublishState::TestRun,
            source,
        })?;
        let mut record = match stored {
            Some(record) => {
                info!("[{}] resuming at {}", package, record.next);
                record
            }
            None => PublishRecord::new(
                package,
                &self.settings.staging_root,
                &self.settings.published_root,
            ),
        };

        if !record.current_dir().is_dir() {
            return Err(PublishError::NotReady {
                package: package.to_string(),
                reason: format!("{} does not exist", record.current_dir().display()),
            });
        }

        while !record.is_done() {
            if let Err(e) = self.run_state(&record) {
                error!("{}", e);
                return Err(e);
            }
            record.advance();
            self.persist(&record)?;
        }

        if let Err(e) = self.store.remove(package) {
            warn!("[{}] could not clear publish state: {:#}", package, e);
        }
        info!("[{}] published", package);
        Ok(record)
    }

    /// Publish a package that was just generated. Progress stored by an
    /// earlier run belongs to different code, so the chain restarts from the
    /// test run.
    pub fn publish_fresh(&self, package: &str) -> Result<PublishRecord, PublishError> {
        let stale = |source: anyhow::Error| PublishError::Step {
            package: package.to_string(),
            state: PublishState::TestRun,
            source,
        };
        if let Some(record) = self.store.load(package).map_err(stale)? {
            warn!(
                "[{}] discarding publish state from an earlier run (was at {})",
                package, record.next
            );
            self.store.remove(package).map_err(stale)?;
        }
        self.publish_package(package)
    }

    /// Packages waiting in the staging directory plus any with unfinished
    /// stored progress, in name order.
    pub fn candidates(&self) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        if self.settings.staging_root.is_dir() {
            for entry in fs::read_dir(&self.settings.staging_root)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    if let Some(name) = entry.file_name().to_str() {
                        names.insert(name.to_string());
                    }
                }
            }
        }
        names.extend(self.store.pending()?);
        Ok(names.into_iter().collect())
    }

    /// Publish packages one at a time. The first failure stops the batch.
    pub fn publish_all(&self, packages: &[String]) -> Result<Vec<String>, PublishError> {
        let mut published = Vec::new();
        for package in packages {
            self.publish_package(package)?;
            published.push(package.clone());
        }
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every command; fails the first one whose rendering contains
    /// `fail_on`.
    #[derive(Default)]
    struct FakeRunner {
        log: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl FakeRunner {
        fn failing_on(pattern: &str) -> Self {
            Self {
                log: Mutex::new(Vec::new()),
                fail_on: Some(pattern.to_string()),
            }
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            let rendered = spec.to_string();
            self.log.lock().unwrap().push(rendered.clone());
            match &self.fail_on {
                Some(p) if rendered.contains(p.as_str()) => Ok(CommandOutput::failed(1, "boom")),
                _ => Ok(CommandOutput::ok("")),
            }
        }
    }

    struct Fixture {
        _dir: TempDir,
        settings: PublishSettings,
        state_dir: PathBuf,
    }

    fn fixture(packages: &[&str], npm: bool) -> Fixture {
        let dir = TempDir::new().unwrap();
        let staging_root = dir.path().join("hero_modules");
        for p in packages {
            fs::create_dir_all(staging_root.join(p)).unwrap();
        }
        Fixture {
            settings: PublishSettings {
                staging_root,
                published_root: dir.path().join("published_hero_modules"),
                github_username: "ada".to_string(),
                github_owner_id: "OWNER".to_string(),
                visibility: "PUBLIC".to_string(),
                publish_to_npm: npm,
            },
            state_dir: dir.path().join("state"),
            _dir: dir,
        }
    }

    #[test]
    fn test_full_chain_moves_and_clears_state() {
        let fx = fixture(&["demo-a"], true);
        let runner = FakeRunner::default();
        let publisher = Publisher::new(fx.settings.clone(), &runner, StateStore::new(&fx.state_dir));

        let record = publisher.publish_package("demo-a").unwrap();
        assert_eq!(record.completed.len(), 5);
        assert!(!fx.settings.staging_root.join("demo-a").exists());
        assert!(fx.settings.published_root.join("demo-a").is_dir());
        assert!(StateStore::new(&fx.state_dir).load("demo-a").unwrap().is_none());

        let log = runner.log();
        assert_eq!(log[0], "npm run test");
        assert!(log[1].starts_with("gh api graphql -f"));
        assert!(log[1].contains("name=demo-a"));
        assert!(log[1].contains("visibility=PUBLIC"));
        assert!(log.contains(&"git remote add origin https://github.com/ada/demo-a.git".to_string()));
        assert_eq!(log.last().unwrap(), "npm publish --access public");
    }

    #[test]
    fn test_npm_publish_skipped_when_disabled() {
        let fx = fixture(&["demo-a"], false);
        let runner = FakeRunner::default();
        let publisher = Publisher::new(fx.settings.clone(), &runner, StateStore::new(&fx.state_dir));
        publisher.publish_package("demo-a").unwrap();
        assert!(!runner.log().iter().any(|c| c.starts_with("npm publish")));
    }

    #[test]
    fn test_failed_tests_stop_chain() {
        let fx = fixture(&["demo-a"], true);
        let runner = FakeRunner::failing_on("npm run test");
        let publisher = Publisher::new(fx.settings.clone(), &runner, StateStore::new(&fx.state_dir));

        let err = publisher.publish_package("demo-a").unwrap_err();
        assert_eq!(err.state(), Some(PublishState::TestRun));
        assert_eq!(runner.log(), vec!["npm run test".to_string()]);
        assert!(fx.settings.staging_root.join("demo-a").is_dir());
    }

    #[test]
    fn test_allowed_failure_does_not_stop_push() {
        let fx = fixture(&["demo-a"], false);
        let runner = FakeRunner::failing_on("remote remove");
        let publisher = Publisher::new(fx.settings.clone(), &runner, StateStore::new(&fx.state_dir));
        assert!(publisher.publish_package("demo-a").is_ok());
    }

    #[test]
    fn test_resume_after_push_failure() {
        let fx = fixture(&["demo-a"], false);
        let store_dir = fx.state_dir.clone();

        let failing = FakeRunner::failing_on("git push");
        let publisher = Publisher::new(fx.settings.clone(), &failing, StateStore::new(&store_dir));
        let err = publisher.publish_package("demo-a").unwrap_err();
        assert_eq!(err.state(), Some(PublishState::GitPush));

        let stored = StateStore::new(&store_dir).load("demo-a").unwrap().unwrap();
        assert_eq!(stored.next, PublishState::GitPush);
        assert_eq!(
            stored.completed,
            vec![PublishState::TestRun, PublishState::RepoCreate]
        );

        let runner = FakeRunner::default();
        let publisher = Publisher::new(fx.settings.clone(), &runner, StateStore::new(&store_dir));
        publisher.publish_package("demo-a").unwrap();
        let log = runner.log();
        // tests and repo creation are not repeated
        assert_eq!(log[0], "git init");
        assert!(!log.iter().any(|c| c.starts_with("gh ")));
        assert!(fx.settings.published_root.join("demo-a").is_dir());
    }

    #[test]
    fn test_publish_fresh_ignores_stale_state() {
        let fx = fixture(&["demo-a"], false);
        let store = StateStore::new(&fx.state_dir);
        let mut stale = PublishRecord::new(
            "demo-a",
            &fx.settings.staging_root,
            &fx.settings.published_root,
        );
        stale.advance();
        stale.advance();
        store.save(&stale).unwrap();

        let runner = FakeRunner::default();
        let publisher = Publisher::new(fx.settings.clone(), &runner, StateStore::new(&fx.state_dir));
        publisher.publish_fresh("demo-a").unwrap();

        let log = runner.log();
        assert_eq!(log[0], "npm run test");
        assert!(log[1].starts_with("gh api graphql"));
    }

    #[test]
    fn test_publish_all_stops_at_first_failure() {
        let fx = fixture(&["alpha", "beta"], false);
        let runner = FakeRunner::failing_on("name=alpha");
        let publisher = Publisher::new(fx.settings.clone(), &runner, StateStore::new(&fx.state_dir));

        let packages = publisher.candidates().unwrap();
        assert_eq!(packages, vec!["alpha".to_string(), "beta".to_string()]);
        assert!(publisher.publish_all(&packages).is_err());
        // beta never started
        assert!(!runner.log().iter().any(|c| c.contains("beta")));
        assert!(fx.settings.staging_root.join("beta").is_dir());
    }

    #[test]
    fn test_move_refuses_to_overwrite() {
        let fx = fixture(&["demo-a"], false);
        fs::create_dir_all(fx.settings.published_root.join("demo-a")).unwrap();
        let runner = FakeRunner::default();
        let publisher = Publisher::new(fx.settings.clone(), &runner, StateStore::new(&fx.state_dir));
        let err = publisher.publish_package("demo-a").unwrap_err();
        assert_eq!(err.state(), Some(PublishState::Move));
    }

    #[test]
    fn test_missing_package_is_not_ready() {
        let fx = fixture(&[], false);
        let runner = FakeRunner::default();
        let publisher = Publisher::new(fx.settings.clone(), &runner, StateStore::new(&fx.state_dir));
        assert!(matches!(
            publisher.publish_package("ghost"),
            Err(PublishError::NotReady { .. })
        ));
        assert!(runner.log().is_empty());
    }
}
