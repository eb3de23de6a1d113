use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Steps of publishing one package, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    TestRun,
    RepoCreate,
    GitPush,
    Move,
    Publish,
    Done,
}

impl PublishState {
    pub fn next(self) -> Self {
        match self {
            PublishState::TestRun => PublishState::RepoCreate,
            PublishState::RepoCreate => PublishState::GitPush,
            PublishState::GitPush => PublishState::Move,
            PublishState::Move => PublishState::Publish,
            PublishState::Publish | PublishState::Done => PublishState::Done,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PublishState::TestRun => "test_run",
            PublishState::RepoCreate => "repo_create",
            PublishState::GitPush => "git_push",
            PublishState::Move => "move",
            PublishState::Publish => "publish",
            PublishState::Done => "done",
        }
    }

    /// The package lives in the published location from here on.
    pub fn is_after_move(self) -> bool {
        matches!(self, PublishState::Publish | PublishState::Done)
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of one package, persisted after every completed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRecord {
    pub package: String,
    pub staging_dir: PathBuf,
    pub published_dir: PathBuf,
    pub completed: Vec<PublishState>,
    pub next: PublishState,
}

impl PublishRecord {
    pub fn new(package: &str, staging_root: &Path, published_root: &Path) -> Self {
        Self {
            package: package.to_string(),
            staging_dir: staging_root.join(package),
            published_dir: published_root.join(package),
            completed: Vec::new(),
            next: PublishState::TestRun,
        }
    }

    pub fn advance(&mut self) {
        self.completed.push(self.next);
        self.next = self.next.next();
    }

    pub fn is_done(&self) -> bool {
        self.next == PublishState::Done
    }

    /// Where the package currently lives.
    pub fn current_dir(&self) -> &Path {
        if self.next.is_after_move() {
            &self.published_dir
        } else {
            &self.staging_dir
        }
    }
}

/// One JSON file per package under the state directory.
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, package: &str) -> PathBuf {
        self.dir.join(format!("{}.json", package))
    }

    pub fn load(&self, package: &str) -> Result<Option<PublishRecord>> {
        let path = self.path_for(package);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        let record = serde_json::from_str(&text)
            .with_context(|| format!("Corrupt publish state {}", path.display()))?;
        Ok(Some(record))
    }

    /// Write atomically so a crash never leaves a half-written record.
    pub fn save(&self, record: &PublishRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(serde_json::to_string_pretty(record)?.as_bytes())?;
        tmp.persist(self.path_for(&record.package))
            .map_err(|e| e.error)
            .context("Failed to persist publish state")?;
        Ok(())
    }

    pub fn remove(&self, package: &str) -> Result<()> {
        let path = self.path_for(package);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Packages with a stored, unfinished record.
    pub fn pending(&self) -> Result<Vec<String>> {
        let mut packages = Vec::new();
        if !self.dir.is_dir() {
            return Ok(packages);
        }
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                packages.push(stem.to_string());
            }
        }
        packages.sort();
        Ok(packages)
    }
}
