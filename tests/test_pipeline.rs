// End-to-end runs of the generation pipeline against the mock client
use anyhow::Result;
use herogen::config::Config;
use herogen::llm::client::{LlmClient, MockLlmClient};
use herogen::llm::prompts::IDEA_PROMPT_MARKER;
use herogen::pipeline::assembler::MANIFEST_FILE;
use herogen::pipeline::runner::Pipeline;
use herogen::publish::{
    CommandOutput, CommandRunner, CommandSpec, PublishSettings, Publisher, StateStore,
};
use herogen::schema::Idea;
use std::fs;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

struct FailingTests {
    commands: Mutex<Vec<String>>,
}

impl CommandRunner for FailingTests {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.commands.lock().unwrap().push(spec.to_string());
        Ok(CommandOutput::failed(1, "2 tests failed"))
    }
}

fn publish_config() -> Config {
    let mut config = Config::default();
    config.github.username = "ada".to_string();
    config.github.owner_id = "OWNER".to_string();
    config.generation.function_delay_ms = 0;
    config
}

#[tokio::test]
async fn test_string_utilities_package_layout() {
    let dir = TempDir::new().unwrap();
    let client = MockLlmClient::new();
    let config = publish_config();
    let runner = FailingTests {
        commands: Mutex::new(Vec::new()),
    };
    let publisher = Publisher::new(
        PublishSettings::from_config(&config, dir.path()).unwrap(),
        &runner,
        StateStore::new(dir.path().join("state")),
    );
    let pipeline = Pipeline::new(&client, &config, dir.path()).with_publisher(publisher);

    // failing tests stop the run with the package left staged
    let err = pipeline
        .run_ideas(&[Idea::new("string utilities", 2, "demo")])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("demo-string-utils"));

    let pkg = dir.path().join("hero_modules/demo-string-utils");
    let count_js = |sub: &str| {
        fs::read_dir(pkg.join(sub))
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().unwrap() == "js")
            .count()
    };
    assert_eq!(count_js("functions"), 2);
    assert_eq!(count_js("tests"), 2);

    let index = fs::read_to_string(pkg.join("index.js")).unwrap();
    assert_eq!(index.matches("module.exports.").count(), 2);

    let tests = fs::read_to_string(pkg.join("tests.js")).unwrap();
    assert_eq!(tests.matches(".runTests();").count(), 2);

    let package_json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(pkg.join("package.json")).unwrap()).unwrap();
    assert_eq!(package_json["scripts"]["test"], "node tests.js");
    assert!(pkg.join(MANIFEST_FILE).is_file());

    // failing tests stop the chain before any repository is created
    let commands = runner.commands.lock().unwrap();
    assert_eq!(*commands, vec!["npm run test".to_string()]);
    assert!(!dir.path().join("published_hero_modules").exists());
}

/// Records the idea prompts it sees and answers everything from the mock.
struct IdeaLog {
    inner: MockLlmClient,
    ideas: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl LlmClient for IdeaLog {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if prompt.contains(IDEA_PROMPT_MARKER) {
            self.ideas.lock().unwrap().push(prompt.to_string());
        }
        self.inner.complete(prompt).await
    }
}

#[tokio::test]
async fn test_ideas_run_in_order() {
    let dir = TempDir::new().unwrap();
    let client = IdeaLog {
        inner: MockLlmClient::new(),
        ideas: Mutex::new(Vec::new()),
    };
    let config = Config::default();
    let pipeline =
        Pipeline::new(&client, &config, dir.path()).with_function_delay(Duration::ZERO);

    // the mock proposes the same package for every idea, so the later ones
    // collide with the first in the staging directory
    let summary = pipeline
        .run_ideas(&[
            Idea::new("string utilities", 2, "demo"),
            Idea::new("date helpers", 2, "demo"),
            Idea::new("array tools", 2, "demo"),
        ])
        .await
        .unwrap();
    assert_eq!(summary.proposed, 3);
    assert_eq!(summary.assembled, 1);
    assert_eq!(summary.failed, 2);

    let ideas = client.ideas.lock().unwrap();
    assert_eq!(ideas.len(), 3);
    assert!(ideas[0].contains("string utilities"));
    assert!(ideas[1].contains("date helpers"));
    assert!(ideas[2].contains("array tools"));
}
