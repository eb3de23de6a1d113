use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::llm::client::LlmClient;
use crate::llm::prompts::{self, TEST_ENTRY_POINT};
use crate::schema::{FunctionDescriptor, PackageMeta};
use crate::writer::{contains_code_fence, write_content};

pub const FUNCTIONS_DIR: &str = "functions";
pub const TESTS_DIR: &str = "tests";

pub fn function_path(package_dir: &Path, name: &str) -> PathBuf {
    package_dir.join(FUNCTIONS_DIR).join(format!("{}.js", name))
}

pub fn test_path(package_dir: &Path, name: &str) -> PathBuf {
    package_dir.join(TESTS_DIR).join(format!("{}.js", name))
}

/// Helpers every generated test relies on: the function under test, badge
/// rendering, and appending the badge to the package README. A failing
/// case also flips the process exit code so `npm test` reports it.
pub fn test_preamble(name: &str) -> String {
    format!(
        r#"const {{ {name} }} = require("../{functions}/{name}.js");
const fs = require("fs");
const path = require("path");

function generateBadgeUrl(label, message, color) {{
    const escape = (text) => encodeURIComponent(String(text).replace(/-/g, "--").replace(/_/g, "__"));
    return `https://img.shields.io/badge/${{escape(label)}}-${{escape(message)}}-${{color}}`;
}}

function generateTestBadge(name_of_function, number_of_tests_passed, number_of_tests_failed) {{
    const total = number_of_tests_passed + number_of_tests_failed;
    const color = number_of_tests_failed === 0 ? "brightgreen" : "red";
    if (number_of_tests_failed > 0) {{
        process.exitCode = 1;
    }}
    const url = generateBadgeUrl(name_of_function, `${{number_of_tests_passed}}/${{total}} passed`, color);
    return `![${{name_of_function}} tests](${{url}})`;
}}

function addToReadme(markdown) {{
    fs.appendFileSync(path.join(__dirname, "..", "README.md"), `${{markdown}}\n\n`);
}}
"#,
        name = name,
        functions = FUNCTIONS_DIR,
    )
}

/// Registration under the well-known key that `tests.js` calls.
pub fn test_footer() -> String {
    format!("module.exports = {{ {entry} }};", entry = TEST_ENTRY_POINT)
}

pub fn render_test_file(name: &str, body: &str) -> String {
    format!("{}\n{}\n\n{}\n", test_preamble(name), body.trim(), test_footer())
}

/// Generates one function and its test into a package directory.
pub struct Synthesizer<'a> {
    client: &'a dyn LlmClient,
}

impl<'a> Synthesizer<'a> {
    pub fn new(client: &'a dyn LlmClient) -> Self {
        Self { client }
    }

    /// Returns the function name when the function file was written. A
    /// fenced (format-violating) function answer skips the pair entirely; a
    /// fenced test answer skips only the test.
    pub async fn synthesize(
        &self,
        descriptor: &FunctionDescriptor,
        meta: &PackageMeta,
        package_dir: &Path,
    ) -> Result<Option<String>> {
        let name = &descriptor.function_name;
        info!("Building function {}: {}", name, descriptor.function_summary);

        let code = self
            .client
            .complete(&prompts::function_prompt(descriptor, meta))
            .await?;

        if contains_code_fence(&code) {
            warn!("Skipping {}: generated code still contains a code fence", name);
            return Ok(None);
        }

        info!("Writing function {}()", name);
        write_content(&function_path(package_dir, name), &code, false)?;

        info!("Generating test for {}()", name);
        let test_body = self
            .client
            .complete(&prompts::test_prompt(descriptor, &code))
            .await?;

        if contains_code_fence(&test_body) {
            warn!("Skipping test for {}: generated test contains a code fence", name);
        } else {
            write_content(
                &test_path(package_dir, name),
                &render_test_file(name, &test_body),
                false,
            )?;
        }

        Ok(Some(name.clone()))
    }
}
