use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::prompts::{FUNCTION_PROMPT_MARKER, IDEA_PROMPT_MARKER, TEST_PROMPT_MARKER};

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Box<T> {
    async fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt).await
    }
}

static CALLED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"function called "([A-Za-z_$][A-Za-z0-9_$]*)""#).unwrap());

/// Offline client for `--dry-run`: answers each prompt kind with a fixed,
/// well-formed artifact.
pub struct MockLlmClient;

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self
    }

    fn function_name(prompt: &str) -> String {
        CALLED_NAME
            .captures(prompt)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| "mockFunction".to_string())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if prompt.contains(IDEA_PROMPT_MARKER) {
            Ok(r#"[
  {
    "name": "demo-string-utils",
    "description": "Small helpers for everyday string manipulation",
    "functions": [
      {
        "function_name": "capitalizeWords",
        "function_summary": "Capitalizes the first letter of every word in a string"
      },
      {
        "function_name": "reverseString",
        "function_summary": "Returns the characters of a string in reverse order"
      }
    ]
  }
]"#
            .to_string())
        } else if prompt.contains(TEST_PROMPT_MARKER) {
            let name = Self::function_name(prompt);
            Ok(format!(
                r#"function runTests() {{
    const name_of_function = "{name}";
    let number_of_tests_passed = 0;
    let number_of_tests_failed = 0;

    try {{
        if (typeof {name} === "function") {{
            number_of_tests_passed++;
        }} else {{
            number_of_tests_failed++;
        }}
    }} catch (error) {{
        number_of_tests_failed++;
    }}

    addToReadme(generateTestBadge(name_of_function, number_of_tests_passed, number_of_tests_failed));
}}"#
            ))
        } else if prompt.contains(FUNCTION_PROMPT_MARKER) {
            let name = Self::function_name(prompt);
            Ok(format!(
                r#"/**
 * Mock implementation of {name}.
 *
 * @param {{string}} input - The input value.
 * @return {{string}} The input unchanged.
 */
function {name}(input) {{
    return input;
}}

module.exports = {{ {name} }};"#
            ))
        } else {
            Ok(String::new())
        }
    }
}
