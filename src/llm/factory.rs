use anyhow::{bail, Result};

use super::client::{LlmClient, MockLlmClient};
use super::client_impl::OpenAIClient;
use super::retry::RetryingClient;
use crate::config::Config;

/// Build the raw completion client named by the config, without retries.
fn create_base_client(config: &Config) -> Result<Box<dyn LlmClient>> {
    let api_key = config.get_api_key()?;
    let llm = &config.llm;
    let max_tokens = llm.get_max_tokens();

    match llm.provider.as_str() {
        "openai" => {
            let client = match llm.base_url {
                Some(ref base_url) => OpenAIClient::with_base_url(
                    api_key,
                    llm.model.clone(),
                    base_url.clone(),
                    max_tokens,
                    llm.timeout_secs,
                )?,
                None => OpenAIClient::new(api_key, llm.model.clone(), max_tokens, llm.timeout_secs)?,
            };
            Ok(Box::new(client))
        }

        "openai-compatible" => {
            let base_url = llm
                .base_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434/v1".to_string());

            Ok(Box::new(OpenAIClient::with_base_url(
                api_key,
                llm.model.clone(),
                base_url,
                max_tokens,
                llm.timeout_secs,
            )?))
        }

        unknown => bail!("Unknown LLM provider: {}", unknown),
    }
}

/// Create the completion client used by the pipeline, wrapped in the
/// configured retry policy.
pub fn create_client(config: &Config, dry_run: bool) -> Result<Box<dyn LlmClient>> {
    if dry_run {
        return Ok(Box::new(MockLlmClient::new()));
    }

    let base = create_base_client(config)?;
    Ok(Box::new(RetryingClient::new(base, config.retry.to_policy()?)))
}
