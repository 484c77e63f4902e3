//! Chat-completion adapter (Azure OpenAI style deployments).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::domain::{
    CategorizationRequest, CategorizationResult, OracleError, OracleResult, PipelineError,
};
use crate::oracle::{prompts, wire, CategorizationOracle, KeywordExtractor, KeywordsAndTopic};

/// Connection settings for a chat-completion deployment.
#[derive(Clone)]
pub struct ChatOracleConfig {
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    pub api_key: String,
}

impl std::fmt::Debug for ChatOracleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatOracleConfig")
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("api_key", &"***")
            .finish()
    }
}

impl ChatOracleConfig {
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            api_version: api_version.into(),
            api_key: api_key.into(),
        }
    }

    /// Read `AZURE_OPENAI_ENDPOINT`, `AZURE_OPENAI_DEPLOYMENT_NAME`,
    /// `AZURE_OPENAI_API_VERSION` and `AZURE_OPENAI_API_KEY`.
    pub fn from_env() -> crate::Result<Self> {
        Ok(Self::new(
            required_env("AZURE_OPENAI_ENDPOINT")?,
            required_env("AZURE_OPENAI_DEPLOYMENT_NAME")?,
            required_env("AZURE_OPENAI_API_VERSION")?,
            required_env("AZURE_OPENAI_API_KEY")?,
        ))
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint.trim_end_matches('/'),
            self.deployment
        )
    }
}

fn required_env(name: &str) -> crate::Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(PipelineError::Configuration(format!("{name} is not set"))),
    }
}

#[derive(Deserialize)]
struct ChatEnvelope {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// [`CategorizationOracle`] and [`KeywordExtractor`] over a chat-completion
/// endpoint. Requests run at temperature 0; no retries.
#[derive(Debug, Clone)]
pub struct ChatOracle {
    client: reqwest::Client,
    config: ChatOracleConfig,
}

impl ChatOracle {
    pub fn new(config: ChatOracleConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: ChatOracleConfig) -> Self {
        Self { client, config }
    }

    /// Send one system + user exchange and return the assistant's content.
    async fn complete(&self, system: &str, user: &str) -> OracleResult<String> {
        let body = json!({
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": 0,
        });

        let response = self
            .client
            .post(self.config.completions_url())
            .query(&[("api-version", self.config.api_version.as_str())])
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(OracleError::transport(format!(
                "service answered {status}: {detail}"
            )));
        }

        let text = response.text().await?;
        let envelope: ChatEnvelope = serde_json::from_str(&text)
            .map_err(|e| OracleError::parse(format!("invalid chat completion envelope: {e}")))?;

        envelope
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| OracleError::parse("reply has no choices[0].message.content"))
    }
}

#[async_trait]
impl CategorizationOracle for ChatOracle {
    async fn categorize(
        &self,
        request: &CategorizationRequest,
    ) -> OracleResult<CategorizationResult> {
        let payload = wire::encode_request(request)?;
        let content = self
            .complete(prompts::CATEGORIZE_SYSTEM_PROMPT, &payload)
            .await?;
        wire::parse_categories(&content)
    }
}

#[async_trait]
impl KeywordExtractor for ChatOracle {
    async fn extract(&self, title: &str, body: &str) -> OracleResult<Option<KeywordsAndTopic>> {
        let content = self
            .complete(
                prompts::EXTRACT_SYSTEM_PROMPT,
                &prompts::extract_payload(title, body),
            )
            .await?;
        wire::parse_keywords(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url_trims_trailing_slash() {
        let config = ChatOracleConfig::new("https://example.test/", "gpt", "2024-02-01", "k");
        assert_eq!(
            config.completions_url(),
            "https://example.test/openai/deployments/gpt/chat/completions"
        );
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = ChatOracleConfig::new("https://example.test", "gpt", "v", "secret-key");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("***"));
    }
}
