use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::client::{AgentClient, AgentError};
use super::models::{AgentOutput, AgentReply, StrategyPayload, UsageRecord};
use crate::core::config::AgentConfig;
use crate::shared::llm::looks_like_json;
use crate::shared::prompts::{render_chat_agent_system_prompt, render_chat_agent_user_prompt};

/// Function the agent calls to hand over a PineScript strategy
pub const STRATEGY_TOOL_NAME: &str = "generate_pinescript";

const STRATEGY_TOOL_DESCRIPTION: &str =
    "Generate a TradingView Pine Script v5 strategy with optional chart visualizations. \
     Call this whenever the user asks for a strategy, indicator or backtest.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    tools: Value,
    tool_choice: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Agent backed by an Azure OpenAI chat-completions deployment
pub struct AzureOpenAiAgent {
    http_client: reqwest::Client,
    config: AgentConfig,
    tools: Value,
}

impl AzureOpenAiAgent {
    pub fn new(config: AgentConfig) -> Result<Self, AgentError> {
        // The service applies its own deadline; this only guards a hung socket
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout * 2)
            .build()
            .map_err(|e| AgentError::Build(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
            tools: strategy_tool_definition(),
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint, self.config.deployment, self.config.api_version
        )
    }
}

#[async_trait]
impl AgentClient for AzureOpenAiAgent {
    async fn invoke(&self, query: &str, context: &str) -> Result<AgentReply, AgentError> {
        let system_prompt = render_chat_agent_system_prompt(STRATEGY_TOOL_NAME, context)?;
        let user_prompt = render_chat_agent_user_prompt(context, query)?;

        let body = ChatCompletionRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: self.config.temperature,
            tools: self.tools.clone(),
            tool_choice: "auto",
        };

        tracing::debug!(
            "Invoking agent deployment {} ({} chars of context)",
            self.config.deployment,
            context.len()
        );

        let response = self
            .http_client
            .post(self.completions_url())
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Agent request failed: {}", e);
                AgentError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Agent API error: HTTP {} - {}", status, body);
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion = response.json::<ChatCompletionResponse>().await?;
        classify(completion)
    }
}

/// Tool declaration for strategy generation, parameters derived from
/// [`StrategyPayload`]
fn strategy_tool_definition() -> Value {
    let settings = schemars::gen::SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
    });
    let schema = settings
        .into_generator()
        .into_root_schema_for::<StrategyPayload>();

    let mut parameters = serde_json::to_value(schema).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut parameters {
        map.remove("$schema");
        map.remove("title");
    }

    json!([{
        "type": "function",
        "function": {
            "name": STRATEGY_TOOL_NAME,
            "description": STRATEGY_TOOL_DESCRIPTION,
            "parameters": parameters,
        }
    }])
}

/// Turn a raw completion into an [`AgentReply`].
///
/// A tool call wins over message content; content that presents itself as a
/// JSON object is flagged as malformed so the normalizer can salvage it.
pub(crate) fn classify(completion: ChatCompletionResponse) -> Result<AgentReply, AgentError> {
    let usage = completion
        .usage
        .map(|u| vec![UsageRecord::new(u.prompt_tokens, u.completion_tokens)])
        .unwrap_or_default();

    let message = completion
        .choices
        .into_iter()
        .next()
        .ok_or(AgentError::EmptyResponse)?
        .message;

    let narrative = message.content.unwrap_or_default();

    let output = match message.tool_calls.into_iter().next() {
        Some(call) => AgentOutput::ToolResult {
            narrative,
            tool_name: call.function.name,
            payload: call.function.arguments,
        },
        None if looks_like_json(&narrative) => AgentOutput::Malformed(narrative),
        None => AgentOutput::Narrative(narrative),
    };

    Ok(AgentReply { output, usage })
}
