use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::shared::llm::LlmResponse;

fn default_true() -> bool {
    true
}

/// Token counts of a single model invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageRecord {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl UsageRecord {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// What the agent produced for one turn, before normalization.
///
/// Closed set: every consumer matches all three variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutput {
    /// The agent invoked a tool; `payload` is the tool's raw output (JSON for
    /// strategy generation, plain text for search-style tools) and `narrative`
    /// is the closing message that accompanied it
    ToolResult {
        narrative: String,
        tool_name: String,
        payload: String,
    },

    /// A plain narrative answer with no tool involved
    Narrative(String),

    /// Text presented as a JSON reply object. It is not trusted to decode;
    /// the normalizer salvages what it can and falls back to the raw text
    Malformed(String),
}

/// Everything the agent boundary hands back for one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub output: AgentOutput,
    /// One record per model call made while answering; may be empty
    pub usage: Vec<UsageRecord>,
}

/// Chart/UI snippets the strategy tool may attach
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Visualizations {
    /// React component source using shadcn/ui
    #[serde(default)]
    pub shadcn: Option<String>,

    /// ApexCharts configuration
    #[serde(default)]
    pub apexcharts: Option<String>,
}

/// Payload of the PineScript strategy tool
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct StrategyPayload {
    /// Complete Pine Script v5 source
    #[serde(default)]
    pub pinescript_code: Option<String>,

    #[serde(default)]
    pub visualizations: Option<Visualizations>,

    /// How to apply the strategy on a chart
    #[serde(default)]
    pub usage_notes: Option<String>,

    /// Key strategy inputs, e.g. "RSI Length: 14"
    #[serde(default)]
    pub parameters: Vec<serde_json::Value>,

    /// Plain-language explanation of the strategy
    #[serde(default)]
    pub explanation: Option<String>,

    #[serde(default = "default_true")]
    #[schemars(skip)]
    pub is_llm_success: bool,

    #[serde(default)]
    #[schemars(skip)]
    pub llm_error_message: Option<String>,
}

impl StrategyPayload {
    /// Parameters rendered as display lines; non-string values are shown as JSON
    pub fn parameter_lines(&self) -> Vec<String> {
        self.parameters
            .iter()
            .map(|p| match p {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .filter(|s| !s.trim().is_empty())
            .collect()
    }

    /// True when the payload carries anything worth merging into the answer
    pub fn has_content(&self) -> bool {
        let non_blank = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        let has_viz = self
            .visualizations
            .as_ref()
            .is_some_and(|v| non_blank(&v.shadcn) || non_blank(&v.apexcharts));

        non_blank(&self.pinescript_code) || non_blank(&self.usage_notes) || has_viz
    }
}

impl LlmResponse for StrategyPayload {
    fn mark_as_fallback(&mut self, error_message: String) {
        self.is_llm_success = false;
        self.llm_error_message = Some(error_message);
    }

    fn is_success(&self) -> bool {
        self.is_llm_success
    }
}

/// Reply object an agent sometimes emits as JSON text instead of markdown
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct StructuredReply {
    #[serde(default)]
    pub answer: String,

    #[serde(default)]
    pub chatsummary: Option<String>,

    #[serde(default)]
    pub whatsapp_summary: Option<String>,

    #[serde(default = "default_true")]
    #[schemars(skip)]
    pub is_llm_success: bool,

    #[serde(default)]
    #[schemars(skip)]
    pub llm_error_message: Option<String>,
}

impl LlmResponse for StructuredReply {
    fn mark_as_fallback(&mut self, error_message: String) {
        self.is_llm_success = false;
        self.llm_error_message = Some(error_message);
    }

    fn is_success(&self) -> bool {
        self.is_llm_success
    }
}
