use async_trait::async_trait;
use thiserror::Error;

use super::models::AgentReply;
use crate::core::error::AppError;
use crate::shared::prompts::TemplateError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Agent returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Agent returned no choices")]
    EmptyResponse,

    #[error("Agent prompt could not be rendered: {0}")]
    Prompt(#[from] TemplateError),

    #[error("Agent client misconfigured: {0}")]
    Build(String),
}

impl From<AgentError> for AppError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::Prompt(e) => AppError::Internal(format!("Prompt rendering failed: {}", e)),
            AgentError::Build(msg) => AppError::Internal(msg),
            other => AppError::UpstreamUnavailable(other.to_string()),
        }
    }
}

/// Boundary to the trading assistant agent.
///
/// `context` is the previous-turn summary produced by the context assembler;
/// implementations must not see the stored conversation in any other form.
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn invoke(&self, query: &str, context: &str) -> Result<AgentReply, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_maps_to_upstream() {
        let err: AppError = AgentError::Status {
            status: 429,
            body: "rate limited".to_string(),
        }
        .into();

        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_prompt_error_maps_to_internal() {
        let err: AppError =
            AgentError::Prompt(TemplateError::NotFound("chat_agent/user.jinja".into())).into();

        assert!(matches!(err, AppError::Internal(_)));
        assert!(!err.is_retryable());
    }
}
