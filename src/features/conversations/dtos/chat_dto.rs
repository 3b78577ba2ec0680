use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Request DTO for one chat turn
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ChatRequestDto {
    /// The user's question
    #[validate(length(min = 1, max = 10000, message = "Query must be 1-10000 characters"))]
    pub query: String,

    /// Existing thread to continue; omit to start a new one
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_validation() {
        let ok: ChatRequestDto = serde_json::from_str(r#"{"query": "What is RSI?"}"#).unwrap();
        assert!(ok.validate().is_ok());
        assert!(ok.conversation_id.is_none());

        let empty: ChatRequestDto = serde_json::from_str(r#"{"query": ""}"#).unwrap();
        assert!(empty.validate().is_err());
    }
}
