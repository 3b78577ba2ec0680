use crate::features::conversations::models::Conversation;
use crate::shared::constants::NO_PREVIOUS_CONVERSATION;

const FALLBACK_CONTENT_CHARS: usize = 100;

/// Digest of prior turns handed to the agent: the chat summary of the latest
/// assistant reply, or a sentinel for a fresh conversation.
pub fn build_context(conversation: &Conversation) -> String {
    let Some(latest) = conversation.latest_assistant() else {
        return NO_PREVIOUS_CONVERSATION.to_string();
    };

    let summary = latest
        .metadata
        .as_ref()
        .map(|meta| meta.full_response.chatsummary.trim())
        .filter(|s| !s.is_empty());

    match summary {
        Some(summary) => summary.to_string(),
        None => {
            let head: String = latest.content.chars().take(FALLBACK_CONTENT_CHARS).collect();
            format!("Assistant: {}...", head)
        }
    }
}
