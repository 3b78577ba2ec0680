/// Header carrying the caller's opaque user identity
pub const USER_ID_HEADER: &str = "x-user-uuid";

// =============================================================================
// CONVERSATION CONSTANTS
// =============================================================================

/// Context handed to the agent when a conversation has no assistant turns yet
pub const NO_PREVIOUS_CONVERSATION: &str = "No previous conversation.";

/// Stored assistant message content is capped; the full answer lives in metadata
pub const ASSISTANT_CONTENT_MAX_CHARS: usize = 500;

/// Query prefix length used when naming a conversation created by the chat path
pub const AUTO_NAME_QUERY_CHARS: usize = 50;

