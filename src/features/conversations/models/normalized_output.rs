use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The fixed reply shape returned for every chat turn.
///
/// All fields are always present, whatever shape the agent answered in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NormalizedOutput {
    /// Full markdown answer, strategy code and charts embedded as sections
    pub answer: String,

    /// One-line digest used as context for the next turn
    pub chatsummary: String,

    /// Short mobile-friendly summary
    pub whatsapp_summary: String,

    pub conversation_id: Uuid,

    /// Tokens consumed by this turn
    pub tokens_used: i64,

    /// Cost of this turn in USD
    pub cost: f64,
}
