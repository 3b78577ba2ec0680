use schemars::gen::SchemaGenerator;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

/// Agent reply shapes that degrade gracefully instead of failing.
///
/// A type implementing this trait can always be produced from agent text: if
/// decoding fails, `parse_with_fallback` hands back `Default::default()`
/// marked via `mark_as_fallback`, and the caller fills the gaps.
pub trait LlmResponse: DeserializeOwned + Default + JsonSchema {
    /// Mark this value as a fallback due to parsing failure
    fn mark_as_fallback(&mut self, error_message: String);

    /// Whether this value was decoded from the agent text
    fn is_success(&self) -> bool;

    /// JSON schema string for embedding in agent prompts
    fn json_schema_string() -> String {
        let mut gen = SchemaGenerator::default();
        let schema = gen.root_schema_for::<Self>();
        serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
    }
}
