//! Decoding of free-form agent text into typed replies.

pub mod parser;
mod response;

pub use parser::{looks_like_json, parse_with_fallback, repair_escape_sequences};
pub use response::LlmResponse;
