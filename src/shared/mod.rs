pub mod constants;
pub mod llm;
pub mod prompts;
pub mod types;
pub mod validation;
