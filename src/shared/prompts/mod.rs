//! Prompt template management module.
//!
//! Templates live in `templates/prompts/` and use Jinja2 syntax. They are
//! embedded at compile time; files on disk with the same name override them.

pub mod engine;

pub use engine::{render_template, TemplateError};

use chrono::Utc;
use minijinja::Value;
use std::collections::HashMap;

use crate::shared::constants::NO_PREVIOUS_CONVERSATION;

/// Render the system prompt for the trading assistant agent.
///
/// `strategy_tool` is the function name the agent should call to hand over
/// PineScript strategy payloads.
pub fn render_chat_agent_system_prompt(
    strategy_tool: &str,
    context: &str,
) -> Result<String, TemplateError> {
    let now = Utc::now();

    let mut ctx: HashMap<&str, Value> = HashMap::new();
    ctx.insert("date", Value::from(now.format("%Y-%m-%d").to_string()));
    ctx.insert("time", Value::from(now.format("%H:%M").to_string()));
    ctx.insert("strategy_tool", Value::from(strategy_tool));
    ctx.insert(
        "has_prior_context",
        Value::from(context != NO_PREVIOUS_CONVERSATION),
    );

    render_template("chat_agent/system.jinja", &ctx)
}

/// Render the user turn: previous-turn summary followed by the current query
pub fn render_chat_agent_user_prompt(context: &str, query: &str) -> Result<String, TemplateError> {
    let mut ctx: HashMap<&str, Value> = HashMap::new();
    ctx.insert("context", Value::from(context));
    ctx.insert("query", Value::from(query));

    render_template("chat_agent/user.jinja", &ctx)
}
