//! Reconciles whatever the agent produced into a [`NormalizedOutput`].
//!
//! Normalization never fails: tool payloads that are not strategies, replies
//! that only look like JSON and empty answers all degrade to a usable reply.

use uuid::Uuid;

use crate::features::agent::models::{StrategyPayload, StructuredReply};
use crate::features::agent::AgentOutput;
use crate::features::conversations::models::NormalizedOutput;
use crate::shared::llm::{parse_with_fallback, repair_escape_sequences, LlmResponse};

/// Used when nothing usable survives normalization
pub const EMPTY_ANSWER_PLACEHOLDER: &str =
    "I couldn't put together an answer for that request. Please try rephrasing your question.";

const SUMMARY_QUERY_CHARS: usize = 50;
const CARD_QUERY_CHARS: usize = 100;
const MAX_SUMMARY_PARAMETERS: usize = 4;
const EXPLANATION_BRIEF_CHARS: usize = 150;
const FIRST_PARAGRAPH_CHARS: usize = 200;
const SECTION_RULE: &str = "\n\n---\n\n";

struct Draft {
    answer: String,
    chatsummary: String,
    whatsapp_summary: String,
}

/// Map raw agent output to the fixed reply shape. Usage fields are zero;
/// the caller fills them in once the turn has been priced.
pub fn normalize(raw: &AgentOutput, user_query: &str, conversation_id: Uuid) -> NormalizedOutput {
    let draft = match raw {
        AgentOutput::ToolResult {
            narrative,
            tool_name,
            payload,
        } => from_tool_result(narrative, tool_name, payload, user_query),
        AgentOutput::Narrative(text) => from_narrative(text, user_query),
        AgentOutput::Malformed(text) => from_malformed(text, user_query),
    };

    let answer = repair_escape_sequences(&draft.answer).trim().to_string();
    let answer = if answer.is_empty() {
        EMPTY_ANSWER_PLACEHOLDER.to_string()
    } else {
        answer
    };

    NormalizedOutput {
        answer,
        chatsummary: draft.chatsummary,
        whatsapp_summary: draft.whatsapp_summary,
        conversation_id,
        tokens_used: 0,
        cost: 0.0,
    }
}

fn from_tool_result(narrative: &str, tool_name: &str, payload: &str, query: &str) -> Draft {
    let strategy: StrategyPayload = parse_with_fallback(payload);

    if strategy.is_success() && strategy.has_content() {
        tracing::debug!("Merging strategy payload from tool {}", tool_name);
        return from_strategy(narrative, &strategy, query);
    }

    tracing::debug!("Tool {} returned a non-strategy payload", tool_name);
    if narrative.trim().is_empty() {
        from_narrative(payload, query)
    } else {
        from_narrative(narrative, query)
    }
}

fn from_strategy(narrative: &str, strategy: &StrategyPayload, query: &str) -> Draft {
    fn non_blank(v: Option<&str>) -> Option<&str> {
        v.map(str::trim).filter(|s| !s.is_empty())
    }

    let lead = non_blank(Some(narrative)).or_else(|| non_blank(strategy.explanation.as_deref()));
    let code = non_blank(strategy.pinescript_code.as_deref());
    let viz = strategy.visualizations.as_ref();

    let mut sections: Vec<String> = Vec::new();
    if let Some(lead) = lead {
        sections.push(lead.to_string());
    }
    if let Some(code) = code {
        sections.push(format!(
            "## PineScript Implementation\n\n```pinescript\n{}\n```",
            code
        ));
    }
    if let Some(shadcn) = non_blank(viz.and_then(|v| v.shadcn.as_deref())) {
        sections.push(format!("## Visualization Component\n\n{}", shadcn));
    }
    if let Some(apexcharts) = non_blank(viz.and_then(|v| v.apexcharts.as_deref())) {
        sections.push(format!("## Chart Configuration\n\n{}", apexcharts));
    }
    if let Some(notes) = non_blank(strategy.usage_notes.as_deref()) {
        sections.push(format!("## Usage Notes\n\n{}", notes));
    }

    let chatsummary = if code.is_some() {
        format!(
            "User asked: {}. Provided PineScript strategy with implementation.",
            query
        )
    } else {
        format!("User asked: {}. Provided explanation.", query)
    };

    let mut whatsapp_summary = format!("*{}*\n\n", head(query, SUMMARY_QUERY_CHARS));
    let parameters = strategy.parameter_lines();
    if !parameters.is_empty() {
        whatsapp_summary.push_str("Key Parameters:\n");
        for parameter in parameters.iter().take(MAX_SUMMARY_PARAMETERS) {
            whatsapp_summary.push_str(&format!("• {}\n", parameter));
        }
    }
    if let Some(explanation) = non_blank(strategy.explanation.as_deref()) {
        whatsapp_summary.push('\n');
        whatsapp_summary.push_str(&brief(explanation));
    }
    if code.is_some() {
        whatsapp_summary.push_str("\n\n_PineScript code included in full response_");
    } else {
        whatsapp_summary.push_str("\n\n_Full explanation in main response_");
    }

    Draft {
        answer: sections.join(SECTION_RULE),
        chatsummary,
        whatsapp_summary,
    }
}

fn from_narrative(text: &str, query: &str) -> Draft {
    let text = repair_escape_sequences(text);
    let text = text.trim();

    let first_paragraph = match text.split_once("\n\n") {
        Some((first, _)) => first.trim().to_string(),
        None => head(text, FIRST_PARAGRAPH_CHARS),
    };
    let first_paragraph = if first_paragraph.chars().count() > FIRST_PARAGRAPH_CHARS {
        format!("{}...", head(&first_paragraph, FIRST_PARAGRAPH_CHARS - 3))
    } else {
        first_paragraph
    };

    Draft {
        answer: text.to_string(),
        chatsummary: format!("User asked: {}. Provided explanation.", query),
        whatsapp_summary: format!(
            "*{}*\n\n{}\n\n_Full explanation in main response_",
            head(query, SUMMARY_QUERY_CHARS),
            first_paragraph
        ),
    }
}

fn from_malformed(text: &str, query: &str) -> Draft {
    let reply: StructuredReply = parse_with_fallback(text);

    if reply.is_success() && !reply.answer.trim().is_empty() {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        return Draft {
            chatsummary: present(reply.chatsummary).unwrap_or_else(|| generic_chatsummary(query)),
            whatsapp_summary: present(reply.whatsapp_summary)
                .unwrap_or_else(|| generic_card(query)),
            answer: reply.answer,
        };
    }

    tracing::warn!(
        "Agent reply looked like JSON but could not be recovered ({}); using raw text",
        reply
            .llm_error_message
            .as_deref()
            .unwrap_or("empty answer")
    );

    Draft {
        answer: text.to_string(),
        chatsummary: generic_chatsummary(query),
        whatsapp_summary: generic_card(query),
    }
}

fn generic_chatsummary(query: &str) -> String {
    format!("User asked: {}", query)
}

fn generic_card(query: &str) -> String {
    format!(
        "📱 *Response Generated*\n\n{}...\n\n_See details above_ 📋",
        head(query, CARD_QUERY_CHARS)
    )
}

fn head(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// First sentence-ish chunk of an explanation, cut at a word boundary
fn brief(explanation: &str) -> String {
    let cut = head(explanation, EXPLANATION_BRIEF_CHARS);
    let cut = cut.trim();
    if cut.ends_with('.') {
        return cut.to_string();
    }
    match cut.rfind(' ') {
        Some(idx) => format!("{}...", &cut[..idx]),
        None => format!("{}...", cut),
    }
}
