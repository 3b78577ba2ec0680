use lazy_static::lazy_static;
use regex::Regex;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::LlmResponse;

lazy_static! {
    /// Regex for trailing commas before } or ]
    static ref TRAILING_COMMA_RE: Regex = Regex::new(r",(\s*[}\]])").unwrap();

    /// Regex for JavaScript string concatenation ("str1" + "str2")
    static ref JS_STRING_CONCAT_RE: Regex = Regex::new(r#""\s*\+\s*""#).unwrap();
}

/// Repairs slower than this are logged; the agent output is small so it
/// should never happen outside of pathological input
const SLOW_REPAIR_THRESHOLD: Duration = Duration::from_secs(5);

/// Why agent text could not be decoded into the target shape
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("No JSON object found in response")]
    NoJsonObject,

    #[error("Invalid JSON boundaries in response")]
    InvalidBoundaries,

    #[error("Failed to parse JSON after all repair attempts. Original: {0}")]
    Unrepairable(String),
}

/// Returns true when the text presents itself as a JSON reply, either a bare
/// object or a fenced ```json block
pub fn looks_like_json(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with("```json")
}

/// Extract JSON string from text (handles multiple formats)
///
/// Tries in order:
/// 1. JSON in markdown code block: ```json ... ```
/// 2. Generic markdown code block: ``` ... ```
/// 3. Plain JSON starting with {
/// 4. JSON embedded anywhere in text (first { to last })
pub fn extract_json_string(text: &str) -> Result<String, ParseError> {
    if let Some(rest) = text.split("```json").nth(1) {
        if let Some(block) = rest.split("```").next() {
            return Ok(block.trim().to_string());
        }
    }

    if let Some(start) = text.find("```") {
        let block_start = start + 3;
        // Skip optional language identifier on the same line
        if let Some(newline_offset) = text[block_start..].find('\n') {
            let json_start = block_start + newline_offset + 1;
            if let Some(end_offset) = text[json_start..].find("```") {
                let block = text[json_start..json_start + end_offset].trim();
                if block.starts_with('{') {
                    return Ok(block.to_string());
                }
            }
        }
    }

    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        return Ok(trimmed.to_string());
    }

    let start = text.find('{').ok_or(ParseError::NoJsonObject)?;
    let end = text.rfind('}').ok_or(ParseError::InvalidBoundaries)?;

    if start < end {
        Ok(text[start..=end].to_string())
    } else {
        Err(ParseError::InvalidBoundaries)
    }
}

/// Fix trailing commas in JSON (common LLM mistake)
///
/// Example: `{"name": "John",}` -> `{"name": "John"}`
pub fn fix_trailing_commas(json_str: &str) -> String {
    TRAILING_COMMA_RE.replace_all(json_str, "$1").to_string()
}

/// Fix JavaScript string concatenation which is invalid in JSON
///
/// `"str1" + "str2"` becomes `"str1str2"`
pub fn fix_js_string_concatenation(json_str: &str) -> String {
    JS_STRING_CONCAT_RE.replace_all(json_str, "").to_string()
}

/// Escape raw control characters that appear inside JSON string literals.
///
/// Agents frequently emit multi-line markdown answers with real newlines inside
/// a quoted field, which strict JSON rejects. Characters outside strings are
/// left alone.
pub fn escape_control_chars_in_strings(json_str: &str) -> String {
    let mut out = String::with_capacity(json_str.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in json_str.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }

    out
}

/// Turn literal `\n` / `\t` sequences left in already-decoded text into
/// markdown-friendly whitespace.
///
/// Idempotent: the replacements never produce a backslash, so a second pass
/// finds nothing to replace.
pub fn repair_escape_sequences(text: &str) -> String {
    if !text.contains('\\') {
        return text.to_string();
    }
    text.replace("\\n", "\n").replace("\\t", "  ")
}

/// Apply quick fixes to malformed JSON
fn apply_quick_fixes(json_str: &str) -> String {
    let fixed = fix_js_string_concatenation(json_str);
    let fixed = fix_trailing_commas(&fixed);
    escape_control_chars_in_strings(&fixed)
}

/// Attempt to repair JSON using the llm_json crate.
///
/// Returns the repaired JSON string, or None if repair fails or panics
fn repair_json(json_str: &str) -> Option<String> {
    let start = Instant::now();

    let options = llm_json::RepairOptions::default();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        llm_json::repair_json(json_str, &options)
    }));

    if start.elapsed() > SLOW_REPAIR_THRESHOLD {
        tracing::warn!("JSON repair took {:?}", start.elapsed());
    }

    match result {
        Ok(Ok(repaired)) => Some(repaired),
        Ok(Err(e)) => {
            tracing::debug!("JSON repair failed: {:?}", e);
            None
        }
        Err(_) => {
            tracing::warn!("JSON repair panicked");
            None
        }
    }
}

/// Try to parse text as the target type using multiple strategies
///
/// 1. Extract JSON string (markdown/plain/embedded)
/// 2. Direct parse (fast path)
/// 3. Quick fixes (string concat, trailing commas, raw control chars)
/// 4. llm_json repair
pub fn try_parse<T>(text: &str) -> Result<T, ParseError>
where
    T: LlmResponse,
{
    let json_str = extract_json_string(text)?;

    tracing::debug!(
        "Extracted JSON (first 500 chars): {}",
        json_str.chars().take(500).collect::<String>()
    );

    if let Ok(parsed) = serde_json::from_str::<T>(&json_str) {
        tracing::debug!("JSON parsed successfully (fast path)");
        return Ok(parsed);
    }

    let fixed_json = apply_quick_fixes(&json_str);
    if let Ok(parsed) = serde_json::from_str::<T>(&fixed_json) {
        tracing::debug!("JSON parsed successfully after quick fixes");
        return Ok(parsed);
    }

    if let Some(repaired) = repair_json(&fixed_json) {
        if let Ok(parsed) = serde_json::from_str::<T>(&repaired) {
            tracing::debug!("JSON parsed successfully after llm_json repair");
            return Ok(parsed);
        }
    }

    Err(ParseError::Unrepairable(
        json_str.chars().take(200).collect::<String>(),
    ))
}

/// Parse agent text with graceful fallback.
///
/// If every strategy fails, returns `T::default()` marked as a fallback with
/// the error message attached. Never panics, never returns an error.
pub fn parse_with_fallback<T>(text: &str) -> T
where
    T: LlmResponse,
{
    match try_parse::<T>(text) {
        Ok(parsed) => parsed,
        Err(error) => {
            tracing::warn!("Agent output parsing failed, using fallback: {}", error);
            let mut fallback = T::default();
            fallback.mark_as_fallback(error.to_string());
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    fn default_true() -> bool {
        true
    }

    #[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
    struct TestReply {
        pub answer: String,
        #[serde(default)]
        pub chatsummary: Option<String>,

        #[serde(default = "default_true")]
        #[schemars(skip)]
        pub is_llm_success: bool,

        #[serde(skip_serializing_if = "Option::is_none")]
        #[schemars(skip)]
        pub llm_error_message: Option<String>,
    }

    impl LlmResponse for TestReply {
        fn mark_as_fallback(&mut self, error_message: String) {
            self.is_llm_success = false;
            self.llm_error_message = Some(error_message);
        }

        fn is_success(&self) -> bool {
            self.is_llm_success
        }
    }

    // ==================== extract_json_string tests ====================

    #[test]
    fn test_extract_json_string_with_json_code_block() {
        let response = "Here you go:\n\n```json\n{\"answer\": \"RSI\"}\n```\n\nDone.";

        let json = extract_json_string(response).unwrap();
        assert_eq!(json, "{\"answer\": \"RSI\"}");
    }

    #[test]
    fn test_extract_json_string_ignores_non_json_code_block() {
        // A pinescript fence before the object must not be mistaken for the payload
        let response = "```pinescript\nstrategy('x')\n```\n{\"answer\": \"ok\"}";

        let json = extract_json_string(response).unwrap();
        assert_eq!(json, "{\"answer\": \"ok\"}");
    }

    #[test]
    fn test_extract_json_string_embedded() {
        let response = "Result: {\"answer\": \"MACD\"} end";

        let json = extract_json_string(response).unwrap();
        assert_eq!(json, "{\"answer\": \"MACD\"}");
    }

    #[test]
    fn test_extract_json_string_no_json() {
        assert_eq!(
            extract_json_string("Plain narrative answer"),
            Err(ParseError::NoJsonObject)
        );
        assert_eq!(
            extract_json_string("} backwards {"),
            Err(ParseError::InvalidBoundaries)
        );
    }

    #[test]
    fn test_looks_like_json() {
        assert!(looks_like_json("  {\"answer\": 1}"));
        assert!(looks_like_json("```json\n{}\n```"));
        assert!(!looks_like_json("# RSI Strategy\n\nThe RSI is..."));
    }

    // ==================== fix functions tests ====================

    #[test]
    fn test_fix_trailing_commas() {
        assert_eq!(
            fix_trailing_commas(r#"{"answer": "a", "n": 1,}"#),
            r#"{"answer": "a", "n": 1}"#
        );
        assert_eq!(
            fix_trailing_commas(r#"{"parameters": ["a", "b",],}"#),
            r#"{"parameters": ["a", "b"]}"#
        );
    }

    #[test]
    fn test_fix_js_string_concatenation() {
        assert_eq!(
            fix_js_string_concatenation(r#"{"answer": "RSI " + "strategy"}"#),
            r#"{"answer": "RSI strategy"}"#
        );
    }

    #[test]
    fn test_escape_control_chars_only_inside_strings() {
        let input = "{\n  \"answer\": \"line one\nline two\"\n}";
        let fixed = escape_control_chars_in_strings(input);
        assert_eq!(fixed, "{\n  \"answer\": \"line one\\nline two\"\n}");

        let parsed: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(parsed["answer"], "line one\nline two");
    }

    #[test]
    fn test_escape_control_chars_respects_escaped_quotes() {
        let input = "{\"answer\": \"say \\\"hi\\\"\nnow\"}";
        let fixed = escape_control_chars_in_strings(input);
        let parsed: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(parsed["answer"], "say \"hi\"\nnow");
    }

    // ==================== repair_escape_sequences tests ====================

    #[test]
    fn test_repair_escape_sequences() {
        assert_eq!(
            repair_escape_sequences("## Title\\n\\nBody\\tindented"),
            "## Title\n\nBody  indented"
        );
    }

    #[test]
    fn test_repair_escape_sequences_is_idempotent() {
        let inputs = [
            "clean text\nwith newline",
            "literal \\n and \\t",
            "double \\\\n backslash",
            "trailing backslash \\",
        ];
        for input in inputs {
            let once = repair_escape_sequences(input);
            let twice = repair_escape_sequences(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_repair_escape_sequences_noop_on_clean_text() {
        let clean = "# RSI\n\nBuy when RSI < 30.";
        assert_eq!(repair_escape_sequences(clean), clean);
    }

    // ==================== parse_with_fallback tests ====================

    #[test]
    fn test_parse_with_fallback_valid_json() {
        let result: TestReply =
            parse_with_fallback(r#"{"answer": "Use RSI(14)", "chatsummary": "RSI question"}"#);

        assert!(result.is_success());
        assert_eq!(result.answer, "Use RSI(14)");
        assert_eq!(result.chatsummary.as_deref(), Some("RSI question"));
    }

    #[test]
    fn test_parse_with_fallback_raw_newlines_in_string() {
        let input = "{\"answer\": \"# RSI Strategy\n\nBuy below 30\", \"chatsummary\": \"rsi\"}";

        let result: TestReply = parse_with_fallback(input);

        assert!(result.is_success());
        assert_eq!(result.answer, "# RSI Strategy\n\nBuy below 30");
    }

    #[test]
    fn test_parse_with_fallback_with_trailing_comma() {
        let result: TestReply = parse_with_fallback(r#"{"answer": "ok",}"#);

        assert!(result.is_success());
        assert_eq!(result.answer, "ok");
    }

    #[test]
    fn test_parse_with_fallback_invalid_returns_fallback() {
        let result: TestReply = parse_with_fallback("This is not JSON at all");

        assert!(!result.is_success());
        assert!(result.llm_error_message.is_some());
        assert!(result.answer.is_empty());
    }

    #[test]
    fn test_json_schema_string_skips_internal_fields() {
        let schema = TestReply::json_schema_string();

        assert!(schema.contains("answer"));
        assert!(!schema.contains("is_llm_success"));
        assert!(!schema.contains("llm_error_message"));
    }
}
