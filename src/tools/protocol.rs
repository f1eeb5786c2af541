//! Wire protocol for tool provider subprocesses
//!
//! Requests and responses are single lines of JSON over the provider's
//! stdio pipes. Every request carries a correlation id; a response carries
//! the same id and exactly one of `result` or `error`. Responses are
//! validated into tagged variants on parse rather than being passed around
//! as loose JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Capability-listing method name
pub const METHOD_LIST_TOOLS: &str = "tools/list";

/// Capability-invocation method name
pub const METHOD_CALL_TOOL: &str = "tools/call";

/// Outbound request line
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRequest {
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl ProviderRequest {
    /// Serialize to a single newline-terminated line
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_line(&self) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Parsed, validated response line
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub id: u64,
    pub outcome: ResponseOutcome,
}

/// Tagged response payload: success xor failure
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    Ok(Value),
    Err(String),
}

/// Loose mirror of the wire shape, tightened by [`parse_response`]
#[derive(Debug, Deserialize)]
struct RawResponse {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Parse and validate one response line
///
/// # Errors
///
/// Returns [`Error::Provider`] if the line is not JSON, lacks an id, or
/// does not carry exactly one of `result` / `error`.
pub fn parse_response(line: &str) -> Result<ProviderResponse> {
    let raw: RawResponse = serde_json::from_str(line)
        .map_err(|e| Error::Provider(format!("malformed response line: {e}")))?;

    let outcome = match (raw.result, raw.error) {
        (Some(result), None) => ResponseOutcome::Ok(result),
        (None, Some(error)) => ResponseOutcome::Err(error_message(&error)),
        (Some(_), Some(_)) => {
            return Err(Error::Provider(
                "response carries both result and error".to_string(),
            ));
        }
        (None, None) => {
            return Err(Error::Provider(
                "response carries neither result nor error".to_string(),
            ));
        }
    };

    Ok(ProviderResponse {
        id: raw.id,
        outcome,
    })
}

/// Render an error payload (object with `message`, bare string, or other)
fn error_message(error: &Value) -> String {
    if let Some(message) = error.get("message").and_then(Value::as_str) {
        return message.to_string();
    }
    if let Some(message) = error.as_str() {
        return message.to_string();
    }
    error.to_string()
}

/// Tool list carried by a `tools/list` result
#[derive(Debug, Deserialize)]
pub struct ToolsListResult {
    #[serde(default)]
    pub tools: Vec<WireTool>,
}

/// One tool as reported by a provider
#[derive(Debug, Deserialize)]
pub struct WireTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "inputSchema")]
    pub input_schema: Option<Value>,
}

/// Extract the text payload from a `tools/call` result
///
/// Providers return `{content: [{type: "text", text: ...}, ...]}`; text
/// blocks are joined with newlines. A bare string result is passed through,
/// and anything else falls back to compact JSON.
#[must_use]
pub fn text_content(result: &Value) -> String {
    if let Some(text) = result.as_str() {
        return text.to_string();
    }
    if let Some(blocks) = result.get("content").and_then(Value::as_array) {
        let texts: Vec<&str> = blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect();
        return texts.join("\n");
    }
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_as_single_line() {
        let request = ProviderRequest {
            id: 7,
            method: METHOD_CALL_TOOL.to_string(),
            params: json!({"name": "search", "arguments": {"query": "rust"}}),
        };
        let line = request.to_line().unwrap();
        assert_eq!(line.last(), Some(&b'\n'));
        let text = std::str::from_utf8(&line[..line.len() - 1]).unwrap();
        assert!(!text.contains('\n'));
        assert!(text.contains("\"id\":7"));
        assert!(text.contains("tools/call"));
    }

    #[test]
    fn result_response_parses() {
        let response = parse_response(r#"{"id":3,"result":{"ok":true}}"#).unwrap();
        assert_eq!(response.id, 3);
        assert_eq!(response.outcome, ResponseOutcome::Ok(json!({"ok": true})));
    }

    #[test]
    fn error_response_parses() {
        let response =
            parse_response(r#"{"id":4,"error":{"code":-32601,"message":"method not found"}}"#)
                .unwrap();
        assert_eq!(response.outcome, ResponseOutcome::Err("method not found".to_string()));
    }

    #[test]
    fn ambiguous_responses_are_rejected() {
        assert!(parse_response(r#"{"id":1}"#).is_err());
        assert!(parse_response(r#"{"id":1,"result":1,"error":"x"}"#).is_err());
        assert!(parse_response("not json").is_err());
        assert!(parse_response(r#"{"result":1}"#).is_err());
    }

    #[test]
    fn tool_list_accepts_both_schema_spellings() {
        let list: ToolsListResult = serde_json::from_value(json!({
            "tools": [
                {"name": "a", "description": "A", "inputSchema": {"type": "object"}},
                {"name": "b", "input_schema": {"type": "object"}}
            ]
        }))
        .unwrap();
        assert_eq!(list.tools.len(), 2);
        assert!(list.tools[0].input_schema.is_some());
        assert!(list.tools[1].input_schema.is_some());
        assert!(list.tools[1].description.is_none());
    }

    #[test]
    fn text_content_joins_text_blocks() {
        let result = json!({
            "content": [
                {"type": "text", "text": "line one"},
                {"type": "image", "data": "..."},
                {"type": "text", "text": "line two"}
            ]
        });
        assert_eq!(text_content(&result), "line one\nline two");
        assert_eq!(text_content(&json!("plain")), "plain");
        assert_eq!(text_content(&json!({"answer": 42})), r#"{"answer":42}"#);
    }
}
