//! Server-Sent-Events frame parsing for MCP responses.
//!
//! MCP servers answer each JSON-RPC request with a single SSE frame of the
//! shape `event: message\ndata: <json>\n\n`. This parser isolates that quirk
//! from the transport: [`parse_event`] decodes the frame, and
//! [`extract_mcp_result`] classifies the decoded object as a JSON-RPC result
//! or error.

use serde_json::Value;
use tracing::warn;

/// Errors from SSE frame parsing.
#[derive(Debug, thiserror::Error)]
pub enum SseParseError {
    /// The input text was empty.
    #[error("Empty SSE text")]
    Empty,
    /// The frame contained no `data:` line.
    #[error("No data found in SSE response")]
    NoData,
}

/// Outcome of classifying an MCP response frame.
#[derive(Debug)]
pub struct McpResult {
    /// Whether the frame carried a JSON-RPC `result`.
    pub success: bool,
    /// The `result` value on success, or the `error` object on failure.
    pub payload: Option<Value>,
    /// The error message, when the frame carried an error.
    pub error_message: Option<String>,
}

/// Parse a single SSE frame into `(event_name, decoded_data)`.
///
/// Both `\n` and `\r\n` line endings are tolerated. A `data:` line that is
/// not valid JSON is wrapped as `{"raw": <line>}` rather than failing.
///
/// # Errors
///
/// Returns [`SseParseError::Empty`] only when the input is empty.
pub fn parse_event(text: &str) -> Result<(Option<String>, Option<Value>), SseParseError> {
    if text.is_empty() {
        return Err(SseParseError::Empty);
    }

    let mut event_type = None;
    let mut data = None;

    let normalized = text.replace("\r\n", "\n");
    for line in normalized.split('\n') {
        if let Some(rest) = line.strip_prefix("event: ") {
            event_type = Some(rest.trim().to_owned());
        } else if let Some(rest) = line.strip_prefix("data: ") {
            let data_line = rest.trim();
            if data_line.is_empty() {
                continue;
            }
            data = Some(match serde_json::from_str::<Value>(data_line) {
                Ok(value) => value,
                Err(e) => {
                    warn!(data = data_line, error = %e, "failed to parse SSE data as JSON");
                    serde_json::json!({ "raw": data_line })
                }
            });
        }
    }

    Ok((event_type, data))
}

/// Extract the decoded MCP response object from an SSE frame.
///
/// # Errors
///
/// Returns an error when the input is empty or carries no data line.
pub fn extract_mcp_response(text: &str) -> Result<Value, SseParseError> {
    let (event_type, data) = parse_event(text)?;

    let Some(data) = data else {
        return Err(SseParseError::NoData);
    };

    if let Some(event) = &event_type {
        if event != "message" {
            warn!(event_type = %event, expected = "message", "unexpected SSE event type");
        }
    }

    Ok(data)
}

/// Parse an MCP response frame and classify it as success or error.
///
/// Never fails: frame-level parse errors are folded into an unsuccessful
/// [`McpResult`] carrying the parse error message.
pub fn extract_mcp_result(text: &str) -> McpResult {
    let data = match extract_mcp_response(text) {
        Ok(data) => data,
        Err(e) => {
            return McpResult {
                success: false,
                payload: None,
                error_message: Some(e.to_string()),
            }
        }
    };

    if let Some(result) = data.get("result") {
        return McpResult {
            success: true,
            payload: Some(result.clone()),
            error_message: None,
        };
    }

    if let Some(error) = data.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_owned();
        return McpResult {
            success: false,
            payload: Some(error.clone()),
            error_message: Some(message),
        };
    }

    warn!(data = %data, "MCP response missing result or error");
    McpResult {
        success: false,
        payload: None,
        error_message: Some("Invalid MCP response format".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_result_frame() {
        let text = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"ok\":true}}\n\n";
        let (event, data) = parse_event(text).expect("should parse");
        assert_eq!(event.as_deref(), Some("message"));
        assert_eq!(data.expect("data")["result"]["ok"], true);
    }

    #[test]
    fn test_parse_event_crlf_line_endings() {
        let text = "event: message\r\ndata: {\"result\":1}\r\n\r\n";
        let (event, data) = parse_event(text).expect("should parse");
        assert_eq!(event.as_deref(), Some("message"));
        assert_eq!(data.expect("data")["result"], 1);
    }

    #[test]
    fn test_parse_event_non_json_data_wrapped_as_raw() {
        let text = "event: message\ndata: not-json\n\n";
        let (_, data) = parse_event(text).expect("should parse");
        assert_eq!(data.expect("data")["raw"], "not-json");
    }

    #[test]
    fn test_parse_event_empty_input_fails() {
        assert!(matches!(parse_event(""), Err(SseParseError::Empty)));
    }

    #[test]
    fn test_extract_result_success() {
        let text = "event: message\ndata: {\"result\":{\"tools\":[]}}\n\n";
        let result = extract_mcp_result(text);
        assert!(result.success);
        assert!(result.error_message.is_none());
        assert_eq!(result.payload.expect("payload")["tools"], serde_json::json!([]));
    }

    #[test]
    fn test_extract_result_error() {
        let text =
            "event: message\ndata: {\"error\":{\"code\":-32601,\"message\":\"Method not found\"}}\n\n";
        let result = extract_mcp_result(text);
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("Method not found"));
        assert_eq!(result.payload.expect("payload")["code"], -32601);
    }

    #[test]
    fn test_extract_result_missing_both_keys() {
        let text = "event: message\ndata: {\"neither\":1}\n\n";
        let result = extract_mcp_result(text);
        assert!(!result.success);
        assert_eq!(
            result.error_message.as_deref(),
            Some("Invalid MCP response format")
        );
    }

    #[test]
    fn test_extract_result_no_data_line() {
        let result = extract_mcp_result("event: message\n\n");
        assert!(!result.success);
        assert_eq!(
            result.error_message.as_deref(),
            Some("No data found in SSE response")
        );
    }
}
