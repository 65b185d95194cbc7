//! JSON-RPC 2.0 message shapes for the Model Context Protocol.

use super::super::provider::ProviderError;
use super::super::registry::{ToolDescriptor, default_input_schema};
use serde::{Deserialize, Serialize};

/// Protocol revision sent in the `initialize` handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A request without an id; no response is expected.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: &str) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn into_result(self) -> Result<serde_json::Value, ProviderError> {
        match self.error {
            Some(err) => Err(ProviderError::Protocol(format!(
                "JSON-RPC error {}: {}",
                err.code, err.message
            ))),
            None => Ok(self.result.unwrap_or(serde_json::Value::Null)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Tool entry of a `tools/list` result.
#[derive(Debug, Clone, Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default = "default_input_schema")]
    pub input_schema: serde_json::Value,
}

impl From<McpTool> for ToolDescriptor {
    fn from(tool: McpTool) -> Self {
        ToolDescriptor::new(tool.name, tool.description.unwrap_or_default(), tool.input_schema)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub capabilities: serde_json::Value,
    pub client_info: ClientInfo,
}

impl Default for InitializeParams {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: serde_json::json!({}),
            client_info: ClientInfo {
                name: "parley".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ToolCallParams<'a> {
    pub name: &'a str,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ContentPart>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl ToolCallResult {
    /// Text parts joined by newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parse a `tools/list` result (`{"tools": [...]}`).
pub fn parse_tool_list(result: serde_json::Value) -> Result<Vec<ToolDescriptor>, ProviderError> {
    let tools = result
        .get("tools")
        .cloned()
        .unwrap_or(serde_json::Value::Array(vec![]));
    let tools: Vec<McpTool> = serde_json::from_value(tools)
        .map_err(|e| ProviderError::Protocol(format!("failed to parse tools list: {e}")))?;
    Ok(tools.into_iter().map(ToolDescriptor::from).collect())
}

/// Interpret a `tools/call` result: joined text, or a remote error when the
/// server flagged `isError`.
pub fn parse_tool_call(result: serde_json::Value) -> Result<String, ProviderError> {
    let parsed: ToolCallResult = serde_json::from_value(result)
        .map_err(|e| ProviderError::Protocol(format!("failed to parse tool result: {e}")))?;
    if parsed.is_error {
        return Err(ProviderError::Remote(parsed.text()));
    }
    Ok(parsed.text())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = JsonRpcRequest::new(1, "tools/list", None);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"tools/list\""));
        assert!(!json.contains("params"));
    }

    #[test]
    fn initialize_params_use_camel_case() {
        let json = serde_json::to_value(InitializeParams::default()).unwrap();
        assert_eq!(json["protocolVersion"], "2024-11-05");
        assert_eq!(json["clientInfo"]["name"], "parley");
    }

    #[test]
    fn error_response_becomes_protocol_error() {
        let json =
            r#"{"jsonrpc":"2.0","id":2,"error":{"code":-32601,"message":"Method not found"}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        let err = resp.into_result().unwrap_err();
        assert!(err.to_string().contains("-32601"));
    }

    #[test]
    fn tool_list_maps_input_schema() {
        let tools = parse_tool_list(serde_json::json!({
            "tools": [
                {"name": "get_weather", "description": "Weather", "inputSchema": {
                    "type": "object", "properties": {"location": {"type": "string"}}
                }},
                {"name": "ping"}
            ]
        }))
        .unwrap();
        assert_eq!(tools[0].input_schema["properties"]["location"]["type"], "string");
        assert_eq!(tools[1].description, "");
        assert_eq!(tools[1].input_schema["type"], "object");
    }

    #[test]
    fn tool_call_joins_text_and_flags_errors() {
        let ok = parse_tool_call(serde_json::json!({
            "content": [{"type": "text", "text": "34°C"}, {"type": "text", "text": "clear"}]
        }))
        .unwrap();
        assert_eq!(ok, "34°C\nclear");

        let err = parse_tool_call(serde_json::json!({
            "content": [{"type": "text", "text": "city not found"}],
            "isError": true
        }))
        .unwrap_err();
        assert!(matches!(err, ProviderError::Remote(ref m) if m == "city not found"));
    }
}
