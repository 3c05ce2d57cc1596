//! Cambrian MCP client
//!
//! Speaks JSON-RPC 2.0 over HTTP POST (MCP streamable HTTP transport).
//! Responses arrive either as a JSON body or as a server-sent event stream
//! whose `data:` lines carry the JSON-RPC message.

use super::{send, SourceError};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

const PROVIDER: &str = "cambrian";
const PROTOCOL_VERSION: &str = "2025-03-26";
const SESSION_HEADER: &str = "mcp-session-id";

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    params: Value,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// A tool advertised by the MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

#[derive(Debug, Deserialize)]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<McpToolInfo>,
    #[serde(default, rename = "nextCursor")]
    next_cursor: Option<String>,
}

/// Cambrian MCP client with an established session
pub struct McpClient {
    http: Client,
    url: String,
    api_key: Option<SecretString>,
    session_id: Option<String>,
    next_id: AtomicU64,
}

impl McpClient {
    /// Run the MCP `initialize` handshake and return a ready client
    pub async fn connect(
        http: Client,
        url: &str,
        api_key: Option<SecretString>,
    ) -> Result<Self, SourceError> {
        let mut client = Self {
            http,
            url: url.to_string(),
            api_key,
            session_id: None,
            next_id: AtomicU64::new(1),
        };

        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        });
        let (id, headers, body) = client.post("initialize", Some(params)).await?;
        client.session_id = headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let init = decode_response(&headers, &body, id)?;
        let server = init
            .get("serverInfo")
            .and_then(|s| s.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or("unknown");
        tracing::info!(server, session = client.session_id.is_some(), "Connected to Cambrian MCP");

        // Servers may answer notifications with 202 and no body
        if let Err(e) = client.post("notifications/initialized", None).await {
            tracing::debug!(error = %e, "initialized notification not acknowledged");
        }

        Ok(client)
    }

    /// List every tool, following pagination cursors
    pub async fn list_tools(&self) -> Result<Vec<McpToolInfo>, SourceError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let result = self.request("tools/list", params).await?;
            let page: ToolsListResult =
                serde_json::from_value(result).map_err(|e| SourceError::malformed(PROVIDER, e))?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    /// Call a tool and return the raw MCP result object
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, SourceError> {
        self.request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, SourceError> {
        let (id, headers, body) = self.post(method, Some(params)).await?;
        decode_response(&headers, &body, id)
    }

    /// POST one JSON-RPC message; notifications (`params` = None) carry no id
    async fn post(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(u64, HeaderMap, String), SourceError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let payload = JsonRpcRequest {
            jsonrpc: "2.0",
            id: params.as_ref().map(|_| id),
            method,
            params: params.unwrap_or_else(|| json!({})),
        };

        let mut request = self
            .http
            .post(&self.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key.expose_secret());
        }
        if let Some(session) = &self.session_id {
            request = request.header(SESSION_HEADER, session);
        }

        let response = send(PROVIDER, request).await?;
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| SourceError::Network {
            provider: PROVIDER,
            message: e.to_string(),
        })?;
        Ok((id, headers, body))
    }
}

/// Decode a JSON-RPC response from a JSON or SSE body
fn decode_response(headers: &HeaderMap, body: &str, id: u64) -> Result<Value, SourceError> {
    let is_sse = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("text/event-stream"))
        .unwrap_or(false);

    let response = if is_sse {
        sse_messages(body)
            .into_iter()
            .find(|msg| msg.id.as_ref().and_then(|v| v.as_u64()) == Some(id))
            .ok_or_else(|| SourceError::malformed(PROVIDER, "no response in event stream"))?
    } else {
        serde_json::from_str::<JsonRpcResponse>(body)
            .map_err(|e| SourceError::malformed(PROVIDER, e))?
    };

    if let Some(error) = response.error {
        return Err(SourceError::malformed(
            PROVIDER,
            format!("JSON-RPC error {}: {}", error.code, error.message),
        ));
    }

    response
        .result
        .ok_or_else(|| SourceError::malformed(PROVIDER, "response has no result"))
}

/// Parse every JSON-RPC message carried in `data:` lines of an SSE body
fn sse_messages(body: &str) -> Vec<JsonRpcResponse> {
    let mut messages = Vec::new();
    let mut data = String::new();

    for line in body.lines().chain(std::iter::once("")) {
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.trim_start());
        } else if line.trim().is_empty() && !data.is_empty() {
            if let Ok(msg) = serde_json::from_str::<JsonRpcResponse>(&data) {
                messages.push(msg);
            }
            data.clear();
        }
    }

    messages
}

/// Flatten an MCP tool result into JSON for the model.
///
/// Text items holding JSON are parsed; a single item is returned bare.
pub fn flatten_content(result: &Value) -> Value {
    let items: Vec<Value> = result
        .get("content")
        .and_then(|c| c.as_array())
        .map(|content| {
            content
                .iter()
                .map(|item| match item.get("text").and_then(|t| t.as_str()) {
                    Some(text) => serde_json::from_str(text).unwrap_or_else(|_| json!(text)),
                    None => item.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    match items.len() {
        0 => result.get("structuredContent").cloned().unwrap_or(Value::Null),
        1 => items.into_iter().next().unwrap_or(Value::Null),
        _ => Value::Array(items),
    }
}

/// Whether an MCP tool result reports a tool-level failure
pub fn is_error_result(result: &Value) -> bool {
    result
        .get("isError")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn decodes_plain_json_response() {
        let body = r#"{"jsonrpc":"2.0","id":3,"result":{"tools":[]}}"#;
        let result = decode_response(&headers("application/json"), body, 3).unwrap();
        assert_eq!(result, json!({ "tools": [] }));
    }

    #[test]
    fn decodes_matching_event_from_stream() {
        let body = "event: message\n\
                    data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n\
                    \n\
                    event: message\n\
                    data: {\"jsonrpc\":\"2.0\",\"id\":7,\"result\":{\"ok\":true}}\n";
        let result = decode_response(&headers("text/event-stream"), body, 7).unwrap();
        assert_eq!(result, json!({ "ok": true }));

        let err = decode_response(&headers("text/event-stream"), body, 8).unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }

    #[test]
    fn rpc_errors_surface() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#;
        let err = decode_response(&headers("application/json"), body, 1).unwrap_err();
        assert!(err.to_string().contains("-32601"));
    }

    #[test]
    fn tool_info_defaults_schema() {
        let info: McpToolInfo = serde_json::from_value(json!({ "name": "solana_price" })).unwrap();
        assert_eq!(info.input_schema["type"], "object");
        assert!(info.description.is_none());
    }

    #[test]
    fn flatten_parses_json_text() {
        let result = json!({
            "content": [{ "type": "text", "text": "{\"price\": 1.5}" }],
            "isError": false
        });
        assert_eq!(flatten_content(&result), json!({ "price": 1.5 }));
        assert!(!is_error_result(&result));

        let multi = json!({ "content": [{ "type": "text", "text": "a" }, { "type": "text", "text": "b" }] });
        assert_eq!(flatten_content(&multi), json!(["a", "b"]));
    }
}
