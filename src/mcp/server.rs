use crate::app::App;
use crate::errors::{ErrorCode, McpError, ToolError, ToolErrorKind};
use crate::mcp::catalog::{tool_catalog, validate_tool_args};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

const PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = "bexio-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn map_tool_error(tool: &str, error: &ToolError) -> McpError {
    let mut lines = vec![
        format!("tool: {}", tool),
        format!("code: {}", error.code),
        format!("message: {}", error.message),
    ];
    if let Some(status) = error.status {
        lines.push(format!("upstream_status: {}", status));
    }
    if let Some(hint) = &error.hint {
        lines.push(format!("hint: {}", hint));
    }
    let message = lines.join("\n");

    let code = match error.kind {
        ToolErrorKind::Config | ToolErrorKind::InvalidParams => ErrorCode::InvalidParams,
        ToolErrorKind::Timeout => ErrorCode::RequestTimeout,
        ToolErrorKind::NotFound | ToolErrorKind::Denied | ToolErrorKind::Validation => {
            ErrorCode::InvalidRequest
        }
        ToolErrorKind::Upstream | ToolErrorKind::Internal => ErrorCode::InternalError,
    };
    McpError::new(code, message)
}

pub struct McpServer {
    app: App,
}

impl McpServer {
    pub fn new() -> Result<Self, ToolError> {
        Ok(Self {
            app: App::initialize()?,
        })
    }

    fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "list": true, "call": true } },
            "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
        })
    }

    fn handle_tools_list(&self) -> Value {
        serde_json::json!({ "tools": tool_catalog() })
    }

    async fn handle_tools_call(&self, name: &str, args: Value) -> Result<Value, McpError> {
        validate_tool_args(name, &args)?;
        let result = self
            .app
            .executor
            .execute(name, args)
            .await
            .map_err(|err| map_tool_error(name, &err))?;
        let text = serde_json::to_string_pretty(&result).unwrap_or_else(|_| "null".to_string());
        Ok(serde_json::json!({
            "content": [ { "type": "text", "text": text } ]
        }))
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);
        let response = match request.method.as_str() {
            method if method.starts_with("notifications/") => {
                JsonRpcResponse::success(id, serde_json::json!({}))
            }
            "initialize" => JsonRpcResponse::success(id, self.handle_initialize()),
            "tools/list" => JsonRpcResponse::success(id, self.handle_tools_list()),
            "tools/call" => {
                let params = request.params.as_object().cloned().unwrap_or_default();
                let name = params.get("name").and_then(Value::as_str).unwrap_or("");
                if name.is_empty() {
                    JsonRpcResponse::failure(
                        id,
                        ErrorCode::InvalidParams.as_i32(),
                        "Missing tool name".to_string(),
                    )
                } else {
                    let args = params
                        .get("arguments")
                        .cloned()
                        .unwrap_or(Value::Object(Default::default()));
                    match self.handle_tools_call(name, args).await {
                        Ok(result) => JsonRpcResponse::success(id, result),
                        Err(err) => JsonRpcResponse::failure(id, err.code.as_i32(), err.message),
                    }
                }
            }
            _ => JsonRpcResponse::failure(
                id,
                ErrorCode::MethodNotFound.as_i32(),
                "Method not found".to_string(),
            ),
        };
        Some(response)
    }

    pub async fn run_stdio(&self) -> Result<(), ToolError> {
        let stdin = tokio::io::stdin();
        let stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin).lines();
        let mut writer = BufWriter::new(stdout);

        while let Some(line) = reader
            .next_line()
            .await
            .map_err(|err| ToolError::internal(err.to_string()))?
        {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => self.dispatch(request).await,
                Err(_) => Some(JsonRpcResponse::failure(
                    Value::Null,
                    ErrorCode::ParseError.as_i32(),
                    "Parse error".to_string(),
                )),
            };

            if let Some(response) = response {
                let payload = serde_json::to_string(&response).unwrap_or_default();
                writer.write_all(payload.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        Ok(())
    }
}

pub async fn run_stdio() -> Result<(), ToolError> {
    let server = McpServer::new()?;
    server.run_stdio().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_errors_map_onto_json_rpc_codes() {
        let cases = [
            (ToolError::invalid_params("x"), ErrorCode::InvalidParams),
            (ToolError::config("x"), ErrorCode::InvalidParams),
            (ToolError::timeout("x"), ErrorCode::RequestTimeout),
            (ToolError::not_found("x"), ErrorCode::InvalidRequest),
            (ToolError::validation("x"), ErrorCode::InvalidRequest),
            (ToolError::upstream("x"), ErrorCode::InternalError),
            (ToolError::internal("x"), ErrorCode::InternalError),
        ];
        for (err, expected) in cases {
            assert_eq!(map_tool_error("t", &err).code, expected);
        }
    }

    #[test]
    fn mapped_errors_carry_status_and_hint() {
        let err = ToolError::from_upstream_status(422, "name_1 missing")
            .with_hint("supply name_1");
        let mapped = map_tool_error("create_contact", &err);
        assert!(mapped.message.contains("upstream_status: 422"));
        assert!(mapped.message.contains("hint: supply name_1"));
        assert!(mapped.message.contains("tool: create_contact"));
    }
}
