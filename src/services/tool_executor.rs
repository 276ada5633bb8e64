use crate::errors::ToolError;
use crate::services::logger::Logger;
use crate::utils::tool_errors::unknown_tool_error;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// One handler may be registered under several operation names; the name is
/// passed through so it can route.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, operation: &str, args: Value) -> Result<Value, ToolError>;
}

/// Routes a named tool call to its handler, stamping each call with a trace
/// id and logging its outcome and duration.
pub struct ToolExecutor {
    logger: Logger,
    handlers: Arc<HashMap<String, Arc<dyn ToolHandler>>>,
}

impl ToolExecutor {
    pub fn new(logger: Logger, handlers: HashMap<String, Arc<dyn ToolHandler>>) -> Self {
        Self {
            logger: logger.child("executor"),
            handlers: Arc::new(handlers),
        }
    }

    pub fn operations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let Some(handler) = self.handlers.get(name) else {
            return Err(unknown_tool_error(name, &self.operations()));
        };

        let trace_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        self.logger.debug(
            "tool call started",
            Some(&serde_json::json!({ "tool": name, "trace_id": trace_id })),
        );

        let result = handler.handle(name, args).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => self.logger.info(
                "tool call finished",
                Some(&serde_json::json!({
                    "tool": name,
                    "trace_id": trace_id,
                    "duration_ms": duration_ms,
                })),
            ),
            Err(err) => self.logger.warn(
                "tool call failed",
                Some(&serde_json::json!({
                    "tool": name,
                    "trace_id": trace_id,
                    "duration_ms": duration_ms,
                    "kind": err.kind,
                    "error": err.message,
                })),
            ),
        }
        result
    }
}
