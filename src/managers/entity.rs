use crate::errors::ToolError;
use crate::services::client::{BexioClient, EntityKind, ListQuery};
use crate::services::completion::FieldCompleter;
use crate::services::logger::Logger;
use crate::services::tool_executor::ToolHandler;
use crate::utils::explain::explain;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// One tool handler per entity kind, all running the same code: permissive
/// field completion, then the matching Gateway call. Kind-specific quirks
/// (invoice pre-validation, contact merge-update) live in the Gateway, and
/// the field policy is data, so adding a kind adds no control flow here.
pub struct EntityManager {
    kind: EntityKind,
    logger: Logger,
    client: Arc<BexioClient>,
    completer: Arc<FieldCompleter>,
}

impl EntityManager {
    pub fn new(
        kind: EntityKind,
        logger: Logger,
        client: Arc<BexioClient>,
        completer: Arc<FieldCompleter>,
    ) -> Self {
        Self {
            kind,
            logger: logger.child(kind.noun()),
            client,
            completer,
        }
    }

    /// The tool names this kind answers to.
    pub fn operations(kind: EntityKind) -> Vec<String> {
        vec![
            format!("list_{}", kind.plural()),
            format!("get_{}", kind.noun()),
            format!("create_{}", kind.noun()),
            format!("update_{}", kind.noun()),
            format!("delete_{}", kind.noun()),
            format!("search_{}", kind.plural()),
        ]
    }

    fn require_id(&self, args: &Value) -> Result<i64, ToolError> {
        let key = self.kind.id_key();
        args.get(key)
            .and_then(Value::as_i64)
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                ToolError::invalid_params(format!("{} must be a positive integer", key))
            })
    }

    fn require_data(&self, completed: &Value) -> Result<Value, ToolError> {
        let key = self.kind.data_key();
        completed
            .get(key)
            .filter(|v| v.is_object())
            .cloned()
            .ok_or_else(|| {
                ToolError::invalid_params(format!(
                    "Provide the {} fields as an object under '{}'",
                    self.kind.noun(),
                    key
                ))
            })
    }

    async fn list(&self, args: &Value) -> Result<Value, ToolError> {
        let query = parse_list_query(args)?;
        let records = self.client.list(self.kind, &query).await?;
        Ok(Value::Array(records))
    }

    async fn search(&self, args: &Value) -> Result<Value, ToolError> {
        let criteria = args
            .get("criteria")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| {
                ToolError::invalid_params("criteria must be an array").with_hint(
                    "Each criterion is an object with field, value and criteria ('=' or 'like').",
                )
            })?;
        let hits = self.client.search(self.kind, &criteria).await?;
        Ok(Value::Array(hits))
    }
}

#[async_trait]
impl ToolHandler for EntityManager {
    async fn handle(&self, operation: &str, args: Value) -> Result<Value, ToolError> {
        let verb = operation.split('_').next().unwrap_or("");
        let result = match verb {
            "list" => self.list(&args).await,
            "get" => {
                let id = self.require_id(&args)?;
                self.client.get(self.kind, id).await
            }
            "create" => {
                let completed = self.completer.complete(operation, &args, None).await;
                let payload = self.require_data(&completed)?;
                self.client.create(self.kind, payload).await
            }
            "update" => {
                let id = self.require_id(&args)?;
                let completed = self.completer.complete(operation, &args, Some(id)).await;
                let payload = self.require_data(&completed)?;
                self.client.update(self.kind, id, payload).await
            }
            "delete" => {
                let id = self.require_id(&args)?;
                self.client.delete(self.kind, id).await
            }
            "search" => self.search(&args).await,
            _ => {
                self.logger.error(
                    "operation routed to the wrong handler",
                    Some(&serde_json::json!({ "operation": operation })),
                );
                Err(ToolError::internal(format!(
                    "Operation '{}' is not wired to the {} handler",
                    operation,
                    self.kind.noun()
                )))
            }
        };
        result.map_err(explain)
    }
}

fn parse_list_query(args: &Value) -> Result<ListQuery, ToolError> {
    let mut query = ListQuery::default();
    for (key, slot) in [("limit", &mut query.limit), ("offset", &mut query.offset)] {
        match args.get(key) {
            None | Some(Value::Null) => {}
            Some(value) => {
                *slot = Some(value.as_u64().ok_or_else(|| {
                    ToolError::invalid_params(format!("{} must be a non-negative integer", key))
                })?);
            }
        }
    }
    match args.get("order_by") {
        None | Some(Value::Null) => {}
        Some(value) => {
            let order_by = value
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ToolError::invalid_params("order_by must be a non-empty string"))?;
            query.order_by = Some(order_by.to_string());
        }
    }
    Ok(query)
}
