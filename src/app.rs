use crate::errors::ToolError;
use crate::managers::entity::EntityManager;
use crate::mcp::catalog::tool_catalog;
use crate::services::client::{BexioClient, EntityKind};
use crate::services::completion::FieldCompleter;
use crate::services::config::BexioConfig;
use crate::services::logger::Logger;
use crate::services::tool_executor::{ToolExecutor, ToolHandler};
use std::collections::HashMap;
use std::sync::Arc;

/// Composition root: every collaborator is constructed exactly once here
/// and handed down by reference. The HTTP session lives as long as the App
/// and is released when it drops.
pub struct App {
    pub logger: Logger,
    pub executor: Arc<ToolExecutor>,
}

impl App {
    pub fn initialize() -> Result<Self, ToolError> {
        Self::with_config(BexioConfig::from_env()?)
    }

    pub fn with_config(config: BexioConfig) -> Result<Self, ToolError> {
        let logger = Logger::new("bexio");
        let client = Arc::new(BexioClient::new(&config, logger.clone())?);
        let completer = Arc::new(FieldCompleter::new(logger.clone(), client.clone()));

        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        for kind in EntityKind::ALL {
            let manager: Arc<dyn ToolHandler> = Arc::new(EntityManager::new(
                kind,
                logger.clone(),
                client.clone(),
                completer.clone(),
            ));
            for operation in EntityManager::operations(kind) {
                handlers.insert(operation, manager.clone());
            }
        }

        Self::validate_tool_wiring(&handlers)?;

        let executor = Arc::new(ToolExecutor::new(logger.clone(), handlers));
        Ok(Self { logger, executor })
    }

    /// Catch wiring drift at startup instead of at call time: every catalog
    /// tool must resolve to a registered handler.
    fn validate_tool_wiring(
        handlers: &HashMap<String, Arc<dyn ToolHandler>>,
    ) -> Result<(), ToolError> {
        let mut missing: Vec<String> = tool_catalog()
            .iter()
            .filter(|tool| !handlers.contains_key(&tool.name))
            .map(|tool| tool.name.clone())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        Err(ToolError::internal("Tool wiring is incomplete")
            .with_hint("Every tool in tool_catalog.json must resolve to a registered handler.")
            .with_details(serde_json::json!({ "missing_tools": missing })))
    }
}
