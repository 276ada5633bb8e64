use crate::errors::ToolError;
use crate::utils::suggest::suggest;

pub fn unknown_tool_error(name: &str, known: &[String]) -> ToolError {
    let suggestions = suggest(name, known, 3);
    let mut err = ToolError::invalid_params(format!("Unknown tool: {}", name));
    if !suggestions.is_empty() {
        err = err.with_hint(format!("Did you mean: {}?", suggestions.join(", ")));
    }
    err.with_details(serde_json::json!({ "known_tools": known }))
}
