use crate::errors::{ErrorCode, McpError};
use crate::utils::suggest::suggest;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

static TOOL_CATALOG: Lazy<Vec<ToolDef>> = Lazy::new(|| {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tool_catalog.json"));
    serde_json::from_str(raw).expect("tool_catalog.json must be valid JSON")
});

static TOOL_VALIDATORS: Lazy<HashMap<String, JSONSchema>> = Lazy::new(|| {
    TOOL_CATALOG
        .iter()
        .filter_map(|tool| {
            JSONSchema::compile(&tool.input_schema)
                .ok()
                .map(|schema| (tool.name.clone(), schema))
        })
        .collect()
});

pub fn tool_catalog() -> &'static [ToolDef] {
    &TOOL_CATALOG
}

pub fn tool_names() -> Vec<String> {
    TOOL_CATALOG.iter().map(|tool| tool.name.clone()).collect()
}

pub fn tool_by_name(name: &str) -> Option<&'static ToolDef> {
    TOOL_CATALOG.iter().find(|tool| tool.name == name)
}

/// Validate call arguments against the tool's declared schema. Violations
/// are rendered as one short line each; unknown fields get near-miss
/// suggestions against the schema's declared properties.
pub fn validate_tool_args(tool_name: &str, args: &Value) -> Result<(), McpError> {
    let Some(tool) = tool_by_name(tool_name) else {
        return Ok(());
    };
    let Some(schema) = TOOL_VALIDATORS.get(tool_name) else {
        return Ok(());
    };
    let Err(violations) = schema.validate(args) else {
        return Ok(());
    };

    let mut lines = vec![format!("Invalid arguments for {}", tool_name)];
    for violation in violations.take(8) {
        let at = match violation.instance_path.to_string() {
            path if path.is_empty() => "(root)".to_string(),
            path => path,
        };
        match &violation.kind {
            jsonschema::error::ValidationErrorKind::Required { property } => {
                let field = property.as_str().unwrap_or_default();
                lines.push(format!("- {}: missing required field '{}'", at, field));
            }
            jsonschema::error::ValidationErrorKind::AdditionalProperties { unexpected } => {
                let known = declared_properties(&tool.input_schema);
                for field in unexpected {
                    let mut line = format!("- {}: unknown field '{}'", at, field);
                    let near = suggest(field, &known, 2);
                    if !near.is_empty() {
                        line.push_str(&format!(" (did you mean: {}?)", near.join(", ")));
                    }
                    lines.push(line);
                }
            }
            _ => lines.push(format!("- {}: {}", at, violation)),
        }
    }
    Err(McpError::new(ErrorCode::InvalidParams, lines.join("\n")))
}

fn declared_properties(schema: &Value) -> Vec<String> {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn catalog_parses_and_every_schema_compiles() {
        assert!(!tool_catalog().is_empty());
        for tool in tool_catalog() {
            assert!(
                TOOL_VALIDATORS.contains_key(&tool.name),
                "schema for {} must compile",
                tool.name
            );
        }
    }

    #[test]
    fn catalog_covers_crud_and_search_for_all_kinds() {
        let names = tool_names();
        for plural in ["contacts", "invoices", "quotes", "orders", "projects", "items"] {
            assert!(names.contains(&format!("list_{}", plural)), "list_{}", plural);
            assert!(names.contains(&format!("search_{}", plural)), "search_{}", plural);
        }
        for noun in ["contact", "invoice", "quote", "order", "project", "item"] {
            for verb in ["get", "create", "update", "delete"] {
                let name = format!("{}_{}", verb, noun);
                assert!(names.contains(&name), "{}", name);
            }
        }
    }

    #[test]
    fn missing_required_argument_is_reported() {
        let err = validate_tool_args("get_contact", &json!({})).unwrap_err();
        assert!(err.message.contains("contact_id"));
    }

    #[test]
    fn unknown_argument_gets_a_suggestion() {
        let err = validate_tool_args("get_contact", &json!({"contactid": 1})).unwrap_err();
        assert!(err.message.contains("unknown field 'contactid'"));
        assert!(err.message.contains("contact_id"));
    }

    #[test]
    fn extra_fields_inside_entity_data_pass_through() {
        let args = json!({"contact_data": {"name_1": "Acme", "custom_field_7": "kept"}});
        assert!(validate_tool_args("create_contact", &args).is_ok());
    }

    #[test]
    fn unknown_tools_are_not_validated_here() {
        assert!(validate_tool_args("no_such_tool", &json!({})).is_ok());
    }
}
