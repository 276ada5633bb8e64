use crate::constants::positions as position_defaults;
use crate::errors::ToolError;
use crate::services::client::{BexioClient, EntityKind};
use crate::services::logger::Logger;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

const POSITIONS_FIELD: &str = "positions";

/// How a policy-declared field is treated when the caller leaves it unset.
#[derive(Debug, Clone, PartialEq)]
pub enum Treatment {
    /// Only the caller can supply it; its absence blocks the request.
    Required,
    /// Filled with a fixed safe constant; a caller value always wins.
    Default(Value),
    /// Fetched from the existing entity named by the context id.
    Lookup(EntityKind),
    /// Left unset; the upstream service supplies or tolerates it.
    UpstreamHandled,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub treatment: Treatment,
    pub describe: &'static str,
}

impl FieldSpec {
    fn new(name: &'static str, treatment: Treatment, describe: &'static str) -> Self {
        Self {
            name,
            treatment,
            describe,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OperationPolicy {
    pub operation: &'static str,
    pub data_key: Option<&'static str>,
    pub fields: Vec<FieldSpec>,
}

/// The field policy, declared once. One generic routine consumes it; adding
/// an entity kind means adding rows here, not control flow.
static FIELD_POLICY: Lazy<Vec<OperationPolicy>> = Lazy::new(|| {
    use Treatment::*;
    vec![
        OperationPolicy {
            operation: "create_contact",
            data_key: Some(EntityKind::Contact.data_key()),
            fields: vec![
                FieldSpec::new(
                    "name_1",
                    Required,
                    "Contact name (company name or first name)",
                ),
                FieldSpec::new(
                    "contact_type_id",
                    Default(json!(2)),
                    "Contact type (1=company, 2=person)",
                ),
                FieldSpec::new("user_id", Default(json!(1)), "User id"),
                FieldSpec::new("owner_id", Default(json!(1)), "Owner id"),
            ],
        },
        OperationPolicy {
            operation: "update_contact",
            data_key: Some(EntityKind::Contact.data_key()),
            fields: vec![
                FieldSpec::new("name_1", Lookup(EntityKind::Contact), "Contact name"),
                FieldSpec::new(
                    "contact_type_id",
                    Lookup(EntityKind::Contact),
                    "Contact type",
                ),
                FieldSpec::new(
                    "nr",
                    UpstreamHandled,
                    "Contact number (generated upstream)",
                ),
                FieldSpec::new("user_id", Lookup(EntityKind::Contact), "User id"),
                FieldSpec::new("owner_id", Lookup(EntityKind::Contact), "Owner id"),
            ],
        },
        OperationPolicy {
            operation: "create_invoice",
            data_key: Some(EntityKind::Invoice.data_key()),
            fields: vec![
                FieldSpec::new("contact_id", Required, "Contact the invoice is billed to"),
                FieldSpec::new("user_id", Default(json!(1)), "User id"),
                FieldSpec::new(POSITIONS_FIELD, Required, "Line items array"),
            ],
        },
        OperationPolicy {
            operation: "create_quote",
            data_key: Some(EntityKind::Quote.data_key()),
            fields: vec![
                FieldSpec::new("contact_id", Required, "Contact the quote is addressed to"),
                FieldSpec::new("user_id", Default(json!(1)), "User id"),
                FieldSpec::new(
                    POSITIONS_FIELD,
                    UpstreamHandled,
                    "Line items (optional for quotes)",
                ),
            ],
        },
        OperationPolicy {
            operation: "create_project",
            data_key: Some(EntityKind::Project.data_key()),
            fields: vec![
                FieldSpec::new("name", Required, "Project name"),
                FieldSpec::new("contact_id", Required, "Contact the project belongs to"),
                FieldSpec::new("user_id", Default(json!(1)), "User id"),
                FieldSpec::new("pr_state_id", Default(json!(1)), "Project state (1=active)"),
                FieldSpec::new(
                    "pr_project_type_id",
                    Default(json!(1)),
                    "Project type (1=default)",
                ),
            ],
        },
        OperationPolicy {
            operation: "create_item",
            data_key: Some(EntityKind::Item.data_key()),
            fields: vec![
                FieldSpec::new("intern_name", Required, "Internal item name"),
                FieldSpec::new("user_id", Default(json!(1)), "User id"),
                FieldSpec::new("article_type_id", Default(json!(1)), "Article type (1=default)"),
                FieldSpec::new("currency_id", Default(json!(1)), "Currency (1=CHF)"),
                FieldSpec::new("is_stock", Default(json!(false)), "Stock tracking flag"),
                FieldSpec::new("delivery_price", Default(json!(0)), "Delivery price"),
            ],
        },
    ]
});

pub fn policy_for(operation: &str) -> Option<&'static OperationPolicy> {
    FIELD_POLICY.iter().find(|p| p.operation == operation)
}

/// The narrow Gateway capability the engine depends on: fetch one entity,
/// list the taxes collection. Stubbed in unit tests.
#[async_trait]
pub trait EntityLookup: Send + Sync {
    async fn fetch(&self, kind: EntityKind, id: i64) -> Result<Value, ToolError>;
    async fn taxes(&self) -> Result<Vec<Value>, ToolError>;
}

#[async_trait]
impl EntityLookup for BexioClient {
    async fn fetch(&self, kind: EntityKind, id: i64) -> Result<Value, ToolError> {
        self.get(kind, id).await
    }

    async fn taxes(&self) -> Result<Vec<Value>, ToolError> {
        self.list_taxes().await
    }
}

/// A field completion could not fill, with a human-readable reason.
#[derive(Debug, Clone, Serialize)]
pub struct MissingField {
    pub field: String,
    pub reason: String,
}

impl MissingField {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub fn missing_fields_message(missing: &[MissingField]) -> String {
    if missing.is_empty() {
        return String::new();
    }
    let mut lines = vec!["Missing required fields:".to_string()];
    for entry in missing {
        lines.push(format!("- {}: {}", entry.field, entry.reason));
    }
    lines.push(String::new());
    lines.push("Please provide the missing information and try again.".to_string());
    lines.join("\n")
}

/// Completes caller payloads against the field policy before submission.
/// Never discards caller intent: a supplied non-null value is never
/// overwritten.
pub struct FieldCompleter {
    logger: Logger,
    lookup: Arc<dyn EntityLookup>,
}

impl FieldCompleter {
    pub fn new(logger: Logger, lookup: Arc<dyn EntityLookup>) -> Self {
        Self {
            logger: logger.child("completion"),
            lookup,
        }
    }

    /// Permissive variant used at call time: fields that cannot be filled
    /// stay absent and the upstream response decides.
    pub async fn complete(&self, operation: &str, payload: &Value, context_id: Option<i64>) -> Value {
        self.complete_strict(operation, payload, context_id).await.0
    }

    /// Strict variant: also reports every policy field that still requires
    /// caller input, with a reason per field.
    pub async fn complete_strict(
        &self,
        operation: &str,
        payload: &Value,
        context_id: Option<i64>,
    ) -> (Value, Vec<MissingField>) {
        let Some(policy) = policy_for(operation) else {
            return (payload.clone(), Vec::new());
        };
        let Some(top) = payload.as_object() else {
            return (payload.clone(), Vec::new());
        };
        let mut top = top.clone();

        // Operate on the nested sub-mapping when the operation nests its
        // payload; sibling top-level keys stay untouched.
        let nested_key = policy
            .data_key
            .filter(|key| top.get(*key).map(Value::is_object).unwrap_or(false));
        let mut working: Map<String, Value> = match nested_key {
            Some(key) => top
                .get(key)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            None => top.clone(),
        };

        let mut missing: Vec<MissingField> = Vec::new();
        let mut shared_tax: Option<i64> = None;
        let mut context_entity: Option<Option<Value>> = None;

        for spec in &policy.fields {
            let present = working
                .get(spec.name)
                .map(|v| !v.is_null())
                .unwrap_or(false);
            if present {
                // Positions are re-completed even when present: individual
                // items inside the collection may still be incomplete.
                if spec.name == POSITIONS_FIELD {
                    let current = working[POSITIONS_FIELD].clone();
                    let completed = self.complete_positions(&current, &mut shared_tax).await;
                    working.insert(POSITIONS_FIELD.to_string(), completed);
                }
                continue;
            }

            match &spec.treatment {
                Treatment::Required => {
                    missing.push(MissingField::new(spec.name, spec.describe));
                }
                Treatment::Default(value) => {
                    working.insert(spec.name.to_string(), value.clone());
                }
                Treatment::Lookup(kind) => {
                    let Some(id) = context_id else {
                        missing.push(MissingField::new(
                            spec.name,
                            format!("{} (no {} to look it up from)", spec.describe, kind.id_key()),
                        ));
                        continue;
                    };
                    let entity = match &context_entity {
                        Some(cached) => cached.clone(),
                        None => {
                            let fetched = match self.lookup.fetch(*kind, id).await {
                                Ok(value) => Some(value),
                                Err(err) => {
                                    self.logger.debug(
                                        "context lookup failed",
                                        Some(&json!({
                                            "entity": kind.noun(),
                                            "id": id,
                                            "error": err.message,
                                        })),
                                    );
                                    None
                                }
                            };
                            context_entity = Some(fetched.clone());
                            fetched
                        }
                    };
                    match entity
                        .as_ref()
                        .and_then(|e| e.get(spec.name))
                        .filter(|v| !v.is_null())
                    {
                        Some(value) => {
                            working.insert(spec.name.to_string(), value.clone());
                        }
                        None => missing.push(MissingField::new(
                            spec.name,
                            format!("{} (lookup failed)", spec.describe),
                        )),
                    }
                }
                Treatment::UpstreamHandled => {}
            }
        }

        let completed = match nested_key {
            Some(key) => {
                top.insert(key.to_string(), Value::Object(working));
                Value::Object(top)
            }
            None => Value::Object(working),
        };
        (completed, missing)
    }

    /// Complete each line item independently. The default tax id is resolved
    /// at most once per completion pass and shared by every item that left
    /// it unset, so one call never mixes defaults.
    async fn complete_positions(&self, positions: &Value, shared_tax: &mut Option<i64>) -> Value {
        let Some(items) = positions.as_array() else {
            return positions.clone();
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let Some(map) = item.as_object() else {
                out.push(item.clone());
                continue;
            };
            let mut position = map.clone();
            fill_if_unset(&mut position, "type", json!(position_defaults::DEFAULT_TYPE));
            fill_if_unset(&mut position, "text", json!(position_defaults::DEFAULT_TEXT));
            fill_if_unset(&mut position, "amount", json!(position_defaults::DEFAULT_AMOUNT));
            fill_if_unset(
                &mut position,
                "unit_price",
                json!(position_defaults::DEFAULT_UNIT_PRICE),
            );
            let needs_tax = position.get("tax_id").map(Value::is_null).unwrap_or(true);
            if needs_tax {
                let tax = match *shared_tax {
                    Some(id) => id,
                    None => {
                        let id = self.resolve_default_tax().await;
                        *shared_tax = Some(id);
                        id
                    }
                };
                position.insert("tax_id".to_string(), json!(tax));
            }
            out.push(Value::Object(position));
        }
        Value::Array(out)
    }

    /// Pick a usable default tax: the first active tax with a positive rate,
    /// else the first tax returned, else a fixed constant when the query
    /// itself fails. Not cached across calls — the tax configuration can
    /// change, and one completion pass is the natural staleness boundary.
    pub async fn resolve_default_tax(&self) -> i64 {
        let taxes = match self.lookup.taxes().await {
            Ok(taxes) => taxes,
            Err(err) => {
                self.logger.warn(
                    "tax lookup failed, using the fallback tax id",
                    Some(&json!({ "error": err.message })),
                );
                return position_defaults::FALLBACK_TAX_ID;
            }
        };
        for tax in &taxes {
            let active = tax
                .get("is_active")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            let rate = tax
                .get("percentage")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            if active && rate > 0.0 {
                if let Some(id) = tax.get("id").and_then(Value::as_i64) {
                    return id;
                }
            }
        }
        taxes
            .first()
            .and_then(|tax| tax.get("id"))
            .and_then(Value::as_i64)
            .unwrap_or(position_defaults::FALLBACK_TAX_ID)
    }
}

fn fill_if_unset(position: &mut Map<String, Value>, key: &str, default: Value) {
    let unset = position.get(key).map(Value::is_null).unwrap_or(true);
    if unset {
        position.insert(key.to_string(), default);
    }
}
