use crate::constants::api;
use crate::errors::ToolError;
use crate::services::config::BexioConfig;
use crate::services::logger::Logger;
use crate::utils::data_path;
use crate::utils::merge::overlay;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;

/// The six entity collections this server fronts, plus the fixed path,
/// argument-key and payload-key vocabulary attached to each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Contact,
    Invoice,
    Quote,
    Order,
    Project,
    Item,
}

/// Body shape the kind's search endpoint accepts. Invoices and quotes are
/// inconsistent upstream and get the full fallback ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchShape {
    BareCriteria,
    Enveloped,
    Laddered,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Contact,
        EntityKind::Invoice,
        EntityKind::Quote,
        EntityKind::Order,
        EntityKind::Project,
        EntityKind::Item,
    ];

    pub fn endpoint(self) -> &'static str {
        match self {
            EntityKind::Contact => "/contact",
            EntityKind::Invoice => "/kb_invoice",
            EntityKind::Quote => "/kb_offer",
            EntityKind::Order => "/kb_order",
            EntityKind::Project => "/pr_project",
            EntityKind::Item => "/article",
        }
    }

    pub fn noun(self) -> &'static str {
        match self {
            EntityKind::Contact => "contact",
            EntityKind::Invoice => "invoice",
            EntityKind::Quote => "quote",
            EntityKind::Order => "order",
            EntityKind::Project => "project",
            EntityKind::Item => "item",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            EntityKind::Contact => "contacts",
            EntityKind::Invoice => "invoices",
            EntityKind::Quote => "quotes",
            EntityKind::Order => "orders",
            EntityKind::Project => "projects",
            EntityKind::Item => "items",
        }
    }

    pub fn id_key(self) -> &'static str {
        match self {
            EntityKind::Contact => "contact_id",
            EntityKind::Invoice => "invoice_id",
            EntityKind::Quote => "quote_id",
            EntityKind::Order => "order_id",
            EntityKind::Project => "project_id",
            EntityKind::Item => "item_id",
        }
    }

    pub fn data_key(self) -> &'static str {
        match self {
            EntityKind::Contact => "contact_data",
            EntityKind::Invoice => "invoice_data",
            EntityKind::Quote => "quote_data",
            EntityKind::Order => "order_data",
            EntityKind::Project => "project_data",
            EntityKind::Item => "item_data",
        }
    }

    fn search_shape(self) -> SearchShape {
        match self {
            EntityKind::Contact => SearchShape::BareCriteria,
            EntityKind::Invoice | EntityKind::Quote => SearchShape::Laddered,
            EntityKind::Order | EntityKind::Project | EntityKind::Item => SearchShape::Enveloped,
        }
    }
}

/// Optional list parameters; omitted ones are not sent, so server-side
/// defaults apply.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order_by: Option<String>,
}

impl ListQuery {
    pub fn with_limit(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset", offset.to_string()));
        }
        if let Some(order_by) = &self.order_by {
            params.push(("order_by", order_by.clone()));
        }
        params
    }
}

/// Single point of HTTP interaction with the upstream API. Owns the session,
/// builds absolute URLs, and normalizes every failure into a `ToolError`.
pub struct BexioClient {
    logger: Logger,
    http: Client,
    base_url: String,
}

impl BexioClient {
    pub fn new(config: &BexioConfig, logger: Logger) -> Result<Self, ToolError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.access_token))
            .map_err(|_| ToolError::config("Access token contains characters not valid in a header"))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .user_agent(api::USER_AGENT)
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|err| ToolError::internal(format!("Failed to build HTTP client: {}", err)))?;

        Ok(Self {
            logger: logger.child("client"),
            http,
            base_url: config.base_url.clone(),
        })
    }

    /// Append the endpoint to the configured base without re-resolving the
    /// path, so the version prefix in the base URL survives.
    async fn request(
        &self,
        method: Method,
        path: &str,
        params: Option<&[(&'static str, String)]>,
        body: Option<&Value>,
    ) -> Result<Value, ToolError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(params) = params {
            request = request.query(params);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                ToolError::timeout("Bexio request timed out")
            } else {
                ToolError::upstream(format!("Bexio request failed: {}", err))
            }
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let parsed: Option<Value> = serde_json::from_str(&text).ok();
        self.logger.debug(
            &format!("{} {} -> {}", method, path, status.as_u16()),
            None,
        );

        if !status.is_success() {
            let detail = parsed
                .as_ref()
                .and_then(upstream_error_detail)
                .unwrap_or_else(|| text.trim().to_string());
            let message = if detail.is_empty() {
                format!("Bexio API error (HTTP {})", status.as_u16())
            } else {
                format!("Bexio API error (HTTP {}): {}", status.as_u16(), detail)
            };
            return Err(ToolError::from_upstream_status(status.as_u16(), message));
        }

        Ok(parsed.unwrap_or(Value::Null))
    }

    pub async fn list(&self, kind: EntityKind, query: &ListQuery) -> Result<Vec<Value>, ToolError> {
        let params = query.to_params();
        let value = self
            .request(Method::GET, kind.endpoint(), Some(&params), None)
            .await?;
        expect_entity_list(kind, value)
    }

    pub async fn get(&self, kind: EntityKind, id: i64) -> Result<Value, ToolError> {
        self.request(
            Method::GET,
            &format!("{}/{}", kind.endpoint(), id),
            None,
            None,
        )
        .await
    }

    pub async fn create(&self, kind: EntityKind, payload: Value) -> Result<Value, ToolError> {
        let payload = match kind {
            EntityKind::Contact => normalize_contact_fields(payload),
            EntityKind::Invoice => {
                ensure_invoice_payload(&payload)?;
                payload
            }
            _ => payload,
        };
        self.request(Method::POST, kind.endpoint(), None, Some(&payload))
            .await
    }

    pub async fn update(
        &self,
        kind: EntityKind,
        id: i64,
        payload: Value,
    ) -> Result<Value, ToolError> {
        let path = format!("{}/{}", kind.endpoint(), id);
        if kind != EntityKind::Contact {
            return self.request(Method::PUT, &path, None, Some(&payload)).await;
        }

        // The upstream contact PUT expects the full required-field set, not a
        // delta. Merge the caller's fields over the current entity; if the
        // fetch fails, send the caller's fields unmerged instead of refusing.
        let payload = normalize_contact_fields(payload);
        let body = match self.get(kind, id).await {
            Ok(existing) => overlay(&existing, &payload),
            Err(err) => {
                self.logger.warn(
                    "contact fetch-then-merge failed, sending caller fields unmerged",
                    Some(&serde_json::json!({ "contact_id": id, "error": err.message })),
                );
                payload
            }
        };
        self.request(Method::PUT, &path, None, Some(&body)).await
    }

    pub async fn delete(&self, kind: EntityKind, id: i64) -> Result<Value, ToolError> {
        let value = self
            .request(
                Method::DELETE,
                &format!("{}/{}", kind.endpoint(), id),
                None,
                None,
            )
            .await?;
        if value.is_null() {
            return Ok(serde_json::json!({ "success": true }));
        }
        Ok(value)
    }

    pub async fn search(
        &self,
        kind: EntityKind,
        criteria: &[Value],
    ) -> Result<Vec<Value>, ToolError> {
        let path = format!("{}/search", kind.endpoint());
        match kind.search_shape() {
            SearchShape::BareCriteria => {
                let body = Value::Array(criteria.to_vec());
                let value = self.request(Method::POST, &path, None, Some(&body)).await?;
                expect_entity_list(kind, value)
            }
            SearchShape::Enveloped => {
                let body = serde_json::json!({ "criteria": criteria });
                let value = self.request(Method::POST, &path, None, Some(&body)).await?;
                expect_entity_list(kind, value)
            }
            SearchShape::Laddered => self.search_with_fallbacks(kind, &path, criteria).await,
        }
    }

    /// Three-rung ladder for endpoints with inconsistent schema acceptance:
    /// bare criteria, then the `{criteria: [...]}` envelope, then a bounded
    /// `list` batch filtered client-side.
    async fn search_with_fallbacks(
        &self,
        kind: EntityKind,
        path: &str,
        criteria: &[Value],
    ) -> Result<Vec<Value>, ToolError> {
        let bare = Value::Array(criteria.to_vec());
        let first = match self
            .request(Method::POST, path, None, Some(&bare))
            .await
            .and_then(|value| expect_entity_list(kind, value))
        {
            Ok(hits) => return Ok(hits),
            Err(err) => err,
        };
        self.logger.debug(
            &format!("{} search rejected bare criteria, retrying enveloped", kind.noun()),
            Some(&serde_json::json!({ "error": first.message })),
        );

        let enveloped = serde_json::json!({ "criteria": criteria });
        let second = match self
            .request(Method::POST, path, None, Some(&enveloped))
            .await
            .and_then(|value| expect_entity_list(kind, value))
        {
            Ok(hits) => return Ok(hits),
            Err(err) => err,
        };
        self.logger.warn(
            &format!(
                "{} search unavailable, filtering a {}-record batch client-side",
                kind.noun(),
                api::SEARCH_FALLBACK_LIMIT
            ),
            Some(&serde_json::json!({ "error": second.message })),
        );

        let batch = self
            .list(kind, &ListQuery::with_limit(api::SEARCH_FALLBACK_LIMIT))
            .await?;
        Ok(filter_by_criteria(&batch, criteria))
    }

    pub async fn list_taxes(&self) -> Result<Vec<Value>, ToolError> {
        let value = self.request(Method::GET, "/tax", None, None).await?;
        match value {
            Value::Array(taxes) => Ok(taxes),
            other => Err(ToolError::upstream(format!(
                "Expected a list of taxes from Bexio, got {}",
                value_kind(&other)
            ))),
        }
    }
}

/// Invoice creation is pre-validated locally: a missing contact reference or
/// an empty positions array is a guaranteed upstream rejection, so fail
/// before the round trip with guidance on the expected shape.
pub fn ensure_invoice_payload(payload: &Value) -> Result<(), ToolError> {
    let mut problems = Vec::new();
    if !has_usable_value(payload.get("contact_id")) {
        problems.push("contact_id (the contact the invoice is billed to)");
    }
    let has_positions = payload
        .get("positions")
        .and_then(|v| v.as_array())
        .map(|items| !items.is_empty())
        .unwrap_or(false);
    if !has_positions {
        problems.push("positions (at least one line item)");
    }
    if problems.is_empty() {
        return Ok(());
    }
    Err(
        ToolError::invalid_params(format!("Invoice requires {}", problems.join(" and ")))
            .with_hint(
                "Provide positions like [{\"type\": \"KbPositionCustom\", \"text\": \"Item description\", \"amount\": 1, \"unit_price\": 10.0}].",
            ),
    )
}

fn has_usable_value(value: Option<&Value>) -> bool {
    match value {
        None => false,
        Some(Value::Null) => false,
        Some(Value::Number(n)) => n.as_i64() != Some(0),
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Callers frequently say `email`; the upstream contact schema says `mail`.
/// An explicit `mail` value always wins.
pub fn normalize_contact_fields(payload: Value) -> Value {
    let Value::Object(mut map) = payload else {
        return payload;
    };
    if map.contains_key("email") && !map.contains_key("mail") {
        if let Some(email) = map.remove("email") {
            map.insert("mail".to_string(), email);
        }
    }
    Value::Object(map)
}

/// A record matches when every criterion matches. Unknown operators fail
/// closed: the criterion never matches, the record is excluded.
pub fn filter_by_criteria(records: &[Value], criteria: &[Value]) -> Vec<Value> {
    records
        .iter()
        .filter(|record| criteria.iter().all(|c| matches_criterion(record, c)))
        .cloned()
        .collect()
}

fn matches_criterion(record: &Value, criterion: &Value) -> bool {
    let Some(field) = criterion.get("field").and_then(|v| v.as_str()) else {
        return false;
    };
    let operator = criterion
        .get("criteria")
        .and_then(|v| v.as_str())
        .unwrap_or("=")
        .trim()
        .to_lowercase();
    let expected = criterion.get("value").unwrap_or(&Value::Null);
    let Some(actual) = data_path::lookup(record, field) else {
        return false;
    };
    if actual.is_null() {
        return false;
    }
    match operator.as_str() {
        "=" => render(actual) == render(expected),
        "like" => {
            if expected.is_null() {
                return false;
            }
            render(actual)
                .to_lowercase()
                .contains(&render(expected).to_lowercase())
        }
        _ => false,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn expect_entity_list(kind: EntityKind, value: Value) -> Result<Vec<Value>, ToolError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(ToolError::upstream(format!(
            "Expected a list of {} from Bexio, got {}",
            kind.plural(),
            value_kind(&other)
        ))),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn upstream_error_detail(body: &Value) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(message) = ["message", "error", "detail"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
    {
        parts.push(message.to_string());
    }
    if let Some(errors) = body.get("errors").filter(|v| !v.is_null()) {
        parts.push(format!("errors: {}", errors));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_kind_keeps_its_version_safe_endpoint() {
        assert_eq!(EntityKind::Contact.endpoint(), "/contact");
        assert_eq!(EntityKind::Invoice.endpoint(), "/kb_invoice");
        assert_eq!(EntityKind::Quote.endpoint(), "/kb_offer");
        assert_eq!(EntityKind::Order.endpoint(), "/kb_order");
        assert_eq!(EntityKind::Project.endpoint(), "/pr_project");
        assert_eq!(EntityKind::Item.endpoint(), "/article");
    }

    #[test]
    fn list_query_omits_absent_parameters() {
        let query = ListQuery {
            limit: Some(50),
            offset: None,
            order_by: None,
        };
        assert_eq!(query.to_params(), vec![("limit", "50".to_string())]);
        assert!(ListQuery::default().to_params().is_empty());
    }

    #[test]
    fn empty_invoice_payload_names_both_missing_pieces() {
        let err = ensure_invoice_payload(&json!({})).unwrap_err();
        assert!(err.message.contains("contact_id"));
        assert!(err.message.contains("positions"));
    }

    #[test]
    fn invoice_with_contact_and_positions_passes_pre_validation() {
        let payload = json!({
            "contact_id": 42,
            "positions": [{"text": "Consulting"}],
        });
        assert!(ensure_invoice_payload(&payload).is_ok());
    }

    #[test]
    fn empty_positions_array_fails_pre_validation() {
        let err = ensure_invoice_payload(&json!({"contact_id": 42, "positions": []})).unwrap_err();
        assert!(err.message.contains("positions"));
        assert!(!err.message.contains("contact_id ("));
    }

    #[test]
    fn email_alias_is_rewritten_unless_mail_is_set() {
        let rewritten = normalize_contact_fields(json!({"email": "a@b.ch"}));
        assert_eq!(rewritten, json!({"mail": "a@b.ch"}));

        let kept = normalize_contact_fields(json!({"email": "a@b.ch", "mail": "c@d.ch"}));
        assert_eq!(kept.get("mail"), Some(&json!("c@d.ch")));
        assert_eq!(kept.get("email"), Some(&json!("a@b.ch")));
    }

    fn sample_records() -> Vec<Value> {
        vec![
            json!({"id": 1, "name_1": "Acme Industries", "address": {"city": "Zürich"}}),
            json!({"id": 2, "name_1": "Globex", "address": null}),
            json!({"id": 3, "name_1": "acme gmbh"}),
        ]
    }

    #[test]
    fn like_matching_is_case_insensitive_substring() {
        let criteria = vec![json!({"field": "name_1", "value": "Acme", "criteria": "like"})];
        let hits = filter_by_criteria(&sample_records(), &criteria);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn equality_compares_rendered_values() {
        let criteria = vec![json!({"field": "id", "value": "2", "criteria": "="})];
        let hits = filter_by_criteria(&sample_records(), &criteria);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].get("name_1"), Some(&json!("Globex")));
    }

    #[test]
    fn dotted_paths_traverse_nested_mappings_only() {
        let criteria = vec![json!({"field": "address.city", "value": "Zürich", "criteria": "="})];
        let hits = filter_by_criteria(&sample_records(), &criteria);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].get("id"), Some(&json!(1)));
    }

    #[test]
    fn unknown_operators_exclude_every_record() {
        let criteria =
            vec![json!({"field": "name_1", "value": "Acme", "criteria": "contains_exact"})];
        assert!(filter_by_criteria(&sample_records(), &criteria).is_empty());
    }

    #[test]
    fn all_criteria_must_match() {
        let criteria = vec![
            json!({"field": "name_1", "value": "acme", "criteria": "like"}),
            json!({"field": "address.city", "value": "Zürich", "criteria": "="}),
        ];
        let hits = filter_by_criteria(&sample_records(), &criteria);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].get("id"), Some(&json!(1)));
    }

    #[test]
    fn criterion_without_field_never_matches() {
        let criteria = vec![json!({"value": "Acme", "criteria": "like"})];
        assert!(filter_by_criteria(&sample_records(), &criteria).is_empty());
    }

    #[test]
    fn upstream_detail_prefers_message_and_appends_field_errors() {
        let body = json!({"message": "Validation failed", "errors": ["name_1 is required"]});
        assert_eq!(
            upstream_error_detail(&body),
            Some("Validation failed | errors: [\"name_1 is required\"]".to_string())
        );
        assert_eq!(upstream_error_detail(&json!({"other": 1})), None);
    }
}
