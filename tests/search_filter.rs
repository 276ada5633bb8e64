use bexio_mcp::services::client::filter_by_criteria;
use serde_json::{json, Value};

fn batch() -> Vec<Value> {
    vec![
        json!({"id": 10, "name_1": "Acme Industries", "address": {"city": "Zürich"}}),
        json!({"id": 11, "name_1": "ACME Export", "address": {"city": "Basel"}}),
        json!({"id": 12, "name_1": "Globex", "address": null}),
        json!({"id": 13, "name_1": "Initech"}),
    ]
}

#[test]
fn like_is_case_insensitive_containment() {
    let criteria = vec![json!({"field": "name_1", "value": "Acme", "criteria": "like"})];
    let hits = filter_by_criteria(&batch(), &criteria);
    let ids: Vec<i64> = hits.iter().filter_map(|h| h["id"].as_i64()).collect();
    assert_eq!(ids, vec![10, 11]);
}

#[test]
fn dotted_path_matches_nested_mappings_and_skips_null_parents() {
    let criteria = vec![json!({"field": "address.city", "value": "Zürich", "criteria": "="})];
    let hits = filter_by_criteria(&batch(), &criteria);
    let ids: Vec<i64> = hits.iter().filter_map(|h| h["id"].as_i64()).collect();
    // id 12 has address null and id 13 lacks address entirely; neither matches
    assert_eq!(ids, vec![10]);
}

#[test]
fn unknown_operator_excludes_every_record() {
    let criteria =
        vec![json!({"field": "name_1", "value": "Acme", "criteria": "contains_exact"})];
    assert!(filter_by_criteria(&batch(), &criteria).is_empty());
}

#[test]
fn conjunction_of_criteria_narrows_the_result() {
    let criteria = vec![
        json!({"field": "name_1", "value": "acme", "criteria": "like"}),
        json!({"field": "address.city", "value": "Basel", "criteria": "="}),
    ];
    let hits = filter_by_criteria(&batch(), &criteria);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"], json!(11));
}

#[test]
fn empty_criteria_match_everything() {
    assert_eq!(filter_by_criteria(&batch(), &[]).len(), 4);
}
