use crate::errors::ToolError;

/// Upstream validation vocabulary. The service reports in German or English
/// depending on the company locale, so both are scanned.
const MISSING_MARKERS: &[&str] = &["missing", "required", "pflichtfeld", "field not set"];
const INVALID_MARKERS: &[&str] = &["invalid", "incorrect", "nicht korrekt", "ungültig"];

/// Rewrite a validation-class error (HTTP 422) into actionable guidance.
/// The upstream diagnostic is always preserved verbatim; any other error
/// passes through unmodified. Never fails.
pub fn explain(err: ToolError) -> ToolError {
    if !err.is_validation() {
        return err;
    }
    let lowered = err.message.to_lowercase();
    let lead_in = if MISSING_MARKERS.iter().any(|m| lowered.contains(m)) {
        "Required fields are missing. Supply them and call the tool again"
    } else if INVALID_MARKERS.iter().any(|m| lowered.contains(m)) {
        "A field value was rejected. Correct it and call the tool again"
    } else {
        "Validation failed"
    };
    let message = format!("{}. Upstream said: {}", lead_in, err.message);
    ToolError {
        message,
        hint: err.hint.clone().or_else(|| {
            Some("The tool description lists which fields are required and which are auto-filled.".to_string())
        }),
        ..err
    }
}
