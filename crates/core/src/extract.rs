use crate::error::ClientError;
use crate::models::ExtractedIntent;

/// Generative models habitually wrap JSON answers in a markdown fence even when
/// told not to. Peel one layer of ```/```json wrapping if present.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim()
}

/// Parse the model's answer text into an [`ExtractedIntent`]. Missing fields
/// default to empty values; an empty `destination` is valid output here and is
/// the orchestrator's signal that extraction found nothing usable.
pub fn parse_extracted_intent(text: &str) -> Result<ExtractedIntent, ClientError> {
    let payload = strip_code_fences(text);
    serde_json::from_str(payload).map_err(|error| ClientError::Parse {
        service: "intent extractor",
        detail: format!("{error}; text was: {payload}"),
    })
}
