use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use waymark_core::{parse_extracted_intent, ClientError, ExtractedIntent};

use crate::IntentExtractor;

const MODEL_ID: &str = "gemini-2.0-flash-001";

/// Vertex AI project/location identifiers plus the bearer token minted from the
/// ambient service credential. All three are required; absence surfaces as a
/// configuration error when the extractor is built.
#[derive(Debug, Clone)]
pub struct VertexConfig {
    pub project_id: String,
    pub location: String,
    pub access_token: String,
}

impl VertexConfig {
    pub fn validate(&self) -> Result<(), ClientError> {
        for (name, value) in [
            ("project id", &self.project_id),
            ("location", &self.location),
            ("access token", &self.access_token),
        ] {
            if value.trim().is_empty() {
                return Err(ClientError::Configuration(format!(
                    "vertex {name} is empty"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct VertexIntentExtractor {
    http: Client,
    config: VertexConfig,
}

impl VertexIntentExtractor {
    pub fn new(http: Client, config: VertexConfig) -> Result<Self, ClientError> {
        config.validate()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{proj}/locations/{loc}/publishers/google/models/{model}:generateContent",
            loc = self.config.location,
            proj = self.config.project_id,
            model = MODEL_ID,
        )
    }
}

impl IntentExtractor for VertexIntentExtractor {
    async fn extract(&self, sentence: &str) -> Result<ExtractedIntent, ClientError> {
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": build_prompt(sentence) }]
            }]
        });

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|error| ClientError::Upstream {
                service: "intent extractor",
                detail: error.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ClientError::Upstream {
                service: "intent extractor",
                detail: error.to_string(),
            })?;

        if !status.is_success() {
            return Err(ClientError::Upstream {
                service: "intent extractor",
                detail: format!("http {}: {}", status.as_u16(), body),
            });
        }

        let text = candidate_text(&body)?;
        parse_extracted_intent(&text)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

fn candidate_text(body: &str) -> Result<String, ClientError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|error| ClientError::Parse {
            service: "intent extractor",
            detail: error.to_string(),
        })?;

    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content.parts.into_iter().next())
        .map(|part| part.text)
        .ok_or_else(|| ClientError::Parse {
            service: "intent extractor",
            detail: "response contained no candidates".to_string(),
        })
}

/// Fixed instructional prompt with few-shot examples pinning the output shape.
/// The travel-mode inference rules ride along from the source prompt even
/// though nothing downstream consumes the field yet.
fn build_prompt(sentence: &str) -> String {
    format!(
        r#"Extract and infer trip-planning information from the sentence below into strict JSON.
Sentence: "{sentence}"

Rules:
1. "destination": the specific destination place name. Include the city or country when possible.
2. "travel_mode": object describing how the user travels.
   - "mode": infer with this priority:
     a. Explicit: "mobil" means "driving"; "motor", "motoran" or "touring" means "motorcycle".
     b. Implicit: phrases that strongly indicate a motorcycle in an Indonesian context, such as "lewat jalan tikus", "cari rute alternatif cepat", "selap-selip" or "hindari ganjil-genap", mean "motorcycle" even when the word is absent.
     c. Default: "driving" when there is no hint either way.
   - "preferences": array of route preferences, e.g. "jangan lewat tol" becomes "avoid_tolls", "hindari jalan raya" becomes "avoid_highways".
3. "stops_along_the_way": array of foods, drinks or short activities wanted during the ride.
4. "return_trip_plan": string describing the plan for the way back.
5. Use empty values ("", [], {{}}) for anything not found.

---
Example 1
Sentence: "Rute motoran ke Puncak, tapi jangan lewat tol ya."
Output JSON:
{{
  "destination": "Puncak, Bogor, Indonesia",
  "travel_mode": {{ "mode": "motorcycle", "preferences": ["avoid_tolls"] }},
  "stops_along_the_way": [],
  "return_trip_plan": ""
}}
---
Example 2
Sentence: "Mau ke Kota Tua dari Bekasi, cariin jalan tikus dong biar cepet nyampe."
Output JSON:
{{
  "destination": "Kota Tua, Jakarta, Indonesia",
  "travel_mode": {{ "mode": "motorcycle", "preferences": [] }},
  "stops_along_the_way": [],
  "return_trip_plan": ""
}}
---
Example 3
Sentence: "Aku mau ke Jalan Braga Bandung naik mobil, di jalan pengen jajan cimol sama thai tea. Pulangnya mau beli oleh-oleh bolu susu lembang."
Output JSON:
{{
  "destination": "Jalan Braga, Bandung, Indonesia",
  "travel_mode": {{ "mode": "driving", "preferences": [] }},
  "stops_along_the_way": ["cimol", "thai tea"],
  "return_trip_plan": "beli oleh-oleh bolu susu lembang"
}}
---

JSON output:"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_the_sentence() {
        let prompt = build_prompt("Mau ke Kota Tua dari Bekasi");
        assert!(prompt.contains("\"Mau ke Kota Tua dari Bekasi\""));
        assert!(prompt.contains("stops_along_the_way"));
    }

    #[test]
    fn candidate_text_takes_first_part() {
        let body = r#"{
          "candidates": [{
            "content": { "parts": [{ "text": "{\"destination\": \"Lembang\"}" }] }
          }]
        }"#;
        assert_eq!(
            candidate_text(body).unwrap(),
            "{\"destination\": \"Lembang\"}"
        );
    }

    #[test]
    fn empty_candidates_is_parse_error() {
        let error = candidate_text(r#"{ "candidates": [] }"#).unwrap_err();
        assert!(matches!(error, ClientError::Parse { .. }));
    }

    #[test]
    fn blank_config_is_rejected() {
        let config = VertexConfig {
            project_id: "demo".to_string(),
            location: "us-central1".to_string(),
            access_token: "  ".to_string(),
        };
        assert!(matches!(
            config.validate(),
            Err(ClientError::Configuration(_))
        ));
    }
}
