use reqwest::Client;
use serde::Deserialize;
use waymark_core::{ClientError, LatLng, PlacesResult, Venue};

use crate::PlacesApi;

const TEXT_SEARCH_URL: &str = "https://maps.googleapis.com/maps/api/place/textsearch/json";
const BIAS_RADIUS_METERS: &str = "100";

#[derive(Clone)]
pub struct GooglePlacesClient {
    http: Client,
    api_key: String,
}

impl GooglePlacesClient {
    pub fn new(http: Client, api_key: String) -> Self {
        Self { http, api_key }
    }
}

impl PlacesApi for GooglePlacesClient {
    async fn search(
        &self,
        query: &str,
        location_bias: Option<&str>,
    ) -> Result<PlacesResult, ClientError> {
        let mut params = vec![("query", query), ("key", self.api_key.as_str())];
        if let Some(bias) = location_bias {
            params.push(("location", bias));
            params.push(("radius", BIAS_RADIUS_METERS));
        }

        let response = self
            .http
            .get(TEXT_SEARCH_URL)
            .query(&params)
            .send()
            .await
            .map_err(|error| ClientError::Upstream {
                service: "places",
                detail: error.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ClientError::Upstream {
                service: "places",
                detail: error.to_string(),
            })?;

        if !status.is_success() {
            return Err(ClientError::Upstream {
                service: "places",
                detail: format!("http {}: {}", status.as_u16(), body),
            });
        }

        let parsed: PlacesResponse =
            serde_json::from_str(&body).map_err(|error| ClientError::Parse {
                service: "places",
                detail: error.to_string(),
            })?;

        collect(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    results: Vec<WirePlace>,
    status: String,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePlace {
    place_id: String,
    name: String,
    #[serde(default)]
    formatted_address: String,
    geometry: WireGeometry,
    #[serde(default)]
    rating: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct WireGeometry {
    location: LatLng,
}

// "ZERO_RESULTS" is a successful search that found nothing.
fn collect(parsed: PlacesResponse) -> Result<PlacesResult, ClientError> {
    if parsed.status != "OK" && parsed.status != "ZERO_RESULTS" {
        return Err(ClientError::Upstream {
            service: "places",
            detail: format!(
                "status '{}': {}",
                parsed.status,
                parsed.error_message.unwrap_or_default()
            ),
        });
    }

    let results = parsed
        .results
        .into_iter()
        .map(|place| Venue {
            place_id: place.place_id,
            name: place.name,
            formatted_address: place.formatted_address,
            location: place.geometry.location,
            rating: place.rating,
        })
        .collect();

    Ok(PlacesResult {
        status: parsed.status,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_venues_from_ok_response() {
        let parsed: PlacesResponse = serde_json::from_str(
            r#"{
              "results": [{
                "place_id": "ChIJ123",
                "name": "Cimol Gedebage",
                "formatted_address": "Jl. Braga No.1, Bandung",
                "geometry": { "location": { "lat": -6.91, "lng": 107.6 } },
                "rating": 4.4
              }],
              "status": "OK"
            }"#,
        )
        .unwrap();

        let result = collect(parsed).unwrap();
        assert_eq!(result.status, "OK");
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0].name, "Cimol Gedebage");
        assert_eq!(result.results[0].rating, Some(4.4));
    }

    #[test]
    fn zero_results_is_success_with_empty_list() {
        let parsed: PlacesResponse =
            serde_json::from_str(r#"{ "results": [], "status": "ZERO_RESULTS" }"#).unwrap();
        let result = collect(parsed).unwrap();
        assert_eq!(result.status, "ZERO_RESULTS");
        assert!(result.results.is_empty());
    }

    #[test]
    fn denied_status_is_upstream_error() {
        let parsed: PlacesResponse = serde_json::from_str(
            r#"{ "results": [], "status": "REQUEST_DENIED", "error_message": "bad key" }"#,
        )
        .unwrap();
        assert!(matches!(
            collect(parsed),
            Err(ClientError::Upstream { service: "places", .. })
        ));
    }
}
