use reqwest::Client;
use serde::Deserialize;
use waymark_core::{ClientError, LatLng, RouteSummary};

use crate::DirectionsApi;

const DIRECTIONS_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";

#[derive(Clone)]
pub struct GoogleDirectionsClient {
    http: Client,
    api_key: String,
}

impl GoogleDirectionsClient {
    pub fn new(http: Client, api_key: String) -> Self {
        Self { http, api_key }
    }
}

impl DirectionsApi for GoogleDirectionsClient {
    async fn route(&self, origin: &str, destination: &str) -> Result<RouteSummary, ClientError> {
        let response = self
            .http
            .get(DIRECTIONS_URL)
            .query(&[
                ("origin", origin),
                ("destination", destination),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|error| ClientError::Upstream {
                service: "directions",
                detail: error.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ClientError::Upstream {
                service: "directions",
                detail: error.to_string(),
            })?;

        if !status.is_success() {
            return Err(ClientError::Upstream {
                service: "directions",
                detail: format!("http {}: {}", status.as_u16(), body),
            });
        }

        let parsed: DirectionsResponse =
            serde_json::from_str(&body).map_err(|error| ClientError::Parse {
                service: "directions",
                detail: error.to_string(),
            })?;

        summarize(parsed)
    }
}

/// Wire shape of the directions payload, reduced to the fields we read.
#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    routes: Vec<WireRoute>,
    status: String,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireRoute {
    #[serde(default)]
    legs: Vec<WireLeg>,
    overview_polyline: WirePolyline,
}

#[derive(Debug, Deserialize)]
struct WireLeg {
    distance: WireTextValue,
    duration: WireTextValue,
    start_location: LatLng,
    end_location: LatLng,
}

#[derive(Debug, Deserialize)]
struct WireTextValue {
    text: String,
    value: i64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WirePolyline {
    points: String,
}

/// The upstream contract promises at least one route with one leg on "OK", but
/// an "OK" payload with neither has been seen in the wild; treat it as no route
/// rather than index blindly.
fn summarize(parsed: DirectionsResponse) -> Result<RouteSummary, ClientError> {
    if parsed.status != "OK" {
        return Err(ClientError::NoRouteFound {
            status: parsed.status,
            message: parsed.error_message.unwrap_or_default(),
        });
    }

    let route = parsed.routes.first().ok_or_else(|| ClientError::NoRouteFound {
        status: "OK".to_string(),
        message: "response contained no routes".to_string(),
    })?;
    let leg = route.legs.first().ok_or_else(|| ClientError::NoRouteFound {
        status: "OK".to_string(),
        message: "route contained no legs".to_string(),
    })?;

    Ok(RouteSummary {
        distance_text: leg.distance.text.clone(),
        distance_meters: leg.distance.value,
        duration_text: leg.duration.text.clone(),
        duration_seconds: leg.duration.value,
        start_location: leg.start_location,
        end_location: leg.end_location,
        overview_polyline: route.overview_polyline.points.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "routes": [{
        "legs": [{
          "distance": { "text": "148 km", "value": 147573 },
          "duration": { "text": "2 hours 45 mins", "value": 9882 },
          "start_location": { "lat": -6.2382695, "lng": 106.9755726 },
          "end_location": { "lat": -6.9174639, "lng": 107.6191228 }
        }],
        "overview_polyline": { "points": "abc123" }
      }],
      "status": "OK"
    }"#;

    #[test]
    fn summarizes_first_route_first_leg() {
        let parsed: DirectionsResponse = serde_json::from_str(SAMPLE).unwrap();
        let summary = summarize(parsed).unwrap();

        assert_eq!(summary.distance_meters, 147573);
        assert_eq!(summary.duration_seconds, 9882);
        assert_eq!(summary.overview_polyline, "abc123");
        assert_eq!(summary.end_location.lat, -6.9174639);
    }

    #[test]
    fn non_ok_status_is_no_route() {
        let parsed: DirectionsResponse = serde_json::from_str(
            r#"{ "routes": [], "status": "NOT_FOUND", "error_message": "origin unknown" }"#,
        )
        .unwrap();

        match summarize(parsed).unwrap_err() {
            ClientError::NoRouteFound { status, message } => {
                assert_eq!(status, "NOT_FOUND");
                assert_eq!(message, "origin unknown");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn ok_with_empty_routes_is_no_route() {
        let parsed: DirectionsResponse =
            serde_json::from_str(r#"{ "routes": [], "status": "OK" }"#).unwrap();
        assert!(matches!(
            summarize(parsed),
            Err(ClientError::NoRouteFound { .. })
        ));
    }
}
