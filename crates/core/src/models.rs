use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Raw planning input: the user's free-text sentence plus where they start from.
/// `origin` may be a place name or a "lat,lng" pair; resolution is the upstream
/// directions service's problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripQuery {
    pub query: String,
    pub origin: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Location-bias string for place searches: fixed-point "lat,lng" with six
    /// decimals, matching what the directions payload carries.
    pub fn as_bias(&self) -> String {
        format!("{:.6},{:.6}", self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TravelMode {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub preferences: Vec<String>,
}

/// Structured fields pulled out of a free-text trip request by the generative
/// model. An empty `destination` signals extraction failure. `travel_mode` is
/// extracted but nothing downstream consumes it yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedIntent {
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub travel_mode: TravelMode,
    #[serde(default)]
    pub stops_along_the_way: Vec<String>,
    #[serde(default)]
    pub return_trip_plan: String,
}

impl ExtractedIntent {
    pub fn has_destination(&self) -> bool {
        !self.destination.trim().is_empty()
    }

    pub fn return_trip_query(&self) -> Option<&str> {
        let trimmed = self.return_trip_plan.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

/// First route, first leg of a directions response, plus the route's overview
/// geometry. Callers rely on `end_location` being the trip's terminal point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub distance_text: String,
    pub distance_meters: i64,
    pub duration_text: String,
    pub duration_seconds: i64,
    pub start_location: LatLng,
    pub end_location: LatLng,
    pub overview_polyline: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub place_id: String,
    pub name: String,
    pub formatted_address: String,
    pub location: LatLng,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
}

/// One place-search outcome. `status` echoes the upstream status so clients can
/// tell "OK" from "ZERO_RESULTS"; both count as success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacesResult {
    pub status: String,
    pub results: Vec<Venue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedStop {
    pub query: String,
    pub reason: String,
}

/// The sole planning response payload. Nothing here is persisted.
///
/// `suggested_stops` serialises as a JSON object keyed by stop query, in the
/// order the stops were extracted. Stops whose lookup failed are tracked in
/// `skipped_stops` for logs but deliberately absent from the wire, matching the
/// source behavior.
#[derive(Debug, Clone, Serialize)]
pub struct TripPlan {
    pub interpretation: ExtractedIntent,
    pub main_route: RouteSummary,
    #[serde(serialize_with = "serialize_stop_map")]
    pub suggested_stops: Vec<(String, PlacesResult)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_trip_shop: Option<PlacesResult>,
    #[serde(skip_serializing)]
    pub skipped_stops: Vec<SkippedStop>,
}

fn serialize_stop_map<S>(stops: &[(String, PlacesResult)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(stops.len()))?;
    for (query, result) in stops {
        map.serialize_entry(query, result)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bias_uses_six_decimal_fixed_point() {
        let point = LatLng {
            lat: -6.9344694,
            lng: 107.6049539,
        };
        assert_eq!(point.as_bias(), "-6.934469,107.604954");
    }

    #[test]
    fn blank_destination_is_not_a_destination() {
        let intent = ExtractedIntent {
            destination: "   ".to_string(),
            ..ExtractedIntent::default()
        };
        assert!(!intent.has_destination());
    }

    #[test]
    fn empty_return_plan_means_no_return_query() {
        let mut intent = ExtractedIntent::default();
        assert_eq!(intent.return_trip_query(), None);

        intent.return_trip_plan = "beli oleh-oleh bolu susu".to_string();
        assert_eq!(
            intent.return_trip_query(),
            Some("beli oleh-oleh bolu susu")
        );
    }

    #[test]
    fn suggested_stops_serialize_in_insertion_order() {
        let empty = PlacesResult {
            status: "ZERO_RESULTS".to_string(),
            results: Vec::new(),
        };
        let plan = TripPlan {
            interpretation: ExtractedIntent::default(),
            main_route: RouteSummary {
                distance_text: "1 km".to_string(),
                distance_meters: 1000,
                duration_text: "5 mins".to_string(),
                duration_seconds: 300,
                start_location: LatLng { lat: 0.0, lng: 0.0 },
                end_location: LatLng { lat: 0.0, lng: 0.0 },
                overview_polyline: String::new(),
            },
            suggested_stops: vec![
                ("zz last".to_string(), empty.clone()),
                ("aa first".to_string(), empty),
            ],
            return_trip_shop: None,
            skipped_stops: Vec::new(),
        };

        let rendered = serde_json::to_string(&plan).unwrap();
        let zz = rendered.find("zz last").unwrap();
        let aa = rendered.find("aa first").unwrap();
        assert!(zz < aa, "map keys must keep extraction order");
        assert!(!rendered.contains("skipped_stops"));
    }
}
