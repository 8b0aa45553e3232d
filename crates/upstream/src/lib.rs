mod directions;
mod genai;
mod places;

pub use directions::GoogleDirectionsClient;
pub use genai::{VertexConfig, VertexIntentExtractor};
pub use places::GooglePlacesClient;

use waymark_core::{ClientError, ExtractedIntent, PlacesResult, RouteSummary};

/// One routing request: free-form place names or "lat,lng" pairs both work,
/// resolution is delegated upstream.
pub trait DirectionsApi: Send + Sync {
    async fn route(&self, origin: &str, destination: &str) -> Result<RouteSummary, ClientError>;
}

/// One text-search request, optionally biased toward a coordinate.
pub trait PlacesApi: Send + Sync {
    async fn search(
        &self,
        query: &str,
        location_bias: Option<&str>,
    ) -> Result<PlacesResult, ClientError>;
}

/// Turn a free-text trip request into structured fields via a generative call.
pub trait IntentExtractor: Send + Sync {
    async fn extract(&self, sentence: &str) -> Result<ExtractedIntent, ClientError>;
}
