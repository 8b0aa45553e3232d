use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{info, warn};
use waymark_core::{ClientError, SkippedStop, TripPlan, TripQuery};
use waymark_observability::AppMetrics;
use waymark_upstream::{DirectionsApi, IntentExtractor, PlacesApi};

/// Planning failures, ordered by pipeline stage. Everything after the main
/// route is best-effort and never fails the plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Failed to understand query")]
    Understand(#[source] ClientError),

    #[error("Could not determine a destination from the query.")]
    NoDestination,

    #[error("Failed to get main route")]
    MainRoute(#[source] ClientError),
}

/// Chains intent extraction, routing and per-stop place searches into one
/// response. Stateless apart from metrics; a single instance serves all
/// requests.
pub struct TripPlanner<X, D, P> {
    extractor: X,
    directions: D,
    places: P,
    metrics: Arc<AppMetrics>,
}

impl<X, D, P> TripPlanner<X, D, P>
where
    X: IntentExtractor,
    D: DirectionsApi,
    P: PlacesApi,
{
    pub fn new(extractor: X, directions: D, places: P, metrics: Arc<AppMetrics>) -> Self {
        Self {
            extractor,
            directions,
            places,
            metrics,
        }
    }

    pub async fn plan_trip(&self, query: &TripQuery) -> Result<TripPlan, PlanError> {
        self.metrics.inc_plan_request();
        let started = Instant::now();

        let intent = self
            .extractor
            .extract(&query.query)
            .await
            .map_err(|error| {
                self.metrics.inc_upstream_failure();
                PlanError::Understand(error)
            })?;

        // Without a destination there is nothing to route; no downstream
        // call is attempted.
        if !intent.has_destination() {
            return Err(PlanError::NoDestination);
        }

        let main_route = self
            .directions
            .route(&query.origin, &intent.destination)
            .await
            .map_err(|error| {
                self.metrics.inc_upstream_failure();
                PlanError::MainRoute(error)
            })?;

        // Stop searches are biased toward the trip's terminal point so that
        // "thai tea" means thai tea near the destination, not near the user.
        let bias = main_route.end_location.as_bias();

        let mut suggested_stops = Vec::with_capacity(intent.stops_along_the_way.len());
        let mut skipped_stops = Vec::new();
        for stop in &intent.stops_along_the_way {
            match self.places.search(stop, Some(bias.as_str())).await {
                Ok(result) => suggested_stops.push((stop.clone(), result)),
                Err(error) => {
                    warn!(stop = %stop, error = %error, "stop search failed, skipping");
                    self.metrics.inc_upstream_failure();
                    self.metrics.inc_stop_skipped();
                    skipped_stops.push(SkippedStop {
                        query: stop.clone(),
                        reason: error.to_string(),
                    });
                }
            }
        }

        let return_trip_shop = match intent.return_trip_query() {
            Some(plan) => match self.places.search(plan, Some(bias.as_str())).await {
                Ok(result) => Some(result),
                Err(error) => {
                    warn!(error = %error, "return-trip search failed, omitting");
                    self.metrics.inc_upstream_failure();
                    None
                }
            },
            None => None,
        };

        let elapsed = started.elapsed();
        self.metrics.observe_plan_latency(elapsed);
        info!(
            destination = %intent.destination,
            stops = suggested_stops.len(),
            skipped = skipped_stops.len(),
            elapsed_millis = elapsed.as_millis() as u64,
            "trip planned"
        );

        Ok(TripPlan {
            interpretation: intent,
            main_route,
            suggested_stops,
            return_trip_shop,
            skipped_stops,
        })
    }
}
