use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use waymark_core::TripQuery;
use waymark_observability::{init_tracing, AppMetrics};
use waymark_planner::TripPlanner;
use waymark_storage::{seed, Store};
use waymark_upstream::{
    GoogleDirectionsClient, GooglePlacesClient, VertexConfig, VertexIntentExtractor,
};

#[derive(Debug, Parser)]
#[command(name = "waymark")]
#[command(about = "Waymark maintenance and trip-planning CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ensure the default accounts, categories and tags exist.
    Seed,
    /// Plan a trip from a free-text query, printing the plan as JSON.
    PlanTrip {
        #[arg(long)]
        query: String,
        #[arg(long)]
        origin: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("waymark_cli");
    let cli = Cli::parse();

    match cli.command {
        Command::Seed => {
            let store = open_store().await?;
            seed::run_all(&store).await?;
            println!("seed data ensured");
        }
        Command::PlanTrip { query, origin } => {
            let planner = build_planner()?;
            let plan = planner
                .plan_trip(&TripQuery { query, origin })
                .await
                .context("trip planning failed")?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
    }

    Ok(())
}

async fn open_store() -> Result<Store> {
    match env::var("WAYMARK_DATABASE_URL") {
        Ok(database_url) => Store::sqlite(&database_url).await,
        Err(_) => Ok(Store::memory()),
    }
}

fn build_planner(
) -> Result<TripPlanner<VertexIntentExtractor, GoogleDirectionsClient, GooglePlacesClient>> {
    let Ok(maps_api_key) = env::var("WAYMARK_MAPS_API_KEY") else {
        bail!("WAYMARK_MAPS_API_KEY is required for trip planning");
    };
    let (Ok(project_id), Ok(access_token)) = (
        env::var("WAYMARK_VERTEX_PROJECT_ID"),
        env::var("WAYMARK_VERTEX_ACCESS_TOKEN"),
    ) else {
        bail!("WAYMARK_VERTEX_PROJECT_ID and WAYMARK_VERTEX_ACCESS_TOKEN are required");
    };

    let http_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(6))
        .timeout(Duration::from_secs(20))
        .build()
        .context("failed to build HTTP client")?;

    let extractor = VertexIntentExtractor::new(
        http_client.clone(),
        VertexConfig {
            project_id,
            location: env::var("WAYMARK_VERTEX_LOCATION")
                .unwrap_or_else(|_| "us-central1".to_string()),
            access_token,
        },
    )
    .context("invalid vertex configuration")?;

    Ok(TripPlanner::new(
        extractor,
        GoogleDirectionsClient::new(http_client.clone(), maps_api_key.clone()),
        GooglePlacesClient::new(http_client, maps_api_key),
        AppMetrics::shared(),
    ))
}
