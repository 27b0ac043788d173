//! NATS message handlers

pub mod ping;
pub mod trip;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use crate::services::geocoding::{create_geocoder, Geocoder};
use crate::services::routing::{create_routing_service_with_fallback, RoutingService};
use crate::services::trip_planner::TripPlanner;

pub const SUBJECT_PING: &str = "hos.ping";
pub const SUBJECT_TRIP_PLAN: &str = "hos.trip.plan";
pub const SUBJECT_LOGBOOK_RENDER: &str = "hos.logbook.render";

/// Start all message handlers
pub async fn start_handlers(client: Client, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let geocoder: Arc<dyn Geocoder> = Arc::from(create_geocoder(config)?);
    info!("Geocoder initialized: {}", geocoder.name());

    // Create routing service with automatic Valhalla detection
    let routing_service: Arc<dyn RoutingService> =
        Arc::from(create_routing_service_with_fallback(config.valhalla_url.clone()).await);
    info!("Routing service initialized: {}", routing_service.name());

    let planner = Arc::new(TripPlanner::new(geocoder, routing_service));

    let ping_sub = client.subscribe(SUBJECT_PING).await?;
    let trip_plan_sub = client.subscribe(SUBJECT_TRIP_PLAN).await?;
    let logbook_render_sub = client.subscribe(SUBJECT_LOGBOOK_RENDER).await?;

    info!("Subscribed to NATS subjects");

    let client_ping = client.clone();
    let client_trip_plan = client.clone();
    let client_logbook_render = client.clone();

    let ping_handle = tokio::spawn(async move { ping::handle_ping(client_ping, ping_sub).await });

    let trip_plan_handle = tokio::spawn(async move {
        trip::handle_plan(client_trip_plan, trip_plan_sub, planner).await
    });

    let logbook_render_handle = tokio::spawn(async move {
        trip::handle_logbook(client_logbook_render, logbook_render_sub).await
    });

    info!("All handlers started");

    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = trip_plan_handle => {
            error!("Trip plan handler finished: {:?}", result);
        }
        result = logbook_render_handle => {
            error!("Logbook render handler finished: {:?}", result);
        }
    }

    Ok(())
}
