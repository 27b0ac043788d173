//! Valhalla routing engine client
//!
//! Valhalla API documentation:
//! https://valhalla.github.io/valhalla/api/turn-by-turn/api-reference/

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ensure_waypoints, Route, RoutingService};
use crate::services::polyline::{decode_polyline, encode_polyline, ROUTE_PRECISION};
use crate::types::Coordinates;

/// Valhalla client configuration
#[derive(Debug, Clone)]
pub struct ValhallaConfig {
    /// Base URL of Valhalla server (e.g., "http://localhost:8002")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ValhallaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl ValhallaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }
}

/// Valhalla routing client
pub struct ValhallaClient {
    client: Client,
    config: ValhallaConfig,
}

impl ValhallaClient {
    pub fn new(config: ValhallaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Build the truck route request
    fn build_route_request(&self, waypoints: &[Coordinates]) -> RouteRequest {
        RouteRequest {
            locations: waypoints
                .iter()
                .map(|c| ValhallaLocation {
                    lat: c.lat,
                    lon: c.lng,
                    // Geocoded city centroids are often off-road.
                    radius: Some(500),
                })
                .collect(),
            costing: "truck".to_string(),
            units: "kilometers".to_string(),
            directions_type: "none".to_string(),
        }
    }
}

#[async_trait]
impl RoutingService for ValhallaClient {
    async fn route(&self, waypoints: &[Coordinates]) -> Result<Route> {
        ensure_waypoints(waypoints)?;

        let request = self.build_route_request(waypoints);
        let url = format!("{}/route", self.config.base_url);

        debug!("Requesting truck route from Valhalla for {} waypoints", waypoints.len());

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send route request to Valhalla")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Valhalla route returned error {}: {}", status, body);
        }

        let route_response: RouteResponse = response
            .json()
            .await
            .context("Failed to parse Valhalla route response")?;

        route_from_response(route_response)
    }

    fn name(&self) -> &str {
        "Valhalla"
    }
}

/// Sum the trip summary and stitch all leg shapes into one polyline
fn route_from_response(response: RouteResponse) -> Result<Route> {
    let trip = response.trip;
    if trip.legs.is_empty() {
        anyhow::bail!("Valhalla returned a trip without legs");
    }

    let mut shape: Vec<Coordinates> = Vec::new();
    for (i, leg) in trip.legs.iter().enumerate() {
        let leg_points = decode_polyline(&leg.shape, ROUTE_PRECISION)
            .with_context(|| format!("Invalid shape on leg {}", i))?;
        debug!("Leg {} has {} points", i, leg_points.len());

        // Each later leg starts where the previous one ended.
        let skip = usize::from(i > 0 && !shape.is_empty());
        shape.extend(leg_points.into_iter().skip(skip));
    }

    debug!(
        "Valhalla route: {:.1} km, {:.0} s, {} points over {} legs",
        trip.summary.length,
        trip.summary.time,
        shape.len(),
        trip.legs.len()
    );

    Ok(Route {
        distance_m: trip.summary.length * 1000.0,
        duration_s: trip.summary.time,
        polyline: encode_polyline(&shape, ROUTE_PRECISION),
    })
}

// Valhalla API types

#[derive(Debug, Serialize, Clone)]
struct ValhallaLocation {
    lat: f64,
    lon: f64,
    /// Radius in meters for snapping to roads
    #[serde(skip_serializing_if = "Option::is_none")]
    radius: Option<u32>,
}

#[derive(Debug, Serialize)]
struct RouteRequest {
    locations: Vec<ValhallaLocation>,
    costing: String,
    units: String,
    directions_type: String,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    trip: Trip,
}

#[derive(Debug, Deserialize)]
struct Trip {
    summary: TripSummary,
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct TripSummary {
    /// Length in kilometers (when units="kilometers")
    length: f64,
    /// Time in seconds
    time: f64,
}

#[derive(Debug, Deserialize)]
struct Leg {
    /// Encoded polyline shape
    shape: String,
}
