//! Routing service for trip distance, duration and geometry
//!
//! Uses Valhalla for production, mock for tests.

mod valhalla;

pub use valhalla::{ValhallaClient, ValhallaConfig};

use anyhow::Result;
use async_trait::async_trait;

use crate::services::geo::{haversine_distance, AVERAGE_SPEED_KMH, MILES_PER_METER, ROAD_COEFFICIENT};
use crate::services::polyline::{encode_polyline, ROUTE_PRECISION};
use crate::types::Coordinates;

/// A driving route through an ordered list of waypoints
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Total distance in meters
    pub distance_m: f64,
    /// Total driving time in seconds
    pub duration_s: f64,
    /// Encoded polyline, precision 6
    pub polyline: String,
}

impl Route {
    pub fn distance_miles(&self) -> f64 {
        self.distance_m * MILES_PER_METER
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_s / 3600.0
    }
}

/// Routing service trait for abstraction (Valhalla, mock, etc.)
#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Route through `waypoints` in order. At least two are required.
    async fn route(&self, waypoints: &[Coordinates]) -> Result<Route>;

    /// Get service name for logging
    fn name(&self) -> &str;
}

fn ensure_waypoints(waypoints: &[Coordinates]) -> Result<()> {
    if waypoints.len() < 2 {
        anyhow::bail!("Need at least 2 waypoints, got {}", waypoints.len());
    }
    Ok(())
}

/// Mock routing service for tests
/// Uses Haversine distance × coefficient for estimation
pub struct MockRoutingService {
    /// Coefficient for converting straight-line to road distance (default: 1.3)
    road_coefficient: f64,
    /// Average speed in km/h for time estimation (default: 80)
    average_speed_kmh: f64,
}

impl Default for MockRoutingService {
    fn default() -> Self {
        Self {
            road_coefficient: ROAD_COEFFICIENT,
            average_speed_kmh: AVERAGE_SPEED_KMH,
        }
    }
}

impl MockRoutingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(road_coefficient: f64, average_speed_kmh: f64) -> Self {
        Self {
            road_coefficient,
            average_speed_kmh,
        }
    }
}

#[async_trait]
impl RoutingService for MockRoutingService {
    async fn route(&self, waypoints: &[Coordinates]) -> Result<Route> {
        ensure_waypoints(waypoints)?;

        let straight_line_km: f64 = waypoints
            .windows(2)
            .map(|pair| haversine_distance(&pair[0], &pair[1]))
            .sum();
        let road_km = straight_line_km * self.road_coefficient;

        Ok(Route {
            distance_m: road_km * 1000.0,
            duration_s: road_km / self.average_speed_kmh * 3600.0,
            polyline: encode_polyline(waypoints, ROUTE_PRECISION),
        })
    }

    fn name(&self) -> &str {
        "MockRouting"
    }
}

/// Create routing service with automatic Valhalla detection and fallback
///
/// Tries to connect to Valhalla if URL is provided. Falls back to mock
/// routing service if Valhalla is unavailable or URL is not configured.
pub async fn create_routing_service_with_fallback(
    valhalla_url: Option<String>,
) -> Box<dyn RoutingService> {
    use tracing::{info, warn};

    if let Some(url) = valhalla_url {
        match check_valhalla_health(&url).await {
            Ok(()) => match ValhallaClient::new(ValhallaConfig::new(&url)) {
                Ok(client) => {
                    info!("Valhalla routing service available at {}", url);
                    return Box::new(client);
                }
                Err(e) => warn!("Failed to build Valhalla client: {}. Falling back to mock routing.", e),
            },
            Err(e) => {
                warn!("Valhalla not available at {}: {}. Falling back to mock routing.", url, e);
            }
        }
    }

    info!("Using mock routing service (Valhalla not configured or unavailable)");
    Box::new(MockRoutingService::new())
}

/// Check if Valhalla is healthy by making a simple status request
async fn check_valhalla_health(base_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()?;

    let url = format!("{}/status", base_url.trim_end_matches('/'));
    let response = client.get(&url).send().await?;

    if response.status().is_success() {
        Ok(())
    } else {
        anyhow::bail!("Valhalla returned status {}", response.status())
    }
}
