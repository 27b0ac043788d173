//! Nominatim geocoding client

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::Place;

const USER_AGENT: &str = "hos-planner/0.2 (trip planning worker)";

/// Nominatim API response
#[derive(Debug, Deserialize)]
pub struct NominatimResult {
    pub lat: String,
    pub lon: String,
    pub display_name: String,
}

impl NominatimResult {
    fn into_place(self) -> Result<Place> {
        let lat: f64 = self.lat.parse().context("Invalid latitude")?;
        let lng: f64 = self.lon.parse().context("Invalid longitude")?;
        Ok(Place {
            lat,
            lng,
            display_name: self.display_name,
        })
    }
}

/// Nominatim geocoding client
pub struct NominatimClient {
    base_url: String,
    client: reqwest::Client,
}

impl NominatimClient {
    /// Create a new client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/search?q={}&format=json&limit=1",
            self.base_url,
            urlencoding::encode(query)
        )
    }

    /// Free-text search, best match only
    ///
    /// `Ok(None)` when Nominatim has no match; transport and server errors
    /// are returned as `Err`.
    pub async fn search(&self, query: &str) -> Result<Option<Place>> {
        let response = self
            .client
            .get(self.search_url(query))
            .send()
            .await
            .context("Failed to send geocoding request")?;

        if !response.status().is_success() {
            anyhow::bail!("Nominatim returned status {}", response.status());
        }

        let results: Vec<NominatimResult> = response
            .json()
            .await
            .context("Failed to parse geocoding response")?;

        results.into_iter().next().map(NominatimResult::into_place).transpose()
    }
}
