//! Place lookup for trip endpoints.
//!
//! `GEOCODER_BACKEND=mock` (the default) answers every non-blank query with
//! stable fake coordinates inside the continental US and never touches the
//! network. `GEOCODER_BACKEND=nominatim` goes to Nominatim through a cache,
//! a request pacer and a circuit breaker, so a busy worker stays within the
//! public instance's usage policy.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{Config, GeocoderBackend};
use crate::services::nominatim::NominatimClient;
use crate::types::{Coordinates, Place};

/// Geocoder trait - abstraction for all geocoding implementations
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Geocode a free-text place ("Dallas, TX", a street address, ...)
    /// Returns None if the place cannot be found
    async fn geocode(&self, query: &str) -> Result<Option<GeocodingResult>>;

    /// Get the name of this geocoder implementation
    fn name(&self) -> &'static str;
}

/// Result of geocoding operation
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodingResult {
    /// Latitude and longitude
    pub coordinates: Coordinates,
    /// Confidence score 0.0-1.0
    pub confidence: f64,
    /// Display name returned by geocoder
    pub display_name: String,
}

impl GeocodingResult {
    pub fn into_place(self) -> Place {
        Place {
            lat: self.coordinates.lat,
            lng: self.coordinates.lng,
            display_name: self.display_name,
        }
    }
}

fn cache_key(query: &str) -> String {
    query.trim().to_lowercase()
}

// ---- Mock ----

/// Mock geocoder for testing - returns deterministic fake coordinates
pub struct MockGeocoder;

impl MockGeocoder {
    pub fn new() -> Self {
        Self
    }

    /// Generate deterministic coordinates from the query hash
    /// Coordinates are guaranteed to be within the continental US
    fn hash_to_coordinates(query: &str) -> Coordinates {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        cache_key(query).hash(&mut hasher);
        let hash = hasher.finish();

        // Continental US inner bounds, away from coasts and borders
        const LAT_MIN: f64 = 30.0;
        const LAT_MAX: f64 = 45.0;
        const LNG_MIN: f64 = -120.0;
        const LNG_MAX: f64 = -75.0;

        // Use different parts of the hash for lat and lng
        let lat_normalized = ((hash >> 32) as f64) / (u32::MAX as f64);
        let lng_normalized = ((hash & 0xFFFF_FFFF) as f64) / (u32::MAX as f64);

        Coordinates {
            lat: LAT_MIN + lat_normalized * (LAT_MAX - LAT_MIN),
            lng: LNG_MIN + lng_normalized * (LNG_MAX - LNG_MIN),
        }
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<GeocodingResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        Ok(Some(GeocodingResult {
            coordinates: Self::hash_to_coordinates(query),
            confidence: 0.95, // Mock always has high confidence
            display_name: format!("{}, United States", query),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ---- Request pacing ----

/// Spaces outgoing requests at least `min_interval` apart.
///
/// Each caller reserves the next free slot under the lock and sleeps outside
/// it, so concurrent lookups queue up in arrival order.
pub struct RateLimiter {
    next_slot: parking_lot::Mutex<Option<tokio::time::Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            next_slot: parking_lot::Mutex::new(None),
            min_interval,
        }
    }

    /// Sleep until this caller's slot comes up
    pub async fn wait(&self) {
        let slot = {
            let mut next = self.next_slot.lock();
            let now = tokio::time::Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.min_interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

/// Stops calling a failing upstream for `recovery_time` once `threshold`
/// consecutive failures have been seen. After that a single trial request
/// is let through again.
pub struct CircuitBreaker {
    state: parking_lot::Mutex<BreakerState>,
    threshold: u32,
    recovery_time: Duration,
}

#[derive(Default)]
struct BreakerState {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, recovery_time: Duration) -> Self {
        Self {
            state: parking_lot::Mutex::new(BreakerState::default()),
            threshold,
            recovery_time,
        }
    }

    /// True while lookups should be refused
    pub fn is_open(&self) -> bool {
        let state = self.state.lock();
        if state.consecutive_failures < self.threshold {
            return false;
        }
        state
            .last_failure
            .map_or(true, |at| at.elapsed() < self.recovery_time)
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure = Some(Instant::now());
    }

    pub fn record_success(&self) {
        self.state.lock().consecutive_failures = 0;
    }
}

// ---- Lookup cache ----

/// Default number of successful lookups kept in memory
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Bounded in-memory cache of successful lookups, oldest entry evicted first
pub struct PlaceCache {
    inner: parking_lot::Mutex<CacheInner>,
    capacity: usize,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, GeocodingResult>,
    order: VecDeque<String>,
}

impl PlaceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: parking_lot::Mutex::new(CacheInner::default()),
            capacity,
        }
    }

    pub fn get(&self, query: &str) -> Option<GeocodingResult> {
        self.inner.lock().entries.get(&cache_key(query)).cloned()
    }

    pub fn insert(&self, query: &str, result: GeocodingResult) {
        if self.capacity == 0 {
            return;
        }
        let key = cache_key(query);
        let mut inner = self.inner.lock();

        if inner.entries.insert(key.clone(), result).is_none() {
            inner.order.push_back(key);
        }
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
    }
}

// ---- Nominatim ----

/// Rate-limited Nominatim geocoder with circuit breaker protection
///
/// This geocoder wraps the NominatimClient with:
/// - Cache: repeated queries never reach the network
/// - Rate limiting: enforces minimum interval between requests
/// - Circuit breaker: stops requests after repeated failures
pub struct RateLimitedNominatimGeocoder {
    client: NominatimClient,
    rate_limiter: RateLimiter,
    /// Circuit breaker - pub(crate) for testing
    pub(crate) circuit_breaker: CircuitBreaker,
    pub(crate) cache: PlaceCache,
}

impl RateLimitedNominatimGeocoder {
    /// Create with custom configuration
    pub fn with_config(
        base_url: &str,
        rate_limit_interval: Duration,
        circuit_breaker_threshold: u32,
        circuit_breaker_recovery: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: NominatimClient::new(base_url)?,
            rate_limiter: RateLimiter::new(rate_limit_interval),
            circuit_breaker: CircuitBreaker::new(circuit_breaker_threshold, circuit_breaker_recovery),
            cache: PlaceCache::new(DEFAULT_CACHE_CAPACITY),
        })
    }

    /// Create from loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_config(
            &config.nominatim_url,
            Duration::from_millis(config.nominatim_rate_limit_ms),
            config.nominatim_cb_threshold,
            Duration::from_secs(config.nominatim_cb_recovery_secs),
        )
    }
}

#[async_trait]
impl Geocoder for RateLimitedNominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<GeocodingResult>> {
        if query.trim().is_empty() {
            return Ok(None);
        }

        if let Some(hit) = self.cache.get(query) {
            tracing::debug!("Geocoding cache hit for '{}'", query);
            return Ok(Some(hit));
        }

        // Check circuit breaker first
        if self.circuit_breaker.is_open() {
            tracing::warn!("Circuit breaker is open, rejecting geocoding request");
            return Err(anyhow::anyhow!("Geocoding service temporarily unavailable (circuit breaker open)"));
        }

        // Wait for rate limiter
        self.rate_limiter.wait().await;

        match self.client.search(query).await {
            Ok(Some(place)) => {
                self.circuit_breaker.record_success();
                let result = GeocodingResult {
                    coordinates: place.coordinates(),
                    confidence: 0.8, // Nominatim doesn't provide confidence, use default
                    display_name: place.display_name,
                };
                self.cache.insert(query, result.clone());
                Ok(Some(result))
            }
            Ok(None) => {
                // No result found is not a failure
                self.circuit_breaker.record_success();
                Ok(None)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                tracing::error!("Geocoding failed: {}", e);
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

// ---- Factory ----

/// Create geocoder based on the configured backend
pub fn create_geocoder(config: &Config) -> Result<Box<dyn Geocoder>> {
    Ok(match config.geocoder_backend {
        GeocoderBackend::Mock => {
            tracing::info!("Using MockGeocoder");
            Box::new(MockGeocoder::new())
        }
        GeocoderBackend::Nominatim => {
            tracing::info!("Using RateLimitedNominatimGeocoder at {}", config.nominatim_url);
            Box::new(RateLimitedNominatimGeocoder::from_config(config)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- MockGeocoder Tests ----

    #[tokio::test]
    async fn mock_geocoder_returns_coordinates_for_any_place() {
        let geocoder = MockGeocoder::new();
        let result = geocoder.geocode("Amarillo, TX").await.unwrap();
        assert!(result.is_some(), "MockGeocoder should always return coordinates");
    }

    #[tokio::test]
    async fn mock_geocoder_returns_none_for_blank_query() {
        let geocoder = MockGeocoder::new();
        assert!(geocoder.geocode("   ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mock_geocoder_returns_deterministic_coordinates() {
        let geocoder = MockGeocoder::new();

        let result1 = geocoder.geocode("Dallas, TX").await.unwrap().unwrap();
        let result2 = geocoder.geocode("  dallas, tx ").await.unwrap().unwrap();

        // Same place modulo case and whitespace gives the same point
        assert_eq!(result1.coordinates, result2.coordinates);
    }

    #[tokio::test]
    async fn mock_geocoder_returns_different_coordinates_for_different_places() {
        let geocoder = MockGeocoder::new();

        let dallas = geocoder.geocode("Dallas, TX").await.unwrap().unwrap();
        let denver = geocoder.geocode("Denver, CO").await.unwrap().unwrap();

        assert_ne!(dallas.coordinates, denver.coordinates);
    }

    #[tokio::test]
    async fn mock_geocoder_returns_coordinates_within_continental_us() {
        let geocoder = MockGeocoder::new();

        for query in ["Dallas, TX", "Denver, CO", "Chicago, IL", "Atlanta, GA", "Boise, ID"] {
            let result = geocoder.geocode(query).await.unwrap().unwrap();
            assert!(result.coordinates.lat >= 30.0 && result.coordinates.lat <= 45.0,
                "Latitude {} out of bounds for {}", result.coordinates.lat, query);
            assert!(result.coordinates.lng >= -120.0 && result.coordinates.lng <= -75.0,
                "Longitude {} out of bounds for {}", result.coordinates.lng, query);
        }
    }

    #[tokio::test]
    async fn mock_geocoder_display_name_and_place() {
        let geocoder = MockGeocoder::new();
        let result = geocoder.geocode("Tulsa, OK").await.unwrap().unwrap();
        assert!(result.confidence >= 0.9);
        assert_eq!(result.display_name, "Tulsa, OK, United States");

        let coordinates = result.coordinates;
        let place = result.into_place();
        assert_eq!(place.coordinates(), coordinates);
    }

    #[tokio::test]
    async fn mock_geocoder_name_is_mock() {
        assert_eq!(MockGeocoder::new().name(), "mock");
    }

    // ---- RateLimiter Tests ----

    #[tokio::test]
    async fn rate_limiter_enforces_minimum_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(100));

        let start = Instant::now();

        // First call should be immediate
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(50), "First call should be immediate");

        // Second call should wait
        limiter.wait().await;
        let after_second = start.elapsed();
        assert!(after_second >= Duration::from_millis(100),
            "Second call should wait at least 100ms, took {:?}", after_second);
    }

    #[tokio::test]
    async fn rate_limiter_queues_concurrent_callers() {
        let limiter = RateLimiter::new(Duration::from_millis(40));
        let start = Instant::now();

        tokio::join!(limiter.wait(), limiter.wait(), limiter.wait());

        // Three slots: now, +40ms, +80ms
        assert!(start.elapsed() >= Duration::from_millis(80), "took {:?}", start.elapsed());
    }

    #[tokio::test]
    async fn rate_limiter_allows_call_after_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(50));

        limiter.wait().await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        let start = Instant::now();
        limiter.wait().await;
        let elapsed = start.elapsed();

        assert!(elapsed < Duration::from_millis(20),
            "Call after interval should be immediate, took {:?}", elapsed);
    }

    // ---- CircuitBreaker Tests ----

    #[test]
    fn circuit_breaker_starts_closed() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        assert!(!breaker.is_open());
    }

    #[test]
    fn circuit_breaker_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        breaker.record_failure();
        assert!(!breaker.is_open(), "Should not open after 1 failure");

        breaker.record_failure();
        assert!(!breaker.is_open(), "Should not open after 2 failures");

        breaker.record_failure();
        assert!(breaker.is_open(), "Should open after 3 failures");
    }

    #[test]
    fn circuit_breaker_resets_on_success() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();

        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open(), "Should not be open, count was reset");
    }

    #[tokio::test]
    async fn circuit_breaker_closes_after_recovery_time() {
        let breaker = CircuitBreaker::new(3, Duration::from_millis(50));

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.is_open());

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!breaker.is_open(), "Circuit breaker should close after recovery time");
    }

    // ---- PlaceCache Tests ----

    fn result_at(lat: f64) -> GeocodingResult {
        GeocodingResult {
            coordinates: Coordinates { lat, lng: -97.0 },
            confidence: 0.8,
            display_name: format!("Place at {}", lat),
        }
    }

    #[test]
    fn place_cache_keys_ignore_case_and_whitespace() {
        let cache = PlaceCache::new(4);
        cache.insert("Dallas, TX", result_at(32.0));
        assert_eq!(cache.get(" dallas, tx"), Some(result_at(32.0)));
        assert_eq!(cache.get("Denver, CO"), None);
    }

    #[test]
    fn place_cache_evicts_oldest_beyond_capacity() {
        let cache = PlaceCache::new(2);
        cache.insert("a", result_at(1.0));
        cache.insert("b", result_at(2.0));
        cache.insert("a", result_at(1.5)); // refresh value, keeps position
        cache.insert("c", result_at(3.0));

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(result_at(2.0)));
        assert_eq!(cache.get("c"), Some(result_at(3.0)));
    }

    // ---- Factory and RateLimitedNominatimGeocoder Tests ----

    #[test]
    fn geocoder_factory_follows_configured_backend() {
        let config = Config::default();
        assert_eq!(create_geocoder(&config).unwrap().name(), "mock");

        let config = Config {
            geocoder_backend: GeocoderBackend::Nominatim,
            ..Config::default()
        };
        assert_eq!(create_geocoder(&config).unwrap().name(), "nominatim");
    }

    fn unreachable_geocoder(threshold: u32) -> RateLimitedNominatimGeocoder {
        RateLimitedNominatimGeocoder::with_config(
            "http://127.0.0.1:9",
            Duration::from_millis(1),
            threshold,
            Duration::from_secs(300),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn rate_limited_nominatim_geocoder_rejects_when_circuit_breaker_open() {
        let geocoder = unreachable_geocoder(1);

        geocoder.circuit_breaker.record_failure();
        assert!(geocoder.circuit_breaker.is_open());

        let result = geocoder.geocode("Dallas, TX").await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("circuit breaker"));
    }

    #[tokio::test]
    async fn rate_limited_nominatim_geocoder_serves_cache_even_when_open() {
        let geocoder = unreachable_geocoder(1);
        geocoder.cache.insert("Dallas, TX", result_at(32.78));
        geocoder.circuit_breaker.record_failure();

        let hit = geocoder.geocode("dallas, tx").await.unwrap();
        assert_eq!(hit, Some(result_at(32.78)));
    }

    #[tokio::test]
    async fn rate_limited_nominatim_geocoder_blank_query_is_not_found() {
        let geocoder = unreachable_geocoder(3);
        assert!(geocoder.geocode("").await.unwrap().is_none());
    }
}
