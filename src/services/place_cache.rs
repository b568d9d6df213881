use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::models::place::{Coordinate, Place};
use crate::models::stats::PerformanceStats;
use crate::services::clock::Clock;
use crate::services::geo;
use crate::services::normalizer;
use crate::services::overpass_client::PoiSource;
use crate::services::ranking::{self, CompletenessWeights, Recommendation};

/// Results are cached per (origin, radius). Origins within the tolerance count
/// as the same query to absorb GPS jitter; the radius must match exactly since
/// a different radius changes the candidate set outright.
#[derive(Clone, Copy, Debug)]
pub struct QueryKey {
    pub origin: Coordinate,
    pub radius: u32,
}

impl QueryKey {
    /// Component-wise: each coordinate axis must shift by less than the
    /// tolerance, measured through the same distance model as everything else.
    pub fn is_similar(&self, other: &QueryKey, tolerance_meters: f64) -> bool {
        if self.radius != other.radius {
            return false;
        }

        let lat_shift = geo::distance_meters(
            self.origin,
            Coordinate {
                lat: other.origin.lat,
                lon: self.origin.lon,
            },
        );
        let lon_shift = geo::distance_meters(
            self.origin,
            Coordinate {
                lat: self.origin.lat,
                lon: other.origin.lon,
            },
        );

        lat_shift < tolerance_meters && lon_shift < tolerance_meters
    }
}

struct CacheEntry {
    key: QueryKey,
    places: Vec<Place>,
    created_at: Instant,
}

#[derive(Default)]
struct CacheState {
    slot: Option<CacheEntry>,
    stats: PerformanceStats,
}

/// Over-fetch factor against the caller's limit; normalization drops unnamed
/// and out-of-radius records, so ask upstream for more than we plan to keep.
const RAW_FETCH_FACTOR: usize = 2;

/// The proximity query engine: one cached slot, staleness detection, and a
/// stale-or-empty fallback when the upstream is down. One browser tab polling
/// one viewport is the expected workload, hence the single slot.
pub struct PlaceQueryService {
    source: Arc<dyn PoiSource>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    location_tolerance_meters: f64,
    weights: CompletenessWeights,
    state: Mutex<CacheState>,
}

impl PlaceQueryService {
    pub fn new(
        source: Arc<dyn PoiSource>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        location_tolerance_meters: f64,
        weights: CompletenessWeights,
    ) -> Self {
        Self {
            source,
            clock,
            ttl,
            location_tolerance_meters,
            weights,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Serves from the slot when it is location-similar, same-radius and
    /// within TTL; otherwise refetches and swaps the slot atomically. An
    /// upstream failure never surfaces here: the previous entry (stale
    /// included) or an empty list is returned instead.
    pub async fn query(&self, origin: Coordinate, radius: u32, limit: usize) -> Vec<Place> {
        let started = self.clock.now();
        let key = QueryKey { origin, radius };

        {
            let mut state = self.state.lock().unwrap();
            state.stats.total_requests += 1;
            if let Some(entry) = &state.slot {
                let age = started.saturating_duration_since(entry.created_at);
                if entry.key.is_similar(&key, self.location_tolerance_meters) && age <= self.ttl {
                    let served: Vec<Place> = entry.places.iter().take(limit).cloned().collect();
                    state.stats.cache_hits += 1;
                    let elapsed = self.clock.now().saturating_duration_since(started);
                    state.stats.record_latency(elapsed);
                    debug!("Served {} places from cache", served.len());
                    return served;
                }
            }
        }

        // Slot is empty, stale or keyed elsewhere. Fetch outside the lock so
        // cached reads stay responsive during a slow round trip.
        let fetched = self
            .source
            .fetch(origin, radius, limit.saturating_mul(RAW_FETCH_FACTOR))
            .await;

        let mut state = self.state.lock().unwrap();
        state.stats.upstream_calls += 1;
        let served = match fetched {
            Ok(elements) => {
                let places = ranking::rank(normalizer::normalize_all(&elements, origin, radius));
                let served: Vec<Place> = places.iter().take(limit).cloned().collect();
                // Even an empty result is fresher truth than whatever the slot
                // held before.
                state.slot = Some(CacheEntry {
                    key,
                    places,
                    created_at: self.clock.now(),
                });
                served
            }
            Err(e) => {
                // A failed fetch must not evict a still-useful entry. Degrade
                // to the previous data, expired or not, else to nothing.
                warn!(
                    "Overpass fetch failed due to: {}, serving last known places",
                    e
                );
                state
                    .slot
                    .as_ref()
                    .map(|entry| entry.places.iter().take(limit).cloned().collect())
                    .unwrap_or_default()
            }
        };
        let elapsed = self.clock.now().saturating_duration_since(started);
        state.stats.record_latency(elapsed);
        served
    }

    pub fn recommend(&self, places: &[Place]) -> Recommendation {
        ranking::recommend(places, &self.weights)
    }

    pub fn stats_snapshot(&self) -> PerformanceStats {
        self.state.lock().unwrap().stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::services::clock::testing::ManualClock;
    use crate::services::overpass_client::{RawElement, UpstreamError};

    const ORIGIN: Coordinate = Coordinate {
        lat: 21.028511,
        lon: 105.804817,
    };

    /// Serves the same canned payload on every call, or fails on demand, and
    /// counts how often the upstream is actually reached.
    struct CountingSource {
        payload: Mutex<Result<Vec<RawElement>, ()>>,
        calls: AtomicUsize,
    }

    impl CountingSource {
        fn with_payload(elements: Vec<RawElement>) -> Self {
            Self {
                payload: Mutex::new(Ok(elements)),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                payload: Mutex::new(Err(())),
                calls: AtomicUsize::new(0),
            }
        }

        fn set_payload(&self, payload: Result<Vec<RawElement>, ()>) {
            *self.payload.lock().unwrap() = payload;
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PoiSource for CountingSource {
        async fn fetch(
            &self,
            _origin: Coordinate,
            _radius: u32,
            _max_raw: usize,
        ) -> Result<Vec<RawElement>, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &*self.payload.lock().unwrap() {
                Ok(elements) => Ok(elements.clone()),
                Err(()) => Err(UpstreamError::Unavailable(3)),
            }
        }
    }

    fn raw_place(name: &str, meters_north: f64) -> RawElement {
        let mut element = RawElement {
            lat: Some(ORIGIN.lat + meters_north / 111_320.0),
            lon: Some(ORIGIN.lon),
            ..RawElement::default()
        };
        element.tags.insert("name".to_string(), name.to_string());
        element
            .tags
            .insert("amenity".to_string(), "cafe".to_string());
        element
    }

    fn payload() -> Vec<RawElement> {
        vec![
            raw_place("far", 900.0),
            raw_place("near", 100.0),
            raw_place("middle", 400.0),
        ]
    }

    fn service(
        source: Arc<CountingSource>,
        clock: Arc<ManualClock>,
    ) -> PlaceQueryService {
        PlaceQueryService::new(
            source,
            clock,
            Duration::from_secs(120),
            100.0,
            CompletenessWeights::default(),
        )
    }

    /// Degrees that move the origin roughly `meters` north.
    fn lat_degrees(meters: f64) -> f64 {
        meters / 111_320.0
    }

    #[tokio::test]
    async fn fresh_query_fetches_sorts_and_slices() {
        let source = Arc::new(CountingSource::with_payload(payload()));
        let clock = Arc::new(ManualClock::new());
        let service = service(source.clone(), clock);

        let places = service.query(ORIGIN, 2000, 2).await;

        assert_eq!(source.calls(), 1);
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].name, "near");
        assert_eq!(places[1].name, "middle");
    }

    #[tokio::test]
    async fn messy_payload_is_filtered_sorted_and_cached_whole() {
        // 8 raw records: 2 without a usable name, 1 beyond the radius.
        let mut elements = vec![
            raw_place("e", 1000.0),
            raw_place("b", 400.0),
            raw_place("d", 800.0),
            raw_place("a", 200.0),
            raw_place("c", 600.0),
            raw_place("too far", 2500.0),
        ];
        let mut unnamed = raw_place("x", 50.0);
        unnamed.tags.remove("name");
        elements.push(unnamed);
        let mut placeholder = raw_place("x", 60.0);
        placeholder
            .tags
            .insert("name".to_string(), "Unknown".to_string());
        elements.push(placeholder);

        let source = Arc::new(CountingSource::with_payload(elements));
        let clock = Arc::new(ManualClock::new());
        let service = service(source.clone(), clock);

        let places = service.query(ORIGIN, 2000, 5).await;

        let names: Vec<&str> = places.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);

        // All five live in the slot; a tighter follow-up slices without a refetch.
        let top = service.query(ORIGIN, 2000, 3).await;
        assert_eq!(top.len(), 3);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn repeat_query_within_ttl_never_reaches_upstream() {
        let source = Arc::new(CountingSource::with_payload(payload()));
        let clock = Arc::new(ManualClock::new());
        let service = service(source.clone(), clock.clone());

        service.query(ORIGIN, 2000, 30).await;
        clock.advance(Duration::from_secs(90));
        let places = service.query(ORIGIN, 2000, 30).await;

        assert_eq!(source.calls(), 1);
        assert_eq!(places.len(), 3);

        let stats = service.stats_snapshot();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.upstream_calls, 1);
    }

    #[tokio::test]
    async fn origin_shifted_fifty_meters_still_hits() {
        let source = Arc::new(CountingSource::with_payload(payload()));
        let clock = Arc::new(ManualClock::new());
        let service = service(source.clone(), clock.clone());

        service.query(ORIGIN, 2000, 30).await;
        clock.advance(Duration::from_secs(10));
        let shifted = Coordinate {
            lat: ORIGIN.lat + lat_degrees(50.0),
            lon: ORIGIN.lon,
        };
        service.query(shifted, 2000, 30).await;

        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn origin_shifted_five_hundred_meters_misses() {
        let source = Arc::new(CountingSource::with_payload(payload()));
        let clock = Arc::new(ManualClock::new());
        let service = service(source.clone(), clock);

        service.query(ORIGIN, 2000, 30).await;
        let shifted = Coordinate {
            lat: ORIGIN.lat + lat_degrees(500.0),
            lon: ORIGIN.lon,
        };
        service.query(shifted, 2000, 30).await;

        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn changed_radius_always_refetches() {
        let source = Arc::new(CountingSource::with_payload(payload()));
        let clock = Arc::new(ManualClock::new());
        let service = service(source.clone(), clock);

        service.query(ORIGIN, 2000, 30).await;
        service.query(ORIGIN, 1000, 30).await;

        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn elapsed_ttl_always_refetches() {
        let source = Arc::new(CountingSource::with_payload(payload()));
        let clock = Arc::new(ManualClock::new());
        let service = service(source.clone(), clock.clone());

        service.query(ORIGIN, 2000, 30).await;
        clock.advance(Duration::from_secs(121));
        service.query(ORIGIN, 2000, 30).await;

        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_serves_stale_data_and_preserves_the_slot() {
        let source = Arc::new(CountingSource::with_payload(payload()));
        let clock = Arc::new(ManualClock::new());
        let service = service(source.clone(), clock.clone());

        service.query(ORIGIN, 2000, 30).await;

        // Past TTL and the upstream is down: stale data still gets served.
        clock.advance(Duration::from_secs(200));
        source.set_payload(Err(()));
        let stale = service.query(ORIGIN, 2000, 30).await;
        assert_eq!(stale.len(), 3);

        // Upstream recovers: the preserved slot is refreshed, not resurrected.
        source.set_payload(Ok(vec![raw_place("reborn", 150.0)]));
        let fresh = service.query(ORIGIN, 2000, 30).await;
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].name, "reborn");
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn failed_fetch_with_an_empty_slot_serves_nothing() {
        let source = Arc::new(CountingSource::failing());
        let clock = Arc::new(ManualClock::new());
        let service = service(source.clone(), clock);

        let places = service.query(ORIGIN, 2000, 30).await;

        assert!(places.is_empty());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn empty_success_overwrites_the_previous_entry() {
        let source = Arc::new(CountingSource::with_payload(payload()));
        let clock = Arc::new(ManualClock::new());
        let service = service(source.clone(), clock.clone());

        service.query(ORIGIN, 2000, 30).await;
        clock.advance(Duration::from_secs(121));
        source.set_payload(Ok(Vec::new()));
        service.query(ORIGIN, 2000, 30).await;

        // The empty result is now the cached truth.
        let cached = service.query(ORIGIN, 2000, 30).await;
        assert!(cached.is_empty());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn cache_hit_slices_to_the_requested_limit() {
        let source = Arc::new(CountingSource::with_payload(payload()));
        let clock = Arc::new(ManualClock::new());
        let service = service(source.clone(), clock);

        service.query(ORIGIN, 2000, 30).await;
        let sliced = service.query(ORIGIN, 2000, 1).await;

        assert_eq!(source.calls(), 1);
        assert_eq!(sliced.len(), 1);
        assert_eq!(sliced[0].name, "near");
    }

    #[test]
    fn query_keys_with_different_radii_are_never_similar() {
        let a = QueryKey {
            origin: ORIGIN,
            radius: 2000,
        };
        let b = QueryKey {
            origin: ORIGIN,
            radius: 1000,
        };

        assert!(!a.is_similar(&b, 100.0));
        assert!(a.is_similar(&a, 100.0));
    }
}
