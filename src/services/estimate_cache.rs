use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{CacheError, EstimateError, EstimateResult, WeatherError};
use crate::models::estimate::{CacheStatus, DayEstimate, EstimateOutcome, EstimatePayload};
use crate::models::panel::PanelSpec;
use crate::services::aggregator::{self, Site};
use crate::services::open_meteo::WeatherSource;
use crate::services::timezone;

const MIN_TTL: Duration = Duration::from_secs(1);

// ─── Backend ─────────────────────────────────────────────────

/// Key/value store with per-entry TTL. Expiry is the backend's business.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Vec<u8>,
    pub expires_at: Instant,
}

/// In-process TTL store. Expired entries read as misses and are pruned when
/// the store is full.
#[derive(Debug)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_entries: usize,
}

impl InMemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        let entries = self.entries.lock();
        Ok(entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if entries.len() >= self.max_entries && !entries.contains_key(key) {
            entries.retain(|_, e| e.expires_at > now);
            if entries.len() >= self.max_entries {
                let soonest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(k) = soonest {
                    entries.remove(&k);
                }
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }
}

// ─── Cache-aside estimate pipeline ───────────────────────────

/// Everything that identifies one cached day estimate.
#[derive(Debug, Clone)]
pub struct EstimateQuery {
    pub lat: f64,
    pub lon: f64,
    pub tz: Tz,
    /// Local calendar day in `tz`
    pub date: NaiveDate,
}

/// `estimate:{date}:{tz}:{panel}:{lat}:{lon}`, coordinates at 6 decimals (~0.11 m).
pub fn cache_key(query: &EstimateQuery, panel_id: &str) -> String {
    format!(
        "estimate:{}:{}:{}:{:.6}:{:.6}",
        query.date.format("%Y-%m-%d"),
        query.tz.name(),
        panel_id,
        query.lat,
        query.lon
    )
}

/// Time left until the local midnight that ends `date`, never below one second.
pub fn ttl_until_midnight(tz: &Tz, date: NaiveDate, now: DateTime<Utc>) -> Duration {
    let next_day = date.succ_opt().unwrap_or(date);
    let midnight = timezone::start_of_day(tz, next_day).with_timezone(&Utc);
    (midnight - now).to_std().unwrap_or(MIN_TTL).max(MIN_TTL)
}

/// Cache-aside wrapper around the day aggregator.
///
/// The cache only ever saves work: read or write failures are logged and the
/// estimate is computed directly.
pub struct EstimateCache {
    store: Option<Arc<dyn CacheStore>>,
}

impl EstimateCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store: Some(store) }
    }

    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let store = self.store.as_ref()?;
        match store.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed");
                None
            }
        }
    }

    pub async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if let Err(e) = store.put(key, value, ttl).await {
            warn!(key, error = %e, "Cache write failed");
        }
    }

    /// Cached payload for the query, or fetch → aggregate → store.
    ///
    /// Each stage checks `cancel` before it starts; a fetch in flight is
    /// dropped as soon as the token fires.
    pub async fn estimate(
        &self,
        spec: &PanelSpec,
        weather: &dyn WeatherSource,
        query: &EstimateQuery,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> EstimateResult<EstimateOutcome> {
        let key = cache_key(query, spec.model_id());

        ensure_live(cancel)?;
        let cached = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EstimateError::Cancelled),
            hit = self.get(&key) => hit,
        };
        if let Some(payload) = cached {
            debug!(key = %key, "Estimate cache hit");
            return Ok(EstimateOutcome {
                payload: EstimatePayload::Encoded(payload),
                status: CacheStatus::Hit,
            });
        }

        ensure_live(cancel)?;
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EstimateError::Cancelled),
            fetched = weather.fetch_day(query.lat, query.lon, query.date, query.tz.name(), cancel) => fetched,
        };
        let day = fetched.map_err(|e| match e {
            WeatherError::Cancelled => EstimateError::Cancelled,
            other => EstimateError::Upstream(other),
        })?;

        let site = Site {
            lat: query.lat,
            lon: query.lon,
            date: query.date,
        };
        let estimate = aggregator::estimate_day(spec, &day, &site)?;
        let payload = match encode(&estimate) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key = %key, error = %e, "Estimate not cached");
                return Ok(EstimateOutcome {
                    payload: EstimatePayload::Fresh(Box::new(estimate)),
                    status: CacheStatus::Miss,
                });
            }
        };

        ensure_live(cancel)?;
        let ttl = ttl_until_midnight(&query.tz, query.date, now);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EstimateError::Cancelled),
            _ = self.put(&key, payload.clone(), ttl) => {}
        }
        debug!(key = %key, ttl_secs = ttl.as_secs(), "Estimate cached");

        Ok(EstimateOutcome {
            payload: EstimatePayload::Encoded(payload),
            status: CacheStatus::Miss,
        })
    }
}

fn encode(estimate: &DayEstimate) -> Result<Vec<u8>, CacheError> {
    Ok(serde_json::to_vec(estimate)?)
}

fn ensure_live(cancel: &CancellationToken) -> EstimateResult<()> {
    if cancel.is_cancelled() {
        Err(EstimateError::Cancelled)
    } else {
        Ok(())
    }
}
