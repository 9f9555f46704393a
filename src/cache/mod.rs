// Year-keyed in-memory store with in-flight request sharing
use crate::types::*;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// A load that any number of callers can await
pub type SharedLoad = Shared<BoxFuture<'static, Result<YearOutcome>>>;

/// What `join_or_start` found for a year
pub enum Join {
    /// Points already held; nothing was started
    Settled(Vec<DisplayPoint>),
    /// A load to await, and whether this call started it
    Pending { load: SharedLoad, started: bool },
}

/// Per-year fetch state for the lifetime of one loader.
///
/// Every write is keyed by year, so loads for different years can finish in
/// any order without touching each other's slots.
pub struct YearCache {
    slots: RwLock<HashMap<String, YearState>>,
    inflight: Mutex<HashMap<String, SharedLoad>>,
}

impl YearCache {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Current state for a year (`NotLoaded` if never touched)
    pub async fn state(&self, year: &str) -> YearState {
        self.slots
            .read()
            .await
            .get(year)
            .cloned()
            .unwrap_or(YearState::NotLoaded)
    }

    /// Cached points, if the year has settled
    pub async fn cached_points(&self, year: &str) -> Option<Vec<DisplayPoint>> {
        match self.slots.read().await.get(year) {
            Some(YearState::Loaded(points)) => Some(points.clone()),
            Some(YearState::LoadedEmpty) => Some(Vec::new()),
            _ => None,
        }
    }

    pub async fn set_state(&self, year: &str, state: YearState) {
        debug!("Year {} -> {}", year, state.as_str());
        self.slots.write().await.insert(year.to_string(), state);
    }

    /// Record the result of a finished load in the year's slot
    pub async fn record(&self, year: &str, result: &Result<YearOutcome>) {
        let state = match result {
            Ok(YearOutcome::Loaded(series)) => YearState::Loaded(series.points.clone()),
            Ok(YearOutcome::Empty { .. }) => YearState::LoadedEmpty,
            Err(e) => YearState::Error(e.to_string()),
        };
        self.set_state(year, state).await;
    }

    /// Forget a year so the next load fetches it again
    pub async fn invalidate(&self, year: &str) {
        self.slots.write().await.remove(year);
    }

    /// Years whose points are held, sorted
    pub async fn loaded_years(&self) -> Vec<String> {
        let slots = self.slots.read().await;
        let mut years: Vec<String> = slots
            .iter()
            .filter(|(_, state)| state.is_settled())
            .map(|(year, _)| year.clone())
            .collect();
        years.sort();
        years
    }

    /// Join the in-flight load for `year`, or start one with `start`.
    ///
    /// The slot is re-checked under the in-flight lock, so a load that
    /// settled after the caller's own cache check is never repeated.
    pub async fn join_or_start<F>(&self, year: &str, start: F) -> Join
    where
        F: FnOnce() -> BoxFuture<'static, Result<YearOutcome>>,
    {
        let mut inflight = self.inflight.lock().await;
        if let Some(existing) = inflight.get(year) {
            debug!("Joining in-flight load for {}", year);
            return Join::Pending {
                load: existing.clone(),
                started: false,
            };
        }

        if let Some(points) = self.cached_points(year).await {
            debug!("{} settled while waiting, not reloading", year);
            return Join::Settled(points);
        }

        let load = start().shared();
        inflight.insert(year.to_string(), load.clone());
        // Mark loading before anyone can poll the load to completion
        self.set_state(year, YearState::Loading).await;
        drop(inflight);

        Join::Pending {
            load,
            started: true,
        }
    }

    /// Drop the in-flight entry once its load has finished
    pub async fn finish(&self, year: &str) {
        self.inflight.lock().await.remove(year);
    }

    pub async fn inflight_count(&self) -> usize {
        self.inflight.lock().await.len()
    }
}

impl Default for YearCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn loaded(year: &str) -> YearOutcome {
        YearOutcome::Loaded(YearSeries {
            year: year.to_string(),
            points: vec![DisplayPoint {
                label: "Jan".into(),
                sort_index: 0,
                balance: dec!(100),
                percent_change: dec!(0),
                cumulative_growth_percent: Some(dec!(0)),
                source_month: format!("{}-01", year),
            }],
            stats: Stats::default(),
        })
    }

    #[tokio::test]
    async fn test_record_and_read_back() {
        let cache = YearCache::new();
        assert_eq!(cache.state("2023").await, YearState::NotLoaded);

        cache.record("2023", &Ok(loaded("2023"))).await;
        cache
            .record(
                "2022",
                &Ok(YearOutcome::Empty {
                    year: "2022".into(),
                    stats: Stats::default(),
                }),
            )
            .await;
        cache
            .record(
                "2021",
                &Err(DataError::Network("connection refused".into())),
            )
            .await;

        assert_eq!(cache.cached_points("2023").await.unwrap().len(), 1);
        assert_eq!(cache.cached_points("2022").await, Some(Vec::new()));
        assert_eq!(cache.cached_points("2021").await, None);
        assert_eq!(cache.state("2021").await.as_str(), "error");
        assert_eq!(cache.loaded_years().await, vec!["2022", "2023"]);

        cache.invalidate("2023").await;
        assert_eq!(cache.state("2023").await, YearState::NotLoaded);
    }

    #[tokio::test]
    async fn test_join_or_start_shares_one_load() {
        let cache = YearCache::new();
        let started = Arc::new(AtomicUsize::new(0));

        let make = |counter: Arc<AtomicUsize>| {
            move || -> BoxFuture<'static, Result<YearOutcome>> {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, DataError>(loaded("2023")) }.boxed()
            }
        };

        let Join::Pending { load: first, started: leader } =
            cache.join_or_start("2023", make(started.clone())).await
        else {
            panic!("expected a new load");
        };
        let Join::Pending { load: second, started: follower_leads } =
            cache.join_or_start("2023", make(started.clone())).await
        else {
            panic!("expected to join the running load");
        };

        assert!(leader);
        assert!(!follower_leads);
        assert_eq!(cache.state("2023").await, YearState::Loading);
        assert_eq!(cache.inflight_count().await, 1);

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, b);
        assert_eq!(started.load(Ordering::SeqCst), 1);

        cache.finish("2023").await;
        assert_eq!(cache.inflight_count().await, 0);
    }

    #[tokio::test]
    async fn test_settled_year_is_not_restarted() {
        let cache = YearCache::new();
        cache.record("2023", &Ok(loaded("2023"))).await;
        let started = Arc::new(AtomicUsize::new(0));

        let counter = started.clone();
        let join = cache
            .join_or_start("2023", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<YearOutcome, _>(DataError::Network("unreachable".into())) }.boxed()
            })
            .await;

        match join {
            Join::Settled(points) => assert_eq!(points[0].source_month, "2023-01"),
            Join::Pending { .. } => panic!("settled year was loaded again"),
        }
        assert_eq!(started.load(Ordering::SeqCst), 0);
        assert_eq!(cache.inflight_count().await, 0);
        assert!(matches!(cache.state("2023").await, YearState::Loaded(_)));
    }
}
