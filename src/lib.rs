pub mod types;
pub mod sources {
    pub mod results_api;
}
pub mod normalizers;
pub mod series;
pub mod cache;
pub mod strategies;
pub mod auth;
pub mod settings;
pub mod handlers;

pub use types::*;
pub use cache::{Join, YearCache};
pub use series::{calculate_cumulative, transform_data, ChartMode, ChartPoint};
pub use settings::Settings;
pub use sources::results_api::ResultsApiClient;

use futures::FutureExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Loads per-year performance series for one strategy.
///
/// Points are cached per year for the lifetime of the loader; stats are
/// fetched fresh on every selection. Cloning is cheap and clones share the
/// same store.
#[derive(Clone)]
pub struct PerformanceLoader {
    source: Arc<dyn ResultsSource>,
    strategy_id: String,
    supported_years: Arc<Vec<String>>,
    cache: Arc<YearCache>,
}

impl PerformanceLoader {
    pub fn new(
        source: Arc<dyn ResultsSource>,
        strategy_id: &str,
        supported_years: Vec<String>,
    ) -> Result<Self> {
        if strategies::strategy(strategy_id).is_none() {
            return Err(DataError::UnknownStrategy(strategy_id.to_string()));
        }

        let mut years: Vec<String> = supported_years
            .into_iter()
            .filter(|y| {
                let ok = normalizers::is_year_key(y);
                if !ok {
                    warn!("Ignoring malformed supported year {:?}", y);
                }
                ok
            })
            .collect();
        years.sort();
        years.dedup();

        Ok(Self {
            source,
            strategy_id: strategy_id.to_string(),
            supported_years: Arc::new(years),
            cache: Arc::new(YearCache::new()),
        })
    }

    pub fn strategy_id(&self) -> &str {
        &self.strategy_id
    }

    pub fn supported_years(&self) -> &[String] {
        &self.supported_years
    }

    pub fn is_supported(&self, year: &str) -> bool {
        self.supported_years.iter().any(|y| y == year)
    }

    fn check_year(&self, year: &str) -> Result<()> {
        if self.is_supported(year) {
            Ok(())
        } else {
            Err(DataError::UnsupportedYear(year.to_string()))
        }
    }

    /// Previous and next supported years, when present
    pub fn neighbors(&self, year: &str) -> Vec<String> {
        let Some(pos) = self.supported_years.iter().position(|y| y == year) else {
            return Vec::new();
        };

        let mut out = Vec::with_capacity(2);
        if pos > 0 {
            out.push(self.supported_years[pos - 1].clone());
        }
        if let Some(next) = self.supported_years.get(pos + 1) {
            out.push(next.clone());
        }
        out
    }

    /// Select a year: prefetch its neighbours, then return its series.
    ///
    /// A cached year is not re-fetched for points, but its stats are always
    /// requested again. Failures for one year never touch other years' slots.
    pub async fn load_year(&self, year: &str) -> Result<YearOutcome> {
        self.check_year(year)?;
        self.prefetch_neighbors(year);

        let points = match self.cache.cached_points(year).await {
            Some(points) => points,
            None => match self.start_load(year).await {
                Join::Settled(points) => points,
                Join::Pending { load, started } => {
                    if !started {
                        debug!("Awaiting in-flight load for {}", year);
                    }
                    return load.await;
                }
            },
        };

        debug!("Cache hit for {}, refreshing stats", year);
        let stats = self.refresh_stats(year).await?;
        Ok(outcome(year, points, stats))
    }

    /// Start background loads for the years around `year`
    pub fn prefetch_neighbors(&self, year: &str) -> Vec<JoinHandle<()>> {
        self.neighbors(year)
            .into_iter()
            .map(|neighbor| {
                let loader = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = loader.prefetch(&neighbor).await {
                        warn!("Prefetch of {} failed: {}", neighbor, e);
                    }
                })
            })
            .collect()
    }

    /// Load a year's points unless already held. Stats are not refreshed.
    pub async fn prefetch(&self, year: &str) -> Result<()> {
        self.check_year(year)?;
        if self.cache.state(year).await.is_settled() {
            return Ok(());
        }
        match self.start_load(year).await {
            Join::Settled(_) => Ok(()),
            Join::Pending { load, .. } => load.await.map(|_| ()),
        }
    }

    /// Fetch points for a year, sharing any load already in flight
    async fn start_load(&self, year: &str) -> Join {
        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.cache);
        let strategy_id = self.strategy_id.clone();
        let key = year.to_string();

        self.cache
            .join_or_start(year, move || {
                async move {
                    let result = fetch_year(source.as_ref(), &strategy_id, &key).await;
                    cache.record(&key, &result).await;
                    cache.finish(&key).await;
                    result
                }
                .boxed()
            })
            .await
    }

    async fn refresh_stats(&self, year: &str) -> Result<Stats> {
        match self.source.fetch_monthly(&self.strategy_id, year).await {
            Ok(results) => Ok(results.stats),
            Err(e) => {
                warn!("Stats refresh for {} failed: {}", year, e);
                Err(e)
            }
        }
    }

    /// Current state of a year slot
    pub async fn state(&self, year: &str) -> YearState {
        self.cache.state(year).await
    }

    /// Years whose points are held
    pub async fn cached_years(&self) -> Vec<String> {
        self.cache.loaded_years().await
    }

    /// Drop a year so the next selection fetches it again
    pub async fn invalidate(&self, year: &str) {
        self.cache.invalidate(year).await;
    }

    pub async fn health(&self) -> SourceHealth {
        self.source.health().await
    }
}

async fn fetch_year(
    source: &dyn ResultsSource,
    strategy_id: &str,
    year: &str,
) -> Result<YearOutcome> {
    let results = source.fetch_monthly(strategy_id, year).await?;
    Ok(build_outcome(year, results))
}

/// Filter a response to `year` and derive its display series
pub fn build_outcome(year: &str, results: MonthlyResults) -> YearOutcome {
    let records = normalizers::filter_year(results.records, year);
    if records.is_empty() {
        info!("No monthly results for {}", year);
        return YearOutcome::Empty {
            year: year.to_string(),
            stats: results.stats,
        };
    }

    let points = calculate_cumulative(transform_data(&records));
    info!("Loaded {} months for {}", points.len(), year);
    outcome(year, points, results.stats)
}

fn outcome(year: &str, points: Vec<DisplayPoint>, stats: Stats) -> YearOutcome {
    if points.is_empty() {
        YearOutcome::Empty {
            year: year.to_string(),
            stats,
        }
    } else {
        YearOutcome::Loaded(YearSeries {
            year: year.to_string(),
            points,
            stats,
        })
    }
}
