use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Month-end balance as reported by the results API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRecord {
    pub month: String,           // "YYYY-MM"
    pub balance: Decimal,
}

/// Trade statistics passed through from the results API untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub win_rate: f64,
    pub profit_factor: f64,
    pub win_count: u64,
    pub loss_count: u64,
}

/// Validated body of one results API response
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyResults {
    pub records: Vec<MonthlyRecord>,
    pub stats: Stats,
}

/// One month of a display-ready series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayPoint {
    pub label: String,           // "Jan" .. "Dec"
    pub sort_index: usize,       // 0 - 11
    pub balance: Decimal,
    pub percent_change: Decimal,
    /// `None` until cumulative growth is computed, and left `None` when the
    /// first balance of the year is zero.
    pub cumulative_growth_percent: Option<Decimal>,
    pub source_month: String,
}

/// A year that loaded with at least one month of data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearSeries {
    pub year: String,
    pub points: Vec<DisplayPoint>,
    pub stats: Stats,
}

/// Result of loading a year. `Empty` is a valid answer, not a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum YearOutcome {
    Loaded(YearSeries),
    Empty { year: String, stats: Stats },
}

impl YearOutcome {
    pub fn year(&self) -> &str {
        match self {
            YearOutcome::Loaded(series) => &series.year,
            YearOutcome::Empty { year, .. } => year,
        }
    }

    pub fn stats(&self) -> &Stats {
        match self {
            YearOutcome::Loaded(series) => &series.stats,
            YearOutcome::Empty { stats, .. } => stats,
        }
    }

    pub fn points(&self) -> &[DisplayPoint] {
        match self {
            YearOutcome::Loaded(series) => &series.points,
            YearOutcome::Empty { .. } => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, YearOutcome::Empty { .. })
    }
}

/// Observable state of one year slot in the store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum YearState {
    NotLoaded,
    Loading,
    Loaded(Vec<DisplayPoint>),
    LoadedEmpty,
    Error(String),
}

impl YearState {
    pub fn as_str(&self) -> &'static str {
        match self {
            YearState::NotLoaded => "not_loaded",
            YearState::Loading => "loading",
            YearState::Loaded(_) => "loaded",
            YearState::LoadedEmpty => "loaded_empty",
            YearState::Error(_) => "error",
        }
    }

    /// True once points (or the empty marker) are held for the year
    pub fn is_settled(&self) -> bool {
        matches!(self, YearState::Loaded(_) | YearState::LoadedEmpty)
    }
}

/// Data source health/status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealth {
    pub source: String,
    pub is_healthy: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub success_rate: f64,
    pub avg_latency_ms: u64,
}

/// Reason string carried by `DataError::Fetch` for non-2xx responses
pub const HTTP_ERROR: &str = "http-error";

/// Error types for performance data retrieval
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to load {year}: {reason} (status {status})")]
    Fetch {
        year: String,
        reason: String,
        status: u16,
    },

    #[error("Invalid response format: {0}")]
    Decode(String),

    #[error("Unsupported year: {0}")]
    UnsupportedYear(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
}

/// Result type for data retrieval operations
pub type Result<T> = std::result::Result<T, DataError>;

/// Trait for monthly results sources
#[async_trait::async_trait]
pub trait ResultsSource: Send + Sync {
    /// Fetch and validate the monthly results for one strategy/year key
    async fn fetch_monthly(&self, strategy_id: &str, year: &str) -> Result<MonthlyResults>;

    /// Get source health status
    async fn health(&self) -> SourceHealth;

    /// Source name
    fn name(&self) -> &str;
}
