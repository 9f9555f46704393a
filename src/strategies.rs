//! Catalog of strategies whose results can be displayed

use phf::phf_map;
use serde::Serialize;

/// A strategy published by the results service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Strategy {
    pub id: &'static str,
    pub name: &'static str,
    pub featured: bool,
}

static STRATEGIES: phf::Map<&'static str, Strategy> = phf_map! {
    "rasta-trendier" => Strategy { id: "rasta-trendier", name: "rasta-trendier Strategy", featured: true },
    "macd" => Strategy { id: "macd", name: "MACD Histogram Strategy", featured: false },
    "sma" => Strategy { id: "sma", name: "SMA Crossover Strategy", featured: false },
};

/// Display order for listings
const ORDER: [&str; 3] = ["rasta-trendier", "macd", "sma"];

pub const DEFAULT_STRATEGY: &str = "rasta-trendier";

pub fn strategy(id: &str) -> Option<&'static Strategy> {
    STRATEGIES.get(id)
}

pub fn all_strategies() -> Vec<&'static Strategy> {
    ORDER.iter().filter_map(|id| STRATEGIES.get(*id)).collect()
}

pub fn featured() -> Option<&'static Strategy> {
    all_strategies().into_iter().find(|s| s.featured)
}
