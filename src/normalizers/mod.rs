// Parse-and-validate layer between the results API and the series transforms
use crate::types::*;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Three-letter labels indexed by 0-based month
pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Wire shape of `GET /api/v1/results/monthly/{strategy}-{year}`
#[derive(Debug, Deserialize)]
struct MonthlyResultsResponse {
    monthly_results: Vec<RawRecord>,
    win_rate: f64,
    profit_factor: f64,
    win_count: u64,
    loss_count: u64,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    month: String,
    balance: Decimal,
}

/// Decode a response body and validate every record
pub fn parse_response(body: &[u8]) -> Result<MonthlyResults> {
    let raw: MonthlyResultsResponse = serde_json::from_slice(body)
        .map_err(|e| DataError::Decode(e.to_string()))?;

    let records = raw
        .monthly_results
        .into_iter()
        .map(|r| validate_record(r.month, r.balance))
        .collect::<Result<Vec<_>>>()?;

    Ok(MonthlyResults {
        records,
        stats: Stats {
            win_rate: raw.win_rate,
            profit_factor: raw.profit_factor,
            win_count: raw.win_count,
            loss_count: raw.loss_count,
        },
    })
}

/// Reject malformed months and negative balances
pub fn validate_record(month: String, balance: Decimal) -> Result<MonthlyRecord> {
    if month_index(&month).is_none() {
        return Err(DataError::Decode(format!(
            "month must be YYYY-MM, got {:?}",
            month
        )));
    }

    if balance < Decimal::ZERO {
        return Err(DataError::Decode(format!(
            "balance for {} must be non-negative, got {}",
            month, balance
        )));
    }

    Ok(MonthlyRecord { month, balance })
}

/// 0-based month index from a "YYYY-MM" string
pub fn month_index(month: &str) -> Option<usize> {
    let bytes = month.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return None;
    }
    if !bytes[..4].iter().all(u8::is_ascii_digit) {
        return None;
    }

    // Characters 6-7 hold the 1-based month
    let mm = month.get(5..7)?;
    if !mm.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match mm.parse::<usize>().ok()? {
        m @ 1..=12 => Some(m - 1),
        _ => None,
    }
}

/// Month label for a 0-based index
pub fn month_label(index: usize) -> Option<&'static str> {
    MONTH_LABELS.get(index).copied()
}

/// Keep only records whose month starts with `"{year}-"`
pub fn filter_year(records: Vec<MonthlyRecord>, year: &str) -> Vec<MonthlyRecord> {
    let prefix = format!("{}-", year);
    records
        .into_iter()
        .filter(|r| r.month.starts_with(&prefix))
        .collect()
}

/// Four ASCII digits
pub fn is_year_key(year: &str) -> bool {
    year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit())
}
