// Display series transforms: month-over-month change and cumulative growth
use crate::normalizers::{month_index, month_label};
use crate::types::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::warn;

/// Round to 2 decimal places, halves away from zero
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `(current - previous) / previous * 100`, or 0 when `previous` is 0
fn percent_change(previous: Decimal, current: Decimal) -> Decimal {
    if previous.is_zero() {
        return Decimal::ZERO;
    }

    (current - previous)
        .checked_div(previous)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(round2)
        .unwrap_or_else(|| {
            warn!("percent change overflow ({} -> {})", previous, current);
            Decimal::ZERO
        })
}

/// Build the display series for one year's records.
///
/// Points are sorted by calendar month before deltas are computed, so the
/// arrival order of records never affects `percent_change`. Records with an
/// unparseable month are dropped.
pub fn transform_data(records: &[MonthlyRecord]) -> Vec<DisplayPoint> {
    let mut points: Vec<DisplayPoint> = records
        .iter()
        .filter_map(|record| {
            let Some(index) = month_index(&record.month) else {
                warn!("Skipping record with invalid month {:?}", record.month);
                return None;
            };
            Some(DisplayPoint {
                label: month_label(index)?.to_string(),
                sort_index: index,
                balance: record.balance,
                percent_change: Decimal::ZERO,
                cumulative_growth_percent: None,
                source_month: record.month.clone(),
            })
        })
        .collect();

    points.sort_by_key(|p| p.sort_index);

    for i in 1..points.len() {
        points[i].percent_change = percent_change(points[i - 1].balance, points[i].balance);
    }

    points
}

/// Attach cumulative growth relative to the first point.
///
/// Expects points already sorted by `sort_index`. When the series is empty
/// or the first balance is zero the input is returned unchanged.
pub fn calculate_cumulative(mut points: Vec<DisplayPoint>) -> Vec<DisplayPoint> {
    let Some(base) = points.first().map(|p| p.balance) else {
        return points;
    };
    if base.is_zero() {
        warn!("First balance is zero, skipping cumulative growth");
        return points;
    }

    for (i, point) in points.iter_mut().enumerate() {
        let growth = if i == 0 {
            Some(Decimal::ZERO)
        } else {
            point
                .balance
                .checked_div(base)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                .map(|pct| round2(pct - Decimal::ONE_HUNDRED))
        };
        point.cumulative_growth_percent = growth;
    }

    points
}

/// Which value a chart should plot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartMode {
    #[default]
    Monthly,
    Cumulative,
    Balance,
}

/// Point handed to a chart renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChartPoint {
    Monthly { name: String, profit: f64 },
    Cumulative { name: String, cumulative: f64 },
    Balance { name: String, balance: f64 },
}

impl ChartPoint {
    pub fn name(&self) -> &str {
        match self {
            ChartPoint::Monthly { name, .. }
            | ChartPoint::Cumulative { name, .. }
            | ChartPoint::Balance { name, .. } => name,
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            ChartPoint::Monthly { profit, .. } => *profit,
            ChartPoint::Cumulative { cumulative, .. } => *cumulative,
            ChartPoint::Balance { balance, .. } => *balance,
        }
    }
}

/// Project display points into chart points.
/// Cumulative mode yields nothing for a series without cumulative figures.
pub fn chart_points(points: &[DisplayPoint], mode: ChartMode) -> Vec<ChartPoint> {
    points
        .iter()
        .filter_map(|p| {
            let name = p.label.clone();
            match mode {
                ChartMode::Monthly => Some(ChartPoint::Monthly {
                    name,
                    profit: p.percent_change.to_f64()?,
                }),
                ChartMode::Cumulative => Some(ChartPoint::Cumulative {
                    name,
                    cumulative: p.cumulative_growth_percent?.to_f64()?,
                }),
                ChartMode::Balance => Some(ChartPoint::Balance {
                    name,
                    balance: p.balance.to_f64()?,
                }),
            }
        })
        .collect()
}

/// Tooltip text for a chart point
pub fn format_tooltip(point: &ChartPoint) -> String {
    match point {
        ChartPoint::Monthly { name, profit } => format!("{}: Profit: {:.2}%", name, profit),
        ChartPoint::Cumulative { name, cumulative } => {
            format!("{}: Growth: {:.2}%", name, cumulative)
        }
        ChartPoint::Balance { name, balance } => format!("{}: Balance: {:.2}", name, balance),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(month: &str, balance: Decimal) -> MonthlyRecord {
        MonthlyRecord {
            month: month.to_string(),
            balance,
        }
    }

    #[test]
    fn test_three_month_scenario() {
        let records = vec![
            record("2023-01", dec!(100)),
            record("2023-02", dec!(110)),
            record("2023-03", dec!(99)),
        ];

        let points = calculate_cumulative(transform_data(&records));
        assert_eq!(points.len(), 3);

        assert_eq!(points[0].label, "Jan");
        assert_eq!(points[0].percent_change, dec!(0));
        assert_eq!(points[0].cumulative_growth_percent, Some(dec!(0)));

        assert_eq!(points[1].label, "Feb");
        assert_eq!(points[1].percent_change, dec!(10.00));
        assert_eq!(points[1].cumulative_growth_percent, Some(dec!(10.00)));

        assert_eq!(points[2].label, "Mar");
        assert_eq!(points[2].percent_change, dec!(-10.00));
        assert_eq!(points[2].cumulative_growth_percent, Some(dec!(-1.00)));
    }

    #[test]
    fn test_midpoint_rounds_away_from_zero() {
        assert_eq!(round2(dec!(0.125)), dec!(0.13));
        assert_eq!(round2(dec!(-0.125)), dec!(-0.13));
        assert_eq!(round2(dec!(0.124)), dec!(0.12));

        // 1 -> 1.00125 is exactly +0.125%
        let points = calculate_cumulative(transform_data(&[
            record("2023-01", dec!(1)),
            record("2023-02", dec!(1.00125)),
        ]));
        assert_eq!(points[1].percent_change, dec!(0.13));
        assert_eq!(points[1].cumulative_growth_percent, Some(dec!(0.13)));
    }

    #[test]
    fn test_out_of_order_input_sorted_before_deltas() {
        let records = vec![
            record("2023-03", dec!(99)),
            record("2023-01", dec!(100)),
            record("2023-02", dec!(110)),
        ];

        let points = transform_data(&records);
        let labels: Vec<&str> = points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Jan", "Feb", "Mar"]);
        assert_eq!(points[0].percent_change, dec!(0));
        assert_eq!(points[1].percent_change, dec!(10));
        assert_eq!(points[2].percent_change, dec!(-10));
        assert_eq!(points[2].source_month, "2023-03");
    }

    #[test]
    fn test_percent_change_rounding() {
        let records = vec![record("2023-01", dec!(3)), record("2023-02", dec!(4))];
        let points = transform_data(&records);
        // 1/3 * 100 = 33.333...
        assert_eq!(points[1].percent_change, dec!(33.33));

        let records = vec![record("2023-01", dec!(3)), record("2023-02", dec!(5))];
        let points = transform_data(&records);
        assert_eq!(points[1].percent_change, dec!(66.67));
    }

    #[test]
    fn test_zero_previous_balance_has_no_change() {
        let records = vec![
            record("2023-01", dec!(50)),
            record("2023-02", dec!(0)),
            record("2023-03", dec!(25)),
        ];
        let points = transform_data(&records);
        assert_eq!(points[1].percent_change, dec!(-100));
        assert_eq!(points[2].percent_change, dec!(0));
    }

    #[test]
    fn test_zero_base_skips_cumulative() {
        let records = vec![record("2023-01", dec!(0)), record("2023-02", dec!(10))];
        let points = transform_data(&records);
        let unchanged = calculate_cumulative(points.clone());
        assert_eq!(unchanged, points);
        assert!(unchanged.iter().all(|p| p.cumulative_growth_percent.is_none()));
    }

    #[test]
    fn test_cumulative_empty_series() {
        assert!(calculate_cumulative(Vec::new()).is_empty());
    }

    #[test]
    fn test_chart_points() {
        let records = vec![record("2023-01", dec!(100)), record("2023-02", dec!(110))];
        let points = calculate_cumulative(transform_data(&records));

        let monthly = chart_points(&points, ChartMode::Monthly);
        assert_eq!(monthly[1].name(), "Feb");
        assert!((monthly[1].value() - 10.0).abs() < 1e-9);

        let cumulative = chart_points(&points, ChartMode::Cumulative);
        assert_eq!(cumulative.len(), 2);
        assert_eq!(format_tooltip(&cumulative[1]), "Feb: Growth: 10.00%");

        let balance = chart_points(&points, ChartMode::Balance);
        assert_eq!(format_tooltip(&balance[0]), "Jan: Balance: 100.00");

        let json = serde_json::to_value(&balance[1]).unwrap();
        assert_eq!(json["name"], "Feb");
        assert_eq!(json["balance"], 110.0);
    }

    #[test]
    fn test_cumulative_chart_empty_without_base() {
        let records = vec![record("2023-01", dec!(0)), record("2023-02", dec!(10))];
        let points = calculate_cumulative(transform_data(&records));
        assert!(chart_points(&points, ChartMode::Cumulative).is_empty());
        assert_eq!(chart_points(&points, ChartMode::Monthly).len(), 2);
    }
}
