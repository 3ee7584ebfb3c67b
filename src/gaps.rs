//! Gap analysis: compares the case's sector metrics against each benchmark
//! city and ranks the deltas by severity.

use std::cmp::Ordering;

use crate::model::{BenchmarkCity, GapAnalysisItem, GapMetric, SectorProfile};
use crate::reference::{BenchmarkRow, ReferenceData};

fn case_value(profile: &SectorProfile, metric: GapMetric) -> Option<f64> {
    match metric {
        GapMetric::ElectrificationRate => profile.electrification_pct(),
        GapMetric::OpexPerBus => profile.opex_per_bus(),
        GapMetric::RidershipPerBus => profile.ridership_per_bus(),
    }
}

fn benchmark_value(row: &BenchmarkRow, metric: GapMetric) -> f64 {
    match metric {
        GapMetric::ElectrificationRate => row.electrification_pct,
        GapMetric::OpexPerBus => row.cost_per_bus_usd,
        GapMetric::RidershipPerBus => row.daily_ridership_per_bus,
    }
}

const METRICS: [GapMetric; 3] = [
    GapMetric::ElectrificationRate,
    GapMetric::OpexPerBus,
    GapMetric::RidershipPerBus,
];

/// One item per (city, metric) pair where the case value is known. A zero
/// benchmark value yields a "not comparable" item with no relative delta
/// instead of a division error. Within each city, items are ordered by
/// descending absolute relative delta, not-comparable items last; cities
/// follow the canonical order.
pub fn build_gap_analysis(profile: &SectorProfile, reference: &ReferenceData) -> Vec<GapAnalysisItem> {
    let mut items = Vec::new();

    for city in BenchmarkCity::CANONICAL_ORDER {
        let Some(row) = reference.benchmark(city) else {
            continue;
        };

        let mut city_items: Vec<GapAnalysisItem> = Vec::new();
        for metric in METRICS {
            let Some(case) = case_value(profile, metric) else {
                continue;
            };
            let benchmark = benchmark_value(row, metric);
            let delta = case - benchmark;
            let delta_pct = if benchmark == 0.0 {
                None
            } else {
                Some(delta / benchmark)
            };
            city_items.push(GapAnalysisItem {
                city,
                metric,
                case_value: case,
                benchmark_value: benchmark,
                delta,
                delta_pct,
                comparable: delta_pct.is_some(),
            });
        }

        city_items.sort_by(|a, b| {
            let severity = |item: &GapAnalysisItem| item.delta_pct.map(f64::abs);
            match (severity(a), severity(b)) {
                (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
        items.extend(city_items);
    }

    items
}
