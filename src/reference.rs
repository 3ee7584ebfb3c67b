//! Read-only reference tables: international benchmark cities, market rate
//! constants and repayment indicators. These are configuration inputs to the
//! gap analysis, KPI and financial structuring engines, not owned case state.
//! The stub values stand in for real market-data and treasury feeds.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::BenchmarkCity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BenchmarkRow {
    pub city: BenchmarkCity,
    pub country: String,
    pub fleet_total: u32,
    pub fleet_electric: u32,
    pub electrification_pct: f64,
    pub cost_per_bus_usd: f64,
    pub daily_ridership_per_bus: f64,
    pub note: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FxRisk {
    Low,
    Medium,
    High,
}

impl FxRisk {
    pub fn label(self) -> &'static str {
        match self {
            FxRisk::Low => "low",
            FxRisk::Medium => "medium",
            FxRisk::High => "high",
        }
    }
}

/// Swap rate and green bond spread, as fractions (0.02 = 2%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MarketRates {
    pub eur_swap_10y: f64,
    pub green_bond_spread_10y: f64,
}

impl MarketRates {
    pub fn all_in_green_rate(&self) -> f64 {
        self.eur_swap_10y + self.green_bond_spread_10y
    }

    pub fn all_in_green_rate_pct(&self) -> f64 {
        self.all_in_green_rate() * 100.0
    }
}

/// Median all-in rates of recent peer transactions, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeerMedianRates {
    pub sovereign_bps: f64,
    pub subnational_bps: f64,
    pub blended_bps: f64,
    pub commercial_bps: f64,
}

/// Repayment capacity indicators for the borrower and the beneficiary
/// city, as a treasury system would report them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RepaymentIndicators {
    pub sovereign_dscr: f64,
    pub sovereign_fx_risk: FxRisk,
    pub sovereign_debt_ratio: f64,
    pub city_dscr: f64,
    pub city_fx_risk: FxRisk,
    pub city_debt_ratio: f64,
}

/// The full read-only reference data set consumed by phases 1-3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReferenceData {
    pub benchmarks: Vec<BenchmarkRow>,
    pub market_rates: MarketRates,
    pub peer_medians: PeerMedianRates,
    pub repayment: RepaymentIndicators,
}

impl ReferenceData {
    /// Fixed stub tables derived from public EV-fleet reports and peer
    /// transaction summaries.
    pub fn stub() -> Self {
        ReferenceData {
            benchmarks: vec![
                BenchmarkRow {
                    city: BenchmarkCity::Shenzhen,
                    country: "China".to_string(),
                    fleet_total: 16_359,
                    fleet_electric: 16_359,
                    electrification_pct: 100.0,
                    cost_per_bus_usd: 32_000.0,
                    daily_ridership_per_bus: 850.0,
                    note: "First major city to achieve 100% e-bus fleet (2017)".to_string(),
                },
                BenchmarkRow {
                    city: BenchmarkCity::London,
                    country: "UK".to_string(),
                    fleet_total: 9_000,
                    fleet_electric: 3_150,
                    electrification_pct: 35.0,
                    cost_per_bus_usd: 45_000.0,
                    daily_ridership_per_bus: 620.0,
                    note: "Target: 100% zero-emission by 2034".to_string(),
                },
                BenchmarkRow {
                    city: BenchmarkCity::Santiago,
                    country: "Chile".to_string(),
                    fleet_total: 6_800,
                    fleet_electric: 1_360,
                    electrification_pct: 20.0,
                    cost_per_bus_usd: 38_000.0,
                    daily_ridership_per_bus: 720.0,
                    note: "Largest e-bus fleet in Latin America".to_string(),
                },
                BenchmarkRow {
                    city: BenchmarkCity::Bogota,
                    country: "Colombia".to_string(),
                    fleet_total: 8_200,
                    fleet_electric: 1_148,
                    electrification_pct: 14.0,
                    cost_per_bus_usd: 36_000.0,
                    daily_ridership_per_bus: 680.0,
                    note: "TransMilenio BRT electrification ongoing".to_string(),
                },
            ],
            market_rates: MarketRates {
                eur_swap_10y: 0.02,
                green_bond_spread_10y: 0.006,
            },
            peer_medians: PeerMedianRates {
                sovereign_bps: 175.0,
                subnational_bps: 280.0,
                blended_bps: 200.0,
                commercial_bps: 450.0,
            },
            repayment: RepaymentIndicators {
                sovereign_dscr: 1.8,
                sovereign_fx_risk: FxRisk::Medium,
                sovereign_debt_ratio: 0.55,
                city_dscr: 1.4,
                city_fx_risk: FxRisk::High,
                city_debt_ratio: 0.35,
            },
        }
    }

    pub fn benchmark(&self, city: BenchmarkCity) -> Option<&BenchmarkRow> {
        self.benchmarks.iter().find(|row| row.city == city)
    }

    /// Benchmark rows in the canonical comparison order, skipping cities
    /// absent from a customized table.
    pub fn benchmarks_in_canonical_order(&self) -> Vec<&BenchmarkRow> {
        BenchmarkCity::CANONICAL_ORDER
            .iter()
            .filter_map(|city| self.benchmark(*city))
            .collect()
    }

    /// Highest value of `field` across the benchmark table.
    pub fn best_benchmark_by<F>(&self, field: F, higher_is_better: bool) -> Option<&BenchmarkRow>
    where
        F: Fn(&BenchmarkRow) -> f64,
    {
        let mut best: Option<&BenchmarkRow> = None;
        for row in &self.benchmarks {
            let better = match best {
                None => true,
                Some(current) => {
                    if higher_is_better {
                        field(row) > field(current)
                    } else {
                        field(row) < field(current)
                    }
                }
            };
            if better {
                best = Some(row);
            }
        }
        best
    }
}

impl Default for ReferenceData {
    fn default() -> Self {
        ReferenceData::stub()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_has_four_cities_in_canonical_order() {
        let reference = ReferenceData::stub();
        let ordered = reference.benchmarks_in_canonical_order();
        assert_eq!(ordered.len(), 4);
        assert_eq!(ordered[0].city, BenchmarkCity::Shenzhen);
        assert_eq!(ordered[1].city, BenchmarkCity::London);
        assert_eq!(ordered[2].city, BenchmarkCity::Santiago);
        assert_eq!(ordered[3].city, BenchmarkCity::Bogota);
    }

    #[test]
    fn test_all_in_green_rate() {
        let rates = ReferenceData::stub().market_rates;
        assert!((rates.all_in_green_rate() - 0.026).abs() < 1e-12);
        assert!((rates.all_in_green_rate_pct() - 2.6).abs() < 1e-9);
    }

    #[test]
    fn test_best_benchmark_selection() {
        let reference = ReferenceData::stub();

        let best_electrified = reference
            .best_benchmark_by(|row| row.electrification_pct, true)
            .unwrap();
        assert_eq!(best_electrified.city, BenchmarkCity::Shenzhen);

        let cheapest = reference
            .best_benchmark_by(|row| row.cost_per_bus_usd, false)
            .unwrap();
        assert_eq!(cheapest.city, BenchmarkCity::Shenzhen);

        let busiest = reference
            .best_benchmark_by(|row| row.daily_ridership_per_bus, true)
            .unwrap();
        assert_eq!(busiest.city, BenchmarkCity::Shenzhen);
    }
}
