//! Financial structuring: generates the three candidate financing options
//! and scores each with the 60/40 rule (60 points repayment capacity, 40
//! points rate competitiveness).
//!
//! The sub-band boundaries have no documented derivation from the domain
//! owners and are therefore carried as configuration constants on
//! `ScoringConfig` rather than hard-wired.

use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::{FinancialOption, OptionKind};
use crate::reference::{FxRisk, ReferenceData};

pub const REPAYMENT_SCORE_MAX: f64 = 60.0;
pub const RATE_SCORE_MAX: f64 = 40.0;

/// Tunable scoring constants. Defaults reproduce the established review
/// methodology.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoringConfig {
    pub dscr_strong: f64,
    pub dscr_adequate: f64,
    pub dscr_marginal: f64,
    pub dscr_strong_points: f64,
    pub dscr_adequate_points: f64,
    pub dscr_marginal_points: f64,
    pub dscr_weak_points: f64,
    pub fx_low_points: f64,
    pub fx_medium_points: f64,
    pub fx_high_points: f64,
    pub debt_ratio_low: f64,
    pub debt_ratio_moderate: f64,
    pub debt_low_points: f64,
    pub debt_moderate_points: f64,
    pub debt_high_points: f64,
    /// Spread below the peer median (bps) at which the rate score maxes out.
    pub favorable_spread_bps: f64,
    /// Spread above the peer median (bps) at which the rate score bottoms out.
    pub unfavorable_spread_bps: f64,
    /// Rate of the concessional sleeve blended into co-financing, in bps.
    pub concessional_rate_bps: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            dscr_strong: 2.0,
            dscr_adequate: 1.5,
            dscr_marginal: 1.2,
            dscr_strong_points: 30.0,
            dscr_adequate_points: 22.0,
            dscr_marginal_points: 15.0,
            dscr_weak_points: 5.0,
            fx_low_points: 15.0,
            fx_medium_points: 8.0,
            fx_high_points: 0.0,
            debt_ratio_low: 0.4,
            debt_ratio_moderate: 0.6,
            debt_low_points: 15.0,
            debt_moderate_points: 8.0,
            debt_high_points: 0.0,
            favorable_spread_bps: 50.0,
            unfavorable_spread_bps: 150.0,
            concessional_rate_bps: 150.0,
        }
    }
}

/// Repayment capacity score in [0, 60]: DSCR, FX risk and debt ratio are
/// each mapped to a sub-band and summed.
pub fn repayment_score(config: &ScoringConfig, dscr: f64, fx: FxRisk, debt_ratio: f64) -> f64 {
    let dscr_points = if dscr >= config.dscr_strong {
        config.dscr_strong_points
    } else if dscr >= config.dscr_adequate {
        config.dscr_adequate_points
    } else if dscr >= config.dscr_marginal {
        config.dscr_marginal_points
    } else {
        config.dscr_weak_points
    };

    let fx_points = match fx {
        FxRisk::Low => config.fx_low_points,
        FxRisk::Medium => config.fx_medium_points,
        FxRisk::High => config.fx_high_points,
    };

    let debt_points = if debt_ratio < config.debt_ratio_low {
        config.debt_low_points
    } else if debt_ratio < config.debt_ratio_moderate {
        config.debt_moderate_points
    } else {
        config.debt_high_points
    };

    (dscr_points + fx_points + debt_points).clamp(0.0, REPAYMENT_SCORE_MAX)
}

/// Rate competitiveness score in [0, 40]: linear in the margin below the
/// peer median rate, clamped at both ends of the spread window.
pub fn rate_score(config: &ScoringConfig, rate_bps: f64, peer_median_bps: f64) -> f64 {
    let margin = peer_median_bps - rate_bps;
    let window = config.favorable_spread_bps + config.unfavorable_spread_bps;
    let raw = RATE_SCORE_MAX * (margin + config.unfavorable_spread_bps) / window;
    raw.clamp(0.0, RATE_SCORE_MAX)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

struct Template {
    kind: OptionKind,
    tenor_years: u32,
    grace_years: u32,
    rate_bps: f64,
    benefits: &'static [&'static str],
    tradeoffs: &'static [&'static str],
}

const SOVEREIGN: Template = Template {
    kind: OptionKind::Sovereign,
    tenor_years: 20,
    grace_years: 5,
    rate_bps: 180.0,
    benefits: &[
        "Lowest cost of capital",
        "Strong sovereign backing",
        "Long tenor with grace period",
        "Preferred creditor status for the lender",
    ],
    tradeoffs: &[
        "Requires sovereign guarantee process",
        "Subject to national debt ceiling",
        "May face parliamentary approval requirements",
    ],
};

const GUARANTEED: Template = Template {
    kind: OptionKind::Guaranteed,
    tenor_years: 15,
    grace_years: 3,
    rate_bps: 250.0,
    benefits: &[
        "Builds city capacity for future borrowing",
        "Faster disbursement",
        "Direct accountability to beneficiary",
        "Supports decentralization agenda",
    ],
    tradeoffs: &[
        "Higher interest rate",
        "Shorter tenor",
        "Requires sovereign guarantee",
        "City revenue may be volatile",
    ],
};

const BLENDED: Template = Template {
    kind: OptionKind::Blended,
    tenor_years: 18,
    grace_years: 4,
    rate_bps: 210.0,
    benefits: &[
        "Brings in concessional funding",
        "Demonstrates donor coordination",
        "Can unlock grant components for technical assistance",
    ],
    tradeoffs: &[
        "Complex structuring and coordination",
        "Multiple approval processes",
        "Potential misalignment of conditions",
        "Longer preparation time",
    ],
};

fn build_option(
    template: &Template,
    principal_usd: f64,
    reference: &ReferenceData,
    config: &ScoringConfig,
) -> FinancialOption {
    let indicators = &reference.repayment;
    let medians = &reference.peer_medians;

    // Each structure is scored against its own peer cohort; the blended
    // structure averages sovereign and city indicators and carries the
    // concessional sleeve into its effective rate.
    let (peer_median, scoring_rate, dscr, fx, debt_ratio, benefits) = match template.kind {
        OptionKind::Sovereign => (
            medians.sovereign_bps,
            template.rate_bps,
            indicators.sovereign_dscr,
            indicators.sovereign_fx_risk,
            indicators.sovereign_debt_ratio,
            to_strings(template.benefits),
        ),
        OptionKind::Guaranteed => (
            medians.subnational_bps,
            template.rate_bps,
            indicators.city_dscr,
            indicators.city_fx_risk,
            indicators.city_debt_ratio,
            to_strings(template.benefits),
        ),
        OptionKind::Blended => {
            let mut benefits = vec![format!(
                "Reduces lender exposure to ${:.0}M",
                principal_usd * 0.6 / 1e6
            )];
            benefits.extend(to_strings(template.benefits));
            (
                medians.blended_bps,
                (template.rate_bps + config.concessional_rate_bps) / 2.0,
                (indicators.sovereign_dscr + indicators.city_dscr) / 2.0,
                FxRisk::Medium,
                (indicators.sovereign_debt_ratio + indicators.city_debt_ratio) / 2.0,
                benefits,
            )
        }
    };

    let repayment = round1(repayment_score(config, dscr, fx, debt_ratio));
    let rate = round1(rate_score(config, scoring_rate, peer_median));

    debug!(
        "{:?}: repayment={} rate={} (scoring rate {} bps vs peer median {} bps)",
        template.kind, repayment, rate, scoring_rate, peer_median
    );

    let tradeoffs = to_strings(template.tradeoffs);

    FinancialOption {
        kind: template.kind,
        label: template.kind.label().to_string(),
        tenor_years: template.tenor_years,
        grace_years: template.grace_years,
        rate_bps: template.rate_bps,
        principal_usd,
        repayment_score: repayment,
        rate_score: rate,
        total_score: repayment + rate,
        benefits,
        tradeoffs,
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Generates exactly three options in the fixed presentation order
/// (Sovereign, Guaranteed, Blended). Ranking by total score is
/// informational only: no option is ever dropped or reordered for a low
/// score.
pub fn build_financial_options(
    principal_usd: f64,
    reference: &ReferenceData,
    config: &ScoringConfig,
) -> Vec<FinancialOption> {
    [&SOVEREIGN, &GUARANTEED, &BLENDED]
        .into_iter()
        .map(|template| build_option(template, principal_usd, reference, config))
        .collect()
}

/// One repayment year of a loan schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CashflowYear {
    pub year: u32,
    pub principal_payment: f64,
    pub interest_payment: f64,
    pub total_payment: f64,
    pub outstanding_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RepaymentSchedule {
    pub principal_usd: f64,
    pub tenor_years: u32,
    pub grace_years: u32,
    pub rate_bps: f64,
    pub total_interest: f64,
    pub total_repayment: f64,
    pub years: Vec<CashflowYear>,
}

/// Straight-line amortization after the grace period: interest accrues on
/// the outstanding balance; principal repays in equal annual installments
/// once grace ends.
pub fn amortization_schedule(
    principal_usd: f64,
    tenor_years: u32,
    grace_years: u32,
    rate_bps: f64,
) -> RepaymentSchedule {
    let rate = rate_bps / 10_000.0;
    let repayment_years = tenor_years.saturating_sub(grace_years);
    let annual_principal = if repayment_years > 0 {
        principal_usd / repayment_years as f64
    } else {
        0.0
    };

    let mut years = Vec::with_capacity(tenor_years as usize);
    let mut outstanding = principal_usd;
    let mut total_interest = 0.0;

    for year in 1..=tenor_years {
        let interest = outstanding * rate;
        let principal_payment = if year <= grace_years { 0.0 } else { annual_principal };
        outstanding = (outstanding - principal_payment).max(0.0);
        total_interest += interest;

        years.push(CashflowYear {
            year,
            principal_payment,
            interest_payment: interest,
            total_payment: interest + principal_payment,
            outstanding_balance: outstanding,
        });
    }

    RepaymentSchedule {
        principal_usd,
        tenor_years,
        grace_years,
        rate_bps,
        total_interest,
        total_repayment: principal_usd + total_interest,
        years,
    }
}
