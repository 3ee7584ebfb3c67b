//! Builders turning extracted field maps into structured profiles.
//!
//! Pure transformations: unit normalization, guarded ratio derivation and
//! ESG categorization. Division by zero or by an unknown value yields
//! "unknown" (`None`), never an error.

use crate::extract::{SectorFields, SustainabilityFields};
use crate::model::{EsgCategory, SectorProfile, SustainabilityProfile};

/// Builds a `SectorProfile` from extracted sector fields, deriving the
/// electric share of the fleet where both sides are known.
pub fn build_sector_profile(fields: &SectorFields) -> SectorProfile {
    let electric_share = match (fields.fleet_electric, fields.fleet_total) {
        (Some(electric), Some(total)) if total > 0 => Some(electric as f64 / total as f64),
        _ => None,
    };

    SectorProfile {
        fleet_total: fields.fleet_total,
        fleet_diesel: fields.fleet_diesel,
        fleet_hybrid: fields.fleet_hybrid,
        fleet_electric: fields.fleet_electric,
        depots: fields.depots,
        daily_ridership: fields.daily_ridership,
        annual_opex_usd: fields.annual_opex_usd,
        annual_co2_tons: fields.annual_co2_tons,
        electric_share,
        notes: fields.notes.clone(),
    }
}

const DEFAULT_ACCESSIBILITY: [&str; 3] = [
    "New electric buses will include low-floor design for accessibility",
    "Route planning to prioritize underserved communities",
    "Fare integration to maintain affordability",
];

const DEFAULT_POLICY: [&str; 3] = [
    "Aligned with National Climate Action Plan and NDC commitments",
    "Supports national sustainable transport objectives",
    "Consistent with the lender's green economy transition approach",
];

const DEFAULT_RISKS: [&str; 4] = [
    "Grid capacity constraints may limit charging infrastructure deployment",
    "Foreign exchange risk on USD-denominated repayments",
    "Technology obsolescence risk for early-generation e-buses",
    "Labor transition risk for diesel maintenance workforce",
];

const DEFAULT_MITIGATIONS: [&str; 4] = [
    "Technical assistance for grid capacity assessment and planning",
    "Phased deployment approach to manage technology risk",
    "Capacity building program for city transport authority",
    "Worker retraining program for diesel mechanics to EV maintenance",
];

fn or_defaults(notes: &[String], defaults: &[&str], limit: usize) -> Vec<String> {
    if notes.is_empty() {
        defaults.iter().map(|s| s.to_string()).collect()
    } else {
        notes.iter().take(limit).cloned().collect()
    }
}

/// Derives the ESG category: an explicit labeled category wins; otherwise
/// two or more high-risk keyword hits push to A, two or more low-risk hits
/// pull to C, and everything else lands on B.
fn derive_category(fields: &SustainabilityFields) -> EsgCategory {
    if let Some(category) = fields.esg_category {
        return category;
    }
    if fields.high_risk_signals >= 2 {
        EsgCategory::A
    } else if fields.low_risk_signals >= 2 {
        EsgCategory::C
    } else {
        EsgCategory::B
    }
}

/// Builds a `SustainabilityProfile`. The CO2 reduction estimate in tons is
/// derivable only when both the reduction target (percent) and a baseline
/// emissions figure are known.
pub fn build_sustainability_profile(
    fields: &SustainabilityFields,
    baseline_co2_tons: Option<f64>,
) -> SustainabilityProfile {
    let co2_reduction_tons = match (fields.co2_reduction_pct, baseline_co2_tons) {
        (Some(pct), Some(baseline)) => Some(baseline * pct / 100.0),
        _ => None,
    };

    let pm25_note = match fields.pm25_reduction_pct {
        Some(pct) => format!("{}% reduction in PM2.5 emissions", pct),
        None => {
            "Estimated 25-40% reduction in local PM2.5 emissions from fleet electrification"
                .to_string()
        }
    };

    SustainabilityProfile {
        esg_category: derive_category(fields),
        co2_reduction_tons,
        pm25_note,
        accessibility: or_defaults(&fields.accessibility_notes, &DEFAULT_ACCESSIBILITY, 3),
        policy_alignment: or_defaults(&fields.policy_notes, &DEFAULT_POLICY, 4),
        risk_flags: or_defaults(&fields.risk_notes, &DEFAULT_RISKS, 4),
        mitigations: or_defaults(&fields.mitigation_notes, &DEFAULT_MITIGATIONS, 4),
    }
}
