//! # Concept Review Engine
//!
//! A library that turns raw project documents (need assessments, sector
//! profiles, sustainability notes) into a structured infrastructure loan
//! concept review: benchmark gap analysis, baseline KPIs, scored financing
//! options and a drafted concept note.
//!
//! ## Core Concepts
//!
//! - **Case**: One loan proposal under review; owns its documents, derived
//!   state and phase ledger
//! - **Phases**: Four gated steps (sector baseline, sustainability,
//!   financial structuring, concept note) that must run in order;
//!   re-running a phase invalidates everything downstream
//! - **Extraction**: Deterministic labeled-line pattern matching; an
//!   absent field is `None`, never an error, and an extracted zero is
//!   preserved as a genuine zero
//! - **Scoring**: Each financing option gets 0-60 points for repayment
//!   capacity and 0-40 for rate competitiveness against peer medians
//!
//! ## Example
//!
//! ```rust,ignore
//! use concept_review_engine::*;
//!
//! let mut case = Case::new(1, "Nairobi E-Bus Fleet Renewal", "Kenya", "Urban Transport");
//! case.documents.set(DocumentCategory::NeedAssessment, need_text);
//! case.documents.set(DocumentCategory::SectorProfile, sector_text);
//! case.documents.set(DocumentCategory::Sustainability, esg_text);
//!
//! let orchestrator = Orchestrator::default();
//! for phase in Phase::ALL {
//!     let steps = orchestrator.run_phase(&mut case, phase)?;
//!     for step in steps {
//!         println!("{}. {}", step.order, step.text);
//!     }
//! }
//!
//! orchestrator.select_option(&mut case, OptionKind::Blended)?;
//! orchestrator.approve(&mut case)?;
//! println!("{}", case.derived.note.as_ref().unwrap().body);
//! ```

pub mod error;
pub mod extract;
pub mod finance;
pub mod gaps;
pub mod kpi;
pub mod model;
pub mod note;
pub mod orchestrator;
pub mod profile;
pub mod reference;

pub use error::{ConceptReviewError, Result};
pub use extract::{DemoDefaults, FieldWarning, SectorFields, SustainabilityFields};
pub use finance::{
    amortization_schedule, build_financial_options, RepaymentSchedule, ScoringConfig,
};
pub use gaps::build_gap_analysis;
pub use kpi::build_baseline_kpis;
pub use model::*;
pub use orchestrator::Orchestrator;
pub use reference::{FxRisk, MarketRates, PeerMedianRates, ReferenceData, RepaymentIndicators};

use log::debug;

/// The profiles built from one document set, plus any field-level
/// warnings raised by demo-default substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    pub need: NeedSummary,
    pub sector: SectorProfile,
    pub sustainability: SustainabilityProfile,
    /// Raw extracted fields backing the sustainability profile.
    pub sustainability_fields: SustainabilityFields,
    pub warnings: Vec<FieldWarning>,
}

/// Extracts all three documents and builds the profiles in one step,
/// without touching any case state. Useful for previewing what a phase run
/// would see. The CO2 baseline for the sustainability profile comes from
/// the sector document extracted in the same call.
pub fn extract_and_build(documents: &DocumentSet, demo_defaults: DemoDefaults) -> ExtractionOutcome {
    let mut need = extract::extract_need_fields(&documents.need_assessment);
    let mut sector_fields = extract::extract_sector_fields(&documents.sector_profile);
    let mut sustainability_fields =
        extract::extract_sustainability_fields(&documents.sustainability);

    let mut warnings = Vec::new();
    if demo_defaults == DemoDefaults::Enabled {
        warnings.extend(extract::apply_need_demo_defaults(&mut need));
        warnings.extend(extract::apply_sector_demo_defaults(&mut sector_fields));
        warnings.extend(extract::apply_sustainability_demo_defaults(&mut sustainability_fields));
    }
    debug!("extraction preview produced {} warnings", warnings.len());

    let sector = profile::build_sector_profile(&sector_fields);
    let sustainability =
        profile::build_sustainability_profile(&sustainability_fields, sector.annual_co2_tons);

    ExtractionOutcome {
        need,
        sector,
        sustainability,
        sustainability_fields,
        warnings,
    }
}

/// Runs one phase with a default orchestrator (stub reference data,
/// default scoring, demo defaults disabled).
pub fn run_phase(case: &mut Case, phase: Phase) -> Result<Vec<ReasoningStep>> {
    Orchestrator::default().run_phase(case, phase)
}

/// Renders the concept note body for a case's current derived state.
pub fn assemble_note(case: &Case) -> String {
    note::assemble(case)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_and_build_preview() {
        let mut documents = DocumentSet::default();
        documents.set(
            DocumentCategory::NeedAssessment,
            "Country: Kenya\nRequested amount: USD 50 million".to_string(),
        );
        documents.set(
            DocumentCategory::SectorProfile,
            "Fleet size: 120\nElectric buses: 0".to_string(),
        );

        let outcome = extract_and_build(&documents, DemoDefaults::Disabled);
        assert_eq!(outcome.need.requested_amount_usd, Some(50_000_000.0));
        assert_eq!(outcome.sector.fleet_electric, Some(0));
        assert!(outcome.warnings.is_empty());

        let outcome = extract_and_build(&documents, DemoDefaults::Enabled);
        // Extracted values, including the zero, survive; absent ones get
        // defaults with a warning each.
        assert_eq!(outcome.sector.fleet_total, Some(120));
        assert_eq!(outcome.sector.fleet_electric, Some(0));
        assert_eq!(outcome.sector.depots, Some(extract::demo::DEPOTS));
        assert!(!outcome.warnings.is_empty());
    }

    #[test]
    fn test_extract_and_build_returns_built_sustainability_profile() {
        let mut documents = DocumentSet::default();
        documents.set(
            DocumentCategory::SectorProfile,
            "Fleet size: 450\nAnnual CO2 emissions: 95,000 tons".to_string(),
        );
        documents.set(
            DocumentCategory::Sustainability,
            "ESG Category: B\nThe project targets a 40% reduction in CO2 emissions.".to_string(),
        );

        let outcome = extract_and_build(&documents, DemoDefaults::Disabled);
        assert_eq!(outcome.sustainability.esg_category, EsgCategory::B);
        // The CO2 baseline flows from the sector document extracted in the
        // same call: 40% of 95,000 tons.
        assert_eq!(outcome.sustainability.co2_reduction_tons, Some(38_000.0));
        assert_eq!(outcome.sustainability_fields.co2_reduction_pct, Some(40.0));

        // Without a sector baseline the tonnage stays unknown.
        documents.set(DocumentCategory::SectorProfile, String::new());
        let outcome = extract_and_build(&documents, DemoDefaults::Disabled);
        assert_eq!(outcome.sustainability.co2_reduction_tons, None);
    }

    #[test]
    fn test_top_level_run_phase() {
        let mut case = Case::new(2, "Test", "Kenya", "Urban Transport");
        case.documents.set(
            DocumentCategory::SectorProfile,
            "Fleet size: 120\nElectric buses: 0".to_string(),
        );
        let steps = run_phase(&mut case, Phase::SectorBaseline).unwrap();
        assert!(!steps.is_empty());
        assert!(case.phases.is_completed(Phase::SectorBaseline));
    }
}
