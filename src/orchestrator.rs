//! Phase orchestration: the gated state machine that drives a case from
//! raw documents to a concept note.
//!
//! Each phase run is staged: all outputs are computed first, and the case
//! is only mutated once the whole phase has succeeded. A failed run leaves
//! the case exactly as it was. Re-running a completed phase commits its new
//! outputs and invalidates every later phase, including a selected
//! financing option and a drafted note.

use chrono::Utc;
use log::{debug, info};

use crate::error::{ConceptReviewError, Result};
use crate::extract::{
    apply_need_demo_defaults, apply_sector_demo_defaults, apply_sustainability_demo_defaults,
    extract_need_fields, extract_sector_fields, extract_sustainability_fields, DemoDefaults,
    FieldWarning,
};
use crate::finance::{build_financial_options, ScoringConfig, RATE_SCORE_MAX, REPAYMENT_SCORE_MAX};
use crate::gaps::build_gap_analysis;
use crate::kpi::build_baseline_kpis;
use crate::model::{
    Case, CaseStatus, ConceptNote, NeedSummary, OptionKind, Phase, ReasoningStep, SectorProfile,
    SustainabilityProfile,
};
use crate::note;
use crate::profile::{build_sector_profile, build_sustainability_profile};
use crate::reference::ReferenceData;

/// Runs review phases against cases. Holds the read-only reference tables
/// and scoring constants; all mutable state lives on the `Case`.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    reference: ReferenceData,
    scoring: ScoringConfig,
    demo_defaults: DemoDefaults,
}

/// Accumulates the reasoning trace of one phase run.
struct Trace {
    phase: Phase,
    steps: Vec<ReasoningStep>,
}

impl Trace {
    fn new(phase: Phase) -> Self {
        Trace { phase, steps: Vec::new() }
    }

    fn push(&mut self, text: impl Into<String>) {
        let order = self.steps.len() as u32 + 1;
        self.steps.push(ReasoningStep { phase: self.phase, order, text: text.into() });
    }

    fn push_warnings(&mut self, warnings: &[FieldWarning]) {
        for warning in warnings {
            self.push(format!("{}: {}", warning.field, warning.message));
        }
    }
}

fn millions(amount: f64) -> String {
    format!("${:.1}M", amount / 1e6)
}

impl Orchestrator {
    pub fn new(reference: ReferenceData, scoring: ScoringConfig) -> Self {
        Orchestrator { reference, scoring, demo_defaults: DemoDefaults::Disabled }
    }

    pub fn with_demo_defaults(mut self, demo_defaults: DemoDefaults) -> Self {
        self.demo_defaults = demo_defaults;
        self
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    /// Runs one phase. Phase *n* requires phases 1..n-1 to be contiguously
    /// completed; a violation is rejected without touching the case.
    /// Re-running a completed phase replaces its outputs and clears every
    /// later phase's outputs, the selected option and the drafted note.
    pub fn run_phase(&self, case: &mut Case, phase: Phase) -> Result<Vec<ReasoningStep>> {
        match case.status {
            CaseStatus::Approved | CaseStatus::Rejected => {
                return Err(ConceptReviewError::Validation(format!(
                    "case {} already has a recorded decision; reset it to re-run phases",
                    case.id
                )));
            }
            CaseStatus::New | CaseStatus::InReview => {}
        }

        let current = case.phases.contiguous_completed();
        if phase.number() > current + 1 {
            return Err(ConceptReviewError::Sequencing { requested: phase.number(), current });
        }

        info!("case {}: running phase {} ({})", case.id, phase.number(), phase.title());

        // Compute everything before mutating the case.
        let staged = match phase {
            Phase::SectorBaseline => self.run_sector_baseline(case)?,
            Phase::Sustainability => self.run_sustainability(case)?,
            Phase::FinancialStructuring => self.run_financial_structuring(case)?,
            Phase::ConceptNote => self.run_concept_note(case)?,
        };

        self.commit(case, phase, staged);
        Ok(case.phases.reasoning(phase).to_vec())
    }

    fn run_sector_baseline(&self, case: &Case) -> Result<Staged> {
        let mut trace = Trace::new(Phase::SectorBaseline);

        let mut need = extract_need_fields(&case.documents.need_assessment);
        trace.push(format!(
            "Scanned need assessment ({} chars): country={}, requested amount={}",
            case.documents.need_assessment.len(),
            need.country.as_deref().unwrap_or("unknown"),
            need.requested_amount_usd.map(millions).unwrap_or_else(|| "unknown".to_string()),
        ));

        let mut sector_fields = extract_sector_fields(&case.documents.sector_profile);

        if self.demo_defaults == DemoDefaults::Enabled {
            trace.push_warnings(&apply_need_demo_defaults(&mut need));
            trace.push_warnings(&apply_sector_demo_defaults(&mut sector_fields));
        }

        let sector = build_sector_profile(&sector_fields);
        trace.push(format!(
            "Sector baseline: {} buses total, {} electric ({}), {} daily riders",
            sector.fleet_total.map(|n| n.to_string()).unwrap_or_else(|| "unknown".to_string()),
            sector.fleet_electric.map(|n| n.to_string()).unwrap_or_else(|| "unknown".to_string()),
            sector
                .electrification_pct()
                .map(|p| format!("{:.1}% electrified", p))
                .unwrap_or_else(|| "share unknown".to_string()),
            sector.daily_ridership.map(|n| n.to_string()).unwrap_or_else(|| "unknown".to_string()),
        ));

        let gaps = build_gap_analysis(&sector, &self.reference);
        let comparable = gaps.iter().filter(|g| g.comparable).count();
        trace.push(format!(
            "Compared baseline against {} benchmark cities: {} gap items ({} comparable)",
            self.reference.benchmarks_in_canonical_order().len(),
            gaps.len(),
            comparable,
        ));

        let kpis = build_baseline_kpis(&sector, &self.reference);
        trace.push(format!("Derived {} baseline KPIs with best-in-class targets", kpis.len()));

        Ok(Staged::SectorBaseline { need, sector, gaps, kpis, steps: trace.steps })
    }

    fn run_sustainability(&self, case: &Case) -> Result<Staged> {
        let mut trace = Trace::new(Phase::Sustainability);

        let mut fields = extract_sustainability_fields(&case.documents.sustainability);
        if self.demo_defaults == DemoDefaults::Enabled {
            trace.push_warnings(&apply_sustainability_demo_defaults(&mut fields));
        }

        let baseline_co2 = case.derived.sector.as_ref().and_then(|s| s.annual_co2_tons);
        let profile = build_sustainability_profile(&fields, baseline_co2);

        trace.push(format!(
            "ESG category {:?}: {}",
            profile.esg_category,
            profile.esg_category.description(),
        ));
        match (fields.co2_reduction_pct, profile.co2_reduction_tons) {
            (Some(pct), Some(tons)) => trace.push(format!(
                "CO2 reduction target {}% of {:.0} t baseline = {:.0} t/year",
                pct,
                baseline_co2.unwrap_or(0.0),
                tons,
            )),
            (Some(pct), None) => trace.push(format!(
                "CO2 reduction target {}% stated, but no baseline emissions known; tonnage not derivable",
                pct,
            )),
            _ => trace.push("No CO2 reduction target identified in documentation".to_string()),
        }
        trace.push(format!(
            "Flagged {} risks with {} mitigations; {} accessibility measures noted",
            profile.risk_flags.len(),
            profile.mitigations.len(),
            profile.accessibility.len(),
        ));

        Ok(Staged::Sustainability { profile, steps: trace.steps })
    }

    fn run_financial_structuring(&self, case: &Case) -> Result<Staged> {
        let mut trace = Trace::new(Phase::FinancialStructuring);

        let principal = case
            .derived
            .need
            .as_ref()
            .and_then(|n| n.requested_amount_usd)
            .ok_or_else(|| {
                ConceptReviewError::Validation(
                    "requested amount is unknown; cannot structure financing options".to_string(),
                )
            })?;

        let rates = &self.reference.market_rates;
        trace.push(format!(
            "Market snapshot: 10y EUR swap {:.2}%, green bond spread {:.0} bps, all-in green rate {:.2}%",
            rates.eur_swap_10y * 100.0,
            rates.green_bond_spread_10y * 10_000.0,
            rates.all_in_green_rate_pct(),
        ));

        let options = build_financial_options(principal, &self.reference, &self.scoring);
        for option in &options {
            trace.push(format!(
                "{}: {}y tenor / {}y grace at {:.0} bps; repayment {:.1}/{:.0}, rate {:.1}/{:.0}, total {:.1}/100",
                option.label,
                option.tenor_years,
                option.grace_years,
                option.rate_bps,
                option.repayment_score,
                REPAYMENT_SCORE_MAX,
                option.rate_score,
                RATE_SCORE_MAX,
                option.total_score,
            ));
        }

        if let Some(best) = options
            .iter()
            .max_by(|a, b| a.total_score.partial_cmp(&b.total_score).unwrap_or(std::cmp::Ordering::Equal))
        {
            trace.push(format!(
                "Highest-scoring structure: {} at {:.1}/100; all three options retained for decision",
                best.label, best.total_score,
            ));
        }

        Ok(Staged::FinancialStructuring { options, steps: trace.steps })
    }

    fn run_concept_note(&self, case: &Case) -> Result<Staged> {
        let mut trace = Trace::new(Phase::ConceptNote);

        let body = note::assemble(case);
        trace.push(format!(
            "Assembled concept note draft ({} chars) from sector, sustainability and financing outputs",
            body.len(),
        ));
        trace.push("Case moved to review".to_string());

        Ok(Staged::ConceptNote { body, steps: trace.steps })
    }

    /// Applies a staged phase result: invalidates the phase and everything
    /// after it, then records the new outputs.
    fn commit(&self, case: &mut Case, phase: Phase, staged: Staged) {
        case.phases.clear_from(phase);

        // Derived entities owned by the cleared phases go with them.
        if phase <= Phase::SectorBaseline {
            case.derived.need = None;
            case.derived.sector = None;
            case.derived.gaps.clear();
            case.derived.kpis.clear();
        }
        if phase <= Phase::Sustainability {
            case.derived.sustainability = None;
        }
        if phase <= Phase::FinancialStructuring {
            case.derived.options.clear();
            case.selected_option = None;
        }
        if case.derived.note.take().is_some() {
            debug!("case {}: drafted note invalidated by phase {} re-run", case.id, phase.number());
        }
        if case.status == CaseStatus::InReview && phase != Phase::ConceptNote {
            case.status = CaseStatus::New;
        }

        match staged {
            Staged::SectorBaseline { need, sector, gaps, kpis, steps } => {
                case.derived.need = Some(need);
                case.derived.sector = Some(sector);
                case.derived.gaps = gaps;
                case.derived.kpis = kpis;
                case.phases.record(Phase::SectorBaseline, steps);
            }
            Staged::Sustainability { profile, steps } => {
                case.derived.sustainability = Some(profile);
                case.phases.record(Phase::Sustainability, steps);
            }
            Staged::FinancialStructuring { options, steps } => {
                case.derived.options = options;
                case.phases.record(Phase::FinancialStructuring, steps);
            }
            Staged::ConceptNote { body, steps } => {
                case.phases.record(Phase::ConceptNote, steps);
                case.derived.note = Some(ConceptNote {
                    body,
                    generated_at: Utc::now(),
                    source_phases: case.phases.completion_flags(),
                });
                case.status = CaseStatus::InReview;
            }
        }

        info!(
            "case {}: phase {} committed ({} phases contiguously complete)",
            case.id,
            phase.number(),
            case.phases.contiguous_completed(),
        );
    }

    /// Clears all derived state, phase flags, the selected option and the
    /// status. Uploaded documents are retained.
    pub fn reset(&self, case: &mut Case) {
        case.phases.reset();
        case.derived = Default::default();
        case.selected_option = None;
        case.status = CaseStatus::New;
        info!("case {}: reset to a clean slate (documents retained)", case.id);
    }

    /// Marks one of the generated financing options as the preferred
    /// structure. Only valid while the case is in review.
    pub fn select_option(&self, case: &mut Case, kind: OptionKind) -> Result<()> {
        if case.status != CaseStatus::InReview {
            return Err(ConceptReviewError::Validation(format!(
                "options can only be selected while the case is in review (status {:?})",
                case.status
            )));
        }
        if case.option(kind).is_none() {
            return Err(ConceptReviewError::Validation(format!(
                "no generated financing option of kind {:?} on case {}",
                kind, case.id
            )));
        }
        case.selected_option = Some(kind);
        info!("case {}: selected {}", case.id, kind.label());
        Ok(())
    }

    /// Approves the case. Requires a selected financing option. Approving
    /// an already-approved case is a no-op.
    pub fn approve(&self, case: &mut Case) -> Result<()> {
        if case.status == CaseStatus::Approved {
            return Ok(());
        }
        if case.status != CaseStatus::InReview {
            return Err(ConceptReviewError::Validation(format!(
                "only a case in review can be approved (status {:?})",
                case.status
            )));
        }
        if case.selected_option.is_none() {
            return Err(ConceptReviewError::Validation(
                "a financing option must be selected before approval".to_string(),
            ));
        }
        case.status = CaseStatus::Approved;
        info!("case {}: approved", case.id);
        Ok(())
    }

    /// Rejects the case. Rejecting an already-rejected case is a no-op.
    pub fn reject(&self, case: &mut Case) -> Result<()> {
        if case.status == CaseStatus::Rejected {
            return Ok(());
        }
        if case.status != CaseStatus::InReview {
            return Err(ConceptReviewError::Validation(format!(
                "only a case in review can be rejected (status {:?})",
                case.status
            )));
        }
        case.status = CaseStatus::Rejected;
        info!("case {}: rejected", case.id);
        Ok(())
    }
}

enum Staged {
    SectorBaseline {
        need: NeedSummary,
        sector: SectorProfile,
        gaps: Vec<crate::model::GapAnalysisItem>,
        kpis: Vec<crate::model::BaselineKpi>,
        steps: Vec<ReasoningStep>,
    },
    Sustainability {
        profile: SustainabilityProfile,
        steps: Vec<ReasoningStep>,
    },
    FinancialStructuring {
        options: Vec<crate::model::FinancialOption>,
        steps: Vec<ReasoningStep>,
    },
    ConceptNote {
        body: String,
        steps: Vec<ReasoningStep>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentCategory;

    const NEED_DOC: &str = "\
Project: Nairobi E-Bus Fleet Renewal
Country: Kenya
Requested amount: USD 50 million
The city of Nairobi urgently needs to replace its ageing diesel bus fleet.
Air quality along main corridors regularly exceeds WHO guidance levels.";

    const SECTOR_DOC: &str = "\
Fleet size: 450
Diesel buses: 420
Hybrid buses: 18
Electric buses: 12
Depots: 6
Daily ridership: 320,000
Annual operating costs: $28.5 million
Annual CO2 emissions: 95,000 tons
The main challenge is an ageing diesel fleet with rising maintenance costs.";

    const SUSTAINABILITY_DOC: &str = "\
ESG Category: B
The project targets a 35% reduction in CO2 emissions.
All depots are existing infrastructure with minimal impact.
Low-floor buses and wheelchair access are specified.
A pilot phase with driver training is planned.
Aligned with the Paris agreement and national SDG commitments.";

    fn seeded_case() -> Case {
        let mut case = Case::new(1, "Nairobi E-Bus Fleet Renewal", "Kenya", "Urban Transport");
        case.documents.set(DocumentCategory::NeedAssessment, NEED_DOC.to_string());
        case.documents.set(DocumentCategory::SectorProfile, SECTOR_DOC.to_string());
        case.documents.set(DocumentCategory::Sustainability, SUSTAINABILITY_DOC.to_string());
        case
    }

    fn run_all(orchestrator: &Orchestrator, case: &mut Case) {
        for phase in Phase::ALL {
            orchestrator.run_phase(case, phase).unwrap();
        }
    }

    #[test]
    fn test_phases_must_run_in_order() {
        let orchestrator = Orchestrator::default();
        let mut case = seeded_case();

        let err = orchestrator.run_phase(&mut case, Phase::FinancialStructuring).unwrap_err();
        assert!(matches!(err, ConceptReviewError::Sequencing { requested: 3, current: 0 }));

        // A rejected run leaves the case untouched.
        assert_eq!(case.phases.contiguous_completed(), 0);
        assert!(case.derived.options.is_empty());
        assert_eq!(case.status, CaseStatus::New);
    }

    #[test]
    fn test_full_progression() {
        let orchestrator = Orchestrator::default();
        let mut case = seeded_case();

        let steps = orchestrator.run_phase(&mut case, Phase::SectorBaseline).unwrap();
        assert!(!steps.is_empty());
        assert_eq!(case.derived.sector.as_ref().unwrap().fleet_total, Some(450));
        assert_eq!(case.derived.gaps.len(), 12);
        assert_eq!(case.derived.kpis.len(), 5);

        orchestrator.run_phase(&mut case, Phase::Sustainability).unwrap();
        let sustainability = case.derived.sustainability.as_ref().unwrap();
        assert_eq!(sustainability.co2_reduction_tons, Some(33_250.0));

        orchestrator.run_phase(&mut case, Phase::FinancialStructuring).unwrap();
        assert_eq!(case.derived.options.len(), 3);
        assert_eq!(case.derived.options[0].principal_usd, 50_000_000.0);

        orchestrator.run_phase(&mut case, Phase::ConceptNote).unwrap();
        assert_eq!(case.status, CaseStatus::InReview);
        assert!(case.derived.note.is_some());
        assert_eq!(case.phases.contiguous_completed(), 4);
        assert_eq!(case.derived.note.as_ref().unwrap().source_phases, [true; 4]);
    }

    #[test]
    fn test_rerun_invalidates_downstream() {
        let orchestrator = Orchestrator::default();
        let mut case = seeded_case();
        run_all(&orchestrator, &mut case);
        orchestrator.select_option(&mut case, OptionKind::Blended).unwrap();

        orchestrator.run_phase(&mut case, Phase::Sustainability).unwrap();

        assert_eq!(case.phases.contiguous_completed(), 2);
        assert!(case.derived.sustainability.is_some());
        assert!(case.derived.options.is_empty());
        assert!(case.derived.note.is_none());
        assert_eq!(case.selected_option, None);
        assert_eq!(case.status, CaseStatus::New);
        // Phase 1 outputs survive.
        assert!(case.derived.sector.is_some());
        assert!(!case.derived.gaps.is_empty());
    }

    #[test]
    fn test_rerun_completed_phase_is_allowed() {
        let orchestrator = Orchestrator::default();
        let mut case = seeded_case();
        orchestrator.run_phase(&mut case, Phase::SectorBaseline).unwrap();
        orchestrator.run_phase(&mut case, Phase::Sustainability).unwrap();

        // Re-running phase 1 is legal and clears phase 2.
        orchestrator.run_phase(&mut case, Phase::SectorBaseline).unwrap();
        assert_eq!(case.phases.contiguous_completed(), 1);
        assert!(case.derived.sustainability.is_none());
    }

    #[test]
    fn test_unknown_principal_fails_structuring_without_side_effects() {
        let orchestrator = Orchestrator::default();
        let mut case = seeded_case();
        case.documents.set(
            DocumentCategory::NeedAssessment,
            "Project: Fleet Renewal\nCountry: Kenya\nNo figure has been agreed yet.".to_string(),
        );

        orchestrator.run_phase(&mut case, Phase::SectorBaseline).unwrap();
        orchestrator.run_phase(&mut case, Phase::Sustainability).unwrap();

        let err = orchestrator.run_phase(&mut case, Phase::FinancialStructuring).unwrap_err();
        assert!(matches!(err, ConceptReviewError::Validation(_)));
        assert_eq!(case.phases.contiguous_completed(), 2);
        assert!(case.derived.options.is_empty());
    }

    #[test]
    fn test_demo_defaults_fill_missing_amount() {
        let orchestrator = Orchestrator::default().with_demo_defaults(DemoDefaults::Enabled);
        let mut case = seeded_case();
        case.documents.set(
            DocumentCategory::NeedAssessment,
            "Project: Fleet Renewal\nCountry: Kenya\nNo figure has been agreed yet.".to_string(),
        );

        let steps = orchestrator.run_phase(&mut case, Phase::SectorBaseline).unwrap();
        assert_eq!(
            case.derived.need.as_ref().unwrap().requested_amount_usd,
            Some(50_000_000.0)
        );
        assert!(steps.iter().any(|s| s.text.contains("demo default")));
    }

    #[test]
    fn test_approval_requires_selected_option() {
        let orchestrator = Orchestrator::default();
        let mut case = seeded_case();
        run_all(&orchestrator, &mut case);

        let err = orchestrator.approve(&mut case).unwrap_err();
        assert!(matches!(err, ConceptReviewError::Validation(_)));
        assert_eq!(case.status, CaseStatus::InReview);

        orchestrator.select_option(&mut case, OptionKind::Sovereign).unwrap();
        orchestrator.approve(&mut case).unwrap();
        assert_eq!(case.status, CaseStatus::Approved);

        // Approving again is a no-op.
        orchestrator.approve(&mut case).unwrap();
        assert_eq!(case.status, CaseStatus::Approved);
    }

    #[test]
    fn test_select_option_validations() {
        let orchestrator = Orchestrator::default();
        let mut case = seeded_case();

        // Not in review yet.
        assert!(orchestrator.select_option(&mut case, OptionKind::Sovereign).is_err());

        run_all(&orchestrator, &mut case);
        orchestrator.select_option(&mut case, OptionKind::Guaranteed).unwrap();
        assert_eq!(case.selected_option, Some(OptionKind::Guaranteed));
    }

    #[test]
    fn test_no_phase_runs_after_decision() {
        let orchestrator = Orchestrator::default();
        let mut case = seeded_case();
        run_all(&orchestrator, &mut case);
        orchestrator.reject(&mut case).unwrap();

        let err = orchestrator.run_phase(&mut case, Phase::SectorBaseline).unwrap_err();
        assert!(matches!(err, ConceptReviewError::Validation(_)));
        assert_eq!(case.status, CaseStatus::Rejected);

        // Rejecting again is a no-op.
        orchestrator.reject(&mut case).unwrap();
    }

    #[test]
    fn test_reset_clears_everything_but_documents() {
        let orchestrator = Orchestrator::default();
        let mut case = seeded_case();
        run_all(&orchestrator, &mut case);
        orchestrator.select_option(&mut case, OptionKind::Blended).unwrap();

        orchestrator.reset(&mut case);

        assert_eq!(case.status, CaseStatus::New);
        assert_eq!(case.phases.contiguous_completed(), 0);
        assert_eq!(case.derived, Default::default());
        assert_eq!(case.selected_option, None);
        assert_eq!(case.documents.get(DocumentCategory::SectorProfile), SECTOR_DOC);
    }

    #[test]
    fn test_rerun_reproduces_identical_derived_state() {
        let orchestrator = Orchestrator::default();
        let mut case = seeded_case();
        run_all(&orchestrator, &mut case);
        let first = case.derived.clone();

        orchestrator.reset(&mut case);
        run_all(&orchestrator, &mut case);

        // Everything except the note timestamp is reproducible.
        assert_eq!(case.derived.need, first.need);
        assert_eq!(case.derived.sector, first.sector);
        assert_eq!(case.derived.sustainability, first.sustainability);
        assert_eq!(case.derived.gaps, first.gaps);
        assert_eq!(case.derived.kpis, first.kpis);
        assert_eq!(case.derived.options, first.options);
        assert_eq!(
            case.derived.note.as_ref().unwrap().body,
            first.note.as_ref().unwrap().body
        );
    }
}
