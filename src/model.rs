use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ConceptReviewError, Result};

/// The four gated review phases. Phase *n* may only run once phases
/// 1..n-1 have completed; re-running a completed phase invalidates
/// everything downstream of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Phase {
    #[schemars(description = "Phase 1: need assessment and sector profile extraction, benchmark gap analysis, baseline KPIs")]
    SectorBaseline,

    #[schemars(description = "Phase 2: sustainability and ESG assessment")]
    Sustainability,

    #[schemars(description = "Phase 3: market data retrieval and financial structuring options")]
    FinancialStructuring,

    #[schemars(description = "Phase 4: concept note draft; moves the case into review")]
    ConceptNote,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::SectorBaseline,
        Phase::Sustainability,
        Phase::FinancialStructuring,
        Phase::ConceptNote,
    ];

    pub fn number(self) -> u8 {
        match self {
            Phase::SectorBaseline => 1,
            Phase::Sustainability => 2,
            Phase::FinancialStructuring => 3,
            Phase::ConceptNote => 4,
        }
    }

    pub fn from_number(n: u8) -> Result<Phase> {
        match n {
            1 => Ok(Phase::SectorBaseline),
            2 => Ok(Phase::Sustainability),
            3 => Ok(Phase::FinancialStructuring),
            4 => Ok(Phase::ConceptNote),
            other => Err(ConceptReviewError::UnknownPhase(other)),
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Phase::SectorBaseline => "Sector Profile, Benchmarks & KPIs",
            Phase::Sustainability => "Sustainability Assessment",
            Phase::FinancialStructuring => "Market Data & Financial Options",
            Phase::ConceptNote => "Concept Note Draft",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    New,
    InReview,
    Approved,
    Rejected,
}

/// Document categories accepted for a case. Uploads replace the category
/// text wholesale; the raw text itself is never mutated by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    NeedAssessment,
    SectorProfile,
    Sustainability,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DocumentSet {
    #[schemars(description = "Raw need-assessment text: emails, minutes of meeting, request letters")]
    pub need_assessment: String,

    #[schemars(description = "Raw sector profile text: fleet composition, ridership, cost and emissions data")]
    pub sector_profile: String,

    #[schemars(description = "Raw sustainability / ESG documentation text")]
    pub sustainability: String,
}

impl DocumentSet {
    pub fn get(&self, category: DocumentCategory) -> &str {
        match category {
            DocumentCategory::NeedAssessment => &self.need_assessment,
            DocumentCategory::SectorProfile => &self.sector_profile,
            DocumentCategory::Sustainability => &self.sustainability,
        }
    }

    pub fn set(&mut self, category: DocumentCategory, text: String) {
        match category {
            DocumentCategory::NeedAssessment => self.need_assessment = text,
            DocumentCategory::SectorProfile => self.sector_profile = text,
            DocumentCategory::Sustainability => self.sustainability = text,
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(DocumentSet)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

/// Summary parsed from the need-assessment document. Every field is
/// optional: absence of a pattern match is a result, not a failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NeedSummary {
    pub project_name: Option<String>,
    pub country: Option<String>,
    pub requested_amount_usd: Option<f64>,
    pub problem_summary: Option<String>,
}

/// Sector operating baseline. `None` means "unknown" — a genuine zero
/// extracted from the documents stays `Some(0)` and is never replaced
/// by a fallback default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectorProfile {
    pub fleet_total: Option<u32>,
    pub fleet_diesel: Option<u32>,
    pub fleet_hybrid: Option<u32>,
    pub fleet_electric: Option<u32>,
    pub depots: Option<u32>,
    pub daily_ridership: Option<u64>,
    pub annual_opex_usd: Option<f64>,
    pub annual_co2_tons: Option<f64>,
    /// fleet_electric / fleet_total, as a fraction in [0,1]. `None` when
    /// either side is unknown or the fleet size is zero.
    pub electric_share: Option<f64>,
    pub notes: Option<String>,
}

impl SectorProfile {
    /// Electrification rate in percent, when derivable.
    pub fn electrification_pct(&self) -> Option<f64> {
        self.electric_share.map(|s| s * 100.0)
    }

    /// Annual operating cost per bus, guarded against a zero fleet.
    pub fn opex_per_bus(&self) -> Option<f64> {
        match (self.annual_opex_usd, self.fleet_total) {
            (Some(opex), Some(fleet)) if fleet > 0 => Some(opex / fleet as f64),
            _ => None,
        }
    }

    /// Daily ridership per bus, guarded against a zero fleet.
    pub fn ridership_per_bus(&self) -> Option<f64> {
        match (self.daily_ridership, self.fleet_total) {
            (Some(riders), Some(fleet)) if fleet > 0 => Some(riders as f64 / fleet as f64),
            _ => None,
        }
    }
}

/// Environmental and social risk category: A = significant adverse
/// impacts, B = moderate, C = minimal or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum EsgCategory {
    A,
    B,
    C,
}

impl EsgCategory {
    pub fn description(self) -> &'static str {
        match self {
            EsgCategory::A => "Significant potential impacts requiring comprehensive assessment",
            EsgCategory::B => "Moderate impacts, manageable through standard mitigation measures",
            EsgCategory::C => "Minimal or no adverse impacts",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SustainabilityProfile {
    pub esg_category: EsgCategory,
    /// Expected annual CO2 reduction in tons, derivable only when a
    /// baseline emissions figure is known.
    pub co2_reduction_tons: Option<f64>,
    pub pm25_note: String,
    pub accessibility: Vec<String>,
    pub policy_alignment: Vec<String>,
    pub risk_flags: Vec<String>,
    pub mitigations: Vec<String>,
}

/// Benchmark cities, in the canonical comparison order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub enum BenchmarkCity {
    Shenzhen,
    London,
    Santiago,
    Bogota,
}

impl BenchmarkCity {
    pub const CANONICAL_ORDER: [BenchmarkCity; 4] = [
        BenchmarkCity::Shenzhen,
        BenchmarkCity::London,
        BenchmarkCity::Santiago,
        BenchmarkCity::Bogota,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BenchmarkCity::Shenzhen => "Shenzhen",
            BenchmarkCity::London => "London",
            BenchmarkCity::Santiago => "Santiago",
            BenchmarkCity::Bogota => "Bogota",
        }
    }
}

impl std::fmt::Display for BenchmarkCity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GapMetric {
    ElectrificationRate,
    OpexPerBus,
    RidershipPerBus,
}

impl GapMetric {
    pub fn label(self) -> &'static str {
        match self {
            GapMetric::ElectrificationRate => "Fleet Electrification Rate",
            GapMetric::OpexPerBus => "Operating Cost per Bus",
            GapMetric::RidershipPerBus => "Daily Ridership per Bus",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            GapMetric::ElectrificationRate => "%",
            GapMetric::OpexPerBus => "USD/year",
            GapMetric::RidershipPerBus => "passengers/day",
        }
    }
}

/// One (benchmark city, metric) comparison. `delta = case - benchmark`;
/// `delta_pct` is `None` when the benchmark value is zero, in which case
/// the item is recorded as not comparable rather than raising an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GapAnalysisItem {
    pub city: BenchmarkCity,
    pub metric: GapMetric,
    pub case_value: f64,
    pub benchmark_value: f64,
    pub delta: f64,
    pub delta_pct: Option<f64>,
    pub comparable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BaselineKpi {
    pub name: String,
    pub unit: String,
    pub current_value: f64,
    pub target_value: f64,
    pub rationale: String,
}

/// The three fixed financing structures, in presentation order. Also
/// serves as the case-scoped identifier of a financial option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Sovereign,
    Guaranteed,
    Blended,
}

impl OptionKind {
    pub const PRESENTATION_ORDER: [OptionKind; 3] =
        [OptionKind::Sovereign, OptionKind::Guaranteed, OptionKind::Blended];

    pub fn label(self) -> &'static str {
        match self {
            OptionKind::Sovereign => "Option A - Sovereign Loan",
            OptionKind::Guaranteed => "Option B - Sovereign-Guaranteed City Loan",
            OptionKind::Blended => "Option C - Blended Co-Financing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinancialOption {
    pub kind: OptionKind,
    pub label: String,
    pub tenor_years: u32,
    pub grace_years: u32,
    pub rate_bps: f64,
    pub principal_usd: f64,
    /// Repayment capacity component, 0-60.
    pub repayment_score: f64,
    /// Rate competitiveness component, 0-40.
    pub rate_score: f64,
    /// repayment_score + rate_score, 0-100. Informational ranking only;
    /// options are never reordered or dropped by score.
    pub total_score: f64,
    pub benefits: Vec<String>,
    pub tradeoffs: Vec<String>,
}

/// A recorded explanation of one derivation performed during a phase run,
/// shown to the end user as an audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReasoningStep {
    pub phase: Phase,
    pub order: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConceptNote {
    pub body: String,
    pub generated_at: DateTime<Utc>,
    /// Phase completion flags at the moment of generation.
    pub source_phases: [bool; 4],
}

/// Per-phase completion flags and reasoning traces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PhaseLedger {
    completed: [bool; 4],
    reasoning: [Vec<ReasoningStep>; 4],
}

impl PhaseLedger {
    pub fn is_completed(&self, phase: Phase) -> bool {
        self.completed[(phase.number() - 1) as usize]
    }

    pub fn completion_flags(&self) -> [bool; 4] {
        self.completed
    }

    /// Number of contiguously completed phases starting from phase 1.
    pub fn contiguous_completed(&self) -> u8 {
        let mut n = 0;
        for done in self.completed {
            if !done {
                break;
            }
            n += 1;
        }
        n
    }

    pub fn reasoning(&self, phase: Phase) -> &[ReasoningStep] {
        &self.reasoning[(phase.number() - 1) as usize]
    }

    pub(crate) fn record(&mut self, phase: Phase, steps: Vec<ReasoningStep>) {
        let idx = (phase.number() - 1) as usize;
        self.reasoning[idx] = steps;
        self.completed[idx] = true;
    }

    /// Clears the flags and reasoning of `phase` and everything after it.
    pub(crate) fn clear_from(&mut self, phase: Phase) {
        for idx in (phase.number() - 1) as usize..4 {
            self.completed[idx] = false;
            self.reasoning[idx].clear();
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = PhaseLedger::default();
    }
}

/// All per-case derived entities. Owned exclusively by the case: a reset
/// or forward invalidation replaces these wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DerivedState {
    pub need: Option<NeedSummary>,
    pub sector: Option<SectorProfile>,
    pub sustainability: Option<SustainabilityProfile>,
    pub gaps: Vec<GapAnalysisItem>,
    pub kpis: Vec<BaselineKpi>,
    pub options: Vec<FinancialOption>,
    pub note: Option<ConceptNote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Case {
    pub id: u64,
    pub name: String,
    pub country: String,
    pub sector: String,
    pub status: CaseStatus,
    pub selected_option: Option<OptionKind>,
    pub documents: DocumentSet,
    pub phases: PhaseLedger,
    pub derived: DerivedState,
}

impl Case {
    pub fn new(id: u64, name: impl Into<String>, country: impl Into<String>, sector: impl Into<String>) -> Self {
        Case {
            id,
            name: name.into(),
            country: country.into(),
            sector: sector.into(),
            status: CaseStatus::New,
            selected_option: None,
            documents: DocumentSet::default(),
            phases: PhaseLedger::default(),
            derived: DerivedState::default(),
        }
    }

    pub fn option(&self, kind: OptionKind) -> Option<&FinancialOption> {
        self.derived.options.iter().find(|o| o.kind == kind)
    }
}
