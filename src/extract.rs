//! Pattern-based field extraction from raw document text.
//!
//! Extraction is deliberately dumb: a fixed set of labeled-line patterns
//! ("Country: Kenya", "Fleet size: 120"), matched line by line and
//! case-insensitively on the label. A field that no line matches is simply
//! absent (`None`) — extraction never fails and never raises. An extracted
//! zero is `Some(0)` and is preserved as such through the whole pipeline.
//!
//! In demo mode, documented defaults are substituted for fields that are
//! genuinely absent, never over an extracted value, and each substitution
//! is reported as a field-level warning.

use log::debug;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::model::{EsgCategory, NeedSummary};

/// Whether absent fields are filled with the documented demo defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemoDefaults {
    Enabled,
    #[default]
    Disabled,
}

/// A non-fatal note about one extracted field, surfaced to the caller
/// alongside the built profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldWarning {
    pub field: String,
    pub message: String,
}

impl FieldWarning {
    fn defaulted(field: &str, value: impl std::fmt::Display) -> Self {
        FieldWarning {
            field: field.to_string(),
            message: format!("not found in document; demo default {} substituted", value),
        }
    }
}

/// Raw fields recognized in a sector profile document. Mirrors
/// `SectorProfile` minus the derived ratios.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectorFields {
    pub fleet_total: Option<u32>,
    pub fleet_diesel: Option<u32>,
    pub fleet_hybrid: Option<u32>,
    pub fleet_electric: Option<u32>,
    pub depots: Option<u32>,
    pub daily_ridership: Option<u64>,
    pub annual_opex_usd: Option<f64>,
    pub annual_co2_tons: Option<f64>,
    pub notes: Option<String>,
}

/// Raw fields and keyword hits recognized in a sustainability document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SustainabilityFields {
    pub esg_category: Option<EsgCategory>,
    pub co2_reduction_pct: Option<f64>,
    pub pm25_reduction_pct: Option<f64>,
    pub accessibility_notes: Vec<String>,
    pub policy_notes: Vec<String>,
    pub risk_notes: Vec<String>,
    pub mitigation_notes: Vec<String>,
    pub high_risk_signals: u32,
    pub low_risk_signals: u32,
}

/// Documented demo defaults, substituted only for absent fields.
pub mod demo {
    pub const FLEET_TOTAL: u32 = 450;
    pub const FLEET_DIESEL: u32 = 420;
    pub const FLEET_HYBRID: u32 = 18;
    pub const FLEET_ELECTRIC: u32 = 12;
    pub const DEPOTS: u32 = 6;
    pub const DAILY_RIDERSHIP: u64 = 320_000;
    pub const ANNUAL_OPEX_USD: f64 = 28_500_000.0;
    pub const ANNUAL_CO2_TONS: f64 = 95_000.0;
    pub const REQUESTED_AMOUNT_USD: f64 = 50_000_000.0;
    pub const CO2_REDUCTION_PCT: f64 = 35.0;
}

struct Patterns {
    project: Regex,
    country: Regex,
    amount_labeled: Regex,
    amount_inline: Regex,
    fleet_total: Regex,
    fleet_diesel: Regex,
    fleet_hybrid: Regex,
    fleet_electric: Regex,
    depots: Regex,
    ridership: Regex,
    opex: Regex,
    co2: Regex,
    esg_category: Regex,
    co2_reduction_a: Regex,
    co2_reduction_b: Regex,
    pm25_a: Regex,
    pm25_b: Regex,
    scaled_number: Regex,
}

impl Patterns {
    fn get() -> &'static Patterns {
        static PATTERNS: OnceLock<Patterns> = OnceLock::new();
        PATTERNS.get_or_init(|| Patterns {
            project: re(r"(?i)^\s*(?:project|programme|program)(?:\s+name)?\s*[:\-]\s*(.{3,100})$"),
            country: re(r"(?i)^\s*country\s*[:\-]\s*([A-Za-z][A-Za-z .'\-]{1,60})$"),
            amount_labeled: re(
                r"(?i)^\s*(?:requested\s+(?:amount|financing)|financing\s+request(?:ed)?|amount\s+requested|loan\s+amount)\s*[:\-]\s*(.+)$",
            ),
            amount_inline: re(
                r"(?i)(?:\$|USD\s*)\s*([\d,]+(?:\.\d+)?)\s*(million|billion|bn|m|b)?\b",
            ),
            fleet_total: re(r"(?i)^\s*(?:fleet\s+(?:size|total)|total\s+fleet|fleet)\s*[:\-]\s*([\d,]+)"),
            fleet_diesel: re(r"(?i)^\s*diesel(?:\s+(?:buses|fleet))?\s*[:\-]\s*([\d,]+)"),
            fleet_hybrid: re(r"(?i)^\s*hybrid(?:\s+(?:buses|fleet))?\s*[:\-]\s*([\d,]+)"),
            fleet_electric: re(
                r"(?i)^\s*(?:electric(?:\s+(?:buses|fleet))?|e-?buses?|ev\s+fleet)\s*[:\-]\s*([\d,]+)",
            ),
            depots: re(r"(?i)^\s*(?:depots?|terminals?|garages?)\s*[:\-]\s*([\d,]+)"),
            ridership: re(
                r"(?i)^\s*(?:daily\s+)?ridership\s*[:\-]\s*([\d,]+(?:\.\d+)?)\s*(million|m)?\b",
            ),
            opex: re(r"(?i)^\s*(?:annual\s+)?(?:operating\s+costs?|operational\s+costs?|opex)\s*[:\-]\s*(.+)$"),
            co2: re(
                r"(?i)^\s*(?:annual\s+)?(?:co2|carbon)(?:\s+emissions?)?\s*[:\-]\s*([\d,]+(?:\.\d+)?)",
            ),
            esg_category: re(
                r"(?i)^\s*(?:esg|environmental(?:\s+and\s+social)?)\s+category\s*[:\-]\s*([ABC])\b",
            ),
            co2_reduction_a: re(
                r"(?i)(\d+(?:\.\d+)?)\s*%\s*(?:reduction|decrease|cut)\s*(?:in\s+)?(?:co2|carbon|emissions?)",
            ),
            co2_reduction_b: re(
                r"(?i)(?:reduce|decrease|cut)\s+(?:co2|carbon|emissions?)\s*(?:by\s+)?(\d+(?:\.\d+)?)\s*%",
            ),
            pm25_a: re(r"(?i)pm\s*2\.?5\s*(?:reduction|decrease)?\s*(?:of\s+)?(\d+(?:\.\d+)?)\s*%"),
            pm25_b: re(r"(?i)(\d+(?:\.\d+)?)\s*%\s*(?:reduction|decrease)\s*(?:in\s+)?pm\s*2\.?5"),
            scaled_number: re(r"(?i)([\d,]+(?:\.\d+)?)\s*(million|billion|bn|m|b)?\b"),
        })
    }
}

fn re(pattern: &str) -> Regex {
    // Patterns are compile-time constants, so construction cannot fail.
    Regex::new(pattern).unwrap()
}

/// Applies a line-scoped pattern to each line of `text` and returns the
/// first capture. Matching per line guarantees a field never spans a
/// newline.
fn first_line_capture<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    for line in text.lines() {
        if let Some(caps) = pattern.captures(line) {
            if let Some(m) = caps.get(1) {
                return Some(m.as_str());
            }
        }
    }
    None
}

fn parse_count(raw: &str) -> Option<u64> {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

fn scale_factor(suffix: Option<&str>) -> f64 {
    match suffix.map(|s| s.to_ascii_lowercase()) {
        Some(s) if s == "billion" || s == "bn" || s == "b" => 1e9,
        Some(s) if s == "million" || s == "m" => 1e6,
        _ => 1.0,
    }
}

/// Parses a monetary/quantity expression like "50 million", "1.2bn" or
/// "32,000" out of a single line's value text.
fn parse_scaled(raw: &str) -> Option<f64> {
    let caps = Patterns::get().scaled_number.captures(raw)?;
    let number: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
    Some(number * scale_factor(caps.get(2).map(|m| m.as_str())))
}

/// First sentences of the text that carry enough substance to serve as a
/// summary, joined and terminated.
fn leading_sentences(text: &str, keywords: Option<&[&str]>, limit: usize) -> Option<String> {
    let mut picked = Vec::new();
    for sentence in text.split(['.', '!', '?']) {
        let clean = sentence.trim().replace('\n', " ");
        if clean.len() <= 20 {
            continue;
        }
        if let Some(kws) = keywords {
            let lower = clean.to_lowercase();
            if !kws.iter().any(|kw| lower.contains(kw)) {
                continue;
            }
        }
        picked.push(clean);
        if picked.len() == limit {
            break;
        }
    }
    if picked.is_empty() {
        None
    } else {
        let mut summary = picked.join(". ");
        if !summary.ends_with('.') {
            summary.push('.');
        }
        Some(summary)
    }
}

/// Parses the need-assessment document into a `NeedSummary`.
pub fn extract_need_fields(text: &str) -> NeedSummary {
    let patterns = Patterns::get();
    let mut result = NeedSummary::default();

    if text.trim().is_empty() {
        return result;
    }

    result.project_name = first_line_capture(&patterns.project, text)
        .map(|s| s.trim().trim_matches(['"', '\'']).to_string());
    result.country = first_line_capture(&patterns.country, text).map(|s| s.trim().to_string());

    // Labeled amount line wins; otherwise the first inline "$50 million"
    // style mention anywhere in the text.
    result.requested_amount_usd =
        first_line_capture(&patterns.amount_labeled, text).and_then(parse_scaled);
    if result.requested_amount_usd.is_none() {
        for line in text.lines() {
            if let Some(caps) = patterns.amount_inline.captures(line) {
                if let Some(number) = caps.get(1).and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok()) {
                    result.requested_amount_usd =
                        Some(number * scale_factor(caps.get(2).map(|m| m.as_str())));
                    break;
                }
            }
        }
    }

    result.problem_summary = leading_sentences(text, None, 3);

    debug!(
        "need assessment parsed: country={:?} amount={:?}",
        result.country, result.requested_amount_usd
    );
    result
}

const NOTE_KEYWORDS: [&str; 8] = [
    "challenge", "issue", "problem", "goal", "target", "plan", "upgrade", "moderniz",
];

/// Parses the sector profile document into raw sector fields.
pub fn extract_sector_fields(text: &str) -> SectorFields {
    let patterns = Patterns::get();
    let mut result = SectorFields::default();

    if text.trim().is_empty() {
        return result;
    }

    result.fleet_total =
        first_line_capture(&patterns.fleet_total, text).and_then(|v| parse_count(v).map(|n| n as u32));
    result.fleet_diesel =
        first_line_capture(&patterns.fleet_diesel, text).and_then(|v| parse_count(v).map(|n| n as u32));
    result.fleet_hybrid =
        first_line_capture(&patterns.fleet_hybrid, text).and_then(|v| parse_count(v).map(|n| n as u32));
    result.fleet_electric =
        first_line_capture(&patterns.fleet_electric, text).and_then(|v| parse_count(v).map(|n| n as u32));
    result.depots =
        first_line_capture(&patterns.depots, text).and_then(|v| parse_count(v).map(|n| n as u32));

    for line in text.lines() {
        if let Some(caps) = patterns.ridership.captures(line) {
            if let Some(number) = caps.get(1).and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok()) {
                result.daily_ridership =
                    Some((number * scale_factor(caps.get(2).map(|m| m.as_str()))) as u64);
                break;
            }
        }
    }

    result.annual_opex_usd = first_line_capture(&patterns.opex, text).and_then(parse_scaled);
    result.annual_co2_tons = first_line_capture(&patterns.co2, text)
        .and_then(|v| v.replace(',', "").parse::<f64>().ok());

    result.notes = leading_sentences(text, Some(&NOTE_KEYWORDS), 3);

    debug!(
        "sector profile parsed: fleet={:?} electric={:?} opex={:?}",
        result.fleet_total, result.fleet_electric, result.annual_opex_usd
    );
    result
}

const HIGH_RISK_KEYWORDS: [&str; 8] = [
    "resettlement",
    "displacement",
    "indigenous",
    "protected area",
    "critical habitat",
    "cultural heritage",
    "large scale",
    "significant impact",
];

const LOW_RISK_KEYWORDS: [&str; 6] = [
    "minimal impact",
    "no displacement",
    "existing infrastructure",
    "brownfield",
    "rehabilitation",
    "upgrade only",
];

const ACCESSIBILITY_NOTES: [(&str, &str); 5] = [
    ("low-floor", "Low-floor buses improve accessibility for elderly and disabled passengers"),
    ("wheelchair", "Wheelchair-accessible vehicles included in fleet specifications"),
    ("audio", "Audio announcements enhance accessibility for visually impaired"),
    ("women", "Women's safety features considered in design"),
    ("affordable", "Fare structure maintains affordability for low-income users"),
];

const POLICY_NOTES: [(&str, &str); 3] = [
    ("paris", "Contributes to Paris Agreement goals"),
    ("sdg", "Advances SDG 11 (Sustainable Cities) and SDG 13 (Climate Action)"),
    ("sustainable development", "Advances SDG 11 (Sustainable Cities) and SDG 13 (Climate Action)"),
];

const RISK_NOTES: [(&str, &str); 5] = [
    ("land acquisition", "Land acquisition delays for depot expansion"),
    ("procurement", "Procurement complexity for e-bus technology"),
    ("capacity", "Institutional capacity constraints for project management"),
    ("tariff", "Electricity tariff volatility affecting operating costs"),
    ("supply chain", "Supply chain risks for battery and component sourcing"),
];

const MITIGATION_NOTES: [(&str, &str); 5] = [
    ("training", "Comprehensive training program for operators and maintenance staff"),
    ("pilot", "Pilot phase to test technology before full deployment"),
    ("guarantee", "Performance guarantees from equipment suppliers"),
    ("insurance", "Insurance coverage for key operational risks"),
    ("monitoring", "Robust M&E framework with clear KPIs"),
];

fn keyword_notes(text_lower: &str, table: &[(&str, &str)]) -> Vec<String> {
    let mut notes = Vec::new();
    for (keyword, note) in table {
        if text_lower.contains(keyword) && !notes.iter().any(|n: &String| n == note) {
            notes.push((*note).to_string());
        }
    }
    notes
}

/// Parses the sustainability document into raw ESG fields and keyword hits.
pub fn extract_sustainability_fields(text: &str) -> SustainabilityFields {
    let patterns = Patterns::get();
    let mut result = SustainabilityFields::default();

    if text.trim().is_empty() {
        return result;
    }

    result.esg_category = first_line_capture(&patterns.esg_category, text).and_then(|v| {
        match v.to_ascii_uppercase().as_str() {
            "A" => Some(EsgCategory::A),
            "B" => Some(EsgCategory::B),
            "C" => Some(EsgCategory::C),
            _ => None,
        }
    });

    for line in text.lines() {
        if result.co2_reduction_pct.is_none() {
            result.co2_reduction_pct = patterns
                .co2_reduction_a
                .captures(line)
                .or_else(|| patterns.co2_reduction_b.captures(line))
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse().ok());
        }
        if result.pm25_reduction_pct.is_none() {
            result.pm25_reduction_pct = patterns
                .pm25_a
                .captures(line)
                .or_else(|| patterns.pm25_b.captures(line))
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse().ok());
        }
    }

    let lower = text.to_lowercase();
    result.accessibility_notes = keyword_notes(&lower, &ACCESSIBILITY_NOTES);
    result.policy_notes = keyword_notes(&lower, &POLICY_NOTES);
    result.risk_notes = keyword_notes(&lower, &RISK_NOTES);
    result.mitigation_notes = keyword_notes(&lower, &MITIGATION_NOTES);
    result.high_risk_signals = HIGH_RISK_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count() as u32;
    result.low_risk_signals = LOW_RISK_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count() as u32;

    result
}

macro_rules! default_if_absent {
    ($field:expr, $name:literal, $default:expr, $warnings:expr) => {
        if $field.is_none() {
            $field = Some($default);
            $warnings.push(FieldWarning::defaulted($name, $default));
        }
    };
}

/// Fills absent need fields with demo defaults. Only numeric fields have
/// documented defaults; identity fields stay absent.
pub fn apply_need_demo_defaults(fields: &mut NeedSummary) -> Vec<FieldWarning> {
    let mut warnings = Vec::new();
    default_if_absent!(
        fields.requested_amount_usd,
        "requested_amount_usd",
        demo::REQUESTED_AMOUNT_USD,
        warnings
    );
    warnings
}

/// Fills absent sector fields with demo defaults. An extracted value,
/// including a genuine zero, is never overwritten.
pub fn apply_sector_demo_defaults(fields: &mut SectorFields) -> Vec<FieldWarning> {
    let mut warnings = Vec::new();
    default_if_absent!(fields.fleet_total, "fleet_total", demo::FLEET_TOTAL, warnings);
    default_if_absent!(fields.fleet_diesel, "fleet_diesel", demo::FLEET_DIESEL, warnings);
    default_if_absent!(fields.fleet_hybrid, "fleet_hybrid", demo::FLEET_HYBRID, warnings);
    default_if_absent!(fields.fleet_electric, "fleet_electric", demo::FLEET_ELECTRIC, warnings);
    default_if_absent!(fields.depots, "depots", demo::DEPOTS, warnings);
    default_if_absent!(fields.daily_ridership, "daily_ridership", demo::DAILY_RIDERSHIP, warnings);
    default_if_absent!(fields.annual_opex_usd, "annual_opex_usd", demo::ANNUAL_OPEX_USD, warnings);
    default_if_absent!(fields.annual_co2_tons, "annual_co2_tons", demo::ANNUAL_CO2_TONS, warnings);
    warnings
}

/// Fills the absent CO2 reduction target with the documented demo default.
pub fn apply_sustainability_demo_defaults(fields: &mut SustainabilityFields) -> Vec<FieldWarning> {
    let mut warnings = Vec::new();
    default_if_absent!(
        fields.co2_reduction_pct,
        "co2_reduction_pct",
        demo::CO2_REDUCTION_PCT,
        warnings
    );
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTOR_DOC: &str = "\
Nairobi Metropolitan Bus Services - Sector Overview

Fleet size: 450 buses
Diesel buses: 420
Hybrid buses: 18
Electric buses: 12
Depots: 6
Daily ridership: 320,000
Annual operating costs: $28.5 million
Annual CO2 emissions: 95,000 tons

The main challenge is an ageing diesel fleet with rising maintenance costs.
The city plans to modernize the fleet over the next decade.";

    #[test]
    fn test_sector_extraction_complete_document() {
        let fields = extract_sector_fields(SECTOR_DOC);
        assert_eq!(fields.fleet_total, Some(450));
        assert_eq!(fields.fleet_diesel, Some(420));
        assert_eq!(fields.fleet_hybrid, Some(18));
        assert_eq!(fields.fleet_electric, Some(12));
        assert_eq!(fields.depots, Some(6));
        assert_eq!(fields.daily_ridership, Some(320_000));
        assert_eq!(fields.annual_opex_usd, Some(28_500_000.0));
        assert_eq!(fields.annual_co2_tons, Some(95_000.0));
        assert!(fields.notes.is_some());
    }

    #[test]
    fn test_extraction_never_fails_on_arbitrary_text() {
        for text in ["", "   \n\n", "no labels here at all", "Fleet size: not-a-number"] {
            let fields = extract_sector_fields(text);
            assert_eq!(fields.fleet_total, None);
            let need = extract_need_fields(text);
            assert_eq!(need.requested_amount_usd, None);
            let sus = extract_sustainability_fields(text);
            assert_eq!(sus.co2_reduction_pct, None);
        }
    }

    #[test]
    fn test_explicit_zero_is_preserved() {
        let fields = extract_sector_fields("Fleet size: 120\nElectric buses: 0\n");
        assert_eq!(fields.fleet_total, Some(120));
        assert_eq!(fields.fleet_electric, Some(0));
    }

    #[test]
    fn test_demo_defaults_only_fill_absent_fields() {
        let mut fields = extract_sector_fields("Fleet size: 120\nElectric buses: 0\n");
        let warnings = apply_sector_demo_defaults(&mut fields);

        // The extracted zero must survive; only genuinely absent fields
        // receive defaults.
        assert_eq!(fields.fleet_total, Some(120));
        assert_eq!(fields.fleet_electric, Some(0));
        assert_eq!(fields.depots, Some(demo::DEPOTS));
        assert_eq!(fields.annual_opex_usd, Some(demo::ANNUAL_OPEX_USD));

        assert!(warnings.iter().any(|w| w.field == "depots"));
        assert!(!warnings.iter().any(|w| w.field == "fleet_total"));
        assert!(!warnings.iter().any(|w| w.field == "fleet_electric"));
    }

    #[test]
    fn test_labels_are_case_insensitive_and_line_scoped() {
        let fields = extract_sector_fields("FLEET SIZE: 300\ndepots:\n4");
        assert_eq!(fields.fleet_total, Some(300));
        // "depots:" with the value on the next line must not match.
        assert_eq!(fields.depots, None);
    }

    #[test]
    fn test_need_amount_parsing_variants() {
        let cases = [
            ("Requested amount: USD 50 million", 50_000_000.0),
            ("Requested amount: $75m", 75_000_000.0),
            ("Loan amount: 1.2 billion", 1_200_000_000.0),
            ("The ministry is seeking $200 million for the fleet.", 200_000_000.0),
        ];
        for (text, expected) in cases {
            let need = extract_need_fields(text);
            assert_eq!(need.requested_amount_usd, Some(expected), "text: {}", text);
        }
    }

    #[test]
    fn test_need_country_and_project() {
        let need = extract_need_fields(
            "Project: Nairobi E-Bus Fleet Renewal\nCountry: Kenya\nThe city of Nairobi urgently needs to replace its ageing diesel buses.",
        );
        assert_eq!(need.project_name.as_deref(), Some("Nairobi E-Bus Fleet Renewal"));
        assert_eq!(need.country.as_deref(), Some("Kenya"));
        assert!(need.problem_summary.unwrap().contains("ageing diesel buses"));
    }

    #[test]
    fn test_sustainability_extraction() {
        let text = "\
ESG Category: B
The project targets a 40% reduction in CO2 emissions.
PM2.5 reduction of 30% is expected in the corridor.
All depots are existing infrastructure, brownfield sites with minimal impact.
Wheelchair ramps and low-floor buses are specified.
A pilot phase and driver training are planned.";
        let fields = extract_sustainability_fields(text);
        assert_eq!(fields.esg_category, Some(EsgCategory::B));
        assert_eq!(fields.co2_reduction_pct, Some(40.0));
        assert_eq!(fields.pm25_reduction_pct, Some(30.0));
        assert_eq!(fields.low_risk_signals, 3);
        assert_eq!(fields.high_risk_signals, 0);
        assert_eq!(fields.accessibility_notes.len(), 2);
        assert_eq!(fields.mitigation_notes.len(), 2);
    }

    #[test]
    fn test_ridership_million_suffix() {
        let fields = extract_sector_fields("Daily ridership: 1.2 million");
        assert_eq!(fields.daily_ridership, Some(1_200_000));
    }
}
