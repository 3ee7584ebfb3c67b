//! Concept note assembly.
//!
//! A pure rendering of the case's derived state into a markdown document:
//! no recomputation, no data access beyond the case itself. Sections for
//! which no derived data exists render a pending placeholder rather than
//! being dropped, so the section order of a note is always the same.

use std::fmt::Write;

use crate::finance::amortization_schedule;
use crate::model::Case;

const PENDING: &str = "_Pending: run the corresponding review phase._";

fn group_thousands(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if rounded < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

fn millions(amount: f64) -> String {
    format!("${:.1}M", amount / 1e6)
}

fn opt_count(value: Option<u32>) -> String {
    value.map(|n| group_thousands(n as f64)).unwrap_or_else(|| "n/a".to_string())
}

/// Renders the concept note body from the case's derived state.
pub fn assemble(case: &Case) -> String {
    let mut out = String::new();

    writeln!(out, "# Concept Note: {}", case.name).ok();
    writeln!(out).ok();
    writeln!(out, "**Country:** {} | **Sector:** {}", case.country, case.sector).ok();
    writeln!(out).ok();

    summary_section(&mut out, case);
    sector_section(&mut out, case);
    gap_section(&mut out, case);
    kpi_section(&mut out, case);
    options_section(&mut out, case);
    sustainability_section(&mut out, case);
    decision_section(&mut out, case);

    out
}

fn summary_section(out: &mut String, case: &Case) {
    writeln!(out, "## 1. Summary").ok();
    writeln!(out).ok();
    match &case.derived.need {
        Some(need) => {
            if let Some(project) = &need.project_name {
                writeln!(out, "**Project:** {}", project).ok();
            }
            if let Some(amount) = need.requested_amount_usd {
                writeln!(out, "**Requested financing:** {}", millions(amount)).ok();
            }
            writeln!(out).ok();
            match &need.problem_summary {
                Some(summary) => writeln!(out, "{}", summary).ok(),
                None => writeln!(out, "No problem statement identified in the need assessment.").ok(),
            };
        }
        None => {
            writeln!(out, "{}", PENDING).ok();
        }
    }
    writeln!(out).ok();
}

fn sector_section(out: &mut String, case: &Case) {
    writeln!(out, "## 2. Sector Profile").ok();
    writeln!(out).ok();
    let Some(sector) = &case.derived.sector else {
        writeln!(out, "{}", PENDING).ok();
        writeln!(out).ok();
        return;
    };

    writeln!(out, "| Indicator | Value |").ok();
    writeln!(out, "|---|---|").ok();
    writeln!(out, "| Fleet size | {} |", opt_count(sector.fleet_total)).ok();
    writeln!(out, "| Diesel buses | {} |", opt_count(sector.fleet_diesel)).ok();
    writeln!(out, "| Hybrid buses | {} |", opt_count(sector.fleet_hybrid)).ok();
    writeln!(out, "| Electric buses | {} |", opt_count(sector.fleet_electric)).ok();
    writeln!(out, "| Depots | {} |", opt_count(sector.depots)).ok();
    writeln!(
        out,
        "| Daily ridership | {} |",
        sector.daily_ridership.map(|n| group_thousands(n as f64)).unwrap_or_else(|| "n/a".to_string()),
    )
    .ok();
    writeln!(
        out,
        "| Annual operating cost | {} |",
        sector.annual_opex_usd.map(millions).unwrap_or_else(|| "n/a".to_string()),
    )
    .ok();
    writeln!(
        out,
        "| Annual CO2 emissions | {} |",
        sector
            .annual_co2_tons
            .map(|t| format!("{} tons", group_thousands(t)))
            .unwrap_or_else(|| "n/a".to_string()),
    )
    .ok();
    writeln!(
        out,
        "| Fleet electrification | {} |",
        sector
            .electrification_pct()
            .map(|p| format!("{:.1}%", p))
            .unwrap_or_else(|| "n/a".to_string()),
    )
    .ok();
    if let Some(notes) = &sector.notes {
        writeln!(out).ok();
        writeln!(out, "{}", notes).ok();
    }
    writeln!(out).ok();
}

fn gap_section(out: &mut String, case: &Case) {
    writeln!(out, "## 3. Benchmark Gap Analysis").ok();
    writeln!(out).ok();
    if case.derived.gaps.is_empty() {
        writeln!(out, "{}", PENDING).ok();
        writeln!(out).ok();
        return;
    }

    writeln!(out, "| City | Metric | Case | Benchmark | Gap |").ok();
    writeln!(out, "|---|---|---|---|---|").ok();
    for item in &case.derived.gaps {
        let gap = match item.delta_pct {
            Some(pct) => format!("{:+.0}%", pct * 100.0),
            None => "not comparable".to_string(),
        };
        writeln!(
            out,
            "| {} | {} | {} {} | {} {} | {} |",
            item.city,
            item.metric.label(),
            group_thousands(item.case_value),
            item.metric.unit(),
            group_thousands(item.benchmark_value),
            item.metric.unit(),
            gap,
        )
        .ok();
    }
    writeln!(out).ok();
}

fn kpi_section(out: &mut String, case: &Case) {
    writeln!(out, "## 4. Baseline KPIs").ok();
    writeln!(out).ok();
    if case.derived.kpis.is_empty() {
        writeln!(out, "{}", PENDING).ok();
        writeln!(out).ok();
        return;
    }

    writeln!(out, "| KPI | Current | Target | Rationale |").ok();
    writeln!(out, "|---|---|---|---|").ok();
    for kpi in &case.derived.kpis {
        writeln!(
            out,
            "| {} | {} {} | {} {} | {} |",
            kpi.name,
            group_thousands(kpi.current_value),
            kpi.unit,
            group_thousands(kpi.target_value),
            kpi.unit,
            kpi.rationale,
        )
        .ok();
    }
    writeln!(out).ok();
}

fn options_section(out: &mut String, case: &Case) {
    writeln!(out, "## 5. Financing Options").ok();
    writeln!(out).ok();
    if case.derived.options.is_empty() {
        writeln!(out, "{}", PENDING).ok();
        writeln!(out).ok();
        return;
    }

    writeln!(out, "| Option | Tenor | Grace | Rate | Repayment (60) | Rate (40) | Total (100) |").ok();
    writeln!(out, "|---|---|---|---|---|---|---|").ok();
    for option in &case.derived.options {
        writeln!(
            out,
            "| {} | {}y | {}y | {:.0} bps | {:.1} | {:.1} | {:.1} |",
            option.label,
            option.tenor_years,
            option.grace_years,
            option.rate_bps,
            option.repayment_score,
            option.rate_score,
            option.total_score,
        )
        .ok();
    }
    writeln!(out).ok();

    for option in &case.derived.options {
        writeln!(out, "### {}", option.label).ok();
        writeln!(out).ok();
        writeln!(out, "**Benefits:**").ok();
        for benefit in &option.benefits {
            writeln!(out, "- {}", benefit).ok();
        }
        writeln!(out).ok();
        writeln!(out, "**Trade-offs:**").ok();
        for tradeoff in &option.tradeoffs {
            writeln!(out, "- {}", tradeoff).ok();
        }
        writeln!(out).ok();

        let schedule = amortization_schedule(
            option.principal_usd,
            option.tenor_years,
            option.grace_years,
            option.rate_bps,
        );
        writeln!(
            out,
            "Indicative debt service: total interest ${}, total repayment ${} over {} years.",
            group_thousands(schedule.total_interest),
            group_thousands(schedule.total_repayment),
            option.tenor_years,
        )
        .ok();
        writeln!(out).ok();
    }
}

fn sustainability_section(out: &mut String, case: &Case) {
    writeln!(out, "## 6. Sustainability & ESG").ok();
    writeln!(out).ok();
    let Some(sustainability) = &case.derived.sustainability else {
        writeln!(out, "{}", PENDING).ok();
        writeln!(out).ok();
        return;
    };

    writeln!(
        out,
        "**ESG Category {:?}:** {}",
        sustainability.esg_category,
        sustainability.esg_category.description(),
    )
    .ok();
    writeln!(out).ok();
    match sustainability.co2_reduction_tons {
        Some(tons) => {
            writeln!(out, "Expected CO2 reduction: {} tons/year.", group_thousands(tons)).ok()
        }
        None => writeln!(out, "CO2 reduction tonnage not derivable from available data.").ok(),
    };
    writeln!(out, "{}", sustainability.pm25_note).ok();
    writeln!(out).ok();

    writeln!(out, "**Social & accessibility:**").ok();
    for item in &sustainability.accessibility {
        writeln!(out, "- {}", item).ok();
    }
    writeln!(out).ok();
    writeln!(out, "**Policy alignment:**").ok();
    for item in &sustainability.policy_alignment {
        writeln!(out, "- {}", item).ok();
    }
    writeln!(out).ok();
    writeln!(out, "**Key risks:**").ok();
    for item in &sustainability.risk_flags {
        writeln!(out, "- {}", item).ok();
    }
    writeln!(out).ok();
    writeln!(out, "**Mitigations:**").ok();
    for item in &sustainability.mitigations {
        writeln!(out, "- {}", item).ok();
    }
    writeln!(out).ok();
}

fn decision_section(out: &mut String, case: &Case) {
    writeln!(out, "## 7. Decision Framework").ok();
    writeln!(out).ok();
    writeln!(out, "This concept note is submitted for review. Next steps:").ok();
    writeln!(out).ok();
    writeln!(out, "1. Review the financing options and select a preferred structure.").ok();
    writeln!(out, "2. Approve to proceed to appraisal, or reject with guidance.").ok();
    writeln!(out, "3. Any phase may be re-run if documents change; downstream results are refreshed.").ok();
}
