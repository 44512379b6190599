//! Formatted output helpers for CLI commands.
//!
//! Renders start plans and run reports with colored status indicators.

use std::fmt::Write;
use std::time::Duration;

use composer_common::types::ServiceState;
use composer_compose::StartPlan;
use composer_runtime::RunReport;

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Renders the batches of a start plan, one line per batch.
#[must_use]
pub fn format_plan(project: &str, plan: &StartPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{BOLD}Start plan for {project}{RESET}");
    for (index, batch) in plan.batches().iter().enumerate() {
        let _ = writeln!(out, "  {DIM}batch {}:{RESET} {}", index + 1, batch.join(", "));
    }
    let _ = writeln!(
        out,
        "  {} service(s) in {} batch(es)",
        plan.service_count(),
        plan.len()
    );
    out
}

/// Renders the final state of every planned service.
#[must_use]
pub fn format_report(report: &RunReport, elapsed: Duration) -> String {
    let mut out = String::new();
    for service in report.services() {
        let marker = match service.state {
            ServiceState::Ready => format!("{GREEN}●{RESET}"),
            ServiceState::Failed => format!("{RED}✗{RESET}"),
            ServiceState::Pending | ServiceState::Starting => format!("{YELLOW}○{RESET}"),
        };
        let _ = write!(out, "  {marker} {BOLD}{}{RESET} {}", service.name, service.state);
        if let Some(handle) = &service.handle {
            let _ = write!(out, " {DIM}[{handle}]{RESET}");
        }
        if let Some(error) = &service.error {
            let _ = write!(out, " {DIM}{error}{RESET}");
        }
        out.push('\n');
    }
    if !report.skipped().is_empty() {
        let _ = writeln!(out, "  not started: {}", report.skipped().join(", "));
    }
    let ready = report
        .services()
        .filter(|s| s.state == ServiceState::Ready)
        .count();
    let _ = writeln!(
        out,
        "  {ready} service(s) ready in {:.1}s",
        elapsed.as_secs_f64()
    );
    out
}
