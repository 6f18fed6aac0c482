use crate::explorer::crawler::Termination;
use crate::report::report_model::{DiscoveryReport, ReconcileReport};

// ============================================================================
// Console reporter: formatted terminal output
// ============================================================================

/// Format a discovery report for terminal output.
///
/// Produces output like:
/// ```text
/// === Discovery: 2 world states ===
///
/// ✓ default  3 screens (exhausted)
///     01-initial
///     02-tap-Settings
///     03-tap-Help
/// ✗ premium=true  0 screens (aborted)
///     [ERROR] cannot write preference 'premium'
///
/// === Results: 3 screens, 1 failed pass in 4.2s ===
/// ```
pub fn format_discovery_report(report: &DiscoveryReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "=== Discovery: {} world states ===\n\n",
        report.total_passes
    ));

    for pass in &report.passes {
        let marker = if pass.failed() { "\u{2717}" } else { "\u{2713}" };
        out.push_str(&format!(
            "{} {}  {} screens ({})\n",
            marker,
            pass.label,
            pass.screens.len(),
            termination_name(&pass.termination)
        ));

        for screen in &pass.screens {
            out.push_str(&format!("    {}\n", screen.name));
        }

        if let Some(ref error) = pass.error {
            out.push_str(&format!("    [ERROR] {}\n", error));
        }
    }

    out.push_str(&format!(
        "\n=== Results: {} screens, {} failed pass{}",
        report.total_screens,
        report.failed_passes,
        if report.failed_passes == 1 { "" } else { "es" }
    ));

    if let Some(ms) = report.duration_ms {
        let secs = ms as f64 / 1000.0;
        out.push_str(&format!(" in {:.1}s", secs));
    }

    out.push_str(" ===\n");
    out
}

/// Format reconciliation verdicts: one line per reachable screen with its
/// action count, then every unreachable screen with its reason.
pub fn format_reconcile_report(report: &ReconcileReport) -> String {
    let mut out = String::new();

    for target in &report.targets {
        out.push_str(&format!(
            "\u{2713} {}  [{}] {} actions\n",
            target.name,
            target.world_state.label(),
            target.actions.len()
        ));
        for action in &target.actions {
            out.push_str(&format!("    {}\n", action));
        }
    }

    for screen in &report.unreachable {
        out.push_str(&format!("\u{2717} {}  unreachable: {}\n", screen.name, screen.reason));
    }

    out.push_str(&format!(
        "\n=== Reconciled: {} reachable, {} unreachable ===\n",
        report.targets.len(),
        report.unreachable.len()
    ));
    out
}

fn termination_name(termination: &Termination) -> &'static str {
    match termination {
        Termination::Exhausted => "exhausted",
        Termination::ScreenCap => "screen cap",
        Termination::IterationCap => "iteration cap",
        Termination::ReplayDiverged => "replay diverged",
        Termination::Aborted(_) => "aborted",
    }
}
