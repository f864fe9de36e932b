//! Shared helpers for the `depot` binary: tracing setup and report rendering.

use std::fmt::Write;

use clap::ValueEnum;
use depot_files::maintenance::RecordFailure;
use depot_files::{MigrationReport, RefreshReport, VerifyReport};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn to_json(value: &impl Serialize) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn push_failures(out: &mut String, failures: &[RecordFailure]) {
    if failures.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n--- Failures ---");
    for failure in failures {
        let _ = writeln!(
            out,
            "{:<12} {}",
            truncate_string(&failure.record, 12),
            truncate_string(&failure.error, 100)
        );
    }
}

pub fn render_migration(report: &MigrationReport) -> String {
    let mut out = String::from("\n=== Migration ===\n\n");
    let _ = writeln!(out, "Total:    {}", report.total);
    let _ = writeln!(out, "Migrated: {}", report.migrated);
    let _ = writeln!(out, "Skipped:  {}", report.skipped);
    let _ = writeln!(out, "Failed:   {}", report.failed);
    push_failures(&mut out, &report.failures);
    out
}

pub fn render_refresh(report: &RefreshReport) -> String {
    let mut out = String::from("\n=== Refresh ===\n\n");
    let _ = writeln!(out, "Total:     {}", report.total);
    let _ = writeln!(out, "Refreshed: {}", report.refreshed);
    let _ = writeln!(out, "Unchanged: {}", report.unchanged);
    let _ = writeln!(out, "Failed:    {}", report.failed);
    let _ = writeln!(out, "Batches:   {}", report.flushes);
    push_failures(&mut out, &report.failures);
    out
}

pub fn render_verify(report: &VerifyReport) -> String {
    let mut out = String::from("\n=== Verification ===\n\n");
    let _ = writeln!(out, "Total:      {}", report.total);
    let _ = writeln!(out, "Consistent: {}", report.consistent);
    let _ = writeln!(out, "Mismatched: {}", report.mismatches.len());
    let _ = writeln!(out, "Failed:     {}", report.failed);

    if !report.mismatches.is_empty() {
        let _ = writeln!(out, "\n--- Mismatches ---");
        let _ = writeln!(
            out,
            "{:<12} {:<40} {:<14} {:<34} {}",
            "RECORD", "PATHNAME", "FIELD", "EXPECTED", "ACTUAL"
        );
        for mismatch in &report.mismatches {
            for field in &mismatch.fields {
                let _ = writeln!(
                    out,
                    "{:<12} {:<40} {:<14} {:<34} {}",
                    truncate_string(&mismatch.record, 12),
                    truncate_string(&mismatch.pathname, 40),
                    field.field,
                    truncate_string(&field.expected, 34),
                    field.actual
                );
            }
        }
    }
    push_failures(&mut out, &report.failures);
    out
}
