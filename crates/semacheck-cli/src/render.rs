//! Rendering of a finished run for `semacheck run --format`.

use anyhow::{Context, Result};
use clap::ValueEnum;
use console::style;
use semacheck_verifier::RunReport;

/// How `semacheck run` prints its report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// One line per scenario, totals, then an overall verdict
    #[default]
    Text,
    /// The whole report as pretty-printed JSON
    Json,
}

impl ReportFormat {
    pub fn render(self, report: &RunReport) -> Result<String> {
        match self {
            Self::Json => report.to_json().context("Failed to serialize report"),
            Self::Text => {
                let verdict = if report.is_success() {
                    style("PASSED").green().bold()
                } else {
                    style("FAILED").red().bold()
                };
                Ok(format!("{report}{verdict}"))
            }
        }
    }
}
