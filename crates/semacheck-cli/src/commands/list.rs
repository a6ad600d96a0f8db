//! Scenario listing

use anyhow::Result;
use clap::Args;
use console::style;
use semacheck_verifier::registry;

/// List every registered scenario
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only list scenarios whose name contains this substring
    #[arg(long, value_name = "SUBSTRING")]
    pub filter: Option<String>,
}

impl ListCommand {
    pub fn execute(&self) -> Result<()> {
        let selected = registry()
            .iter()
            .filter(|s| self.filter.as_deref().is_none_or(|f| s.name.contains(f)));
        for scenario in selected {
            println!("{:<32} {}", style(scenario.name).bold(), scenario.description);
        }
        Ok(())
    }
}
