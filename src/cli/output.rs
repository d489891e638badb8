//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying run summaries
//! and validation results in text or JSON.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{DeploymentDescriptor, Placement};
use crate::error::ProvisionerError;
use crate::provision::{Outcome, TaskReport};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Task outcome row for table display.
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Deployment")]
    name: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Details")]
    details: String,
}

/// Descriptor row for table display.
#[derive(Tabled)]
struct DescriptorRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Placement")]
    placement: String,
    #[tabled(rename = "Teams")]
    teams: usize,
}

#[derive(Serialize)]
struct OutcomeJson<'a> {
    name: &'a str,
    result: &'static str,
    details: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats per-deployment outcomes of a run.
    #[must_use]
    pub fn format_run(&self, tasks: &[TaskReport]) -> String {
        match self.format {
            OutputFormat::Json => {
                let rows: Vec<OutcomeJson<'_>> = tasks
                    .iter()
                    .map(|t| OutcomeJson {
                        name: &t.name,
                        result: Self::outcome_label(&t.outcome),
                        details: Self::outcome_details(&t.outcome),
                    })
                    .collect();
                serde_json::to_string_pretty(&rows).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_run_text(tasks),
        }
    }

    fn format_run_text(tasks: &[TaskReport]) -> String {
        if tasks.is_empty() {
            return String::from("No deployments to process.\n");
        }

        let rows: Vec<OutcomeRow> = tasks
            .iter()
            .map(|t| OutcomeRow {
                name: t.name.clone(),
                result: Self::colored_outcome(&t.outcome),
                details: Self::outcome_details(&t.outcome),
            })
            .collect();

        let mut output = Table::new(rows).to_string();
        output.push('\n');

        let failed = tasks.iter().filter(|t| !t.outcome.is_success()).count();
        let created = tasks
            .iter()
            .filter(|t| matches!(t.outcome, Outcome::Created { .. }))
            .count();
        let _ = write!(
            output,
            "\n{} processed, {} created, {} failed\n",
            tasks.len(),
            created.to_string().green(),
            failed.to_string().red()
        );
        output
    }

    /// Formats descriptors that passed validation.
    #[must_use]
    pub fn format_validation(&self, descriptors: &[DeploymentDescriptor]) -> String {
        match self.format {
            OutputFormat::Json => {
                let names: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
                serde_json::json!({ "valid": true, "deployments": names }).to_string()
            }
            OutputFormat::Text => {
                let rows: Vec<DescriptorRow> = descriptors
                    .iter()
                    .map(|d| DescriptorRow {
                        name: d.name.clone(),
                        resource_type: d.resource_type.to_string(),
                        placement: Self::placement(&d.placement),
                        teams: d.team_roles.len(),
                    })
                    .collect();

                let mut output = format!(
                    "{} {} deployment spec(s) are valid\n\n",
                    "✓".green(),
                    descriptors.len()
                );
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
                output
            }
        }
    }

    /// Formats a surfaced error, one line per aggregated failure.
    #[must_use]
    pub fn format_error(&self, error: &ProvisionerError) -> String {
        let messages: Vec<String> = match error {
            ProvisionerError::Aggregate(agg) => {
                agg.errors.iter().map(ToString::to_string).collect()
            }
            other => vec![other.to_string()],
        };

        match self.format {
            OutputFormat::Json => {
                serde_json::json!({ "status": "error", "errors": messages }).to_string()
            }
            OutputFormat::Text => {
                let mut output = format!("{} {} error(s):\n", "✗".red(), messages.len());
                for message in &messages {
                    let _ = writeln!(output, "   - {message}");
                }
                output
            }
        }
    }

    fn placement(placement: &Placement) -> String {
        match placement {
            Placement::Cluster { name } => format!("cluster {name}"),
            Placement::Datacenter { slug, scaling, .. } => match scaling {
                Some(units) => format!("{slug} x{units}"),
                None => slug.clone(),
            },
        }
    }

    const fn outcome_label(outcome: &Outcome) -> &'static str {
        match outcome {
            Outcome::Created { .. } => "created",
            Outcome::Updated { .. } => "updated",
            Outcome::Unchanged { .. } => "unchanged",
            Outcome::Deleted { .. } => "deleted",
            Outcome::Absent => "absent",
            Outcome::DryRun { .. } => "dry-run",
            Outcome::Failed { .. } => "failed",
        }
    }

    fn colored_outcome(outcome: &Outcome) -> String {
        let label = Self::outcome_label(outcome);
        match outcome {
            Outcome::Created { .. } | Outcome::Deleted { .. } => label.green().to_string(),
            Outcome::Updated { .. } | Outcome::DryRun { .. } => label.yellow().to_string(),
            Outcome::Unchanged { .. } | Outcome::Absent => label.dimmed().to_string(),
            Outcome::Failed { .. } => label.red().to_string(),
        }
    }

    fn outcome_details(outcome: &Outcome) -> String {
        match outcome {
            Outcome::Created { id }
            | Outcome::Updated { id }
            | Outcome::Unchanged { id }
            | Outcome::Deleted { id } => id.clone(),
            Outcome::Absent => String::from("not found"),
            Outcome::DryRun { plan } => plan.clone(),
            Outcome::Failed { stage } => format!("during {stage}"),
        }
    }
}
