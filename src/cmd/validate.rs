//! Validate command - surface ledger rows the calculator would skip or reject

use crate::cmd::read_inputs;
use crate::core::{mask_credential, RecordInput, Warning};
use chrono::Datelike;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// JSON or CSV ledger export ("-" reads JSON from stdin)
    #[arg(short, long)]
    records: PathBuf,

    /// Only check rows paid in this calendar year
    #[arg(short, long)]
    year: Option<i32>,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// A validation issue for output
#[derive(Debug, Clone, Serialize)]
struct ValidationIssue {
    /// 1-based position of the row in the export
    row: usize,
    #[serde(rename = "type")]
    issue_type: String,
    batch_no: String,
    credential_num: String,
    realname: String,
    message: String,
}

/// JSON output structure
#[derive(Debug, Serialize)]
struct ValidationOutput {
    year: String,
    issue_count: usize,
    issues: Vec<ValidationIssue>,
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let inputs = read_inputs(&self.records)?;
        let issues = collect_issues(&inputs, self.year);

        if self.json {
            self.print_json(&issues)?;
        } else {
            self.print_text(&issues);
        }

        // Exit with code 1 if issues found
        if !issues.is_empty() {
            std::process::exit(1);
        }
        Ok(())
    }

    fn year_label(&self) -> String {
        self.year.map_or("All Years".to_string(), |y| y.to_string())
    }

    fn print_text(&self, issues: &[ValidationIssue]) {
        println!();
        println!("VALIDATION RESULTS ({})", self.year_label());
        println!();

        if issues.is_empty() {
            println!("\u{2713} No issues found.");
            return;
        }

        println!("\u{26A0} {} issue(s) found:", issues.len());
        println!();
        for (i, issue) in issues.iter().enumerate() {
            println!(
                "  {}. [{}] row {} batch {} {} {}",
                i + 1,
                issue.issue_type,
                issue.row,
                issue.batch_no,
                issue.realname,
                mask_credential(&issue.credential_num)
            );
            println!("     {}", issue.message);
            println!();
        }
    }

    fn print_json(&self, issues: &[ValidationIssue]) -> anyhow::Result<()> {
        let output = ValidationOutput {
            year: self.year_label(),
            issue_count: issues.len(),
            issues: issues.to_vec(),
        };

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}

/// Issues of live, settled rows. Rows whose payment year cannot be read are always checked.
fn collect_issues(inputs: &[RecordInput], year: Option<i32>) -> Vec<ValidationIssue> {
    inputs
        .iter()
        .enumerate()
        .filter(|(_, input)| !input.deleted && input.is_settled())
        .filter(|(_, input)| match (year, input.payment_time()) {
            (Some(year), Ok(time)) => time.year() == year,
            _ => true,
        })
        .flat_map(|(i, input)| {
            Warning::for_input(input)
                .into_iter()
                .map(move |warning| ValidationIssue {
                    row: i + 1,
                    issue_type: warning.kind().to_string(),
                    batch_no: input.batch_no.clone(),
                    credential_num: input.credential_num.clone(),
                    realname: input.realname.clone(),
                    message: warning.to_string(),
                })
        })
        .collect()
}
