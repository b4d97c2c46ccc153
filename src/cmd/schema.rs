//! Schema command - print expected input and result formats

use crate::core::{ResultRow, RecordsInput, CSV_COLUMNS};
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format: records-json, result-json, csv-header or csv-fields
    #[arg(value_enum, default_value = "records-json")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the ledger export
    RecordsJson,
    /// JSON Schema for a calculated result row
    ResultJson,
    /// CSV header row with column names
    CsvHeader,
    /// CSV column descriptions
    CsvFields,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::RecordsJson => {
                let schema = schema_for!(RecordsInput);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::ResultJson => {
                let schema = schema_for!(ResultRow);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::CsvHeader => println!("{}", CSV_COLUMNS.join(",")),
            SchemaFormat::CsvFields => print_csv_fields(),
        }
        Ok(())
    }
}

fn print_csv_fields() {
    println!("CSV Input Format");
    println!("================");
    println!();
    for (name, required, description) in CSV_FIELD_DESCRIPTIONS {
        let req = if *required { "required" } else { "optional" };
        println!("{:20} ({:8})  {}", name, req, description);
    }
    println!();
    println!("One of payment_over_time, create_time or year_month must be present.");
}

const CSV_FIELD_DESCRIPTIONS: &[(&str, bool, &str)] = &[
    ("credential_num", true, "Tax ID (identity card number) of the worker"),
    ("realname", false, "Name of the worker"),
    ("batch_no", true, "Settlement batch number"),
    ("worker_id", false, "Worker ID in the settlement system"),
    ("bill_amount", true, "Billed amount after service fee"),
    (
        "payment_over_time",
        false,
        "Payment completion time (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)",
    ),
    (
        "create_time",
        false,
        "Row creation time, used when the payment has not completed",
    ),
    ("year_month", false, "Month (YYYY-MM) used when no timestamp is present"),
    (
        "deleted",
        false,
        "true for soft-deleted rows; false when the column is left out",
    ),
    (
        "pay_status",
        false,
        "0 pending, 1 failed, 2 paid, 3 completed; empty counts as settled",
    ),
    (
        "confirm_pay_status",
        false,
        "1 when a pending payment has been confirmed",
    ),
    ("business_type", false, "Business type that produced the row"),
];
