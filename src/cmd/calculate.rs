//! Calculate command - withholding tax for every payment of a batch or person

use crate::cmd::CalcArgs;
use crate::core::money::display_rate;
use crate::core::{display_amount, mask_credential, ResultRow};
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct CalculateCommand {
    #[command(flatten)]
    args: CalcArgs,

    /// Print each row's calculation steps after the table
    #[arg(long)]
    steps: bool,

    /// Output result rows as JSON
    #[arg(long, conflicts_with = "csv")]
    json: bool,

    /// Output result rows as CSV
    #[arg(long)]
    csv: bool,
}

impl CalculateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let rows = self.args.run()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
            Ok(())
        } else if self.csv {
            self.write_csv(&rows)
        } else {
            self.print_table(&rows);
            Ok(())
        }
    }

    fn print_table(&self, rows: &[ResultRow]) {
        if rows.is_empty() {
            println!("No records found for {} tax year", self.args.year());
            return;
        }

        let table_rows: Vec<PaymentRow> = rows.iter().map(PaymentRow::from).collect();
        let table = Table::new(&table_rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);

        let total_tax: Decimal = rows.iter().map(|r| r.tax).sum();
        println!("Total tax: {}", display_amount(total_tax));

        if self.steps {
            for row in rows {
                println!();
                println!(
                    "{} {} {} (batch {})",
                    row.year_month,
                    row.realname,
                    mask_credential(&row.credential_num),
                    row.batch_no
                );
                for step in &row.calculation_steps {
                    println!("  {}", step);
                }
            }
        }
    }

    fn write_csv(&self, rows: &[ResultRow]) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(io::stdout());
        for row in rows {
            wtr.serialize(CsvRow::from(row))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Row for the payments table output
#[derive(Debug, Clone, Tabled)]
struct PaymentRow {
    #[tabled(rename = "Month")]
    year_month: String,
    #[tabled(rename = "Batch")]
    batch_no: String,
    #[tabled(rename = "Name")]
    realname: String,
    #[tabled(rename = "Credential")]
    credential: String,
    #[tabled(rename = "Type")]
    income_type: String,
    #[tabled(rename = "Billed")]
    bill_amount: String,
    #[tabled(rename = "Acc. Income")]
    accumulated_income: String,
    #[tabled(rename = "Months")]
    accumulated_months: u32,
    #[tabled(rename = "Acc. Taxable")]
    accumulated_taxable: String,
    #[tabled(rename = "Rate")]
    tax_rate: String,
    #[tabled(rename = "Acc. Tax")]
    accumulated_total_tax: String,
    #[tabled(rename = "Withheld")]
    prev_accumulated_tax: String,
    #[tabled(rename = "Tax")]
    tax: String,
    #[tabled(rename = "Eff. %")]
    effective_tax_rate: String,
}

impl From<&ResultRow> for PaymentRow {
    fn from(row: &ResultRow) -> Self {
        PaymentRow {
            year_month: row.year_month.to_string(),
            batch_no: row.batch_no.clone(),
            realname: row.realname.clone(),
            credential: mask_credential(&row.credential_num),
            income_type: row.income_type_name.clone(),
            bill_amount: display_amount(row.bill_amount),
            accumulated_income: display_amount(row.accumulated_income),
            accumulated_months: row.accumulated_months,
            accumulated_taxable: display_amount(row.accumulated_taxable),
            tax_rate: display_rate(row.tax_rate),
            accumulated_total_tax: display_amount(row.accumulated_total_tax),
            prev_accumulated_tax: display_amount(row.prev_accumulated_tax),
            tax: display_amount(row.tax),
            effective_tax_rate: display_amount(row.effective_tax_rate),
        }
    }
}

/// Flat CSV rendering of a result row
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    batch_no: &'a str,
    credential_num: &'a str,
    realname: &'a str,
    worker_id: Option<i64>,
    year_month: String,
    income_type: u8,
    income_type_name: &'a str,
    bill_amount: String,
    income_amount: String,
    prev_accumulated_income: String,
    accumulated_income: String,
    accumulated_months: u32,
    accumulated_deduction: String,
    accumulated_special: String,
    accumulated_additional: String,
    accumulated_other: String,
    accumulated_pension: String,
    accumulated_donation: String,
    accumulated_taxable: String,
    tax_rate: String,
    quick_deduction: String,
    accumulated_total_tax: String,
    prev_accumulated_tax: String,
    tax: String,
    accumulated_tax: String,
    effective_tax_rate: String,
    revenue_bills: String,
    calculation_steps: String,
}

impl<'a> From<&'a ResultRow> for CsvRow<'a> {
    fn from(row: &'a ResultRow) -> Self {
        CsvRow {
            batch_no: &row.batch_no,
            credential_num: &row.credential_num,
            realname: &row.realname,
            worker_id: row.worker_id,
            year_month: row.year_month.to_string(),
            income_type: row.income_type.code(),
            income_type_name: &row.income_type_name,
            bill_amount: display_amount(row.bill_amount),
            income_amount: display_amount(row.income_amount),
            prev_accumulated_income: display_amount(row.prev_accumulated_income),
            accumulated_income: display_amount(row.accumulated_income),
            accumulated_months: row.accumulated_months,
            accumulated_deduction: display_amount(row.accumulated_deduction),
            accumulated_special: display_amount(row.accumulated_special),
            accumulated_additional: display_amount(row.accumulated_additional),
            accumulated_other: display_amount(row.accumulated_other),
            accumulated_pension: display_amount(row.accumulated_pension),
            accumulated_donation: display_amount(row.accumulated_donation),
            accumulated_taxable: display_amount(row.accumulated_taxable),
            tax_rate: row.tax_rate.normalize().to_string(),
            quick_deduction: display_amount(row.quick_deduction),
            accumulated_total_tax: display_amount(row.accumulated_total_tax),
            prev_accumulated_tax: display_amount(row.prev_accumulated_tax),
            tax: display_amount(row.tax),
            accumulated_tax: display_amount(row.accumulated_tax),
            effective_tax_rate: display_amount(row.effective_tax_rate),
            revenue_bills: display_amount(row.revenue_bills),
            calculation_steps: row.calculation_steps.join(" | "),
        }
    }
}
