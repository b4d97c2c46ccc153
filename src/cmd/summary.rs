//! Summary command - per-person totals of a batch calculation

use crate::cmd::CalcArgs;
use crate::core::money::round_money;
use crate::core::{display_yuan, mask_credential, ResultRow};
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct SummaryCommand {
    #[command(flatten)]
    args: CalcArgs,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// Totals for one person
#[derive(Debug, Clone, PartialEq)]
struct PersonTotals {
    credential_num: String,
    realname: String,
    records: usize,
    billed: Decimal,
    tax: Decimal,
    /// Withheld so far this year as of the last payment
    accumulated_tax: Decimal,
}

impl PersonTotals {
    fn effective_rate(&self) -> Decimal {
        if self.billed.is_zero() {
            Decimal::ZERO
        } else {
            round_money(self.tax / self.billed * dec!(100))
        }
    }
}

/// Summary data for JSON output
#[derive(Debug, Serialize)]
struct SummaryData {
    year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_no: Option<String>,
    people: Vec<PersonSummary>,
    total_bill_amount: String,
    total_tax: String,
}

#[derive(Debug, Serialize)]
struct PersonSummary {
    credential_num: String,
    realname: String,
    records: usize,
    bill_amount: String,
    tax: String,
    accumulated_tax: String,
    effective_tax_rate: String,
}

#[derive(Debug, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Name")]
    realname: String,
    #[tabled(rename = "Credential")]
    credential: String,
    #[tabled(rename = "Payments")]
    records: usize,
    #[tabled(rename = "Billed")]
    billed: String,
    #[tabled(rename = "Tax")]
    tax: String,
    #[tabled(rename = "Year to Date")]
    accumulated_tax: String,
    #[tabled(rename = "Eff. %")]
    effective_rate: String,
}

impl SummaryCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let rows = self.args.run()?;
        let people = totals_by_person(&rows);

        if self.json {
            self.print_json(&people)
        } else {
            self.print_summary(&people);
            Ok(())
        }
    }

    fn print_summary(&self, people: &[PersonTotals]) {
        println!();
        match self.args.batch() {
            Some(batch) => println!("WITHHOLDING SUMMARY ({}, batch {})", self.args.year(), batch),
            None => println!("WITHHOLDING SUMMARY ({})", self.args.year()),
        }
        println!();

        if people.is_empty() {
            println!("No payments found.");
            return;
        }

        let rows: Vec<SummaryRow> = people
            .iter()
            .map(|p| SummaryRow {
                realname: p.realname.clone(),
                credential: mask_credential(&p.credential_num),
                records: p.records,
                billed: display_yuan(p.billed),
                tax: display_yuan(p.tax),
                accumulated_tax: display_yuan(p.accumulated_tax),
                effective_rate: format!("{:.2}", p.effective_rate()),
            })
            .collect();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
        println!();

        let (billed, tax) = grand_totals(people);
        println!("People: {}", people.len());
        println!("Billed: {}", display_yuan(billed));
        println!("TOTAL TAX: {}", display_yuan(tax));
        println!();
    }

    fn print_json(&self, people: &[PersonTotals]) -> anyhow::Result<()> {
        let (billed, tax) = grand_totals(people);
        let data = SummaryData {
            year: self.args.year(),
            batch_no: self.args.batch().map(str::to_string),
            people: people
                .iter()
                .map(|p| PersonSummary {
                    credential_num: p.credential_num.clone(),
                    realname: p.realname.clone(),
                    records: p.records,
                    bill_amount: format!("{:.2}", p.billed),
                    tax: format!("{:.2}", p.tax),
                    accumulated_tax: format!("{:.2}", p.accumulated_tax),
                    effective_tax_rate: format!("{:.2}", p.effective_rate()),
                })
                .collect(),
            total_bill_amount: format!("{:.2}", billed),
            total_tax: format!("{:.2}", tax),
        };

        println!("{}", serde_json::to_string_pretty(&data)?);
        Ok(())
    }
}

/// Group rows by person, in order of first appearance
fn totals_by_person(rows: &[ResultRow]) -> Vec<PersonTotals> {
    let mut people: Vec<PersonTotals> = Vec::new();
    for row in rows {
        let index = match people
            .iter()
            .position(|p| p.credential_num == row.credential_num)
        {
            Some(index) => index,
            None => {
                people.push(PersonTotals {
                    credential_num: row.credential_num.clone(),
                    realname: row.realname.clone(),
                    records: 0,
                    billed: Decimal::ZERO,
                    tax: Decimal::ZERO,
                    accumulated_tax: Decimal::ZERO,
                });
                people.len() - 1
            }
        };
        let person = &mut people[index];
        person.records += 1;
        person.billed += row.bill_amount;
        person.tax += row.tax;
        person.accumulated_tax = row.accumulated_tax;
    }
    people
}

fn grand_totals(people: &[PersonTotals]) -> (Decimal, Decimal) {
    people
        .iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(billed, tax), p| {
            (billed + p.billed, tax + p.tax)
        })
}
