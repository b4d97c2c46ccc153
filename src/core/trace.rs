//! Human-readable calculation steps attached to every result row.
//!
//! Steps are rendered from the finished (rounded) row so that each figure an auditor
//! reads in the trace is the figure stored in the row's numeric fields.

use super::brackets::BASIC_DEDUCTION;
use super::calculator::{ResetReason, ResultRow};
use super::money::{display_amount as amt, display_rate};
use super::options::TaxOptions;
use rust_decimal::Decimal;

/// Figures of the month accumulation that are not carried on the row itself
#[derive(Debug, Clone)]
pub struct StepContext<'a> {
    pub reset_reason: Option<ResetReason>,
    /// Month total before this record
    pub prev_month_total: Decimal,
    /// Month total including this record
    pub month_total: Decimal,
    pub monthly_income: Decimal,
    /// Income previously booked for this month; `None` on the month's first record
    pub replaced_monthly_income: Option<Decimal>,
    /// Tax withheld for the month so far, this record included
    pub month_paid_tax: Decimal,
    pub options: &'a TaxOptions,
}

pub fn calculation_steps(row: &ResultRow, ctx: &StepContext) -> Vec<String> {
    let mut steps = Vec::with_capacity(19);
    let ym = row.year_month;
    let months = row.accumulated_months;

    if let Some(reason) = ctx.reset_reason {
        steps.push(format!("Reset: {}", reason));
    }

    if ctx.prev_month_total > Decimal::ZERO {
        steps.push(format!(
            "Month {} billed: {} + {} = {}",
            ym,
            amt(ctx.prev_month_total),
            amt(row.bill_amount),
            amt(ctx.month_total)
        ));
    } else {
        steps.push(format!("Month {} billed: {}", ym, amt(ctx.month_total)));
    }

    steps.push(format!(
        "Month {} income: {} x {} = {}",
        ym,
        amt(ctx.month_total),
        display_rate(row.income_type.income_ratio()),
        amt(ctx.monthly_income)
    ));

    match ctx.replaced_monthly_income {
        None => steps.push(format!(
            "Accumulated income: {} + {} = {}",
            amt(row.prev_accumulated_income),
            amt(ctx.monthly_income),
            amt(row.accumulated_income)
        )),
        Some(replaced) => steps.push(format!(
            "Accumulated income: {} - {} + {} = {}",
            amt(row.prev_accumulated_income),
            amt(replaced),
            amt(ctx.monthly_income),
            amt(row.accumulated_income)
        )),
    }

    steps.push(format!("Accumulated months: {}", months));
    steps.push(format!(
        "Basic deduction: {} x {} = {}",
        amt(BASIC_DEDUCTION),
        months,
        amt(row.accumulated_deduction)
    ));

    let scaled = [
        ("Special deduction", ctx.options.special_deduction, row.accumulated_special),
        (
            "Additional special deduction",
            ctx.options.additional_special_deduction,
            row.accumulated_additional,
        ),
        ("Other deduction", ctx.options.other_deduction, row.accumulated_other),
        ("Pension deduction", ctx.options.pension_deduction, row.accumulated_pension),
    ];
    for (label, monthly, accumulated) in scaled {
        steps.push(format!(
            "{}: {} x {} = {}",
            label,
            amt(monthly),
            months,
            amt(accumulated)
        ));
    }
    steps.push(format!("Donation deduction: {}", amt(row.accumulated_donation)));

    steps.push(format!(
        "Taxable income: max(0, {} - {} - {} - {} - {} - {} - {}) = {}",
        amt(row.accumulated_income),
        amt(row.accumulated_deduction),
        amt(row.accumulated_special),
        amt(row.accumulated_additional),
        amt(row.accumulated_other),
        amt(row.accumulated_pension),
        amt(row.accumulated_donation),
        amt(row.accumulated_taxable)
    ));
    steps.push(format!(
        "Bracket: rate {}, quick deduction {}",
        display_rate(row.tax_rate),
        amt(row.quick_deduction)
    ));
    steps.push(format!(
        "Accumulated tax: max(0, {} x {} - {}) = {}",
        amt(row.accumulated_taxable),
        display_rate(row.tax_rate),
        amt(row.quick_deduction),
        amt(row.accumulated_total_tax)
    ));
    steps.push(format!(
        "Previously withheld: {}",
        amt(row.prev_accumulated_tax)
    ));
    steps.push(format!(
        "Tax due this payment: max(0, {} - {}) = {}",
        amt(row.accumulated_total_tax),
        amt(row.prev_accumulated_tax),
        amt(row.tax)
    ));
    steps.push(format!(
        "Withheld for {}: {}",
        ym,
        amt(ctx.month_paid_tax)
    ));
    steps.push(format!(
        "Effective rate: {} / {} = {}%",
        amt(row.tax),
        amt(row.bill_amount),
        amt(row.effective_tax_rate)
    ));

    steps
}
