//! Cumulative withholding (累计预扣法) of individual income tax.
//!
//! Each payment is taxed on the year-to-date income of its person: the month's billed total
//! is converted into income, accumulated across months, reduced by the accumulated
//! deductions, and run through the progressive rate table. The tax due for the payment is
//! the increase of the accumulated tax over what was already withheld.

use super::brackets::{IncomeType, TaxBracket, BASIC_DEDUCTION};
use super::money::round_money;
use super::month::YearMonth;
use super::options::{PersonFilter, TaxOptions};
use super::provider::{mask_credential, month_span, Person, ProviderError, RecordsProvider};
use super::records::BillingRecord;
use super::trace::{calculation_steps, StepContext};
use super::warnings::Warning;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum CalcError {
    #[error("must supply batch number or credential number")]
    InvalidArgument,
    #[error("records unavailable for {}: {source}", mask_credential(.credential_num))]
    DataUnavailable {
        credential_num: String,
        source: ProviderError,
    },
    #[error("could not list people in batch {batch_no}: {source}")]
    BatchLookup {
        batch_no: String,
        source: ProviderError,
    },
}

/// Why the running totals were zeroed before a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    NewYear { from: YearMonth, to: YearMonth },
    IncomeGap { from: YearMonth, to: YearMonth },
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetReason::NewYear { from, to } => write!(f, "new tax year ({} -> {})", from, to),
            ResetReason::IncomeGap { from, to } => {
                write!(f, "income interrupted for more than one month ({} -> {})", from, to)
            }
        }
    }
}

/// Whether a record continues the running totals or starts them afresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuity {
    Continue,
    Reset(ResetReason),
}

impl Continuity {
    /// Compared on calendar months only: any change of year resets, as does a gap of
    /// two or more months within a year.
    pub fn between(last: Option<YearMonth>, current: YearMonth) -> Continuity {
        let Some(last) = last else {
            return Continuity::Continue;
        };
        if last.year != current.year {
            Continuity::Reset(ResetReason::NewYear {
                from: last,
                to: current,
            })
        } else if last.months_until(current) > 1 {
            Continuity::Reset(ResetReason::IncomeGap {
                from: last,
                to: current,
            })
        } else {
            Continuity::Continue
        }
    }
}

/// Withholding result for one billing record. Money fields are rounded to 2 dp.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ResultRow {
    pub batch_no: String,
    pub credential_num: String,
    pub realname: String,
    pub worker_id: Option<i64>,
    #[schemars(with = "String")]
    pub year_month: YearMonth,
    #[schemars(with = "f64")]
    pub bill_amount: Decimal,
    /// Tax due for this payment
    #[schemars(with = "f64")]
    pub tax: Decimal,
    #[schemars(with = "u8")]
    pub income_type: IncomeType,
    pub income_type_name: String,
    #[schemars(with = "f64")]
    pub income_amount: Decimal,
    #[schemars(with = "f64")]
    pub prev_accumulated_income: Decimal,
    #[schemars(with = "f64")]
    pub accumulated_income: Decimal,
    pub accumulated_months: u32,
    /// Accumulated basic deduction (5000 per month)
    #[schemars(with = "f64")]
    pub accumulated_deduction: Decimal,
    #[schemars(with = "f64")]
    pub accumulated_taxable: Decimal,
    #[schemars(with = "f64")]
    pub accumulated_special: Decimal,
    #[schemars(with = "f64")]
    pub accumulated_additional: Decimal,
    #[schemars(with = "f64")]
    pub accumulated_other: Decimal,
    #[schemars(with = "f64")]
    pub accumulated_pension: Decimal,
    #[schemars(with = "f64")]
    pub accumulated_donation: Decimal,
    #[schemars(with = "f64")]
    pub tax_rate: Decimal,
    #[schemars(with = "f64")]
    pub quick_deduction: Decimal,
    /// Tax on the accumulated taxable income
    #[schemars(with = "f64")]
    pub accumulated_total_tax: Decimal,
    #[schemars(with = "f64")]
    pub prev_accumulated_tax: Decimal,
    /// Tax withheld so far this year, this payment included
    #[schemars(with = "f64")]
    pub accumulated_tax: Decimal,
    pub calculation_steps: Vec<String>,
    /// This payment's tax as a percentage of its billed amount
    #[schemars(with = "f64")]
    pub effective_tax_rate: Decimal,
    /// Raw billed amounts accumulated since the last reset
    #[schemars(with = "f64")]
    pub revenue_bills: Decimal,
}

#[derive(Debug, Default)]
struct MonthlyAccumulator {
    total_amount: Decimal,
    monthly_income: Decimal,
    paid_tax: Decimal,
    started: bool,
    reset_reason: Option<ResetReason>,
}

/// Running totals for one person, alive for a single calculation
#[derive(Debug, Default)]
struct AnnualRunningState {
    accumulated_income: Decimal,
    accumulated_tax: Decimal,
    accumulated_months: u32,
    revenue_bills: Decimal,
    last_income_month: Option<YearMonth>,
    months: HashMap<YearMonth, MonthlyAccumulator>,
}

impl AnnualRunningState {
    fn reset(&mut self, month: YearMonth, reason: ResetReason) {
        *self = AnnualRunningState {
            last_income_month: self.last_income_month,
            ..Default::default()
        };
        self.months.entry(month).or_default().reset_reason = Some(reason);
    }

    /// Post one valid record and produce its row
    fn post(
        &mut self,
        credential_num: &str,
        record: &BillingRecord,
        bill_amount: Decimal,
        options: &TaxOptions,
    ) -> ResultRow {
        let month = record.year_month;
        if let Continuity::Reset(reason) = Continuity::between(self.last_income_month, month) {
            log::info!(
                "{}: {}, resetting accumulated totals",
                mask_credential(credential_num),
                reason
            );
            self.reset(month, reason);
        }

        let prev_accumulated_income = self.accumulated_income;
        let accum = self.months.entry(month).or_default();
        let prev_month_total = accum.total_amount;
        accum.total_amount += bill_amount;
        let monthly_income =
            (accum.total_amount * options.income_type.income_ratio()).max(Decimal::ZERO);

        let replaced_monthly_income = if accum.started {
            self.accumulated_income =
                prev_accumulated_income - accum.monthly_income + monthly_income;
            Some(accum.monthly_income)
        } else {
            accum.started = true;
            self.accumulated_income += monthly_income;
            self.accumulated_months += 1;
            None
        };
        accum.monthly_income = monthly_income;
        let month_total = accum.total_amount;
        let reset_reason = accum.reset_reason.take();
        self.revenue_bills += bill_amount;

        self.accumulated_months = self.accumulated_months.max(1);
        let months = Decimal::from(self.accumulated_months);
        let accumulated_deduction = BASIC_DEDUCTION * months;
        let accumulated_special = options.special_deduction * months;
        let accumulated_additional = options.additional_special_deduction * months;
        let accumulated_other = options.other_deduction * months;
        let accumulated_pension = options.pension_deduction * months;
        let accumulated_donation = options.donation_deduction;

        let accumulated_taxable = (self.accumulated_income
            - accumulated_deduction
            - accumulated_special
            - accumulated_additional
            - accumulated_other
            - accumulated_pension
            - accumulated_donation)
            .max(Decimal::ZERO);

        // Bracket of the rounded figure shown on the row
        let bracket = TaxBracket::for_taxable_income(round_money(accumulated_taxable));
        let accumulated_total_tax = bracket.tax_on(accumulated_taxable);

        // Both sides rounded to fen before subtracting; see DESIGN.md on carrying the
        // unrounded total forward.
        let prev_accumulated_tax = self.accumulated_tax;
        let tax = (round_money(accumulated_total_tax) - round_money(prev_accumulated_tax))
            .max(Decimal::ZERO);
        self.accumulated_tax = prev_accumulated_tax + tax;

        let accum = self.months.entry(month).or_default();
        accum.paid_tax += tax;
        let month_paid_tax = accum.paid_tax;

        let effective_tax_rate = if bill_amount.is_zero() {
            Decimal::ZERO
        } else {
            round_money(tax / bill_amount * dec!(100))
        };

        self.last_income_month = Some(month);

        let realname = if record.realname.is_empty() {
            options.realname.clone().unwrap_or_default()
        } else {
            record.realname.clone()
        };

        let mut row = ResultRow {
            batch_no: record.batch_no.clone(),
            credential_num: credential_num.to_string(),
            realname,
            worker_id: record.worker_id.or(options.worker_id),
            year_month: month,
            bill_amount: round_money(bill_amount),
            tax: round_money(tax),
            income_type: options.income_type,
            income_type_name: options.income_type.name().to_string(),
            income_amount: round_money(bill_amount),
            prev_accumulated_income: round_money(prev_accumulated_income),
            accumulated_income: round_money(self.accumulated_income),
            accumulated_months: self.accumulated_months,
            accumulated_deduction: round_money(accumulated_deduction),
            accumulated_taxable: round_money(accumulated_taxable),
            accumulated_special: round_money(accumulated_special),
            accumulated_additional: round_money(accumulated_additional),
            accumulated_other: round_money(accumulated_other),
            accumulated_pension: round_money(accumulated_pension),
            accumulated_donation: round_money(accumulated_donation),
            tax_rate: bracket.rate,
            quick_deduction: round_money(bracket.quick_deduction),
            accumulated_total_tax: round_money(accumulated_total_tax),
            prev_accumulated_tax: round_money(prev_accumulated_tax),
            accumulated_tax: round_money(self.accumulated_tax),
            calculation_steps: Vec::new(),
            effective_tax_rate,
            revenue_bills: round_money(self.revenue_bills),
        };
        row.calculation_steps = calculation_steps(
            &row,
            &StepContext {
                reset_reason,
                prev_month_total,
                month_total,
                monthly_income,
                replaced_monthly_income,
                month_paid_tax,
                options,
            },
        );
        row
    }
}

/// Run one person's records through the withholding state machine.
///
/// Records are processed in `(year_month, payment_time)` order; records without a valid
/// amount are skipped. Returns one row per processed record.
pub fn calculate_rows(
    credential_num: &str,
    mut records: Vec<BillingRecord>,
    options: &TaxOptions,
) -> Vec<ResultRow> {
    let options = options.sanitized();
    records.sort_by_key(|r| (r.year_month, r.payment_time));

    let mut state = AnnualRunningState::default();
    let mut rows = Vec::with_capacity(records.len());
    for record in &records {
        let Some(bill_amount) = record.valid_amount() else {
            if let Some(warning) = Warning::for_record(record) {
                log::warn!(
                    "Skipping {} record of {} in batch {}: {}",
                    record.year_month,
                    mask_credential(credential_num),
                    record.batch_no,
                    warning
                );
            }
            continue;
        };
        let row = state.post(credential_num, record, bill_amount, &options);
        log::debug!(
            "{} {}: amount={} tax={}",
            mask_credential(credential_num),
            row.year_month,
            row.bill_amount,
            row.tax
        );
        rows.push(row);
    }
    rows
}

/// Withholding calculator over a [`RecordsProvider`]
pub struct TaxCalculator<P> {
    provider: P,
}

impl<P: RecordsProvider> TaxCalculator<P> {
    pub fn new(provider: P) -> Self {
        TaxCalculator { provider }
    }

    /// Calculate every person of a batch, or the single person named in `filter`.
    ///
    /// With a batch number, each person's whole year is calculated but only rows of that
    /// batch are returned. A failure for one person is logged and leaves out that
    /// person's rows only.
    pub fn calculate_for_batch(
        &self,
        year: i32,
        batch_no: Option<&str>,
        filter: &PersonFilter,
        options: &TaxOptions,
    ) -> Result<Vec<ResultRow>, CalcError> {
        let batch_no = batch_no.map(str::trim).filter(|b| !b.is_empty());
        let people = self.people_to_process(batch_no, filter)?;
        if people.is_empty() {
            log::warn!("No people found to calculate");
            return Ok(Vec::new());
        }

        let people: Vec<Person> = people
            .into_iter()
            .filter(|p| {
                let blank = p.credential_num.trim().is_empty();
                if blank {
                    log::warn!("Skipping {:?}: {}", p.realname, Warning::MissingCredential);
                }
                !blank
            })
            .collect();

        let mut prefetched = self.prefetch(&people, year);
        let mut rows = Vec::new();
        let mut failures = 0;
        for person in &people {
            let person_options = options.for_person(&person.realname, person.worker_id);
            // The batch row's name only labels the rows: the whole year of the
            // credential number counts, whichever way the records are fetched.
            let records = match prefetched.as_mut() {
                Some(by_person) => Ok(by_person.remove(&person.credential_num).unwrap_or_default()),
                None => self.fetch_records(&person.credential_num, year, None),
            };
            let result = records.and_then(|records| {
                self.calculate_for_person(&person.credential_num, year, Some(records), &person_options)
            });
            match result {
                Ok(person_rows) => rows.extend(person_rows),
                Err(err) => {
                    failures += 1;
                    log::error!("Tax calculation failed: {}", err);
                }
            }
        }

        if let Some(batch_no) = batch_no {
            log::info!("Keeping rows of batch {}", batch_no);
            rows.retain(|r| r.batch_no == batch_no);
        }

        let total_tax: Decimal = rows.iter().map(|r| r.tax).sum();
        log::info!(
            "Calculated {} people ({} failed): {} rows, total tax {}",
            people.len(),
            failures,
            rows.len(),
            total_tax
        );
        Ok(rows)
    }

    /// Calculate one person's year. Uses `records` when given, otherwise asks the provider.
    pub fn calculate_for_person(
        &self,
        credential_num: &str,
        year: i32,
        records: Option<Vec<BillingRecord>>,
        options: &TaxOptions,
    ) -> Result<Vec<ResultRow>, CalcError> {
        log::info!(
            "Calculating {} tax for {} ({})",
            year,
            mask_credential(credential_num),
            options.realname_filter().unwrap_or("N/A")
        );
        let records = match records {
            Some(records) => records,
            None => self.fetch_records(credential_num, year, options.realname_filter())?,
        };
        match month_span(&records) {
            Some((first, last)) => log::debug!(
                "{} records from {} to {}",
                records.len(),
                first,
                last
            ),
            None => {
                log::info!("No records for {}", mask_credential(credential_num));
                return Ok(Vec::new());
            }
        }
        Ok(calculate_rows(credential_num, records, options))
    }

    fn fetch_records(
        &self,
        credential_num: &str,
        year: i32,
        realname: Option<&str>,
    ) -> Result<Vec<BillingRecord>, CalcError> {
        self.provider
            .records_for_person(credential_num, year, realname)
            .map_err(|source| CalcError::DataUnavailable {
                credential_num: credential_num.to_string(),
                source,
            })
    }

    fn people_to_process(
        &self,
        batch_no: Option<&str>,
        filter: &PersonFilter,
    ) -> Result<Vec<Person>, CalcError> {
        if let Some(batch_no) = batch_no {
            return self
                .provider
                .people_in_batch(batch_no, filter.credential_num(), filter.realname())
                .map_err(|source| CalcError::BatchLookup {
                    batch_no: batch_no.to_string(),
                    source,
                });
        }
        match filter.credential_num() {
            Some(credential_num) => Ok(vec![Person {
                credential_num: credential_num.to_string(),
                realname: filter.realname().unwrap_or_default().to_string(),
                worker_id: None,
            }]),
            None => Err(CalcError::InvalidArgument),
        }
    }

    /// One bulk query for several people, partitioned by credential number.
    /// `None` means each person is queried on their own.
    fn prefetch(
        &self,
        people: &[Person],
        year: i32,
    ) -> Option<HashMap<String, Vec<BillingRecord>>> {
        if people.len() < 2 {
            return None;
        }
        let credential_nums: Vec<String> =
            people.iter().map(|p| p.credential_num.clone()).collect();
        match self.provider.records_for_people(&credential_nums, year) {
            Ok(records) => {
                let mut by_person: HashMap<String, Vec<BillingRecord>> = HashMap::new();
                for record in records {
                    by_person
                        .entry(record.credential_num.clone())
                        .or_default()
                        .push(record);
                }
                Some(by_person)
            }
            Err(err) => {
                log::warn!("Bulk record query failed, querying people one by one: {}", err);
                None
            }
        }
    }
}
