use super::month::{InvalidYearMonth, YearMonth};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::io::Read;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("invalid datetime: {0}")]
    InvalidDatetime(String),
    #[error(transparent)]
    InvalidYearMonth(#[from] InvalidYearMonth),
    #[error("record for {credential_num} has no payment time, creation time or year-month")]
    MissingTimestamp { credential_num: String },
}

/// One payment event fed to the calculator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingRecord {
    /// Payment-completion time, or creation time when the payment never completed
    pub payment_time: NaiveDateTime,
    pub year_month: YearMonth,
    /// Amount net of service fee. `None` when the ledger row carries no amount.
    pub bill_amount: Option<Decimal>,
    pub batch_no: String,
    pub realname: String,
    pub credential_num: String,
    pub worker_id: Option<i64>,
}

impl BillingRecord {
    /// Amount usable for accumulation, if present and not negative
    pub fn valid_amount(&self) -> Option<Decimal> {
        self.bill_amount.filter(|a| *a >= Decimal::ZERO)
    }
}

/// Root of a JSON ledger export
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecordsInput {
    pub records: Vec<RecordInput>,
}

/// A row of the worker settlement ledger as exported by the settlement system
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RecordInput {
    /// Tax ID (identity card number) of the worker
    #[serde(default)]
    pub credential_num: String,
    #[serde(default)]
    pub realname: String,
    #[serde(default)]
    pub batch_no: String,
    #[serde(default)]
    pub worker_id: Option<i64>,
    /// Billed amount after service fee
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub bill_amount: Option<Decimal>,
    /// When the payment completed (YYYY-MM-DD[THH:MM:SS])
    #[serde(default)]
    pub payment_over_time: Option<String>,
    /// When the ledger row was created; used if the payment never completed
    #[serde(default)]
    pub create_time: Option<String>,
    /// Month (YYYY-MM) used when neither timestamp is present
    #[serde(default)]
    pub year_month: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub pay_status: Option<i32>,
    #[serde(default)]
    pub confirm_pay_status: Option<i32>,
    #[serde(default)]
    pub business_type: Option<String>,
}

impl RecordInput {
    /// Settled rows: paid (2) or completed (3), or pending (0) with a confirmed payment.
    /// Rows without any status are treated as settled.
    pub fn is_settled(&self) -> bool {
        match self.pay_status {
            None => true,
            Some(2) | Some(3) => true,
            Some(0) => self.confirm_pay_status == Some(1),
            Some(_) => false,
        }
    }

    pub fn payment_time(&self) -> Result<NaiveDateTime, RecordError> {
        let timestamp = [&self.payment_over_time, &self.create_time]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty());
        if let Some(ts) = timestamp {
            return parse_datetime(ts);
        }
        match self.year_month.as_deref().map(str::trim) {
            Some(ym) if !ym.is_empty() => Ok(ym.parse::<YearMonth>()?.first_day()),
            _ => Err(RecordError::MissingTimestamp {
                credential_num: self.credential_num.clone(),
            }),
        }
    }

    pub fn to_billing_record(&self) -> Result<BillingRecord, RecordError> {
        let payment_time = self.payment_time()?;
        Ok(BillingRecord {
            payment_time,
            year_month: YearMonth::from_datetime(payment_time),
            bill_amount: self.bill_amount,
            batch_no: self.batch_no.trim().to_string(),
            realname: self.realname.trim().to_string(),
            credential_num: self.credential_num.trim().to_string(),
            worker_id: self.worker_id,
        })
    }
}

/// Parse a date string that may be date-only or datetime format
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime, RecordError> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    // Date only, defaulting to midnight
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|_| RecordError::InvalidDatetime(s.to_string()))
}

/// Read ledger rows from a JSON export
pub fn read_records_json<R: Read>(reader: R) -> anyhow::Result<Vec<RecordInput>> {
    let input: RecordsInput = serde_json::from_reader(reader)?;
    Ok(input.records)
}

/// Read ledger rows from a CSV export with a header line
pub fn read_records_csv<R: Read>(reader: R) -> anyhow::Result<Vec<RecordInput>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let records: Result<Vec<RecordInput>, _> = rdr.deserialize::<RecordInput>().collect();
    Ok(records?)
}

/// CSV header matching the fields of [`RecordInput`]
pub const CSV_COLUMNS: &[&str] = &[
    "credential_num",
    "realname",
    "batch_no",
    "worker_id",
    "bill_amount",
    "payment_over_time",
    "create_time",
    "year_month",
    "deleted",
    "pay_status",
    "confirm_pay_status",
    "business_type",
];
