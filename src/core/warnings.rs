use super::records::{BillingRecord, RecordInput};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger issues that make the calculator skip a record or a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum Warning {
    /// Record carries no bill amount and is left out of accumulation.
    MissingAmount,
    /// Record has a negative bill amount and is left out of accumulation.
    NegativeAmount {
        #[schemars(with = "f64")]
        amount: Decimal,
    },
    /// Row has no credential number, so it cannot be attributed to a person.
    MissingCredential,
    /// Row timestamps could not be read.
    InvalidTimestamp { detail: String },
}

impl Warning {
    /// Why a billing record would be skipped, if it would be
    pub fn for_record(record: &BillingRecord) -> Option<Warning> {
        match record.bill_amount {
            None => Some(Warning::MissingAmount),
            Some(amount) if amount < Decimal::ZERO => Some(Warning::NegativeAmount { amount }),
            Some(_) => None,
        }
    }

    /// Every issue found on a raw ledger row
    pub fn for_input(input: &RecordInput) -> Vec<Warning> {
        let mut warnings = Vec::new();
        if input.credential_num.trim().is_empty() {
            warnings.push(Warning::MissingCredential);
        }
        match input.bill_amount {
            None => warnings.push(Warning::MissingAmount),
            Some(amount) if amount < Decimal::ZERO => {
                warnings.push(Warning::NegativeAmount { amount })
            }
            Some(_) => {}
        }
        if let Err(err) = input.payment_time() {
            warnings.push(Warning::InvalidTimestamp {
                detail: err.to_string(),
            });
        }
        warnings
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Warning::MissingAmount => "MissingAmount",
            Warning::NegativeAmount { .. } => "NegativeAmount",
            Warning::MissingCredential => "MissingCredential",
            Warning::InvalidTimestamp { .. } => "InvalidTimestamp",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingAmount => write!(f, "no bill amount, record skipped"),
            Warning::NegativeAmount { amount } => {
                write!(f, "negative bill amount {:.2}, record skipped", amount)
            }
            Warning::MissingCredential => write!(f, "no credential number, person skipped"),
            Warning::InvalidTimestamp { detail } => write!(f, "{}", detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(credential: &str, amount: Option<Decimal>, year_month: Option<&str>) -> RecordInput {
        RecordInput {
            credential_num: credential.to_string(),
            bill_amount: amount,
            year_month: year_month.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn clean_row_has_no_warnings() {
        assert!(Warning::for_input(&row("A1", Some(dec!(10)), Some("2025-01"))).is_empty());
    }

    #[test]
    fn collects_every_issue() {
        let warnings = Warning::for_input(&row(" ", Some(dec!(-5)), None));
        assert_eq!(warnings.len(), 3);
        assert_eq!(warnings[0], Warning::MissingCredential);
        assert_eq!(warnings[1], Warning::NegativeAmount { amount: dec!(-5) });
        assert_eq!(warnings[2].kind(), "InvalidTimestamp");
    }

    #[test]
    fn billing_record_skip_reasons() {
        let mut record = row("A1", None, Some("2025-01")).to_billing_record().unwrap();
        assert_eq!(Warning::for_record(&record), Some(Warning::MissingAmount));
        record.bill_amount = Some(dec!(-0.01));
        assert_eq!(
            Warning::for_record(&record),
            Some(Warning::NegativeAmount { amount: dec!(-0.01) })
        );
        record.bill_amount = Some(dec!(0));
        assert_eq!(Warning::for_record(&record), None);
    }
}
