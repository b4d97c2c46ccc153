use super::month::YearMonth;
use super::records::{BillingRecord, RecordError, RecordInput};
use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid ledger record: {0}")]
    InvalidRecord(#[from] RecordError),
}

/// A person identified within a settlement batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Person {
    pub credential_num: String,
    pub realname: String,
    pub worker_id: Option<i64>,
}

/// Source of billing records for the calculator.
///
/// Implementations only return rows that are not soft-deleted, are settled, come from a
/// qualifying business type, and whose payment time (falling back to creation time) lies
/// within the requested calendar year. Queries have no side effects.
pub trait RecordsProvider {
    /// All qualifying records of one person for a year, ordered by payment time
    fn records_for_person(
        &self,
        credential_num: &str,
        year: i32,
        realname: Option<&str>,
    ) -> Result<Vec<BillingRecord>, ProviderError>;

    /// All qualifying records of a set of people for a year, in one query
    fn records_for_people(
        &self,
        credential_nums: &[String],
        year: i32,
    ) -> Result<Vec<BillingRecord>, ProviderError>;

    /// Distinct people with records in a batch
    fn people_in_batch(
        &self,
        batch_no: &str,
        credential_num: Option<&str>,
        realname: Option<&str>,
    ) -> Result<Vec<Person>, ProviderError>;
}

impl<P: RecordsProvider + ?Sized> RecordsProvider for &P {
    fn records_for_person(
        &self,
        credential_num: &str,
        year: i32,
        realname: Option<&str>,
    ) -> Result<Vec<BillingRecord>, ProviderError> {
        (**self).records_for_person(credential_num, year, realname)
    }

    fn records_for_people(
        &self,
        credential_nums: &[String],
        year: i32,
    ) -> Result<Vec<BillingRecord>, ProviderError> {
        (**self).records_for_people(credential_nums, year)
    }

    fn people_in_batch(
        &self,
        batch_no: &str,
        credential_num: Option<&str>,
        realname: Option<&str>,
    ) -> Result<Vec<Person>, ProviderError> {
        (**self).people_in_batch(batch_no, credential_num, realname)
    }
}

#[derive(Debug, Clone)]
struct StoredRecord {
    person: Person,
    batch_no: String,
    /// `Err` when the row's timestamps cannot be read
    record: Result<BillingRecord, RecordError>,
    deleted: bool,
    settled: bool,
    business_type: Option<String>,
}

/// Provider over ledger rows held in memory (file exports, tests)
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    records: Vec<StoredRecord>,
    business_types: Option<HashSet<String>>,
}

impl InMemoryProvider {
    /// Build from raw ledger rows. A row whose timestamps cannot be read makes every
    /// record query touching its person fail, while other people stay usable.
    pub fn from_inputs(inputs: &[RecordInput]) -> Self {
        let records: Vec<StoredRecord> = inputs
            .iter()
            .map(|input| {
                let record = input.to_billing_record();
                if let Err(err) = &record {
                    log::warn!(
                        "Unreadable ledger row for {} in batch {}: {}",
                        mask_credential(&input.credential_num),
                        input.batch_no,
                        err
                    );
                }
                StoredRecord {
                    person: Person {
                        credential_num: input.credential_num.trim().to_string(),
                        realname: input.realname.trim().to_string(),
                        worker_id: input.worker_id,
                    },
                    batch_no: input.batch_no.trim().to_string(),
                    record,
                    deleted: input.deleted,
                    settled: input.is_settled(),
                    business_type: input.business_type.clone(),
                }
            })
            .collect();
        log::debug!("Loaded {} ledger records", records.len());
        InMemoryProvider {
            records,
            business_types: None,
        }
    }

    /// Build from records that are already settled and live
    #[cfg(test)]
    pub fn from_records(records: Vec<BillingRecord>) -> Self {
        InMemoryProvider {
            records: records
                .into_iter()
                .map(|record| StoredRecord {
                    person: Person {
                        credential_num: record.credential_num.clone(),
                        realname: record.realname.clone(),
                        worker_id: record.worker_id,
                    },
                    batch_no: record.batch_no.clone(),
                    record: Ok(record),
                    deleted: false,
                    settled: true,
                    business_type: None,
                })
                .collect(),
            business_types: None,
        }
    }

    /// Only count records produced by these business types
    pub fn with_business_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let types: HashSet<String> = types.into_iter().map(Into::into).collect();
        self.business_types = (!types.is_empty()).then_some(types);
        self
    }

    fn qualifies(&self, stored: &StoredRecord) -> bool {
        if stored.deleted || !stored.settled {
            return false;
        }
        match (&self.business_types, &stored.business_type) {
            (None, _) => true,
            (Some(types), Some(t)) => types.contains(t),
            (Some(_), None) => false,
        }
    }

    /// Qualifying records in `year` of the people accepted by `wanted`, sorted by
    /// payment time. An unreadable row of a wanted person fails the query, since its
    /// year cannot be told.
    fn query(
        &self,
        year: i32,
        wanted: impl Fn(&Person) -> bool,
    ) -> Result<Vec<BillingRecord>, ProviderError> {
        let mut records = Vec::new();
        for stored in &self.records {
            if !self.qualifies(stored) || !wanted(&stored.person) {
                continue;
            }
            match &stored.record {
                Ok(record) if in_year(record.payment_time, year) => records.push(record.clone()),
                Ok(_) => {}
                Err(err) => return Err(err.clone().into()),
            }
        }
        records.sort_by_key(|r| r.payment_time);
        Ok(records)
    }
}

/// `[year-01-01, year+1-01-01)`
fn in_year(payment_time: NaiveDateTime, year: i32) -> bool {
    payment_time.year() == year
}

impl RecordsProvider for InMemoryProvider {
    fn records_for_person(
        &self,
        credential_num: &str,
        year: i32,
        realname: Option<&str>,
    ) -> Result<Vec<BillingRecord>, ProviderError> {
        let records = self.query(year, |p| {
            p.credential_num == credential_num && realname.is_none_or(|name| p.realname == name)
        })?;
        log::info!(
            "Found {} records for {} in {}",
            records.len(),
            mask_credential(credential_num),
            year
        );
        Ok(records)
    }

    fn records_for_people(
        &self,
        credential_nums: &[String],
        year: i32,
    ) -> Result<Vec<BillingRecord>, ProviderError> {
        let wanted: HashSet<&str> = credential_nums.iter().map(String::as_str).collect();
        let records = self.query(year, |p| wanted.contains(p.credential_num.as_str()))?;
        log::info!(
            "Found {} records for {} people in {}",
            records.len(),
            wanted.len(),
            year
        );
        Ok(records)
    }

    fn people_in_batch(
        &self,
        batch_no: &str,
        credential_num: Option<&str>,
        realname: Option<&str>,
    ) -> Result<Vec<Person>, ProviderError> {
        let mut seen = HashSet::new();
        let people: Vec<Person> = self
            .records
            .iter()
            .filter(|s| self.qualifies(s) && s.batch_no == batch_no)
            .map(|s| &s.person)
            .filter(|p| credential_num.is_none_or(|c| p.credential_num == c))
            .filter(|p| realname.is_none_or(|n| p.realname == n))
            .filter(|p| seen.insert(p.credential_num.clone()))
            .cloned()
            .collect();
        log::info!("Batch {} has {} people to calculate", batch_no, people.len());
        Ok(people)
    }
}

/// First six characters of a credential number followed by `***`
pub fn mask_credential(credential_num: &str) -> String {
    let prefix: String = credential_num.chars().take(6).collect();
    format!("{}***", prefix)
}

/// Month range covered by a set of records, for log lines
pub fn month_span(records: &[BillingRecord]) -> Option<(YearMonth, YearMonth)> {
    let first = records.iter().map(|r| r.year_month).min()?;
    let last = records.iter().map(|r| r.year_month).max()?;
    Some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(credential: &str, batch: &str, when: &str) -> RecordInput {
        RecordInput {
            credential_num: credential.to_string(),
            realname: format!("name-{credential}"),
            batch_no: batch.to_string(),
            worker_id: Some(1),
            bill_amount: Some(dec!(100)),
            payment_over_time: Some(when.to_string()),
            pay_status: Some(3),
            ..Default::default()
        }
    }

    fn provider(rows: Vec<RecordInput>) -> InMemoryProvider {
        InMemoryProvider::from_inputs(&rows)
    }

    #[test]
    fn filters_deleted_unsettled_and_other_years() {
        let p = provider(vec![
            row("A", "B1", "2025-01-10"),
            RecordInput {
                deleted: true,
                ..row("A", "B1", "2025-02-10")
            },
            RecordInput {
                pay_status: Some(1),
                ..row("A", "B1", "2025-03-10")
            },
            row("A", "B1", "2024-12-31 23:59:59"),
            row("A", "B1", "2026-01-01"),
            row("B", "B1", "2025-01-10"),
        ]);
        let records = p.records_for_person("A", 2025, None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].year_month.to_string(), "2025-01");
    }

    #[test]
    fn records_sorted_by_payment_time() {
        let p = provider(vec![
            row("A", "B1", "2025-03-01"),
            row("A", "B1", "2025-01-01"),
            row("A", "B1", "2025-02-01"),
        ]);
        let months: Vec<String> = p
            .records_for_person("A", 2025, None)
            .unwrap()
            .iter()
            .map(|r| r.year_month.to_string())
            .collect();
        assert_eq!(months, vec!["2025-01", "2025-02", "2025-03"]);
    }

    #[test]
    fn realname_filter_applies() {
        let p = provider(vec![row("A", "B1", "2025-01-01")]);
        assert_eq!(p.records_for_person("A", 2025, Some("name-A")).unwrap().len(), 1);
        assert!(p.records_for_person("A", 2025, Some("other")).unwrap().is_empty());
    }

    #[test]
    fn business_type_filter() {
        let typed = |t: &str| RecordInput {
            business_type: Some(t.to_string()),
            ..row("A", "B1", "2025-01-01")
        };
        let p = provider(vec![typed("labor"), typed("refund"), row("A", "B1", "2025-01-02")])
            .with_business_types(["labor"]);
        assert_eq!(p.records_for_person("A", 2025, None).unwrap().len(), 1);
    }

    #[test]
    fn bulk_query_returns_all_requested_people() {
        let p = provider(vec![
            row("A", "B1", "2025-01-01"),
            row("B", "B2", "2025-01-02"),
            row("C", "B1", "2025-01-03"),
        ]);
        let records = p
            .records_for_people(&["A".to_string(), "B".to_string()], 2025)
            .unwrap();
        let people: HashSet<&str> = records.iter().map(|r| r.credential_num.as_str()).collect();
        assert_eq!(people, HashSet::from(["A", "B"]));
    }

    #[test]
    fn people_in_batch_are_distinct() {
        let p = provider(vec![
            row("A", "B1", "2025-01-01"),
            row("A", "B1", "2025-02-01"),
            row("B", "B1", "2025-01-01"),
            row("C", "B2", "2025-01-01"),
        ]);
        let people = p.people_in_batch("B1", None, None).unwrap();
        assert_eq!(people.len(), 2);
        assert_eq!(people[0].credential_num, "A");
        assert_eq!(people[1].credential_num, "B");

        let only_b = p.people_in_batch("B1", Some("B"), None).unwrap();
        assert_eq!(only_b.len(), 1);
        assert!(p.people_in_batch("B1", None, Some("nobody")).unwrap().is_empty());
    }

    #[test]
    fn unreadable_row_fails_queries_of_its_person_only() {
        let p = provider(vec![
            row("A", "B1", "2025-01-01"),
            row("B", "B1", "2025-13-45"),
        ]);
        assert_eq!(p.records_for_person("A", 2025, None).unwrap().len(), 1);
        assert!(matches!(
            p.records_for_person("B", 2025, None),
            Err(ProviderError::InvalidRecord(RecordError::InvalidDatetime(_)))
        ));
        assert!(p
            .records_for_people(&["A".to_string(), "B".to_string()], 2025)
            .is_err());
        assert_eq!(p.people_in_batch("B1", None, None).unwrap().len(), 2);
    }

    #[test]
    fn masks_credentials() {
        assert_eq!(mask_credential("110101199001011234"), "110101***");
        assert_eq!(mask_credential("AB"), "AB***");
    }
}
