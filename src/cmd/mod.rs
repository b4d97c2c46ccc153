pub mod calculate;
pub mod schema;
pub mod summary;
pub mod validate;

use crate::core::{
    read_records_csv, read_records_json, IncomeType, InMemoryProvider, PersonFilter, RecordInput,
    ResultRow, TaxCalculator, TaxOptions,
};
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Selection and deduction flags shared by `calculate` and `summary`
#[derive(Args, Debug)]
pub struct CalcArgs {
    /// JSON or CSV ledger export ("-" reads JSON from stdin)
    #[arg(short, long)]
    records: PathBuf,

    /// Calendar tax year
    #[arg(short, long)]
    year: i32,

    /// Settlement batch to report on
    #[arg(short, long)]
    batch: Option<String>,

    /// Credential (tax ID) number of a single person
    #[arg(short, long)]
    credential: Option<String>,

    /// Name of the person, narrows the credential or batch lookup
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Kind of income being withheld on
    #[arg(long, value_enum, default_value_t = IncomeTypeArg::Labor)]
    income_type: IncomeTypeArg,

    /// Monthly special deduction
    #[arg(long, default_value_t = Decimal::ZERO)]
    special: Decimal,

    /// Monthly additional special deduction
    #[arg(long, default_value_t = Decimal::ZERO)]
    additional: Decimal,

    /// Monthly other deduction
    #[arg(long, default_value_t = Decimal::ZERO)]
    other: Decimal,

    /// Monthly personal pension deduction
    #[arg(long, default_value_t = Decimal::ZERO)]
    pension: Decimal,

    /// Deductible donations for the year
    #[arg(long, default_value_t = Decimal::ZERO)]
    donation: Decimal,

    /// Only count records of these business types (repeatable)
    #[arg(long = "business-type")]
    business_types: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum IncomeTypeArg {
    #[default]
    Labor,
    Wages,
}

impl From<IncomeTypeArg> for IncomeType {
    fn from(arg: IncomeTypeArg) -> Self {
        match arg {
            IncomeTypeArg::Labor => IncomeType::Labor,
            IncomeTypeArg::Wages => IncomeType::Wages,
        }
    }
}

impl CalcArgs {
    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn batch(&self) -> Option<&str> {
        self.batch.as_deref()
    }

    fn options(&self) -> TaxOptions {
        TaxOptions {
            special_deduction: self.special,
            additional_special_deduction: self.additional,
            other_deduction: self.other,
            pension_deduction: self.pension,
            donation_deduction: self.donation,
            realname: self.name.clone(),
            ..TaxOptions::new(self.income_type.into())
        }
    }

    fn filter(&self) -> PersonFilter {
        PersonFilter {
            credential_num: self.credential.clone(),
            realname: self.name.clone(),
        }
    }

    /// Load the ledger and run the batch calculation
    pub fn run(&self) -> anyhow::Result<Vec<ResultRow>> {
        let inputs = read_inputs(&self.records)?;
        let provider = InMemoryProvider::from_inputs(&inputs)
            .with_business_types(self.business_types.iter().cloned());
        let calculator = TaxCalculator::new(provider);
        let rows =
            calculator.calculate_for_batch(self.year, self.batch(), &self.filter(), &self.options())?;
        Ok(rows)
    }
}

/// Read ledger rows: CSV by extension, JSON otherwise (or stdin with "-")
pub fn read_inputs(path: &Path) -> anyhow::Result<Vec<RecordInput>> {
    if path.as_os_str() == "-" {
        return read_from_stdin();
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        read_records_csv(reader)
    } else {
        read_records_json(reader)
    }
}

fn read_from_stdin() -> anyhow::Result<Vec<RecordInput>> {
    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());

    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    if buffer.is_empty() {
        anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
    }

    read_records_json(io::Cursor::new(buffer))
}
