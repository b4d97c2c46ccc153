pub mod brackets;
pub mod calculator;
pub mod money;
pub mod month;
pub mod options;
pub mod provider;
pub mod records;
pub mod trace;
pub mod warnings;

// Flat public surface for domain types and functions.
pub use brackets::IncomeType;
#[allow(unused_imports)]
pub use calculator::{calculate_rows, CalcError, Continuity, ResetReason, ResultRow, TaxCalculator};
pub use money::{display_amount, display_yuan};
#[allow(unused_imports)]
pub use month::YearMonth;
pub use options::{PersonFilter, TaxOptions};
#[allow(unused_imports)]
pub use provider::{mask_credential, InMemoryProvider, Person, ProviderError, RecordsProvider};
#[allow(unused_imports)]
pub use records::{
    read_records_csv, read_records_json, BillingRecord, RecordInput, RecordsInput, CSV_COLUMNS,
};
pub use warnings::Warning;
