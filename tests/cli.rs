//! E2E tests for the calculate, summary, validate and schema commands

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::io::Write;
use std::process::{Command, Output, Stdio};

fn run(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn stdout_json(output: &Output) -> Value {
    assert!(output.status.success(), "Command failed: {:?}", output);
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal serialized as string")
        .parse()
        .expect("invalid decimal")
}

/// Batch rows carry the full year's accumulation of each person
#[test]
fn calculate_batch_json() {
    let output = run(&[
        "calculate",
        "-r",
        "tests/data/records.json",
        "-y",
        "2025",
        "-b",
        "B2",
        "--json",
    ]);
    let rows = stdout_json(&output);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);

    let zhang = &rows[0];
    assert_eq!(zhang["realname"], "张三");
    assert_eq!(zhang["batch_no"], "B2");
    assert_eq!(zhang["year_month"], "2025-02");
    assert_eq!(zhang["accumulated_months"], 2);
    assert_eq!(zhang["worker_id"], 1001);
    assert_eq!(decimal(&zhang["prev_accumulated_income"]), dec!(8000));
    assert_eq!(decimal(&zhang["prev_accumulated_tax"]), dec!(90));
    assert_eq!(decimal(&zhang["tax"]), dec!(90));

    // Deleted and unpaid rows of 李四 are left out
    let li = &rows[1];
    assert_eq!(li["realname"], "李四");
    assert_eq!(decimal(&li["bill_amount"]), dec!(20000));
    assert_eq!(decimal(&li["tax"]), dec!(330));
    assert_eq!(li["income_type"], 1);
    assert_eq!(li["income_type_name"], "劳务报酬");
    assert!(li["calculation_steps"].as_array().unwrap().len() > 10);
}

/// A single person's year resets after a gap of more than one month
#[test]
fn calculate_person_with_steps() {
    let output = run(&[
        "calculate",
        "-r",
        "tests/data/records.json",
        "-y",
        "2025",
        "-c",
        "110101199001011234",
        "--steps",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "Command failed: {:?}", output);

    assert!(stdout.contains("2025-01"));
    assert!(stdout.contains("2025-05"));
    assert!(!stdout.contains("2024-12"));
    assert!(stdout.contains("Total tax: 270.00"));
    assert!(stdout.contains("Reset: income interrupted for more than one month (2025-02 -> 2025-05)"));
    assert!(stdout.contains("Tax due this payment: max(0, 180.00 - 90.00) = 90.00"));
}

#[test]
fn calculate_wages_with_deductions() {
    let output = run(&[
        "calculate",
        "-r",
        "tests/data/records.json",
        "-y",
        "2025",
        "-c",
        "220202199202022222",
        "--income-type",
        "wages",
        "--special",
        "1000",
        "--donation",
        "500",
        "--json",
    ]);
    let rows = stdout_json(&output);
    let row = &rows[0];
    assert_eq!(row["income_type"], 2);
    assert_eq!(row["income_type_name"], "工资薪金");
    // 20000 - 5000 - 1000 - 500
    assert_eq!(decimal(&row["accumulated_taxable"]), dec!(13500));
    assert_eq!(decimal(&row["tax"]), dec!(405));
}

/// CSV ledger with a business type filter and CSV output
#[test]
fn calculate_csv_in_csv_out() {
    let output = run(&[
        "calculate",
        "-r",
        "tests/data/records.csv",
        "-y",
        "2025",
        "-b",
        "B2",
        "--business-type",
        "labor",
        "--csv",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let mut lines = stdout.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("batch_no,credential_num,realname"));
    assert!(header.ends_with("calculation_steps"));

    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].contains(",10000.00,"));
    assert!(rows[0].contains(",90.00,"));
    assert!(rows[0].contains(" | "));
    // 100000 x 80% - 5000 = 75000 taxable at 10% less 2520
    assert!(rows[1].contains("李四"));
    assert!(rows[1].contains(",4980.00,"));
}

#[test]
fn calculate_reads_stdin() {
    let mut child = Command::new("cargo")
        .args(["run", "--", "calculate", "-r", "-", "-y", "2025", "-b", "B1", "--json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute command");
    let input = std::fs::read("tests/data/records.json").unwrap();
    child.stdin.take().unwrap().write_all(&input).unwrap();
    let output = child.wait_with_output().unwrap();

    let rows = stdout_json(&output);
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(decimal(&rows[0]["tax"]), dec!(90));
}

#[test]
fn calculate_requires_batch_or_credential() {
    let output = run(&["calculate", "-r", "tests/data/records.json", "-y", "2025"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("must supply batch number or credential number"));
}

#[test]
fn calculate_unknown_batch_is_empty() {
    let output = run(&[
        "calculate",
        "-r",
        "tests/data/records.json",
        "-y",
        "2025",
        "-b",
        "NOPE",
        "--json",
    ]);
    let rows = stdout_json(&output);
    assert!(rows.as_array().unwrap().is_empty());
}

#[test]
fn summary_batch_totals() {
    let output = run(&[
        "summary",
        "-r",
        "tests/data/records.json",
        "-y",
        "2025",
        "-b",
        "B2",
        "--json",
    ]);
    let summary = stdout_json(&output);
    assert_eq!(summary["year"], 2025);
    assert_eq!(summary["batch_no"], "B2");
    assert_eq!(summary["people"].as_array().unwrap().len(), 2);
    assert_eq!(summary["total_tax"], "420.00");
    assert_eq!(summary["total_bill_amount"], "30000.00");
    assert_eq!(summary["people"][0]["effective_tax_rate"], "0.90");
}

#[test]
fn summary_text() {
    let output = run(&[
        "summary",
        "-r",
        "tests/data/records.json",
        "-y",
        "2025",
        "-b",
        "B2",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout.contains("WITHHOLDING SUMMARY (2025, batch B2)"));
    assert!(stdout.contains("110101***"));
    assert!(!stdout.contains("110101199001011234"));
    assert!(stdout.contains("TOTAL TAX: ¥420.00"));
}

/// Validate exits with status 1 when a live row has no amount
#[test]
fn validate_reports_missing_amount() {
    let output = run(&["validate", "-r", "tests/data/records.json", "--json"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(1));

    let report: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["issue_count"], 1);
    assert_eq!(report["issues"][0]["type"], "MissingAmount");
    assert_eq!(report["issues"][0]["row"], 3);
}

#[test]
fn validate_clean_ledger() {
    let output = run(&["validate", "-r", "tests/data/records.csv", "-y", "2025"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout.contains("No issues found."));
}

#[test]
fn schema_outputs() {
    let output = run(&["schema", "csv-header"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout.starts_with("credential_num,realname,batch_no,worker_id,bill_amount"));

    let records = stdout_json(&run(&["schema", "records-json"]));
    assert!(records["definitions"]["RecordInput"]["properties"]["bill_amount"].is_object());

    let result = stdout_json(&run(&["schema", "result-json"]));
    assert!(result["properties"]["calculation_steps"].is_object());
    assert!(result["properties"]["effective_tax_rate"].is_object());
}
