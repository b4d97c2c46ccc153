mod cmd;
mod core;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "iitc", version, about = "Cumulative withholding of PRC individual income tax")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Calculate withholding tax for every payment of a batch or person
    Calculate(cmd::calculate::CalculateCommand),
    /// Per-person totals of billed amount and withheld tax
    Summary(cmd::summary::SummaryCommand),
    /// Report ledger rows the calculator would skip or reject
    Validate(cmd::validate::ValidateCommand),
    /// Print the expected input format or the result format
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Calculate(calculate) => calculate.exec(),
        Command::Summary(summary) => summary.exec(),
        Command::Validate(validate) => validate.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}
