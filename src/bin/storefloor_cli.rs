use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use storefloor_api::{
    models::InventoryRecord,
    reports::{self, render_date, ImportReport},
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect(args) => handle_inspect(args, cli.json),
        Commands::Check(args) => handle_check(args, cli.json),
        Commands::Normalize(args) => handle_normalize(args),
    }
}

#[derive(Parser)]
#[command(
    name = "storefloor",
    about = "Offline tools for storefloor inventory reports",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a report and print the recovered records
    Inspect(ReportArgs),
    /// Report accepted and skipped row counts; fails when nothing is usable
    Check(ReportArgs),
    /// Re-export a report in the canonical layout
    Normalize(NormalizeArgs),
}

#[derive(Args)]
struct ReportArgs {
    #[arg(help = "Path to an inventory CSV report")]
    file: PathBuf,
}

#[derive(Args)]
struct NormalizeArgs {
    #[arg(help = "Path to an inventory CSV report")]
    file: PathBuf,
    #[arg(long, short, help = "Write here instead of stdout")]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct CheckSummary<'a> {
    file: &'a str,
    accepted: usize,
    skipped: usize,
}

fn load_report(path: &PathBuf) -> Result<ImportReport> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let report = reports::parse(&text)
        .with_context(|| format!("failed to import {}", path.display()))?;
    Ok(report)
}

fn handle_inspect(args: ReportArgs, json: bool) -> Result<()> {
    let report = load_report(&args.file)?;

    if json {
        print_json(&report)?;
    } else {
        println!(
            "{} record(s) recovered, {} row(s) skipped",
            report.records.len(),
            report.skipped
        );
        for record in &report.records {
            render_record(record);
        }
    }

    Ok(())
}

fn handle_check(args: ReportArgs, json: bool) -> Result<()> {
    let report = load_report(&args.file)?;
    let file = args.file.display().to_string();
    let summary = CheckSummary {
        file: &file,
        accepted: report.records.len(),
        skipped: report.skipped,
    };

    if json {
        print_json(&summary)?;
    } else {
        println!(
            "{}: {} accepted, {} skipped",
            summary.file, summary.accepted, summary.skipped
        );
    }

    Ok(())
}

fn handle_normalize(args: NormalizeArgs) -> Result<()> {
    let report = load_report(&args.file)?;
    let csv = reports::serialize(&report.records);

    match args.output {
        Some(path) => {
            fs::write(&path, csv).with_context(|| format!("failed to write {}", path.display()))?;
            println!("{} record(s) written to {}", report.records.len(), path.display());
        }
        None => println!("{}", csv),
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_record(record: &InventoryRecord) {
    println!(
        "- SAP {} • barcode {} • qty {} • {} • BOL {} • {}",
        record.sap_number,
        record.barcode.as_deref().unwrap_or("-"),
        record.quantity,
        record.store_location,
        if record.bol_number.is_empty() {
            "-"
        } else {
            record.bol_number.as_str()
        },
        render_date(&record.timestamp)
    );
}
