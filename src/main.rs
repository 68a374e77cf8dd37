use anyhow::{Context, Result};
use std::env;

use trasparenza_comuni::logging::init_tracing;
use trasparenza_comuni::{
    load, sample_budgets, CollectionReport, CollectorConfig, Municipality, MunicipalitySource, Pipeline, WriteOutcome,
};

const USAGE: &str = "\
Usage: trasparenza-comuni [COMMAND]

Commands:
  demo                    ISTAT Lazio (5) + sample budgets (default)
  check                   Probe the BDAP API
  bdap <REGION> [LIMIT]   Municipalities of a region from BDAP (default limit 5)
  istat <REGION> [LIMIT]  Municipalities of a region from ISTAT (default limit 10)
  budget <CODE> [YEAR]    One municipality budget from BDAP (default year 2022)
  sample                  Write the sample budgets";

fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let config = CollectorConfig::from_env();

    match args.get(1).map(String::as_str) {
        None | Some("demo") => run_demo(&config),
        Some("check") => run_check(&config),
        Some("bdap") => {
            let region = required(&args, 2, "REGION")?;
            let limit = optional_number(&args, 3, 5)?;
            run_municipalities(&config, MunicipalitySource::Bdap, region, limit)
        }
        Some("istat") => {
            let region = required(&args, 2, "REGION")?;
            let limit = optional_number(&args, 3, 10)?;
            run_municipalities(&config, MunicipalitySource::Istat, region, limit)
        }
        Some("budget") => {
            let code = required(&args, 2, "CODE")?;
            let year = optional_number(&args, 3, 2022)?;
            run_budget(&config, code, year)
        }
        Some("sample") => run_sample(&config),
        Some("-h") | Some("--help") | Some("help") => {
            println!("{}", USAGE);
            Ok(())
        }
        Some(other) => {
            eprintln!("❌ Unknown command: {}\n", other);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

fn required<'a>(args: &'a [String], idx: usize, name: &str) -> Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .with_context(|| format!("missing argument <{}>\n\n{}", name, USAGE))
}

fn optional_number<T>(args: &[String], idx: usize, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match args.get(idx) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid number: {}", raw)),
        None => Ok(default),
    }
}

fn print_report(report: &CollectionReport) {
    match &report.outcome {
        WriteOutcome::Written { path, .. } => println!("💾 {} record(s) saved → {}", report.records, path.display()),
        WriteOutcome::Unchanged { path, .. } => println!("💾 {} record(s) unchanged → {}", report.records, path.display()),
        WriteOutcome::Skipped { path, previous: Some(_) } => {
            println!("⏭️  Nothing new collected, keeping {}", path.display())
        }
        WriteOutcome::Skipped { previous: None, .. } => println!("⏭️  Nothing collected, no file written"),
    }
    if let trasparenza_comuni::Origin::Backup { reason } = &report.origin {
        println!("⚠️  Degraded source: {}", reason);
    }
}

fn run_check(config: &CollectorConfig) -> Result<()> {
    println!("🧪 Checking BDAP connection...");
    let pipeline = Pipeline::new(config)?;

    if pipeline.bdap().test_connection() {
        println!("✅ Connection OK!");
        Ok(())
    } else {
        println!("❌ Connection failed");
        std::process::exit(1);
    }
}

fn run_municipalities(
    config: &CollectorConfig,
    source: MunicipalitySource,
    region: &str,
    limit: usize,
) -> Result<()> {
    println!("📍 Collecting municipalities of {} from {} (limit {})...", region, source, limit);
    let mut pipeline = Pipeline::new(config)?;

    let report = pipeline.collect_municipalities(source, region, limit)?;
    print_report(&report);
    Ok(())
}

fn run_budget(config: &CollectorConfig, code: &str, year: i32) -> Result<()> {
    println!("💰 Collecting budget of {} for {}...", code, year);
    let pipeline = Pipeline::new(config)?;

    let report = pipeline.collect_budget(code, year)?;
    if report.records == 0 {
        println!("⚠️  No data for {} year {}", code, year);
    }
    print_report(&report);
    Ok(())
}

fn run_sample(config: &CollectorConfig) -> Result<()> {
    let pipeline = Pipeline::new(config)?;
    let report = pipeline.collect_sample_budgets()?;
    print_report(&report);
    Ok(())
}

fn run_demo(config: &CollectorConfig) -> Result<()> {
    println!("🧪 Trasparenza Comuni - data collection");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut pipeline = Pipeline::new(config)?;

    // 1. ISTAT municipalities
    println!("\n📊 ISTAT municipalities of Lazio...");
    let report = pipeline.collect_municipalities(MunicipalitySource::Istat, "Lazio", 5)?;
    if report.path().exists() {
        let comuni: Vec<Municipality> = load(report.path())?;
        for comune in &comuni {
            println!("  • {} ({})", comune.name, comune.province);
        }
    }
    print_report(&report);

    // 2. Sample budgets
    println!("\n💶 Sample municipal budgets:");
    for (name, budget) in sample_budgets() {
        println!("\n  {}:", name);
        println!("    • Population: {}", budget.population);
        println!("    • Total revenues: €{:.0}", budget.revenues.total());
        println!("    • Total expenditures: €{:.0}", budget.expenditures.total());
        println!("    • Per-capita expenditure: €{:.0}", budget.per_capita_expenditure);
    }
    let report = pipeline.collect_sample_budgets()?;
    println!();
    print_report(&report);

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Done");
    Ok(())
}
