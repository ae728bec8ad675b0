use anyhow::{Context, Result};
use qqwry::validation::{validate_database, ValidationLevel, ValidationReport};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub fn cmd_validate(
    database: PathBuf,
    level: ValidationLevel,
    json_output: bool,
    verbose: bool,
) -> Result<()> {
    let start = Instant::now();
    let report = validate_database(&database, level)
        .with_context(|| format!("Failed to load database: {}", database.display()))?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    if json_output {
        let output = json!({
            "file": database.display().to_string(),
            "level": level.to_string(),
            "is_valid": report.is_valid(),
            "elapsed_ms": elapsed_ms,
            "errors": report.errors,
            "warnings": report.warnings,
            "info": report.info,
            "stats": report.stats,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_report(&database, level, &report, elapsed_ms, verbose);
    }

    if !report.is_valid() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(
    database: &Path,
    level: ValidationLevel,
    report: &ValidationReport,
    elapsed_ms: f64,
    verbose: bool,
) {
    let stats = &report.stats;

    println!("Database: {}", database.display());
    println!("Level:    {} ({:.2} ms)", level, elapsed_ms);
    println!(
        "Release:  {}",
        stats.version.as_deref().unwrap_or("(unreadable)")
    );
    println!();
    println!("Index:");
    println!("  Span:    {} - {}", stats.index_start, stats.index_end);
    println!("  Entries: {}", stats.entry_count);
    println!();
    println!("Records:");
    println!("  Unique:           {}", stats.unique_records);
    println!("  Inline:           {}", stats.inline_records);
    println!("  Redirect:         {}", stats.redirect_records);
    println!("  Country redirect: {}", stats.country_redirect_records);
    if level == ValidationLevel::Strict {
        println!("  Decoded:          {}", stats.decoded_records);
    }
    println!();

    for error in &report.errors {
        println!("error: {}", error);
    }
    if verbose {
        for warning in &report.warnings {
            println!("warning: {}", warning);
        }
        for info in &report.info {
            println!("note: {}", info);
        }
    } else if !report.warnings.is_empty() {
        println!("{} warning(s), rerun with --verbose", report.warnings.len());
    }

    if report.is_valid() {
        println!("Result:   valid");
    } else {
        println!("Result:   invalid, {} error(s)", report.errors.len());
    }
}
