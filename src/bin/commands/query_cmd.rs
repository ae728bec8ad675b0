use anyhow::{Context, Result};
use qqwry::{file_reader, Database, LocationInfo, QqwryError};
use serde_json::json;
use std::io::BufRead;
use std::path::PathBuf;

pub fn cmd_query(
    database: PathBuf,
    mut ips: Vec<String>,
    input: Option<PathBuf>,
    format: String,
    quiet: bool,
) -> Result<()> {
    let text_output = match format.to_lowercase().as_str() {
        "json" => false,
        "text" => true,
        _ => anyhow::bail!("Invalid format: '{}'. Must be: json or text", format),
    };

    if let Some(path) = &input {
        let reader = file_reader::open(path)
            .with_context(|| format!("Failed to open input: {}", path.display()))?;
        for line in reader.lines() {
            let line = line.with_context(|| format!("Failed to read input: {}", path.display()))?;
            let line = line.trim();
            if !line.is_empty() && !line.starts_with('#') {
                ips.push(line.to_string());
            }
        }
    }

    if ips.is_empty() {
        anyhow::bail!("No addresses to query (pass IPs or --input)");
    }

    let locator = Database::from(&database)
        .load()
        .with_context(|| format!("Failed to load database: {}", database.display()))?;

    let single = ips.len() == 1;
    let mut all_resolved = true;

    for ip in &ips {
        let result = locator.query(ip);
        all_resolved &= result.is_ok();

        if quiet {
            continue;
        }

        if text_output {
            println!("{}", format_text(ip, &result));
        } else {
            let value = match &result {
                Ok(info) => serde_json::to_value(info)?,
                Err(e) => json!({ "ip": ip, "error": e.to_string() }),
            };
            // One address prints readable JSON; batches print one object per line
            if single {
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}", serde_json::to_string(&value)?);
            }
        }
    }

    let stats = locator.stats();
    tracing::debug!(
        queries = stats.queries,
        local = stats.local,
        resolved = stats.resolved,
        not_found = stats.not_found,
        failures = stats.failures,
        "query finished"
    );

    std::process::exit(if all_resolved { 0 } else { 1 });
}

fn format_text(ip: &str, result: &Result<LocationInfo, QqwryError>) -> String {
    match result {
        Ok(info) => {
            let isp = if info.isp.is_empty() { "-" } else { &info.isp };
            format!("{}\t{}\t{}", info.ip, info.full(" "), isp)
        }
        Err(e) => format!("{}\terror: {}", ip.trim(), e),
    }
}
