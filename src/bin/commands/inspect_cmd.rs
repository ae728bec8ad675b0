use anyhow::{Context, Result};
use qqwry::{Database, Lookup};
use serde_json::json;
use std::path::PathBuf;

pub fn cmd_inspect(database: PathBuf, json_output: bool) -> Result<()> {
    let db = Database::from(&database)
        .open()
        .with_context(|| format!("Failed to load database: {}", database.display()))?;

    let header = db.header();
    let entries = db.entry_count();
    let first = db.range(0).context("Failed to decode first range")?;
    let last = db
        .range(entries - 1)
        .context("Failed to decode last range")?;
    let version = db.version().context("Failed to decode release label")?;

    if json_output {
        let output = json!({
            "file": database.display().to_string(),
            "size": db.size(),
            "index_start": header.index_start,
            "index_end": header.index_end,
            "entries": entries,
            "version": version,
            "first_range": first,
            "last_range": last,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Database: {}", database.display());
        println!("Size:     {} bytes ({} KB)", db.size(), db.size() / 1024);
        println!("Version:  {}", version);
        println!();
        println!("Index:");
        println!("  Start:   {}", header.index_start);
        println!("  End:     {}", header.index_end);
        println!("  Entries: {}", entries);
        println!();
        println!("Ranges:");
        println!("  First:   {}", describe(&first));
        println!("  Last:    {}", describe(&last));
    }

    Ok(())
}

fn describe(range: &Lookup) -> String {
    format!(
        "{} - {}  {} {}",
        range.start, range.end, range.country, range.area
    )
    .trim_end()
    .to_string()
}
