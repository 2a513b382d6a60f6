use std::{collections::BTreeMap, path::PathBuf};

use chrono::NaiveDate;
use ember::{Backend, FileBackend, RemoteDocument};

const PREVIEW_LEN: usize = 100;

fn preview(value: &str) -> String {
    if value.len() <= PREVIEW_LEN {
        return value.to_string();
    }
    // Safely truncate at a character boundary
    let mut end = PREVIEW_LEN;
    while !value.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    format!("{}...", &value[..end])
}

/// `shine-wins-2025-01-31` -> `shine-wins`
fn family(key: &str) -> &str {
    let Some(split) = key.len().checked_sub(11) else {
        return key;
    };
    match (key.get(..split), key.get(split..)) {
        (Some(head), Some(suffix))
            if suffix.strip_prefix('-').is_some_and(|date| {
                NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
            }) =>
        {
            head
        }
        _ => key,
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: {} <path-to-record-directory>", args[0]);
        eprintln!("\nExample: {} ./shine-data", args[0]);
        std::process::exit(1);
    }

    let directory = PathBuf::from(&args[1]);
    if !directory.is_dir() {
        eprintln!("Error: '{}' is not a directory", directory.display());
        std::process::exit(1);
    }

    let backend = match FileBackend::open(&directory) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("Error opening '{}': {e}", directory.display());
            std::process::exit(1);
        }
    };
    let records = match backend.entries() {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Error reading records from '{}': {e}", directory.display());
            std::process::exit(1);
        }
    };

    println!("EmberScope - Local Record Inspector");
    println!("===================================");
    println!("Directory: {}", directory.display());
    let total_bytes: usize = records.iter().map(|(k, v)| k.len() + v.len()).sum();
    println!(
        "Records: {} ({:.2} KB)",
        records.len(),
        total_bytes as f64 / 1024.0
    );
    println!();

    let mut families: BTreeMap<&str, Vec<(&String, &String)>> = BTreeMap::new();
    for (key, value) in &records {
        families.entry(family(key)).or_default().push((key, value));
    }

    let mut invalid = 0;
    for (family, entries) in &families {
        println!("{family} ({} records)", entries.len());
        for (key, value) in entries {
            let parsed = serde_json::from_str::<serde_json::Value>(value);
            if parsed.is_err() {
                invalid += 1;
                println!("  ⚠️  {key}: not valid JSON");
            } else {
                println!("  {key}");
            }
            println!("      {}", preview(value));
        }
        println!();
    }

    println!("Summary:");
    println!("--------");
    if invalid == 0 {
        println!("  ✅ All values are valid JSON");
    } else {
        println!("  ⚠️  {invalid} value(s) are not valid JSON and would be uploaded as strings");
    }

    match serde_json::to_string(&RemoteDocument::from_records("<user>", &records).data) {
        Ok(document) => println!("  Uploaded document size: {} bytes", document.len()),
        Err(e) => println!("  ❌ Could not build upload document: {e}"),
    }
}
