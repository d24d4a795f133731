//! Diff command - classify differences without starting a review.

use std::path::PathBuf;

use amrut::{classify, removed_ids, Archive, AuthoritativeLayer, CrsKind, DiffConfig};
use colored::Colorize;

pub fn run(
    archive_path: PathBuf,
    layer_name: String,
    authoritative_path: PathBuf,
    projected: bool,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let archive = Archive::open(&archive_path)?;
    if !archive.metadata().has_layer(&layer_name) {
        return Err(format!(
            "archive does not declare layer '{}' (available: {})",
            layer_name,
            archive.metadata().layers.join(", ")
        )
        .into());
    }

    let field = archive.extract_layer(&layer_name)?;
    let authoritative = AuthoritativeLayer::from_geojson_file(&layer_name, &authoritative_path)?;

    let config = DiffConfig {
        crs: if projected {
            CrsKind::Projected
        } else {
            CrsKind::Geographic
        },
        ..DiffConfig::default()
    };
    let bounds = archive.metadata().bounds();
    let diff = classify(&authoritative, &field, &bounds, &config)?;
    let removed = removed_ids(&authoritative, &field);
    let duplicated = field.duplicated_ids();

    if json_output {
        let report = serde_json::json!({
            "layer": layer_name,
            "new": &diff.new,
            "deleted_flagged": &diff.deleted_flagged,
            "geometry_changed": &diff.geometry_changed,
            "removed": &removed,
            "duplicated": &duplicated,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {} ({} field / {} authoritative features)",
        "Differences in".cyan().bold(),
        layer_name.white(),
        field.len(),
        authoritative.len()
    );
    println!();
    print_ids("New", &diff.new, "green");
    print_ids("Deleted (flagged)", &diff.deleted_flagged, "red");
    print_ids("Geometry changed", &diff.geometry_changed, "yellow");
    print_ids("Removed (no field copy)", &removed, "magenta");
    if !duplicated.is_empty() {
        print_ids("Duplicated captures", &duplicated, "red");
    }

    if diff.is_empty() && duplicated.is_empty() {
        println!("{}", "No differences to review.".green());
    }

    Ok(())
}

fn print_ids(label: &str, ids: &std::collections::BTreeSet<i64>, color: &str) {
    let count = ids.len().to_string();
    let count = match color {
        "green" => count.green(),
        "red" => count.red(),
        "yellow" => count.yellow(),
        _ => count.magenta(),
    };
    let listed: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    println!("  {:<24} {:>4}  {}", label, count, listed.join(", "));
}
