//! Inspect command - show archive metadata and QC progress.

use std::path::PathBuf;

use amrut::Archive;
use colored::Colorize;

pub fn run(path: PathBuf, json_output: bool) -> Result<(), Box<dyn std::error::Error>> {
    let archive = Archive::open(&path)?;
    let layer_check = archive.validate();
    let metadata = archive.metadata();

    if json_output {
        let status = serde_json::json!({
            "path": path.display().to_string(),
            "bounds": {
                "north": metadata.north,
                "south": metadata.south,
                "east": metadata.east,
                "west": metadata.west,
            },
            "grid": &metadata.grid,
            "layers": &metadata.layers,
            "layers_qc_completed": &metadata.layers_qc_completed,
            "qc_pending": metadata.qc_pending_layers(),
            "verified": metadata.is_fully_verified(),
            "resurvey": &metadata.resurvey,
            "layers_present": layer_check.is_ok(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!(
        "{} {}",
        "Archive".cyan().bold(),
        path.display().to_string().white()
    );
    if let Some(grid) = &metadata.grid {
        println!("Grid:   {}", grid.white());
    }
    println!(
        "Extent: N {} S {} E {} W {}",
        metadata.north, metadata.south, metadata.east, metadata.west
    );
    println!();

    println!("{}", "Layers:".yellow().bold());
    for layer in &metadata.layers {
        let mark = if metadata.layers_qc_completed.contains(layer) {
            "reviewed".green()
        } else {
            "pending".yellow()
        };
        println!("  {:<20} {}", layer.white(), mark);
    }
    println!();

    if metadata.is_fully_verified() {
        println!("{}", "QC status: verified".green().bold());
    } else if metadata.is_marked_for_resurvey() {
        println!(
            "{} ({} location(s))",
            "QC status: resurvey required".red().bold(),
            metadata.resurvey.len()
        );
        for entry in &metadata.resurvey {
            println!(
                "  {} at ({:.6}, {:.6}): {}",
                entry.layer.white(),
                entry.coordinate.0,
                entry.coordinate.1,
                entry.message
            );
        }
    } else {
        println!("{}", "QC status: in progress".yellow().bold());
    }

    if let Err(e) = layer_check {
        println!();
        println!("{} {}", "Warning:".red().bold(), e);
    }

    Ok(())
}
