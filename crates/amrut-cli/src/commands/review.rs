//! Review command - run a session over one layer and commit.

use std::fs;
use std::path::PathBuf;

use amrut::{
    AcceptAll, Archive, AuthoritativeLayer, CrsKind, DecisionSource, DiffConfig, RejectAll,
    ReviewDecision, ReviewSession, ScriptedSource, SessionContext,
};
use colored::Colorize;

#[allow(clippy::too_many_arguments)]
pub fn run(
    archive_path: PathBuf,
    layer_name: String,
    authoritative_path: PathBuf,
    script: Option<PathBuf>,
    accept_all: bool,
    reject_all: bool,
    projected: bool,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut source: Box<dyn DecisionSource> = if let Some(path) = script {
        Box::new(ScriptedSource::from_json(&fs::read_to_string(path)?)?)
    } else if accept_all {
        Box::new(AcceptAll)
    } else if reject_all {
        Box::new(RejectAll)
    } else {
        return Err("pass --script, --accept-all, or --reject-all to supply decisions".into());
    };

    let mut archive = Archive::open(&archive_path)?;
    let metadata = archive.metadata();

    // QC gating mirrors the field workflow: verified archives are
    // final, resurvey archives go back to the field first.
    if metadata.is_fully_verified() {
        return Err("archive is already fully verified; nothing to review".into());
    }
    if metadata.is_marked_for_resurvey() {
        return Err("archive is marked for resurvey; review it after the next field visit".into());
    }
    if metadata.layers_qc_completed.iter().any(|l| l == &layer_name) {
        return Err(format!("layer '{}' has already completed QC", layer_name).into());
    }
    if !metadata.has_layer(&layer_name) {
        return Err(format!(
            "archive does not declare layer '{}' (available: {})",
            layer_name,
            metadata.layers.join(", ")
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
    let context =
        SessionContext::new(&layer_name, archive.metadata().bounds()).with_diff(config);

    let mut session = ReviewSession::new(context, authoritative, field);
    session.run(source.as_mut())?;

    let accepted = count(&session, |d| matches!(d, ReviewDecision::Accept));
    let rejected = count(&session, |d| matches!(d, ReviewDecision::Reject));
    let resurvey = count(&session, |d| matches!(d, ReviewDecision::Resurvey(_)));

    println!(
        "{} {}",
        "Reviewed layer".cyan().bold(),
        layer_name.white()
    );
    println!("  Accepted: {}", accepted.to_string().green());
    println!("  Rejected: {}", rejected.to_string().red());
    if resurvey > 0 {
        println!("  Resurvey: {}", resurvey.to_string().yellow());
    }
    if !session.merge_groups().is_empty() {
        println!("  Merges:   {}", session.merge_groups().len().to_string().blue());
    }
    println!();

    if dry_run {
        println!("{}", "Dry run: archive not modified.".yellow().bold());
        return Ok(());
    }

    session.commit(&mut archive)?;

    if archive.metadata().is_fully_verified() {
        println!("{}", "Committed. Archive is now fully verified.".green().bold());
    } else if archive.metadata().is_marked_for_resurvey() {
        println!(
            "{}",
            "Committed. Archive is marked for resurvey.".yellow().bold()
        );
    } else {
        let pending = archive.metadata().qc_pending_layers().join(", ");
        println!(
            "{} Remaining layers: {}",
            "Committed.".green().bold(),
            pending.white()
        );
    }

    Ok(())
}

fn count(session: &ReviewSession, predicate: impl Fn(&ReviewDecision) -> bool) -> usize {
    session
        .decisions()
        .iter()
        .filter(|record| predicate(&record.decision))
        .count()
}
