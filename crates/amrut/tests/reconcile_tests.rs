//! End-to-end reconciliation tests: open an archive, review a layer,
//! commit, and check what landed on disk.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use amrut::{
    AcceptAll, AmrutError, Archive, AuthoritativeLayer, RejectAll, ReviewDecision, ReviewSession,
    ScriptedSource, SessionContext, SessionState,
};

const METADATA: &str = r#"{
    "north": 21.0, "south": 20.0, "east": 11.0, "west": 10.0,
    "grid": "G-7",
    "layers": ["roads", "buildings"]
}"#;

fn point_collection(features: &[(i64, f64, f64, &str)]) -> String {
    let body: Vec<String> = features
        .iter()
        .map(|(id, x, y, extra)| {
            let properties = if extra.is_empty() {
                format!(r#"{{"feature_id": {id}}}"#)
            } else {
                format!(r#"{{"feature_id": {id}, {extra}}}"#)
            };
            format!(
                r#"{{"type": "Feature",
                     "geometry": {{"type": "Point", "coordinates": [{x}, {y}]}},
                     "properties": {properties}}}"#
            )
        })
        .collect();
    format!(
        r#"{{"type": "FeatureCollection", "features": [{}]}}"#,
        body.join(",")
    )
}

fn write_archive(dir: &Path, layers: &[(&str, &str)]) -> PathBuf {
    let path = dir.join("cell.amrut");
    let mut writer = ZipWriter::new(File::create(&path).unwrap());
    let options = SimpleFileOptions::default();
    writer.start_file("metadata.json", options).unwrap();
    writer.write_all(METADATA.as_bytes()).unwrap();
    for (layer, content) in layers {
        writer
            .start_file(format!("{layer}.geojson"), options)
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
    path
}

fn review_and_commit(
    archive: &mut Archive,
    layer_name: &str,
    authoritative: AuthoritativeLayer,
    source: &mut dyn amrut::DecisionSource,
) -> ReviewSession {
    let field = archive.extract_layer(layer_name).unwrap();
    let context = SessionContext::new(layer_name, archive.metadata().bounds());
    let mut session = ReviewSession::new(context, authoritative, field);
    session.run(source).unwrap();
    session.commit(archive).unwrap();
    session
}

#[test]
fn test_qc_verified_only_after_every_layer() {
    let dir = TempDir::new().unwrap();
    let roads = point_collection(&[(1, 10.5, 20.5, "")]);
    let buildings = point_collection(&[(2, 10.6, 20.6, "")]);
    let path = write_archive(dir.path(), &[("roads", &roads), ("buildings", &buildings)]);

    let mut archive = Archive::open(&path).unwrap();
    let office_roads = AuthoritativeLayer::from_geojson("roads", &roads).unwrap();
    review_and_commit(&mut archive, "roads", office_roads, &mut AcceptAll);

    let reopened = Archive::open(&path).unwrap();
    assert_eq!(reopened.metadata().layers_qc_completed, vec!["roads"]);
    assert!(!reopened.metadata().is_fully_verified());

    let mut archive = Archive::open(&path).unwrap();
    let office_buildings = AuthoritativeLayer::from_geojson("buildings", &buildings).unwrap();
    review_and_commit(&mut archive, "buildings", office_buildings, &mut AcceptAll);

    let reopened = Archive::open(&path).unwrap();
    assert!(reopened.metadata().is_fully_verified());
    assert!(reopened.metadata().resurvey.is_empty());
}

#[test]
fn test_reject_restores_exact_geometry_and_attributes() {
    let dir = TempDir::new().unwrap();
    // Surveyed point drifted ~166 m north and its height was edited.
    let surveyed = point_collection(&[(1, 10.0, 20.0015, r#""height": 9"#)]);
    let office = point_collection(&[(1, 10.0, 20.0, r#""height": 3"#)]);
    let buildings = point_collection(&[(2, 10.6, 20.6, "")]);
    let path = write_archive(
        dir.path(),
        &[("roads", &surveyed), ("buildings", &buildings)],
    );

    let mut archive = Archive::open(&path).unwrap();
    let authoritative = AuthoritativeLayer::from_geojson("roads", &office).unwrap();
    review_and_commit(&mut archive, "roads", authoritative, &mut RejectAll);

    let committed = Archive::open(&path)
        .unwrap()
        .extract_layer("roads")
        .unwrap();
    let restored = committed.first_with_id(1).unwrap();
    assert_eq!(restored.centroid().unwrap(), (10.0, 20.0));
    assert_eq!(
        restored.attributes.get("height").unwrap(),
        &serde_json::json!(3)
    );
}

#[test]
fn test_resurvey_blocks_verification_and_records_reason() {
    let dir = TempDir::new().unwrap();
    let surveyed = point_collection(&[(1, 10.0, 20.0015, "")]);
    let office = point_collection(&[(1, 10.0, 20.0, "")]);
    let buildings = point_collection(&[(2, 10.6, 20.6, "")]);
    let path = write_archive(
        dir.path(),
        &[("roads", &surveyed), ("buildings", &buildings)],
    );

    let mut archive = Archive::open(&path).unwrap();
    let office_buildings = AuthoritativeLayer::from_geojson("buildings", &buildings).unwrap();
    review_and_commit(&mut archive, "buildings", office_buildings, &mut AcceptAll);

    let authoritative = AuthoritativeLayer::from_geojson("roads", &office).unwrap();
    let mut script = ScriptedSource::from_json(
        r#"{"resurvey": {"1": "culvert under construction"}}"#,
    )
    .unwrap();
    let session = review_and_commit(&mut archive, "roads", authoritative, &mut script);
    assert_eq!(session.state(), SessionState::Committed);

    // Every layer completed QC, but the resurvey entry blocks verified.
    let reopened = Archive::open(&path).unwrap();
    let metadata = reopened.metadata();
    assert_eq!(metadata.qc_pending_layers().len(), 0);
    assert!(!metadata.is_fully_verified());
    assert_eq!(metadata.resurvey.len(), 1);
    assert_eq!(metadata.resurvey[0].message, "culvert under construction");
    assert_eq!(metadata.resurvey[0].layer, "roads");
    assert_eq!(metadata.resurvey[0].coordinate, (10.0, 20.0015));
}

#[test]
fn test_abandoned_session_never_touches_the_archive() {
    let dir = TempDir::new().unwrap();
    let surveyed = point_collection(&[(1, 10.0, 20.0015, ""), (5, 10.2, 20.2, "")]);
    let office = point_collection(&[(1, 10.0, 20.0, "")]);
    let path = write_archive(dir.path(), &[("roads", &surveyed)]);
    let before = std::fs::read(&path).unwrap();

    let archive = Archive::open(&path).unwrap();
    let field = archive.extract_layer("roads").unwrap();
    let authoritative = AuthoritativeLayer::from_geojson("roads", &office).unwrap();
    let context = SessionContext::new("roads", archive.metadata().bounds());
    let mut session = ReviewSession::new(context, authoritative, field);
    session.run(&mut AcceptAll).unwrap();
    drop(session);

    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn test_commit_is_single_shot() {
    let dir = TempDir::new().unwrap();
    let roads = point_collection(&[(1, 10.5, 20.5, "")]);
    let buildings = point_collection(&[(2, 10.6, 20.6, "")]);
    let path = write_archive(dir.path(), &[("roads", &roads), ("buildings", &buildings)]);

    let mut archive = Archive::open(&path).unwrap();
    let authoritative = AuthoritativeLayer::from_geojson("roads", &roads).unwrap();
    let mut session = review_and_commit(&mut archive, "roads", authoritative, &mut AcceptAll);

    assert_eq!(session.state(), SessionState::Committed);
    let err = session.commit(&mut archive).unwrap_err();
    assert!(matches!(err, AmrutError::InvalidState(_)));
}

#[test]
fn test_scripted_decisions_apply_per_feature() {
    let dir = TempDir::new().unwrap();
    // One new capture, one soft delete, one drifted point.
    let surveyed = point_collection(&[
        (1, 10.0, 20.0015, ""),
        (2, 10.3, 20.3, r#""delete": true"#),
        (9, 10.7, 20.7, ""),
    ]);
    let office = point_collection(&[(1, 10.0, 20.0, ""), (2, 10.3, 20.3, "")]);
    let buildings = point_collection(&[(4, 10.6, 20.6, "")]);
    let path = write_archive(
        dir.path(),
        &[("roads", &surveyed), ("buildings", &buildings)],
    );

    let mut archive = Archive::open(&path).unwrap();
    let authoritative = AuthoritativeLayer::from_geojson("roads", &office).unwrap();
    // Keep the new capture, undo the deletion, undo the drift.
    let mut script =
        ScriptedSource::from_json(r#"{"accept": [9], "default": "reject"}"#).unwrap();
    let session = review_and_commit(&mut archive, "roads", authoritative, &mut script);

    let phases: Vec<_> = session.decisions().iter().map(|d| d.phase).collect();
    assert_eq!(phases.len(), 3);
    let verdicts: Vec<_> = session
        .decisions()
        .iter()
        .map(|d| d.decision.clone())
        .collect();
    assert_eq!(
        verdicts,
        vec![
            ReviewDecision::Accept,
            ReviewDecision::Reject,
            ReviewDecision::Reject
        ]
    );

    let committed = Archive::open(&path)
        .unwrap()
        .extract_layer("roads")
        .unwrap();
    assert!(committed.first_with_id(9).is_some());
    assert!(!committed.first_with_id(2).unwrap().is_delete_flagged());
    assert_eq!(
        committed.first_with_id(1).unwrap().centroid().unwrap(),
        (10.0, 20.0)
    );
}
