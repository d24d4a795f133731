//! AMRUT: reconciliation engine for field-survey data archives.
//!
//! Surveyors take a grid cell's data into the field as a portable
//! `.amrut` archive (a zip of per-layer GeoJSON plus `metadata.json`),
//! edit it on a mobile device, and bring it back. This crate compares
//! what came back against the authoritative office layers and walks a
//! reviewer through every difference before committing the verdicts
//! atomically into the archive.
//!
//! # Core Principles
//!
//! - **Non-destructive review**: all decisions act on an in-memory
//!   working copy; the archive is rewritten only at commit, by atomic
//!   rename, never in place
//! - **Phase-ordered diffing**: new features (and duplicate captures)
//!   are resolved before deletions and geometry changes, because merge
//!   resolution changes what the later phases should see
//! - **Injected decisions**: the session pulls verdicts through a
//!   trait, so a UI and a scripted harness drive the same state machine
//!
//! # Example
//!
//! ```no_run
//! use amrut::{Archive, AuthoritativeLayer, ReviewSession, SessionContext, AcceptAll};
//!
//! let mut archive = Archive::open("cell_42.amrut").unwrap();
//! let field = archive.extract_layer("roads").unwrap();
//! let office = AuthoritativeLayer::from_geojson_file("roads", "office/roads.geojson").unwrap();
//!
//! let context = SessionContext::new("roads", archive.metadata().bounds());
//! let mut session = ReviewSession::new(context, office, field);
//! session.run(&mut AcceptAll).unwrap();
//! session.commit(&mut archive).unwrap();
//! ```

pub mod archive;
pub mod commit;
pub mod diff;
pub mod error;
pub mod feature;
pub mod layer;
pub mod merge;
pub mod metadata;
pub mod session;
pub mod worker;

pub use archive::{Archive, RetryPolicy, ARCHIVE_EXTENSION};
pub use commit::finalize_metadata;
pub use diff::{classify, removed_ids, CrsKind, DiffConfig, DifferenceSet};
pub use error::{AmrutError, Result};
pub use feature::{Feature, FeatureId, DELETE_KEY, FEATURE_ID_KEY};
pub use layer::{AuthoritativeLayer, FieldLayer};
pub use merge::{detect_merge_group, MergeGroup};
pub use metadata::{ArchiveMetadata, Bounds, QcStatus, ResurveyEntry};
pub use session::{
    AcceptAll, DecisionRecord, DecisionSource, RejectAll, ReviewDecision, ReviewItem, ReviewPhase,
    ReviewSession, ScriptedSource, SessionContext, SessionState,
};
pub use worker::{Backdrop, BackgroundTask};
