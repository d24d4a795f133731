//! Metadata finalization applied when a review session commits.

use tracing::info;

use crate::error::Result;
use crate::metadata::{ArchiveMetadata, ResurveyEntry};

/// Fold a finished layer review into the archive metadata.
///
/// The reviewed layer joins `layers_qc_completed`. Resurvey entries and
/// a verified status are mutually exclusive: any entry in the ledger
/// clears `qc_status`, otherwise the status is re-derived and becomes
/// `verified` once every declared layer has completed QC.
pub fn finalize_metadata(
    metadata: &mut ArchiveMetadata,
    layer: &str,
    resurvey: &[ResurveyEntry],
) -> Result<()> {
    metadata.mark_layer_completed(layer)?;

    if resurvey.is_empty() {
        metadata.recompute_qc_status();
    } else {
        metadata.resurvey.extend(resurvey.iter().cloned());
        metadata.qc_status = None;
    }

    info!(
        layer,
        resurvey = resurvey.len(),
        verified = metadata.is_fully_verified(),
        "finalized layer review"
    );
    Ok(())
}
