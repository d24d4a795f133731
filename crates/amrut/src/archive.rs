//! AMRUT archive store: read, validate, and atomically rewrite the
//! `.amrut` zip container.
//!
//! An archive is only ever observed in a fully-consistent state. A
//! commit stages a complete replacement zip next to the original and
//! swaps it in with a rename; any failure before the swap leaves the
//! original byte-identical. Callers must serialize access — there is
//! one writer per archive and no internal lock.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{AmrutError, Result};
use crate::layer::FieldLayer;
use crate::metadata::ArchiveMetadata;

/// File extension of the archive container.
pub const ARCHIVE_EXTENSION: &str = "amrut";

const METADATA_ENTRY: &str = "metadata.json";

/// Retry behaviour for the final rename. Antivirus scanners and file
/// indexers briefly hold archives open on some platforms.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

/// An opened `.amrut` archive with its parsed metadata.
#[derive(Debug)]
pub struct Archive {
    path: PathBuf,
    metadata: ArchiveMetadata,
    retry: RetryPolicy,
}

impl Archive {
    /// Open and validate an archive: must be a readable zip containing
    /// a parseable `metadata.json` with a `layers` array.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = File::open(&path).map_err(|e| AmrutError::InvalidArchive {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let mut zip = ZipArchive::new(file).map_err(|e| AmrutError::InvalidArchive {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let mut content = Vec::new();
        match zip.by_name(METADATA_ENTRY) {
            Ok(mut entry) => {
                entry.read_to_end(&mut content)?;
            }
            Err(ZipError::FileNotFound) => return Err(AmrutError::MissingMetadata),
            Err(e) => return Err(e.into()),
        }
        let metadata = ArchiveMetadata::from_json(&content)?;

        debug!(path = %path.display(), layers = metadata.layers.len(), "opened archive");
        Ok(Self {
            path,
            metadata,
            retry: RetryPolicy::default(),
        })
    }

    /// Override the rename retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &ArchiveMetadata {
        &self.metadata
    }

    /// Check that every declared layer has a GeoJSON entry.
    pub fn validate(&self) -> Result<()> {
        let mut zip = self.open_zip()?;
        let missing: Vec<String> = self
            .metadata
            .layers
            .iter()
            .filter(|layer| zip.by_name(&format!("{layer}.geojson")).is_err())
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AmrutError::MissingLayer(missing.join(", ")))
        }
    }

    /// Extract a layer's GeoJSON into a working field layer.
    pub fn extract_layer(&self, layer_name: &str) -> Result<FieldLayer> {
        let mut zip = self.open_zip()?;
        let entry_name = format!("{layer_name}.geojson");

        let mut content = String::new();
        match zip.by_name(&entry_name) {
            Ok(mut entry) => {
                entry.read_to_string(&mut content)?;
            }
            Err(ZipError::FileNotFound) => {
                return Err(AmrutError::MissingLayer(layer_name.to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        FieldLayer::from_geojson(layer_name, &content)
    }

    /// Persist a reviewed layer and updated metadata.
    ///
    /// The replacement zip is staged in the archive's directory and
    /// renamed over the original only once fully written; every other
    /// entry (other layers, raster tiles) is carried over unchanged.
    pub fn commit(&mut self, layer: &FieldLayer, metadata: &ArchiveMetadata) -> Result<()> {
        let staged = self
            .build_replacement(layer, metadata)
            .map_err(|e| self.write_failure(e))?;
        self.swap_into_place(staged)?;
        self.metadata = metadata.clone();
        info!(path = %self.path.display(), layer = layer.name(), "committed archive");
        Ok(())
    }

    /// List `.amrut` files in a directory, sorted by name.
    pub fn find(directory: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let mut found: Vec<PathBuf> = std::fs::read_dir(directory.as_ref())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .is_some_and(|extension| extension == ARCHIVE_EXTENSION)
            })
            .collect();
        found.sort();
        Ok(found)
    }

    fn open_zip(&self) -> Result<ZipArchive<File>> {
        let file = File::open(&self.path)?;
        Ok(ZipArchive::new(file)?)
    }

    /// Write the full replacement zip to a temp file in the archive's
    /// directory. The original is not touched.
    fn build_replacement(
        &self,
        layer: &FieldLayer,
        metadata: &ArchiveMetadata,
    ) -> Result<NamedTempFile> {
        let layer_entry = format!("{}.geojson", layer.name());
        let geojson = layer.to_geojson()?;
        let metadata_json = metadata.to_json()?;

        let mut original = self.open_zip()?;
        let parent = self.path.parent().unwrap_or(Path::new("."));
        let staged = NamedTempFile::new_in(parent)?;

        let mut writer = ZipWriter::new(staged.as_file().try_clone()?);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for index in 0..original.len() {
            let name = original.by_index_raw(index)?.name().to_string();
            if name == METADATA_ENTRY {
                writer.start_file(&name, options)?;
                writer.write_all(metadata_json.as_bytes())?;
            } else if name == layer_entry {
                writer.start_file(&name, options)?;
                writer.write_all(geojson.as_bytes())?;
            } else {
                writer.raw_copy_file(original.by_index_raw(index)?)?;
            }
        }
        writer.finish()?;
        Ok(staged)
    }

    /// Rename the staged zip over the original, retrying per policy.
    fn swap_into_place(&self, staged: NamedTempFile) -> Result<()> {
        let mut staged = staged;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match staged.persist(&self.path) {
                Ok(_) => return Ok(()),
                Err(e) if attempt < self.retry.max_attempts => {
                    debug!(attempt, error = %e.error, "archive rename failed, retrying");
                    staged = e.file;
                    std::thread::sleep(self.retry.backoff);
                }
                Err(e) => {
                    return Err(AmrutError::WriteFailure {
                        path: self.path.clone(),
                        message: e.error.to_string(),
                    })
                }
            }
        }
    }

    fn write_failure(&self, source: AmrutError) -> AmrutError {
        match source {
            e @ AmrutError::WriteFailure { .. } => e,
            other => AmrutError::WriteFailure {
                path: self.path.clone(),
                message: other.to_string(),
            },
        }
    }
}
