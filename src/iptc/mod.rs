//! IPTC-IIM keyword storage inside JPEG files.
//!
//! - [`load_record`] — read the IIM record of a photo, if it has one
//! - [`is_already_labeled`] — check the processed marker
//! - [`save_record`] — back the photo up, then rewrite it with a new record
//!
//! The record lives in the Photoshop APP13 segment. Every other byte of the
//! file is copied through untouched, see [`ImageContainer`].

pub mod backup;
mod container;
mod photoshop;
mod record;

use std::fs::File;
use std::io::Write;
use std::path::Path;

pub use container::{ImageContainer, MAX_SEGMENT_PAYLOAD, serialize};
pub use photoshop::ResourceBlock;
pub use record::{MetadataRecord, SENTINEL_KEY, SENTINEL_VALUE};

use crate::error::LabelError;

/// Read the IPTC record stored in a JPEG.
///
/// `Ok(None)` means the file has no IPTC data at all, which is different
/// from a record with zero keywords.
pub fn load_record(path: &Path) -> Result<Option<MetadataRecord>, LabelError> {
    let bytes = std::fs::read(path).map_err(LabelError::io(path))?;
    let record = read_record(&ImageContainer::parse(&bytes)?)?;
    if record.is_none() {
        log::debug!("No IPTC data found in {}", path.display());
    }
    Ok(record)
}

/// Decode the record held by an already parsed container.
pub fn read_record(container: &ImageContainer<'_>) -> Result<Option<MetadataRecord>, LabelError> {
    let Some(block) = container.metadata_block.as_deref() else {
        return Ok(None);
    };
    match ResourceBlock::parse(block)?.iim {
        Some(iim) => MetadataRecord::decode(&iim).map(Some),
        None => Ok(None),
    }
}

/// Whether the photo carries the processed marker. Files without IPTC data
/// are not labeled.
pub fn is_already_labeled(path: &Path) -> Result<bool, LabelError> {
    Ok(load_record(path)?.is_some_and(|record| record.is_already_labeled()))
}

/// Produce the new file content for `bytes` with `record` as its IPTC data.
/// Other Photoshop resources of an existing block are kept.
pub fn render(bytes: &[u8], record: &MetadataRecord) -> Result<Vec<u8>, LabelError> {
    let container = ImageContainer::parse(bytes)?;
    let resources = match container.metadata_block.as_deref() {
        Some(block) => ResourceBlock::parse(block)?,
        None => ResourceBlock::default(),
    };
    container.with_block(&resources.encode(&record.encode()))
}

/// Write `record` into the photo at `path`.
///
/// The new content is built in memory first, then the original is copied to
/// `path~` ([`backup::protect`]), and only then is `path` overwritten in
/// place. An existing backup aborts the save before anything is written.
pub fn save_record(path: &Path, record: &MetadataRecord) -> Result<(), LabelError> {
    let original = std::fs::read(path).map_err(LabelError::io(path))?;
    let output = render(&original, record)?;

    backup::protect(path)?;

    let mut file = File::create(path).map_err(LabelError::io(path))?;
    file.write_all(&output)
        .and_then(|_| file.sync_all())
        .map_err(LabelError::io(path))?;

    log::debug!(
        "Wrote {} keyword(s) to {} ({} → {} bytes)",
        record.keywords().len(),
        path.display(),
        original.len(),
        output.len()
    );
    Ok(())
}
