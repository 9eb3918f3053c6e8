//! Fixtures shared by the unit tests.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LabelError;
use crate::vision::{LabelCandidate, LabelService};

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP0_JFIF: [u8; 18] = [
    0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00,
    0x01, 0x00, 0x00,
];
const SCAN: [u8; 15] = [
    0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00, 0x12, 0x34, 0xFF, 0x00, 0x56,
];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// A structurally valid JPEG with no IPTC data.
pub fn tiny_jpeg() -> Vec<u8> {
    jpeg_with_segments(&[])
}

/// SOI, JFIF APP0, the given header segments, then scan data and EOI.
pub fn jpeg_with_segments(segments: &[Vec<u8>]) -> Vec<u8> {
    let mut out = SOI.to_vec();
    out.extend_from_slice(&APP0_JFIF);
    for segment in segments {
        out.extend_from_slice(segment);
    }
    out.extend_from_slice(&SCAN);
    out.extend_from_slice(&EOI);
    out
}

/// Wrap `payload` in an APP13 segment.
pub fn app13(payload: &[u8]) -> Vec<u8> {
    let mut seg = vec![0xFF, 0xED];
    seg.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    seg.extend_from_slice(payload);
    seg
}

/// A JPEG padded with a comment segment so it is noticeably bigger.
pub fn large_jpeg() -> Vec<u8> {
    let mut comment = vec![0xFF, 0xFE, 0x10, 0x02];
    comment.resize(4 + 0x1000, b'x');
    jpeg_with_segments(&[comment])
}

/// Write [`tiny_jpeg`] to `dir/relative`, creating parent directories.
pub fn write_tiny_jpeg(dir: &Path, relative: &str) -> PathBuf {
    write_jpeg(dir, relative, &tiny_jpeg())
}

pub fn write_jpeg(dir: &Path, relative: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, bytes).unwrap();
    path
}

/// The canned answer of a label service looking at a cat.
pub fn cat_candidates() -> Vec<LabelCandidate> {
    vec![
        LabelCandidate::new("cat", 0.96),
        LabelCandidate::new("mammal", 0.95),
        LabelCandidate::new("vertebrate", 0.94),
        LabelCandidate::new("whiskers", 0.93),
        LabelCandidate::new("animal", 0.3),
    ]
}

/// Label service backed by a closure over the image bytes.
pub struct FnLabelService<F> {
    respond: F,
}

impl<F> FnLabelService<F>
where
    F: Fn(&[u8]) -> Result<Vec<LabelCandidate>, LabelError> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self { respond }
    }
}

/// Always answers with [`cat_candidates`].
pub fn cat_service() -> FnLabelService<impl Fn(&[u8]) -> Result<Vec<LabelCandidate>, LabelError> + Send + Sync> {
    FnLabelService::new(|_: &[u8]| Ok(cat_candidates()))
}

#[async_trait::async_trait]
impl<F> LabelService for FnLabelService<F>
where
    F: Fn(&[u8]) -> Result<Vec<LabelCandidate>, LabelError> + Send + Sync,
{
    fn name(&self) -> &str {
        "test double"
    }

    async fn fetch_labels(&self, image: &[u8]) -> Result<Vec<LabelCandidate>, LabelError> {
        (self.respond)(image)
    }
}
