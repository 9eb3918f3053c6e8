use std::borrow::Cow;

use crate::error::LabelError;

use super::photoshop::PHOTOSHOP_SIGNATURE;

const MARKER_PREFIX: u8 = 0xFF;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP13: u8 = 0xED;
const TEM: u8 = 0x01;

/// Largest payload a single JPEG segment can carry (the length field counts itself).
pub const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

/// A JPEG split around its Photoshop APP13 segment.
///
/// `prefix` and `suffix` are borrowed straight from the input, so everything
/// outside the metadata block goes back out byte-for-byte. `metadata_block`
/// is the APP13 payload (starting with `Photoshop 3.0\0`), without the marker
/// and length bytes. Photoshop splits big resource blocks over consecutive
/// APP13 segments; those are joined into one owned block here and written
/// back as a single segment.
///
/// When the image has no such segment, the split point is the start-of-scan
/// marker: a new block lands after all other header segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageContainer<'a> {
    pub prefix: &'a [u8],
    pub metadata_block: Option<Cow<'a, [u8]>>,
    pub suffix: &'a [u8],
}

impl<'a> ImageContainer<'a> {
    /// Scan the JPEG header segments and locate the metadata block.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, LabelError> {
        if bytes.len() < 2 || bytes[0] != MARKER_PREFIX || bytes[1] != SOI {
            return Err(LabelError::Format("not a JPEG file".into()));
        }

        let mut pos = 2;
        loop {
            if pos >= bytes.len() {
                // Header only, no scan data.
                return Ok(Self::split_at(bytes, bytes.len()));
            }
            if bytes[pos] != MARKER_PREFIX {
                return Err(LabelError::Format(format!(
                    "expected segment marker at offset {pos}, found 0x{:02X}",
                    bytes[pos]
                )));
            }

            let marker_start = pos;
            while pos < bytes.len() && bytes[pos] == MARKER_PREFIX {
                pos += 1;
            }
            let Some(&marker) = bytes.get(pos) else {
                return Err(LabelError::Format("truncated segment marker".into()));
            };
            pos += 1;

            match marker {
                SOS | EOI => return Ok(Self::split_at(bytes, marker_start)),
                TEM | 0xD0..=0xD7 => continue,
                _ => {}
            }

            if pos + 2 > bytes.len() {
                return Err(LabelError::Format(format!(
                    "truncated length of segment 0x{marker:02X} at offset {marker_start}"
                )));
            }
            let length = u16::from_be_bytes([bytes[pos], bytes[pos + 1]]) as usize;
            if length < 2 {
                return Err(LabelError::Format(format!(
                    "invalid length {length} for segment 0x{marker:02X} at offset {marker_start}"
                )));
            }
            let payload_start = pos + 2;
            let end = pos + length;
            if end > bytes.len() {
                return Err(LabelError::Format(format!(
                    "segment 0x{marker:02X} at offset {marker_start} runs past end of file"
                )));
            }

            let payload = &bytes[payload_start..end];
            if marker == APP13 && payload.starts_with(PHOTOSHOP_SIGNATURE) {
                log::trace!("Photoshop APP13 block at offset {marker_start}, {} bytes", payload.len());
                let mut block = Cow::Borrowed(payload);
                let mut end = end;
                while let Some((more, next)) = continuation_at(bytes, end) {
                    log::debug!("Joining continued Photoshop APP13 segment at offset {end}");
                    block.to_mut().extend_from_slice(more);
                    end = next;
                }
                return Ok(Self {
                    prefix: &bytes[..marker_start],
                    metadata_block: Some(block),
                    suffix: &bytes[end..],
                });
            }

            pos = end;
        }
    }

    fn split_at(bytes: &'a [u8], offset: usize) -> Self {
        Self {
            prefix: &bytes[..offset],
            metadata_block: None,
            suffix: &bytes[offset..],
        }
    }

    /// Re-assemble this container around a replacement metadata block.
    pub fn with_block(&self, block: &[u8]) -> Result<Vec<u8>, LabelError> {
        serialize(self.prefix, block, self.suffix)
    }
}

/// A Photoshop APP13 segment directly at `pos` (after optional fill bytes):
/// its payload without the signature, and the offset past it.
fn continuation_at(bytes: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let mut start = pos;
    while bytes.get(start) == Some(&MARKER_PREFIX) && bytes.get(start + 1) == Some(&MARKER_PREFIX) {
        start += 1;
    }
    if bytes.get(start..start + 2)? != [MARKER_PREFIX, APP13] {
        return None;
    }
    let length = u16::from_be_bytes([*bytes.get(start + 2)?, *bytes.get(start + 3)?]) as usize;
    if length < 2 {
        return None;
    }
    let end = start + 2 + length;
    let payload = bytes.get(start + 4..end)?;
    Some((payload.strip_prefix(PHOTOSHOP_SIGNATURE)?, end))
}

/// Write `prefix`, `block` wrapped in an APP13 segment, then `suffix`.
pub fn serialize(prefix: &[u8], block: &[u8], suffix: &[u8]) -> Result<Vec<u8>, LabelError> {
    if block.len() > MAX_SEGMENT_PAYLOAD {
        return Err(LabelError::Format(format!(
            "metadata block of {} bytes does not fit in one APP13 segment",
            block.len()
        )));
    }

    let mut out = Vec::with_capacity(prefix.len() + block.len() + 4 + suffix.len());
    out.extend_from_slice(prefix);
    out.extend_from_slice(&[MARKER_PREFIX, APP13]);
    out.extend_from_slice(&((block.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(block);
    out.extend_from_slice(suffix);
    Ok(out)
}
