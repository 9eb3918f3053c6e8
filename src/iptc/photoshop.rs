//! Photoshop image resource block (the APP13 payload that wraps IPTC-IIM data).

use crate::error::LabelError;

pub const PHOTOSHOP_SIGNATURE: &[u8] = b"Photoshop 3.0\0";
const RESOURCE_SIGNATURE: &[u8] = b"8BIM";
const IPTC_RESOURCE_ID: u16 = 0x0404;

/// The IIM resource pulled out of a Photoshop block, plus everything else
/// in it kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceBlock {
    pub iim: Option<Vec<u8>>,
    /// Raw bytes of every other resource, in original order, followed by any
    /// tail that could not be parsed as resources.
    pub others: Vec<u8>,
}

impl ResourceBlock {
    pub fn parse(payload: &[u8]) -> Result<Self, LabelError> {
        let Some(data) = payload.strip_prefix(PHOTOSHOP_SIGNATURE) else {
            return Err(LabelError::Format("APP13 block is not a Photoshop 3.0 block".into()));
        };

        let mut block = Self::default();
        let mut pos = 0;
        while pos < data.len() {
            let Some((id, content, next)) = next_resource(data, pos) else {
                log::debug!(
                    "Keeping {} unparsed bytes at end of Photoshop block",
                    data.len() - pos
                );
                block.others.extend_from_slice(&data[pos..]);
                break;
            };

            if id == IPTC_RESOURCE_ID && block.iim.is_none() {
                block.iim = Some(content.to_vec());
            } else {
                block.others.extend_from_slice(&data[pos..next]);
            }
            pos = next;
        }

        Ok(block)
    }

    /// Encode with `iim` as the IPTC resource, ahead of the preserved ones.
    pub fn encode(&self, iim: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(PHOTOSHOP_SIGNATURE.len() + 13 + iim.len() + self.others.len());
        out.extend_from_slice(PHOTOSHOP_SIGNATURE);
        out.extend_from_slice(RESOURCE_SIGNATURE);
        out.extend_from_slice(&IPTC_RESOURCE_ID.to_be_bytes());
        out.push(0x00); // empty pascal name
        out.push(0x00); // padding to even
        out.extend_from_slice(&(iim.len() as u32).to_be_bytes());
        out.extend_from_slice(iim);
        if iim.len() % 2 != 0 {
            out.push(0x00);
        }
        out.extend_from_slice(&self.others);
        out
    }
}

/// Decode one `8BIM` resource at `pos`: `(id, data, offset of the next resource)`.
fn next_resource(data: &[u8], pos: usize) -> Option<(u16, &[u8], usize)> {
    let header = data.get(pos..pos + 7)?;
    if &header[..4] != RESOURCE_SIGNATURE {
        return None;
    }
    let id = u16::from_be_bytes([header[4], header[5]]);

    // Pascal string: length byte + name, padded to an even total
    let name_len = header[6] as usize;
    let name_total = (name_len + 1).next_multiple_of(2);

    let size_at = pos + 6 + name_total;
    let size_bytes = data.get(size_at..size_at + 4)?;
    let size = u32::from_be_bytes([size_bytes[0], size_bytes[1], size_bytes[2], size_bytes[3]]) as usize;

    let content_start = size_at + 4;
    let content_end = content_start.checked_add(size)?;
    let content = data.get(content_start..content_end)?;
    let next = (content_end + size % 2).min(data.len());
    Some((id, content, next))
}
