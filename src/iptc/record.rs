use std::collections::BTreeMap;

use crate::error::LabelError;

/// Field that marks a photo as processed.
pub const SENTINEL_KEY: &str = "custom1";
/// Value stored in [`SENTINEL_KEY`] once a photo has been tagged.
pub const SENTINEL_VALUE: &str = "already_tagged_PhotoLabel_v1.0";

const TAG_MARKER: u8 = 0x1C;
const ENVELOPE_RECORD: u8 = 1;
const APPLICATION_RECORD: u8 = 2;
const RECORD_VERSION: u8 = 0;
const KEYWORDS: u8 = 25;
const CODED_CHARSET: u8 = 90;
const UTF8_ESCAPE: &[u8] = b"\x1b%G";

/// Named datasets of the application record (2:x).
const DATASET_NAMES: &[(u8, &str)] = &[
    (5, "object name"),
    (7, "edit status"),
    (10, "urgency"),
    (15, "category"),
    (22, "fixture identifier"),
    (40, "special instructions"),
    (55, "date created"),
    (60, "time created"),
    (80, "by-line"),
    (85, "by-line title"),
    (90, "city"),
    (92, "sub-location"),
    (95, "province/state"),
    (100, "country/primary location code"),
    (101, "country/primary location name"),
    (103, "original transmission reference"),
    (105, "headline"),
    (110, "credit"),
    (115, "source"),
    (116, "copyright notice"),
    (120, "caption/abstract"),
    (122, "writer/editor"),
];

/// `custom1`..`custom20` live at datasets 200..219.
const CUSTOM_FIRST: u8 = 200;
const CUSTOM_COUNT: u8 = 20;

fn dataset_name(number: u8) -> Option<String> {
    if (CUSTOM_FIRST..CUSTOM_FIRST + CUSTOM_COUNT).contains(&number) {
        return Some(format!("custom{}", number - CUSTOM_FIRST + 1));
    }
    DATASET_NAMES
        .iter()
        .find(|(n, _)| *n == number)
        .map(|(_, name)| (*name).to_string())
}

fn dataset_number(name: &str) -> Option<u8> {
    if let Some(index) = name.strip_prefix("custom").and_then(|n| n.parse::<u8>().ok()) {
        return (1..=CUSTOM_COUNT)
            .contains(&index)
            .then(|| CUSTOM_FIRST + index - 1);
    }
    DATASET_NAMES
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(number, _)| *number)
}

/// One raw IIM dataset kept as-is because it has no typed home in the record.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Dataset {
    record: u8,
    number: u8,
    data: Vec<u8>,
}

/// Keywords and named fields of an IPTC-IIM record.
///
/// Keywords are unique and keep insertion order. Datasets that are unknown,
/// repeated, or not valid UTF-8 are carried along untouched so a rewrite
/// never drops them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    keywords: Vec<String>,
    fields: BTreeMap<String, String>,
    passthrough: Vec<Dataset>,
}

impl MetadataRecord {
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Set a named field (`"caption/abstract"`, `"custom3"`, ...).
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) -> Result<(), LabelError> {
        if dataset_number(name).is_none() {
            return Err(LabelError::UnknownField(name.to_string()));
        }
        self.fields.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Append a keyword unless it is already present. Returns whether it was added.
    pub fn add_keyword(&mut self, keyword: impl Into<String>) -> bool {
        let keyword = keyword.into();
        if self.keywords.contains(&keyword) {
            return false;
        }
        self.keywords.push(keyword);
        true
    }

    /// Existing keywords followed by the new ones not yet present, with the
    /// processed marker set. Merging the same tags again changes nothing.
    pub fn merge<S: AsRef<str>>(&self, tags: &[S]) -> MetadataRecord {
        let mut merged = self.clone();
        let added: Vec<&str> = tags
            .iter()
            .map(|tag| tag.as_ref())
            .filter(|tag| merged.add_keyword(*tag))
            .collect();
        if added.is_empty() {
            log::debug!("All tags already present: {:?}", self.keywords);
        } else {
            log::debug!("Appending tags {added:?} to {:?}", self.keywords);
        }
        merged
            .fields
            .insert(SENTINEL_KEY.to_string(), SENTINEL_VALUE.to_string());
        merged
    }

    pub fn is_already_labeled(&self) -> bool {
        self.field(SENTINEL_KEY) == Some(SENTINEL_VALUE)
    }

    /// Decode the datasets of an IIM stream.
    pub fn decode(data: &[u8]) -> Result<Self, LabelError> {
        let mut record = Self::default();
        let mut pos = 0;

        while pos < data.len() {
            if data[pos] != TAG_MARKER {
                // Photoshop pads the resource; anything after the datasets is filler.
                log::trace!("Stopping IIM scan at offset {pos}");
                break;
            }
            let (dataset, next) = read_dataset(data, pos)?;
            record.absorb(dataset);
            pos = next;
        }

        Ok(record)
    }

    fn absorb(&mut self, dataset: Dataset) {
        if dataset.record == APPLICATION_RECORD {
            if dataset.number == RECORD_VERSION {
                return;
            }
            if let Ok(text) = std::str::from_utf8(&dataset.data) {
                if dataset.number == KEYWORDS {
                    if !self.add_keyword(text) {
                        log::debug!("Dropping duplicate keyword {text:?}");
                    }
                    return;
                }
                match dataset_name(dataset.number) {
                    Some(name) if !self.fields.contains_key(&name) => {
                        self.fields.insert(name, text.to_string());
                        return;
                    }
                    _ => {}
                }
            }
        }
        self.passthrough.push(dataset);
    }

    /// Encode as an IIM stream: envelope datasets, record version, then the
    /// application datasets in dataset order.
    pub fn encode(&self) -> Vec<u8> {
        let mut datasets: Vec<(u8, u8, &[u8])> = Vec::new();

        datasets.push((APPLICATION_RECORD, RECORD_VERSION, &[0x00, 0x02][..]));
        for keyword in &self.keywords {
            datasets.push((APPLICATION_RECORD, KEYWORDS, keyword.as_bytes()));
        }
        for (name, value) in &self.fields {
            if let Some(number) = dataset_number(name) {
                datasets.push((APPLICATION_RECORD, number, value.as_bytes()));
            }
        }
        for dataset in &self.passthrough {
            datasets.push((dataset.record, dataset.number, dataset.data.as_slice()));
        }

        let declares_charset = self
            .passthrough
            .iter()
            .any(|d| d.record == ENVELOPE_RECORD && d.number == CODED_CHARSET);
        let has_non_ascii = self.keywords.iter().chain(self.fields.values()).any(|s| !s.is_ascii());
        if has_non_ascii && !declares_charset {
            datasets.push((ENVELOPE_RECORD, CODED_CHARSET, UTF8_ESCAPE));
        }

        // Stable: keywords and repeated datasets keep their relative order.
        datasets.sort_by_key(|(record, number, _)| (*record, *number));

        let mut out = Vec::new();
        for (record, number, data) in datasets {
            write_dataset(&mut out, record, number, data);
        }
        out
    }
}

fn read_dataset(data: &[u8], pos: usize) -> Result<(Dataset, usize), LabelError> {
    let truncated = || LabelError::Format(format!("truncated IIM dataset at offset {pos}"));

    let header = data.get(pos..pos + 5).ok_or_else(truncated)?;
    let (record, number) = (header[1], header[2]);
    let length = u16::from_be_bytes([header[3], header[4]]);

    let mut start = pos + 5;
    let size = if length & 0x8000 != 0 {
        // Extended dataset: the low bits give the width of the real length field.
        let width = (length & 0x7FFF) as usize;
        if width == 0 || width > 4 {
            return Err(LabelError::Format(format!(
                "unsupported IIM extended length width {width} at offset {pos}"
            )));
        }
        let field = data.get(start..start + width).ok_or_else(truncated)?;
        start += width;
        field.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize)
    } else {
        length as usize
    };

    let end = start.checked_add(size).ok_or_else(truncated)?;
    let content = data.get(start..end).ok_or_else(truncated)?;
    Ok((
        Dataset {
            record,
            number,
            data: content.to_vec(),
        },
        end,
    ))
}

fn write_dataset(out: &mut Vec<u8>, record: u8, number: u8, data: &[u8]) {
    out.extend_from_slice(&[TAG_MARKER, record, number]);
    if data.len() <= 0x7FFF {
        out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    } else {
        out.extend_from_slice(&0x8004u16.to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    }
    out.extend_from_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_keywords(keywords: &[&str]) -> MetadataRecord {
        let mut record = MetadataRecord::default();
        for k in keywords {
            record.add_keyword(*k);
        }
        record
    }

    #[test]
    fn empty_record_encodes_version_only() {
        assert_eq!(
            MetadataRecord::default().encode(),
            vec![0x1C, 0x02, 0x00, 0x00, 0x02, 0x00, 0x02]
        );
    }

    #[test]
    fn merge_appends_only_new_tags_in_order() {
        let record = record_with_keywords(&["cat", "mammal"]);
        let merged = record.merge(&["dog", "mammal"]);
        assert_eq!(merged.keywords(), ["cat", "mammal", "dog"]);
    }

    #[test]
    fn merge_sets_sentinel() {
        let merged = MetadataRecord::default().merge(&["dog"]);
        assert!(merged.is_already_labeled());
        assert_eq!(merged.field(SENTINEL_KEY), Some(SENTINEL_VALUE));
    }

    #[test]
    fn merge_is_idempotent() {
        let once = record_with_keywords(&["cat"]).merge(&["dog", "cat"]);
        let twice = once.merge(&["dog", "cat"]);
        assert_eq!(once, twice);
    }

    #[test]
    fn other_custom_value_is_not_labeled() {
        let mut record = MetadataRecord::default();
        assert!(!record.is_already_labeled());
        record.set_field(SENTINEL_KEY, "something else").unwrap();
        assert!(!record.is_already_labeled());
    }

    #[test]
    fn unknown_field_name_is_rejected() {
        let mut record = MetadataRecord::default();
        assert!(matches!(
            record.set_field("custom21", "x"),
            Err(LabelError::UnknownField(_))
        ));
        assert!(record.set_field("custom20", "x").is_ok());
        assert!(record.set_field("headline", "x").is_ok());
    }

    #[test]
    fn decode_reads_keywords_and_fields() {
        let mut data = Vec::new();
        write_dataset(&mut data, 2, 0, &[0, 2]);
        write_dataset(&mut data, 2, 25, b"already");
        write_dataset(&mut data, 2, 25, b"tagged");
        write_dataset(&mut data, 2, 120, b"A cat on a mat");
        write_dataset(&mut data, 2, 200, SENTINEL_VALUE.as_bytes());

        let record = MetadataRecord::decode(&data).unwrap();
        assert_eq!(record.keywords(), ["already", "tagged"]);
        assert_eq!(record.field("caption/abstract"), Some("A cat on a mat"));
        assert!(record.is_already_labeled());
    }

    #[test]
    fn decode_drops_duplicate_keywords() {
        let mut data = Vec::new();
        write_dataset(&mut data, 2, 25, b"cat");
        write_dataset(&mut data, 2, 25, b"cat");
        let record = MetadataRecord::decode(&data).unwrap();
        assert_eq!(record.keywords(), ["cat"]);
    }

    #[test]
    fn unknown_and_binary_datasets_survive_reencoding() {
        let mut data = Vec::new();
        write_dataset(&mut data, 1, 90, UTF8_ESCAPE);
        write_dataset(&mut data, 2, 0, &[0, 2]);
        write_dataset(&mut data, 2, 20, b"Nature");
        write_dataset(&mut data, 2, 20, b"Pets");
        write_dataset(&mut data, 2, 25, &[0xE9, 0x74, 0xE9]); // latin-1 "été"
        write_dataset(&mut data, 2, 80, b"First");
        write_dataset(&mut data, 2, 80, b"Second");

        let record = MetadataRecord::decode(&data).unwrap();
        assert!(record.keywords().is_empty());
        assert_eq!(record.field("by-line"), Some("First"));
        assert_eq!(MetadataRecord::decode(&record.encode()).unwrap(), record);
        assert_eq!(record.encode(), data);
    }

    #[test]
    fn extended_length_round_trip() {
        let long = "x".repeat(40_000);
        let mut record = MetadataRecord::default();
        record.set_field("caption/abstract", long.clone()).unwrap();

        let encoded = record.encode();
        let decoded = MetadataRecord::decode(&encoded).unwrap();
        assert_eq!(decoded.field("caption/abstract"), Some(long.as_str()));
    }

    #[test]
    fn non_ascii_text_declares_utf8() {
        let record = record_with_keywords(&["Eichhörnchen"]);
        let encoded = record.encode();
        assert!(encoded.starts_with(&[0x1C, 0x01, 0x5A, 0x00, 0x03, 0x1B, b'%', b'G']));
    }

    #[test]
    fn decode_rejects_truncated_dataset() {
        assert!(matches!(
            MetadataRecord::decode(&[0x1C, 0x02, 0x19, 0x00, 0x09, b'c']),
            Err(LabelError::Format(_))
        ));
    }

    #[test]
    fn decode_stops_at_padding() {
        let mut data = Vec::new();
        write_dataset(&mut data, 2, 25, b"cat");
        data.push(0x00);
        assert_eq!(MetadataRecord::decode(&data).unwrap().keywords(), ["cat"]);
    }
}
