mod google;

pub use google::GoogleVisionService;

use std::cmp::Ordering;

use serde::Deserialize;

use crate::error::LabelError;

/// Default minimum confidence for a label to be used as a keyword.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.8;

/// A label proposed by the recognition service.
///
/// Deserializes directly from a Cloud Vision `EntityAnnotation`
/// (`description` + `score`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelCandidate {
    pub description: String,
    #[serde(rename = "score")]
    pub confidence: f32,
}

impl LabelCandidate {
    pub fn new(description: impl Into<String>, confidence: f32) -> Self {
        Self {
            description: description.into(),
            confidence,
        }
    }
}

/// Capability to label an image.
///
/// Implementations report the two recoverable conditions as
/// [`LabelError::ImageTooLarge`] and [`LabelError::NoLabelsFound`]; anything
/// else should be [`LabelError::Recognition`].
///
/// # Example
///
/// ```rust,no_run
/// use photo_label::vision::{GoogleVisionService, LabelService, select_labels};
///
/// # async fn example() -> anyhow::Result<()> {
/// let service = GoogleVisionService::new("api-key".into());
/// let bytes = std::fs::read("photo.jpg")?;
/// let candidates = service.fetch_labels(&bytes).await?;
/// let tags = select_labels(&candidates, 0.8)?;
/// println!("{tags:?}");
/// # Ok(())
/// # }
/// ```
#[async_trait::async_trait]
pub trait LabelService: Send + Sync {
    /// The display name of this service.
    fn name(&self) -> &str;
    /// Label the raw bytes of an image file.
    async fn fetch_labels(&self, image: &[u8]) -> Result<Vec<LabelCandidate>, LabelError>;
}

/// Turn candidates into keywords.
///
/// Keeps the candidates scoring strictly above `min_confidence`; if none do,
/// keeps all of them. The result is ordered by descending confidence, ties in
/// their original order. Fails only when there are no candidates at all.
pub fn select_labels(
    candidates: &[LabelCandidate],
    min_confidence: f32,
) -> Result<Vec<String>, LabelError> {
    let confident: Vec<&LabelCandidate> = candidates
        .iter()
        .filter(|c| c.confidence > min_confidence)
        .collect();
    let mut chosen = if confident.is_empty() {
        candidates.iter().collect()
    } else {
        confident
    };

    chosen.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));

    if chosen.is_empty() {
        return Err(LabelError::NoLabelsFound);
    }
    Ok(chosen.into_iter().map(|c| c.description.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::cat_candidates;

    fn candidates(pairs: &[(&str, f32)]) -> Vec<LabelCandidate> {
        pairs.iter().map(|(d, c)| LabelCandidate::new(*d, *c)).collect()
    }

    #[test]
    fn keeps_confident_labels() {
        let c = candidates(&[("cat", 0.96), ("mammal", 0.95), ("animal", 0.3)]);
        assert_eq!(select_labels(&c, DEFAULT_MIN_CONFIDENCE).unwrap(), ["cat", "mammal"]);
    }

    #[test]
    fn find_labels_for_cat_response() {
        assert_eq!(
            select_labels(&cat_candidates(), DEFAULT_MIN_CONFIDENCE).unwrap(),
            ["cat", "mammal", "vertebrate", "whiskers"]
        );
    }

    #[test]
    fn falls_back_to_all_labels_sorted() {
        let c = candidates(&[("blur", 0.2), ("sky", 0.7), ("cloud", 0.5)]);
        assert_eq!(
            select_labels(&c, DEFAULT_MIN_CONFIDENCE).unwrap(),
            ["sky", "cloud", "blur"]
        );
    }

    #[test]
    fn threshold_is_exclusive() {
        let c = candidates(&[("edge", 0.8), ("low", 0.1)]);
        assert_eq!(select_labels(&c, 0.8).unwrap(), ["edge", "low"]);
    }

    #[test]
    fn sorts_confident_labels_descending() {
        let c = candidates(&[("b", 0.85), ("a", 0.99), ("c", 0.9)]);
        assert_eq!(select_labels(&c, 0.8).unwrap(), ["a", "c", "b"]);
    }

    #[test]
    fn ties_keep_original_order() {
        let c = candidates(&[("first", 0.9), ("second", 0.9), ("top", 0.95)]);
        assert_eq!(select_labels(&c, 0.8).unwrap(), ["top", "first", "second"]);
    }

    #[test]
    fn no_candidates_is_an_error() {
        assert!(matches!(select_labels(&[], 0.8), Err(LabelError::NoLabelsFound)));
    }

    #[test]
    fn candidate_reads_vision_annotation() {
        let c: LabelCandidate =
            serde_json::from_str(r#"{"mid": "/m/01yrx", "description": "cat", "score": 0.96, "topicality": 0.96}"#)
                .unwrap();
        assert_eq!(c, LabelCandidate::new("cat", 0.96));
    }
}
