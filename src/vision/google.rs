use anyhow::{Context, anyhow};
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{LabelCandidate, LabelService};
use crate::config::VisionConfig;
use crate::error::LabelError;

/// Body text Cloud Vision answers with when it refuses an oversized image.
const ADMISSION_DENIED: &str = "Request Admission Denied";

/// Label detection through the Google Cloud Vision `images:annotate` endpoint.
pub struct GoogleVisionService {
    api_key: String,
    endpoint: String,
    max_results: u32,
    max_request_bytes: usize,
    client: Client,
}

impl GoogleVisionService {
    pub fn new(api_key: String) -> Self {
        Self::from_config(&VisionConfig {
            api_key,
            ..VisionConfig::default()
        })
    }

    pub fn from_config(config: &VisionConfig) -> Self {
        Self {
            api_key: config.resolved_api_key(),
            endpoint: config.endpoint.clone(),
            max_results: config.max_results,
            max_request_bytes: config.max_request_bytes,
            client: Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    label_annotations: Option<Vec<LabelCandidate>>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[async_trait::async_trait]
impl LabelService for GoogleVisionService {
    fn name(&self) -> &str {
        "Google Vision"
    }

    async fn fetch_labels(&self, image: &[u8]) -> Result<Vec<LabelCandidate>, LabelError> {
        let content = base64::engine::general_purpose::STANDARD.encode(image);
        if content.len() > self.max_request_bytes {
            return Err(LabelError::ImageTooLarge(format!(
                "{} bytes encoded, limit is {}",
                content.len(),
                self.max_request_bytes
            )));
        }

        let body = json!({
            "requests": [
                {
                    "image": { "content": content },
                    "features": [
                        { "type": "LABEL_DETECTION", "maxResults": self.max_results }
                    ]
                }
            ]
        });

        let url = format!("{}?key={}", self.endpoint, self.api_key);
        log::debug!("Performing vision request ({} bytes)", image.len());

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            // the URL carries the API key
            .map_err(|e| e.without_url())
            .context("Vision request failed")
            .map_err(LabelError::Recognition)?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to read Vision response")
            .map_err(LabelError::Recognition)?;

        if is_too_large(status, &text) {
            return Err(LabelError::ImageTooLarge(format!("{status}: {}", text.trim())));
        }
        if !status.is_success() {
            return Err(LabelError::Recognition(anyhow!(
                "Vision API error ({status}): {text}"
            )));
        }

        parse_annotate_response(&text)
    }
}

fn is_too_large(status: StatusCode, body: &str) -> bool {
    status == StatusCode::PAYLOAD_TOO_LARGE
        || (status == StatusCode::BAD_REQUEST && body.contains(ADMISSION_DENIED))
}

/// Pull the label annotations out of an `images:annotate` response body.
fn parse_annotate_response(text: &str) -> Result<Vec<LabelCandidate>, LabelError> {
    let response: AnnotateResponse = serde_json::from_str(text)
        .context("Failed to parse Vision response JSON")
        .map_err(LabelError::Recognition)?;

    let first = response
        .responses
        .into_iter()
        .next()
        .ok_or_else(|| LabelError::Recognition(anyhow!("Vision response has no results")))?;

    if let Some(status) = first.error {
        return Err(LabelError::Recognition(anyhow!(
            "Vision API error {}: {}",
            status.code,
            status.message
        )));
    }

    match first.label_annotations {
        Some(labels) if !labels.is_empty() => Ok(labels),
        _ => Err(LabelError::NoLabelsFound),
    }
}
