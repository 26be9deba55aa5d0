//! Mirror request decoding and validation

use crate::image::reference::{ImageReference, InvalidReference};
use serde::Deserialize;
use thiserror::Error;

/// Field of the request document that carries the image list
pub const CONTENT_FIELD: &str = "hub-mirror";

/// Default upper bound on images per request
pub const DEFAULT_MAX_CONTENT: usize = 10;

/// Reasons a request is rejected before any network activity
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("malformed request: {0}")]
    MalformedInput(String),

    #[error(transparent)]
    InvalidReference(#[from] InvalidReference),

    #[error("too many images: {count} requested, at most {max} allowed")]
    TooManyImages { count: usize, max: usize },

    #[error("no images to mirror")]
    EmptyRequest,
}

/// `{"hub-mirror": ["nginx:latest", ...]}`
#[derive(Debug, Deserialize)]
struct RequestDocument {
    #[serde(rename = "hub-mirror")]
    content: Vec<String>,
}

/// A validated, ordered and bounded list of source images
#[derive(Debug, Clone)]
pub struct MirrorRequest {
    images: Vec<ImageReference>,
    max_content: usize,
}

impl MirrorRequest {
    pub fn images(&self) -> &[ImageReference] {
        &self.images
    }

    pub fn max_content(&self) -> usize {
        self.max_content
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Normalizes and bounds-checks raw image lists
#[derive(Debug, Clone, Copy)]
pub struct RequestValidator {
    max_content: usize,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTENT)
    }
}

impl RequestValidator {
    pub fn new(max_content: usize) -> Self {
        Self { max_content }
    }

    /// Decode a JSON request document and validate its image list
    pub fn validate_content(&self, content: &str) -> Result<MirrorRequest, ValidationError> {
        let document: RequestDocument = serde_json::from_str(content)
            .map_err(|e| ValidationError::MalformedInput(e.to_string()))?;
        self.validate(&document.content)
    }

    /// Validate a raw image list
    ///
    /// Blank entries are skipped. The remaining entries keep their order and
    /// must number between one and `max_content`.
    pub fn validate<S: AsRef<str>>(&self, raw: &[S]) -> Result<MirrorRequest, ValidationError> {
        let entries: Vec<&str> = raw
            .iter()
            .map(|entry| entry.as_ref().trim())
            .filter(|entry| !entry.is_empty())
            .collect();

        if entries.len() > self.max_content {
            return Err(ValidationError::TooManyImages {
                count: entries.len(),
                max: self.max_content,
            });
        }
        if entries.is_empty() {
            return Err(ValidationError::EmptyRequest);
        }

        let images = entries
            .into_iter()
            .map(ImageReference::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MirrorRequest {
            images,
            max_content: self.max_content,
        })
    }
}
