//! Encoded image payloads.
//!
//! Callers hand over either a `data:<mime>;base64,<body>` URI (what a browser
//! `FileReader` produces), raw encoded bytes, or a path on disk.

use std::path::Path;

use agro_core::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// MIME type used when the format cannot be sniffed
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// Encoded image bytes plus their declared MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    mime_type: String,
}

impl ImagePayload {
    /// Create a payload with an explicit MIME type
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Create a payload from raw bytes, sniffing the MIME type from the magic bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mime_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type())
            .unwrap_or(UNKNOWN_MIME);

        Self::new(bytes, mime_type)
    }

    /// Parse a base64 data URI
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| Error::ImageDecode("not a data URI".to_string()))?;

        let (mime_type, body) = rest
            .split_once(";base64,")
            .ok_or_else(|| Error::ImageDecode("data URI is not base64 encoded".to_string()))?;

        if mime_type.is_empty() || !mime_type.contains('/') {
            return Err(Error::ImageDecode(format!("invalid MIME type in data URI: {mime_type:?}")));
        }

        let cleaned: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| Error::ImageDecode(format!("invalid base64 payload: {e}")))?;

        Ok(Self::new(bytes, mime_type))
    }

    /// Read an image file from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::ImageDecode(format!("failed to read {}: {e}", path.display())))?;
        Ok(Self::from_bytes(bytes))
    }

    /// Accept either a data URI or a filesystem path
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim_start().starts_with("data:") {
            Self::from_data_uri(input)
        } else {
            Self::from_file(Path::new(input))
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the MIME type names an image format
    pub fn has_image_mime(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Base64 body for inline transfer
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}
