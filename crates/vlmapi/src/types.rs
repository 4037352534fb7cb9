use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::{detect_mime_type, encode_bytes};

/// Sampling parameters forwarded verbatim as the wire `generationConfig` object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            top_p: 1.0,
            top_k: 32,
            max_output_tokens: 4096,
        }
    }
}

/// One inline image attached to a generation request, already base64 encoded.
#[derive(Clone, Debug, PartialEq)]
pub struct ImagePart {
    pub mime_type: String,
    pub data_b64: String,
}

impl ImagePart {
    pub fn new(mime_type: impl Into<String>, data_b64: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data_b64: data_b64.into(),
        }
    }

    /// Encode raw bytes. The mime type is guessed from `name_hint` when one is
    /// given, with `image/jpeg` as the fallback.
    pub fn from_bytes(bytes: impl AsRef<[u8]>, name_hint: Option<&Path>) -> Self {
        let mime_type = match name_hint {
            Some(path) => detect_mime_type(path),
            None => "image/jpeg".to_string(),
        };
        Self {
            mime_type,
            data_b64: encode_bytes(bytes),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read image file: {}", path.display()))?;
        Ok(Self::from_bytes(bytes, Some(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_generation_config_serializes_camel_case() {
        let value = serde_json::to_value(GenerationConfig::default()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "temperature": 0.4,
                "topP": 1.0,
                "topK": 32,
                "maxOutputTokens": 4096
            })
        );
    }

    #[test]
    fn from_bytes_guesses_mime_from_hint() {
        let part = ImagePart::from_bytes(b"fake", Some(Path::new("photo.png")));
        assert_eq!(part.mime_type, "image/png");
        assert_eq!(part.data_b64, "ZmFrZQ==");
    }

    #[test]
    fn from_bytes_without_hint_falls_back_to_jpeg() {
        let part = ImagePart::from_bytes(b"fake", None);
        assert_eq!(part.mime_type, "image/jpeg");
    }

    #[test]
    fn from_file_reads_and_encodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.gif");
        std::fs::write(&path, b"GIF89a").unwrap();

        let part = ImagePart::from_file(&path).unwrap();
        assert_eq!(part.mime_type, "image/gif");
        assert_eq!(part.data_b64, "R0lGODlh");
    }

    #[test]
    fn from_file_reports_missing_path() {
        let err = ImagePart::from_file("/no/such/image.png").unwrap_err();
        assert!(err.to_string().contains("/no/such/image.png"));
    }
}
