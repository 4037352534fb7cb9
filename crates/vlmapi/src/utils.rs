use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Guess a mime type from the file extension, defaulting to `image/jpeg`.
pub fn detect_mime_type<P: AsRef<Path>>(path: P) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("image/jpeg")
        .to_string()
}

pub fn encode_bytes(bytes: impl AsRef<[u8]>) -> String {
    STANDARD.encode(bytes)
}
