use std::path::PathBuf;

/// One image copied into the upload folder, ready to be read and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedImage {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub mime_type: String,
}
