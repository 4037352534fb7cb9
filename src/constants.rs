pub const APP_TITLE: &str = "Image Query System";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub const UPLOAD_DIR_NAME: &str = "image_upload";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = "app_log.log";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff"];
pub const THUMBNAIL_EDGE: u32 = 100;
pub const PREVIEW_COLUMNS: usize = 4;
