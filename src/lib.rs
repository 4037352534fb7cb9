pub mod app;
pub mod config;
pub mod constants;
pub mod error;
pub mod history;
pub mod library;
pub mod models;
pub mod preview;

pub use app::ImageQueryApp;
pub use config::{AppConfig, GenerationSettings};
pub use constants::{
    API_KEY_ENV, APP_TITLE, CONFIG_FILE_NAME, DEFAULT_GEMINI_ENDPOINT, DEFAULT_MODEL,
    LOG_FILE_NAME, UPLOAD_DIR_NAME,
};
pub use error::{AppError, Result};
pub use models::StagedImage;
