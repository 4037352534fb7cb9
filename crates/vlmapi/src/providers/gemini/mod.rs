mod api;
pub mod models;

pub use api::{GeminiClient, build_generation_body, response_text};
