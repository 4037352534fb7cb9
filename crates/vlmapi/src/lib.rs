pub mod providers;
pub mod types;
pub mod utils;

pub use providers::gemini::{GeminiClient, response_text};
pub use types::{GenerationConfig, ImagePart};
