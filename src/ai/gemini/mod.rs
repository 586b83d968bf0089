pub mod client;
pub mod types;

pub use client::{ContentReply, GeminiHttpClient};
pub use types::{Content, GenerateContentRequest, GenerationConfig, InlineData, Part};
