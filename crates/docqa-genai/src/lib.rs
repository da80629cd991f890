//! Hosted generative-model collaborators (Gemini REST API).

pub mod client;
pub mod embed;
pub mod generate;

pub use client::GeminiClient;
pub use generate::GeminiGenerator;
