pub mod client;
pub mod error;
pub mod types;

pub use client::OpenAiClient;
pub use error::OpenAiError;
