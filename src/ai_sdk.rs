mod client;
mod decoder;
mod openai;

pub use client::{AiConfig, ChatClient, DEFAULT_API_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
pub use decoder::StreamChunk;
pub use openai::ChatMessage;
#[cfg(test)]
pub use openai::Role;
