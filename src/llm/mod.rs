pub mod backend;
pub mod client;
pub mod ollama;
pub mod prompt;
