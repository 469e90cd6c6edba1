//! unitgate: generate GoogleTest suites for C++ sources with an LLM and keep
//! only the ones that compile, pass, and reach the line-coverage threshold.

pub mod config;
pub mod discovery;
pub mod error;
pub mod llm;
pub mod logger;
pub mod orchestrator;
pub mod state;
pub mod testgen;
