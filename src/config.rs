//! config.rs
//!
//! Explicit configuration passed into every component. Nothing here is
//! read from ambient globals after startup.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen2.5-coder:7b";

/// Attempts per backend before moving to the next one.
pub const ATTEMPTS_PER_BACKEND: usize = 3;

/// Minimum line coverage (inclusive) for generated tests to be kept.
pub const COVERAGE_THRESHOLD: f64 = 80.0;

/* ============================================================
   Backend
   ============================================================ */

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub host: Url,
}

impl BackendConfig {
    /// Reads `OLLAMA_HOST`, falling back to the local default.
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var("OLLAMA_HOST") {
            Ok(raw) if !raw.trim().is_empty() => {
                tracing::info!("Using OLLAMA_HOST: {}", raw);
                Self::parse(raw.trim())
            }
            _ => {
                tracing::info!("OLLAMA_HOST not set, using default: {}", DEFAULT_OLLAMA_HOST);
                Self::parse(DEFAULT_OLLAMA_HOST)
            }
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let host = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
            url: raw.to_string(),
            source,
        })?;
        Ok(Self { host })
    }
}

/* ============================================================
   Generation
   ============================================================ */

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub primary_model: String,
    #[serde(with = "secs")]
    pub attempt_timeout: Duration,
    #[serde(with = "secs")]
    pub backoff: Duration,
    pub num_ctx: u32,
    pub num_predict: u32,
    pub debug_dir: PathBuf,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            primary_model: DEFAULT_MODEL.to_string(),
            attempt_timeout: Duration::from_secs(5 * 60),
            backoff: Duration::from_secs(1),
            num_ctx: 131_072,
            num_predict: 1024,
            debug_dir: PathBuf::from("."),
        }
    }
}

/* ============================================================
   Structural requirements on generated tests
   ============================================================ */

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TestRequirements {
    pub suite_name: String,
    pub symbols: Vec<String>,
    pub test_count: usize,
    pub language_standard: String,
    pub min_length: usize,
}

impl Default for TestRequirements {
    fn default() -> Self {
        Self {
            suite_name: "CalculatorTest".to_string(),
            symbols: vec!["add".to_string(), "subtract".to_string()],
            test_count: 4,
            language_standard: "c++17".to_string(),
            min_length: 250,
        }
    }
}

impl TestRequirements {
    /// The exact include directives every generated file must carry.
    pub fn required_includes(&self, header_name: &str) -> [String; 4] {
        [
            "#include <gtest/gtest.h>".to_string(),
            "#include <cmath>".to_string(),
            "#include <stdexcept>".to_string(),
            format!("#include \"{header_name}\""),
        ]
    }
}

/* ============================================================
   Toolchain
   ============================================================ */

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub compiler: String,
    pub coverage_tool: String,
    pub gtest_prefix: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub lib_dirs: Vec<PathBuf>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            compiler: "g++".to_string(),
            coverage_tool: "gcov".to_string(),
            gtest_prefix: PathBuf::from("/opt/homebrew/opt/googletest"),
            include_dirs: vec![PathBuf::from("/usr/local/include")],
            lib_dirs: vec![PathBuf::from("/usr/local/lib")],
        }
    }
}

/* ============================================================
   File overrides
   ============================================================ */

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub generation: GenerationConfig,
    pub requirements: TestRequirements,
    pub toolchain: ToolchainConfig,
}

pub fn default_config_path() -> PathBuf {
    let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("unitgate");
    dir.push("config.toml");
    dir
}

/// Loads overrides from `path`. A missing file yields defaults; a file
/// that exists but does not parse is an error.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_file_config(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_file_config(raw: &str) -> Result<FileConfig, toml::de::Error> {
    toml::from_str(raw)
}

mod secs {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    /// Negative, NaN and infinite values are rejected.
    pub fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = f64::deserialize(d)?;
        Duration::try_from_secs_f64(v).map_err(D::Error::custom)
    }
}
