use std::io::{BufRead, BufReader, Read};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use url::Url;

use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::llm::backend::{GenerationBackend, GenerationRequest};

/// Ollama over its HTTP API (`/api/tags`, `/api/generate`).
pub struct OllamaBackend {
    host: Url,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaBackend {
    /// `timeout` bounds each request end to end, including the stream.
    pub fn new(cfg: &BackendConfig, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| BackendError::Transport {
                url: cfg.host.to_string(),
                source,
            })?;

        Ok(Self {
            host: cfg.host.clone(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.host.as_str().trim_end_matches('/');
        format!("{base}{path}")
    }
}

impl GenerationBackend for OllamaBackend {
    fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let url = self.endpoint("/api/tags");
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|source| BackendError::Transport { url: url.clone(), source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: resp.text().unwrap_or_default(),
            });
        }

        let tags: TagsResponse = resp
            .json()
            .map_err(|source| BackendError::Transport { url, source })?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn generate(&self, req: &GenerationRequest) -> Result<String, BackendError> {
        let url = self.endpoint("/api/generate");
        tracing::debug!("Sending API request with prompt ({} bytes)", req.prompt.len());

        let resp = self
            .client
            .post(&url)
            .json(req)
            .send()
            .map_err(|source| BackendError::Transport { url: url.clone(), source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: resp.text().unwrap_or_default(),
            });
        }

        collect_stream(resp)
    }
}

/* ============================================================
   NDJSON stream
   ============================================================ */

/// Concatenates the `response` field of every chunk until `done`.
pub fn collect_stream<R: Read>(reader: R) -> Result<String, BackendError> {
    let mut out = String::new();

    for line in BufReader::new(reader).lines() {
        let line = line.map_err(|e| BackendError::Stream(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }

        let chunk: GenerateChunk =
            serde_json::from_str(&line).map_err(|e| BackendError::Stream(e.to_string()))?;

        if let Some(err) = chunk.error {
            return Err(BackendError::Remote(err));
        }

        out.push_str(&chunk.response);

        if chunk.done {
            break;
        }
    }

    Ok(out)
}
