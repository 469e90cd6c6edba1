// src/llm/client.rs
//
// Drives the backend across models and attempts until one candidate
// passes structural validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use sha2::{Digest, Sha256};

use crate::config::{GenerationConfig, ATTEMPTS_PER_BACKEND};
use crate::error::GenerationError;
use crate::llm::backend::{GenerationBackend, GenerationRequest};
use crate::testgen::candidate::{CandidateOutput, Provenance};
use crate::testgen::validate::{ValidationVerdict, Validator};

/// One cell of the backend x attempt matrix.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Attempt {
    pub backend: String,
    pub number: usize,
}

/// Lazily yields every (backend, attempt) pair, backend-major.
pub struct AttemptPlan {
    backends: Vec<String>,
    per_backend: usize,
    next: usize,
}

impl AttemptPlan {
    pub fn new(backends: Vec<String>, per_backend: usize) -> Self {
        Self {
            backends,
            per_backend,
            next: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.backends.len() * self.per_backend
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Iterator for AttemptPlan {
    type Item = Attempt;

    fn next(&mut self) -> Option<Attempt> {
        if self.per_backend == 0 || self.next >= self.len() {
            return None;
        }
        let backend = self.backends[self.next / self.per_backend].clone();
        let number = self.next % self.per_backend + 1;
        self.next += 1;
        Some(Attempt { backend, number })
    }
}

/// Primary first, then every listed model not already present.
pub fn candidate_backends(primary: &str, listed: Vec<String>) -> Vec<String> {
    let mut out = vec![primary.to_string()];
    for m in listed {
        if !out.contains(&m) {
            out.push(m);
        }
    }
    out
}

pub struct GenerationClient<B> {
    backend: B,
    cfg: GenerationConfig,
}

impl<B: GenerationBackend> GenerationClient<B> {
    pub fn new(backend: B, cfg: GenerationConfig) -> Self {
        Self { backend, cfg }
    }

    /// Resamples with the same prompt until the validator accepts or the
    /// attempt matrix is spent. Rejected output is never repaired.
    pub fn generate(
        &self,
        prompt: String,
        validator: &Validator,
    ) -> Result<CandidateOutput, GenerationError> {
        let listed = self
            .backend
            .list_models()
            .map_err(GenerationError::ListModels)?;
        let backends = candidate_backends(&self.cfg.primary_model, listed);
        tracing::info!("Available models: {:?}", backends);

        let request = GenerationRequest::new(prompt, &self.cfg);
        let prompt_hash = hash_prompt(&request.prompt);
        tracing::debug!("Prompt {} ({} bytes)", &prompt_hash[..12], request.prompt.len());
        let plan = AttemptPlan::new(backends, ATTEMPTS_PER_BACKEND);
        let backend_count = plan.len() / ATTEMPTS_PER_BACKEND;
        let mut attempts = 0;

        for attempt in plan {
            attempts += 1;
            tracing::info!(
                "Attempt {} of {} to generate unit tests with model {}",
                attempt.number,
                ATTEMPTS_PER_BACKEND,
                attempt.backend
            );

            let req = request.with_model(&attempt.backend);
            let raw = match self.backend.generate(&req) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(
                        "Attempt {} failed with model {}: {}",
                        attempt.number,
                        attempt.backend,
                        e
                    );
                    thread::sleep(self.cfg.backoff);
                    continue;
                }
            };

            self.save_debug_artifact(&attempt, &raw);

            let candidate = CandidateOutput::new(
                raw,
                Provenance {
                    backend: attempt.backend.clone(),
                    attempt: attempt.number,
                    prompt_hash: prompt_hash.clone(),
                },
            );

            match validator.validate(&candidate.normalized) {
                ValidationVerdict::Accepted(_) => {
                    tracing::info!(
                        "Successfully generated unit tests ({} bytes) with model {}",
                        candidate.normalized.len(),
                        attempt.backend
                    );
                    return Ok(candidate);
                }
                ValidationVerdict::Rejected(reason) => {
                    tracing::warn!("Validation failed [{}]: {}", reason.code(), reason);
                }
            }
        }

        tracing::error!(
            "Failed to generate unit tests after {} attempts with all models",
            attempts
        );
        Err(GenerationError::Exhausted {
            attempts,
            backends: backend_count,
        })
    }

    fn save_debug_artifact(&self, attempt: &Attempt, raw: &str) {
        let path = debug_artifact_path(&self.cfg.debug_dir, &attempt.backend, attempt.number);
        if let Err(e) = fs::write(&path, raw) {
            tracing::warn!("Failed to save raw response {}: {}", path.display(), e);
        }
    }
}

/// `raw_response_<backend>_attempt_<n>.txt`, with path-hostile characters
/// in the backend id replaced.
pub fn debug_artifact_path(dir: &Path, backend: &str, attempt: usize) -> PathBuf {
    let safe: String = backend
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    dir.join(format!("raw_response_{safe}_attempt_{attempt}.txt"))
}

fn hash_prompt(prompt: &str) -> String {
    let mut h = Sha256::new();
    h.update(prompt.as_bytes());
    hex::encode(h.finalize())
}
