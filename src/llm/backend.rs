use serde::Serialize;

use crate::config::GenerationConfig;
use crate::error::BackendError;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerationOptions {
    pub num_ctx: u32,
    pub num_predict: u32,
}

/// Built once per unit. Only `model` changes between attempts.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(prompt: String, cfg: &GenerationConfig) -> Self {
        Self {
            model: cfg.primary_model.clone(),
            prompt,
            options: GenerationOptions {
                num_ctx: cfg.num_ctx,
                num_predict: cfg.num_predict,
            },
        }
    }

    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }
}

/// A text-completion service. `OllamaBackend` is the real one; tests
/// plug in scripted stubs.
pub trait GenerationBackend {
    fn list_models(&self) -> Result<Vec<String>, BackendError>;

    fn generate(&self, req: &GenerationRequest) -> Result<String, BackendError>;
}

impl<T: GenerationBackend + ?Sized> GenerationBackend for &T {
    fn list_models(&self) -> Result<Vec<String>, BackendError> {
        (**self).list_models()
    }

    fn generate(&self, req: &GenerationRequest) -> Result<String, BackendError> {
        (**self).generate(req)
    }
}
