//! The natural-language request pipeline.
//!
//! One request flows `interpret -> parse -> dispatch`; any stage may fail
//! the request and nothing is retried. Every upstream failure class is
//! logged with its diagnostics and then collapsed to the opaque
//! [`ApiError::UpstreamCallFailed`].

use std::sync::Arc;

use tracing::{debug, error};

use crate::errors::ApiError;
use crate::nlp::command::Command;
use crate::nlp::dispatch::{DispatchOutcome, Dispatcher};
use crate::nlp::llm::LlmProvider;
use crate::user::store::UserStore;

pub struct NlpService {
    provider: Arc<dyn LlmProvider>,
    dispatcher: Dispatcher,
}

impl NlpService {
    pub fn new(provider: Arc<dyn LlmProvider>, store: Arc<dyn UserStore>) -> Self {
        Self {
            provider,
            dispatcher: Dispatcher::new(store),
        }
    }

    /// Runs one free-text prompt through the pipeline.
    pub async fn process(
        &self,
        prompt: &str,
        model_override: Option<&str>,
    ) -> Result<DispatchOutcome, ApiError> {
        let raw = self
            .provider
            .interpret(prompt, model_override)
            .await
            .map_err(|e| {
                error!(error = %e, "model interpretation failed");
                ApiError::UpstreamCallFailed
            })?;

        let command = Command::parse(&raw)?;
        debug!(operation = command.operation.as_str(), "interpreted command");
        self.dispatcher.dispatch(&command)
    }
}
