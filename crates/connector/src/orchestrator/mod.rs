//! The request pipeline.
//!
//! A [`Connector`] wraps a [`Backend`] that may not support native function
//! calling. When a request enables functions it teaches the model a JSON call
//! grammar through the system prompt, recovers calls from the reply text,
//! executes them and returns a natural-language answer.

mod streaming;

use crate::config::{ConnectorOptions, ExecutionSettings, ToolCallingConfig};
use crate::functions::FunctionRegistry;
use crate::history::ChatHistory;
use crate::invoker::{InvocationResult, Invoker};
use crate::model::{Backend, ModelError, ModelRequest};
use crate::parser::{self, ParsedCall};
use crate::processor::{CallProcessor, NativeProcessor};
use crate::prompt;
use crate::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Function-calling connector over a text backend.
pub struct Connector<B> {
    backend: Arc<B>,
    registry: Arc<FunctionRegistry>,
    options: ConnectorOptions,
    primary: Option<Arc<dyn CallProcessor>>,
}

impl<B: Backend + 'static> Connector<B> {
    pub fn new(backend: B, registry: FunctionRegistry) -> Self {
        Self {
            backend: Arc::new(backend),
            registry: Arc::new(registry),
            options: ConnectorOptions::default(),
            primary: None,
        }
    }

    pub fn with_options(mut self, options: ConnectorOptions) -> Self {
        self.options = options;
        self
    }

    /// Give `processor` the first attempt at every detected call.
    pub fn with_processor(mut self, processor: impl CallProcessor + 'static) -> Self {
        self.primary = Some(Arc::new(processor));
        self
    }

    /// Use the backend's own tool calling as the primary processor.
    ///
    /// Reads `max_native_rounds`, so set options first.
    pub fn with_native_processor(self) -> Self {
        let processor = NativeProcessor::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.registry),
            self.options.max_native_rounds,
        );
        self.with_processor(processor)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn options(&self) -> &ConnectorOptions {
        &self.options
    }

    /// Complete the conversation in `history` and return the answer.
    ///
    /// Function calls and their results are appended to `history`; the
    /// returned answer is not.
    pub async fn complete(
        &self,
        history: &mut ChatHistory,
        settings: &ExecutionSettings,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let span = tracing::info_span!("completion", request_id = %Uuid::new_v4(), mode = "single");
        self.complete_inner(history, settings, cancel)
            .instrument(span)
            .await
    }

    async fn complete_inner(
        &self,
        history: &mut ChatHistory,
        settings: &ExecutionSettings,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let Some(config) = ToolCallingConfig::from_settings(settings, &self.registry) else {
            let request = ModelRequest::text(history.messages(), &settings.sampling);
            let response = cancellable(cancel, self.backend.call(request)).await?;
            return Ok(response.message.text());
        };

        tracing::debug!(tools = config.tools().len(), behavior = ?config.behavior(), "function calling enabled");
        let messages = prompt::augment(history.messages(), &config);
        let request = ModelRequest::text(&messages, &settings.sampling);
        let response = cancellable(cancel, self.backend.call(request)).await?;

        let result = self
            .resolve(response.message.text(), &config, history, settings, cancel)
            .await?;
        Ok(result.into_text())
    }

    /// Turn the model's reply text into the text surfaced to the caller.
    pub(crate) async fn resolve(
        &self,
        text: String,
        config: &ToolCallingConfig,
        history: &mut ChatHistory,
        settings: &ExecutionSettings,
        cancel: &CancellationToken,
    ) -> Result<InvocationResult> {
        let Some(parsed) = parser::parse(&text) else {
            return Ok(InvocationResult::Unchanged(text));
        };

        let (call, response_format) = match parsed {
            ParsedCall::Respond {
                response_format: Some(answer),
            } => return Ok(InvocationResult::Answer(answer)),
            ParsedCall::Respond {
                response_format: None,
            } => return Ok(InvocationResult::Unchanged(text)),
            ParsedCall::Call {
                call,
                response_format,
            } => (call, response_format),
        };

        if !config.auto_invoke() {
            tracing::debug!(function = %call.name, "auto invoke disabled, returning reply as is");
            return Ok(InvocationResult::Unchanged(text));
        }

        if let Some(answer) = self.try_primary(history, config, settings, cancel).await? {
            return Ok(InvocationResult::Answer(answer));
        }

        let result = Invoker::new(self.backend.as_ref(), &self.registry, &self.options)
            .invoke(
                &call,
                response_format.as_deref(),
                config,
                history,
                &settings.sampling,
                cancel,
            )
            .await;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(result)
    }

    /// `None` sends the recovered call to the invoker.
    async fn try_primary(
        &self,
        history: &ChatHistory,
        config: &ToolCallingConfig,
        settings: &ExecutionSettings,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let Some(primary) = &self.primary else {
            return Ok(None);
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            outcome = primary.process(history.messages(), config, &settings.sampling) => outcome,
        };

        match outcome {
            Ok(text) if !parser::contains_call_marker(&text) => Ok(Some(text)),
            Ok(_) => {
                tracing::warn!("primary processor answered with call markers, executing recovered call");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "primary processor failed, executing recovered call");
                Ok(None)
            }
        }
    }
}

/// Await a model call unless the request is cancelled first.
async fn cancellable<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = std::result::Result<T, ModelError>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = call => result.map_err(Error::from),
    }
}
