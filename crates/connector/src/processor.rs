//! Primary handling of calls through native function calling.
//!
//! A [`CallProcessor`] gets the first attempt at a turn that the parser
//! recognized as a call. If it fails, or its final text still carries call
//! markers, the connector falls back to executing the recovered call itself.

use crate::config::ToolCallingConfig;
use crate::functions::{Arguments, FunctionRegistry};
use crate::invoker;
use crate::model::{Backend, Message, ModelError, ModelRequest, SamplingSettings, ToolCall, ToolResult};
use crate::parser::FunctionCall;
use crate::validator;
use async_trait::async_trait;
use futures::future::join_all;
use policy::Decision;
use std::sync::Arc;

/// Produces a final answer for a conversation that needs a function.
#[async_trait]
pub trait CallProcessor: Send + Sync {
    async fn process(
        &self,
        messages: &[Message],
        config: &ToolCallingConfig,
        settings: &SamplingSettings,
    ) -> Result<String, ModelError>;
}

/// Drives the backend's native tool calling until it answers in text.
pub struct NativeProcessor<B> {
    backend: Arc<B>,
    registry: Arc<FunctionRegistry>,
    max_rounds: usize,
}

impl<B: Backend> NativeProcessor<B> {
    pub fn new(backend: Arc<B>, registry: Arc<FunctionRegistry>, max_rounds: usize) -> Self {
        Self {
            backend,
            registry,
            max_rounds,
        }
    }

    async fn run(&self, tool_call: &ToolCall, config: &ToolCallingConfig) -> ToolResult {
        let call = FunctionCall::new(&tool_call.name, Arguments::from_json(&tool_call.input));
        let failure = |error: String| ToolResult::Failure {
            tool_call_id: tool_call.id.clone(),
            error,
        };

        if let Decision::Deny { reason } = validator::check(&call, config) {
            return failure(reason);
        }
        let Some(function) = invoker::resolve(&self.registry, &call, config) else {
            return failure(format!("function {} was not found", call.name));
        };

        tracing::info!(function = %call.name, "invoking native tool call");
        match invoker::execute(function.as_ref(), &call).await {
            Ok(output) => ToolResult::Success {
                tool_call_id: tool_call.id.clone(),
                output,
            },
            Err(error) => failure(error),
        }
    }
}

#[async_trait]
impl<B: Backend + 'static> CallProcessor for NativeProcessor<B> {
    async fn process(
        &self,
        messages: &[Message],
        config: &ToolCallingConfig,
        settings: &SamplingSettings,
    ) -> Result<String, ModelError> {
        let tools = config.tool_specs();
        let mut messages = messages.to_vec();

        for round in 0..self.max_rounds {
            let request = ModelRequest {
                messages: &messages,
                tools: &tools,
                settings,
            };
            let response = self.backend.call(request).await?;
            let calls = response.message.tool_calls();
            if calls.is_empty() || !config.auto_invoke() {
                return Ok(response.message.text());
            }

            tracing::debug!(round, calls = calls.len(), "native tool calls");
            messages.push(response.message);

            let results = if config.options().allow_concurrent_invocation {
                join_all(calls.iter().map(|call| self.run(call, config))).await
            } else {
                let mut results = Vec::with_capacity(calls.len());
                for call in &calls {
                    results.push(self.run(call, config).await);
                }
                results
            };
            messages.extend(results.into_iter().map(Message::tool_result));
        }

        Err(ModelError::InvalidResponse(format!(
            "no final answer after {} tool rounds",
            self.max_rounds
        )))
    }
}
