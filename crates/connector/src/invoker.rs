//! Execution of recovered calls.
//!
//! The invoker never fails: a call that is not advertised, not registered
//! or whose body errors resolves to a fixed message, and a failed rephrasing
//! round-trip falls back to deterministic formatting.

use crate::config::{ConnectorOptions, ToolCallingConfig};
use crate::functions::{Function, FunctionRegistry};
use crate::history::ChatHistory;
use crate::model::{Backend, Message, ModelRequest, Part, Role, SamplingSettings, ToolResult};
use crate::parser::{FunctionCall, RESULT_PLACEHOLDER};
use crate::validator;
use futures::FutureExt;
use policy::Decision;
use serde_json::Value;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Text a `null` function result is rendered as.
pub const NULL_RESULT: &str = "null";

const ANSWER_INSTRUCTIONS: &str = "You are a helpful assistant. Answer the user's question naturally and concisely using the function result. Do not mention functions, tools or JSON.";
const FINAL_ANSWER_PROMPT: &str = "Using that result, give the final answer to my question.";

/// Why a call produced no function result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationFailure {
    /// The call named a function that was not advertised.
    NotAvailable { name: String },
    /// No registered function has that name.
    NotFound { name: String },
    /// The function body failed.
    Execution { name: String },
}

impl fmt::Display for InvocationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAvailable { name } => write!(f, "Sorry, the function '{name}' is not available."),
            Self::NotFound { name } => write!(f, "Sorry, the function '{name}' was not found."),
            Self::Execution { name } => {
                write!(f, "Sorry, there was an error executing the function '{name}'.")
            }
        }
    }
}

/// The text surfaced to the caller for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationResult {
    /// No call was detected; the model's own text.
    Unchanged(String),
    /// A final answer produced after handling the call.
    Answer(String),
    /// A fixed message describing why the call could not run.
    Failed(InvocationFailure),
}

impl InvocationResult {
    pub fn text(&self) -> String {
        match self {
            Self::Unchanged(text) | Self::Answer(text) => text.clone(),
            Self::Failed(failure) => failure.to_string(),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Unchanged(text) | Self::Answer(text) => text,
            Self::Failed(failure) => failure.to_string(),
        }
    }
}

/// Find the function a call refers to.
///
/// Without allow-any the call is bound to the advertised descriptor it
/// names, so a plain name never reaches a same-named function in a group
/// that was not advertised. Under allow-any a group qualifier is tried
/// first, then every group is scanned for the name as written.
pub(crate) fn resolve(
    registry: &FunctionRegistry,
    call: &FunctionCall,
    config: &ToolCallingConfig,
) -> Option<Arc<dyn Function>> {
    if !config.allow_any() {
        let descriptor = config
            .tools()
            .iter()
            .find(|d| d.name == call.name || d.qualified_name() == call.name)?;
        return registry.find(descriptor.plugin.as_deref(), &descriptor.name);
    }

    call.qualifier()
        .and_then(|(group, name)| registry.find(Some(group), name))
        .or_else(|| registry.find(None, &call.name))
}

/// Run a resolved function, turning errors and panics into `Err(message)`.
pub(crate) async fn execute(function: &dyn Function, call: &FunctionCall) -> Result<Value, String> {
    match AssertUnwindSafe(function.invoke(&call.arguments))
        .catch_unwind()
        .await
    {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("function panicked".to_string()),
    }
}

/// Render a function's return value as text.
pub fn stringify_result(value: &Value) -> String {
    match value {
        Value::Null => NULL_RESULT.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Fill a response template with the result.
///
/// A template without the placeholder is already the complete answer.
pub fn apply_template(template: &str, result: &str) -> String {
    if template.contains(RESULT_PLACEHOLDER) {
        template.replace(RESULT_PLACEHOLDER, result)
    } else {
        template.to_string()
    }
}

/// Deterministic phrasing used when the model cannot rephrase a result.
pub fn format_result(result: &str) -> String {
    let trimmed = result.trim();
    if trimmed.is_empty() || trimmed == NULL_RESULT {
        "Done.".to_string()
    } else if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("yes") {
        "Yes.".to_string()
    } else if trimmed.eq_ignore_ascii_case("false") || trimmed.eq_ignore_ascii_case("no") {
        "No.".to_string()
    } else {
        result.to_string()
    }
}

/// Executes one recovered call and produces the final answer.
pub struct Invoker<'a, B> {
    backend: &'a B,
    registry: &'a FunctionRegistry,
    options: &'a ConnectorOptions,
}

impl<'a, B: Backend> Invoker<'a, B> {
    pub fn new(backend: &'a B, registry: &'a FunctionRegistry, options: &'a ConnectorOptions) -> Self {
        Self {
            backend,
            registry,
            options,
        }
    }

    /// Validate, resolve and execute `call`, then compose the answer.
    ///
    /// The call and its outcome are appended to `history`. Cancellation
    /// only cuts the rephrasing round-trip short; a started function always
    /// runs to completion.
    pub async fn invoke(
        &self,
        call: &FunctionCall,
        response_format: Option<&str>,
        config: &ToolCallingConfig,
        history: &mut ChatHistory,
        settings: &SamplingSettings,
        cancel: &CancellationToken,
    ) -> InvocationResult {
        if let Decision::Deny { reason } = validator::check(call, config) {
            tracing::warn!(function = %call.name, %reason, "rejected function call");
            return InvocationResult::Failed(InvocationFailure::NotAvailable {
                name: call.name.clone(),
            });
        }

        let Some(function) = resolve(self.registry, call, config) else {
            tracing::warn!(function = %call.name, "function not registered");
            return InvocationResult::Failed(InvocationFailure::NotFound {
                name: call.name.clone(),
            });
        };

        let question = history.last_user_text();
        let call_id = format!("call_{}", Uuid::new_v4().simple());
        history.push(Message {
            role: Role::Assistant,
            parts: vec![Part::ToolCall(call.to_tool_call(&call_id))],
        });

        tracing::info!(function = %call.name, arguments = call.arguments.len(), "invoking function");
        let value = match execute(function.as_ref(), call).await {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(function = %call.name, %error, "function failed");
                history.push(Message::tool_result(ToolResult::Failure {
                    tool_call_id: call_id,
                    error,
                }));
                return InvocationResult::Failed(InvocationFailure::Execution {
                    name: call.name.clone(),
                });
            }
        };

        let result = stringify_result(&value);
        history.push(Message::tool_result(ToolResult::Success {
            tool_call_id: call_id,
            output: value,
        }));

        if let Some(template) = response_format {
            return InvocationResult::Answer(apply_template(template, &result));
        }

        if !self.options.secondary_round_trip {
            return InvocationResult::Answer(result);
        }

        let answer = match question {
            Some(question) => {
                self.rephrase(&question, &call.name, &result, settings, cancel)
                    .await
            }
            None => None,
        };
        InvocationResult::Answer(answer.unwrap_or_else(|| format_result(&result)))
    }

    /// Ask the model to phrase `result` as an answer to `question`.
    ///
    /// Runs on an isolated conversation; `None` on any failure.
    async fn rephrase(
        &self,
        question: &str,
        function: &str,
        result: &str,
        settings: &SamplingSettings,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let messages = vec![
            Message::system(ANSWER_INSTRUCTIONS),
            Message::user(question),
            Message::assistant(format!("Let me check that with {function}.")),
            Message::tool(format!("{function} returned: {result}")),
            Message::user(FINAL_ANSWER_PROMPT),
        ];

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            response = self.backend.call(ModelRequest::text(&messages, settings)) => response,
        };

        match response {
            Ok(response) => {
                let text = response.message.text();
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Err(e) => {
                tracing::warn!(function, error = %e, "rephrasing round-trip failed");
                None
            }
        }
    }
}
