//! Per-request settings and the tool-calling snapshot derived from them.

use crate::functions::{FunctionDescriptor, FunctionRegistry};
use crate::model::{SamplingSettings, ToolSpec};
use policy::{Behavior, FunctionChoice, InvocationOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_CHUNK_DELAY_MS: u64 = 50;
const DEFAULT_MAX_NATIVE_ROUNDS: usize = 5;

/// Settings supplied with a single request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSettings {
    #[serde(flatten)]
    pub sampling: SamplingSettings,

    /// Function choice for this request; `None` disables function calling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_choice: Option<FunctionChoice>,
}

impl ExecutionSettings {
    pub fn with_function_choice(mut self, choice: FunctionChoice) -> Self {
        self.function_choice = Some(choice);
        self
    }
}

/// Connector-wide behavior switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorOptions {
    /// Ask the model to phrase template-less results in natural language.
    pub secondary_round_trip: bool,

    /// Pause between re-emitted chunks of a streamed final answer.
    pub chunk_delay_ms: u64,

    /// Upper bound on native tool-call rounds in the primary processor.
    pub max_native_rounds: usize,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self {
            secondary_round_trip: true,
            chunk_delay_ms: DEFAULT_CHUNK_DELAY_MS,
            max_native_rounds: DEFAULT_MAX_NATIVE_ROUNDS,
        }
    }
}

impl ConnectorOptions {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

/// The functions advertised for one request and how calls to them are
/// treated.
///
/// Built once per request and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallingConfig {
    choice: FunctionChoice,
    tools: Vec<FunctionDescriptor>,
}

impl ToolCallingConfig {
    pub fn new(choice: FunctionChoice, tools: Vec<FunctionDescriptor>) -> Self {
        Self { choice, tools }
    }

    /// Snapshot the registry according to the request's function choice.
    ///
    /// `None` when function calling is off or nothing would be advertised.
    pub fn from_settings(settings: &ExecutionSettings, registry: &FunctionRegistry) -> Option<Self> {
        let choice = settings.function_choice.as_ref()?;
        if !choice.behavior.advertises() {
            return None;
        }

        let tools: Vec<FunctionDescriptor> = registry
            .descriptors()
            .into_iter()
            .filter(|d| {
                let qualified = d.qualified_name();
                choice.selects(&d.name, d.plugin.as_ref().map(|_| qualified.as_str()))
            })
            .collect();

        if tools.is_empty() {
            return None;
        }
        Some(Self::new(choice.clone(), tools))
    }

    pub fn tools(&self) -> &[FunctionDescriptor] {
        &self.tools
    }

    pub fn choice(&self) -> &FunctionChoice {
        &self.choice
    }

    pub fn behavior(&self) -> Behavior {
        self.choice.behavior
    }

    pub fn auto_invoke(&self) -> bool {
        self.choice.auto_invoke
    }

    pub fn allow_any(&self) -> bool {
        self.choice.allow_any
    }

    pub fn options(&self) -> InvocationOptions {
        self.choice.options
    }

    /// Every name a call may use for an advertised function.
    pub fn advertised_names(&self) -> Vec<String> {
        self.tools.iter().flat_map(|d| d.names()).collect()
    }

    /// Native tool specs for backends with structured function calling.
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(FunctionDescriptor::to_tool_spec).collect()
    }
}
