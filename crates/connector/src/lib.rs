//! Function calling for chat models that cannot do it natively.
//!
//! The connector sits between an application and a chat completion backend.
//! When a request enables functions it describes them to the model in the
//! system prompt, recovers the JSON call the model writes back (even when it
//! is wrapped in prose, fenced or truncated), executes the matching local
//! function and answers in natural language. Streaming requests forward
//! ordinary text live and hold back only what might be a call.
//!
//! # Example
//!
//! ```ignore
//! use connector::{
//!     ChatHistory, Connector, ExecutionSettings, FnFunction, FunctionDescriptor, FunctionGroup,
//!     FunctionRegistry, OpenAiBackend,
//! };
//! use policy::FunctionChoice;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> connector::Result<()> {
//! let time = FunctionGroup::new("time").with(FnFunction::new(
//!     FunctionDescriptor::new("now", "Current local time"),
//!     |_| async { Ok(serde_json::json!("3:00 PM")) },
//! ));
//! let backend = OpenAiBackend::builder("llama3").build();
//! let connector = Connector::new(backend, FunctionRegistry::new().with_group(time));
//!
//! let mut history = ChatHistory::new();
//! history.add_user("What time is it?");
//! let settings = ExecutionSettings::default().with_function_choice(FunctionChoice::auto());
//! let answer = connector
//!     .complete(&mut history, &settings, &CancellationToken::new())
//!     .await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

mod backend;
mod config;
mod error;
pub mod functions;
mod history;
mod invoker;
pub mod model;
mod orchestrator;
pub mod parser;
mod processor;
mod prompt;
mod session;
#[cfg(test)]
mod testing;
pub mod validator;

// Backends
pub use backend::{DEFAULT_ENDPOINT, OpenAiBackend, OpenAiBackendBuilder};

// Functions
pub use functions::{
    ArgValue, Arguments, FnFunction, Function, FunctionDescriptor, FunctionError, FunctionGroup,
    FunctionRegistry, ParameterDescriptor, ParameterType,
};

// Model types
pub use model::{Backend, Message, ModelError, Role, SamplingSettings};

// Pipeline
pub use config::{ConnectorOptions, ExecutionSettings, ToolCallingConfig};
pub use error::{Error, Result};
pub use history::ChatHistory;
pub use invoker::{InvocationFailure, InvocationResult, Invoker};
pub use orchestrator::Connector;
pub use processor::{CallProcessor, NativeProcessor};
pub use prompt::{augment, system_instructions};
pub use session::Session;
