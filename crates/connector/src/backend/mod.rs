//! Model backends.

mod openai;
mod sse;

pub use openai::{DEFAULT_ENDPOINT, OpenAiBackend, OpenAiBackendBuilder};
