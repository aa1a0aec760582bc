//! Test doubles shared by the connector's unit tests.

use crate::functions::{
    ArgValue, FnFunction, FunctionDescriptor, FunctionError, FunctionGroup, FunctionRegistry,
    ParameterDescriptor, ParameterType,
};
use crate::model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, TextStream, Usage,
};
use futures::StreamExt;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted backend reply.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Message(Message),
    Fragments(Vec<String>),
    Fail(String),
}

impl Reply {
    pub(crate) fn text(text: &str) -> Self {
        Self::Message(Message::assistant(text))
    }

    pub(crate) fn message(message: Message) -> Self {
        Self::Message(message)
    }

    pub(crate) fn fragments(fragments: &[&str]) -> Self {
        Self::Fragments(fragments.iter().map(|f| f.to_string()).collect())
    }

    pub(crate) fn fail(reason: &str) -> Self {
        Self::Fail(reason.to_string())
    }
}

/// A request as the backend saw it.
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
}

/// Backend that replays a fixed script and records every request.
#[derive(Debug, Default)]
pub(crate) struct ScriptedBackend {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<Recorded>>,
}

impl ScriptedBackend {
    pub(crate) fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::default(),
        }
    }

    pub(crate) fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &ModelRequest<'_>) -> Reply {
        self.requests.lock().unwrap().push(Recorded {
            messages: request.messages.to_vec(),
            tools: request.tools.iter().map(|t| t.name.clone()).collect(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::fail("script exhausted"))
    }
}

impl Backend for ScriptedBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let message = match self.next(&request) {
            Reply::Message(message) => message,
            Reply::Fragments(fragments) => Message::assistant(fragments.concat()),
            Reply::Fail(reason) => return Err(ModelError::Api(reason)),
        };
        Ok(ModelResponse {
            message,
            usage: Usage::default(),
        })
    }

    async fn stream(&self, request: ModelRequest<'_>) -> Result<TextStream, ModelError> {
        let fragments = match self.next(&request) {
            Reply::Message(message) => vec![message.text()],
            Reply::Fragments(fragments) => fragments,
            Reply::Fail(reason) => return Err(ModelError::Api(reason)),
        };
        Ok(futures::stream::iter(fragments.into_iter().map(Ok)).boxed())
    }
}

/// Registry with `time`, `math` and `util` groups.
///
/// `util` holds functions with awkward outcomes: an error, a panic, a null
/// result and a boolean-ish string.
pub(crate) fn registry() -> FunctionRegistry {
    let time = FunctionGroup::new("time").with(FnFunction::new(
        FunctionDescriptor::new("now", "Current local time").with_parameter(
            ParameterDescriptor::optional("format", ParameterType::String, "strftime format"),
        ),
        |_| async { Ok(json!("3:00 PM")) },
    ));

    let math = FunctionGroup::new("math").with(FnFunction::new(
        FunctionDescriptor::new("add", "Add two numbers")
            .with_parameter(ParameterDescriptor::required("a", ParameterType::Number, "first"))
            .with_parameter(ParameterDescriptor::required("b", ParameterType::Number, "second")),
        |args| async move {
            match (
                args.get("a").and_then(ArgValue::as_i64),
                args.get("b").and_then(ArgValue::as_i64),
            ) {
                (Some(a), Some(b)) => Ok(json!(a + b)),
                _ => Ok(json!(args.require_f64("a")? + args.require_f64("b")?)),
            }
        },
    ));

    let util = FunctionGroup::new("util")
        .with(FnFunction::new(
            FunctionDescriptor::new("fail", "Always fails"),
            |_| async { Err(FunctionError::Execution("boom".into())) },
        ))
        .with(FnFunction::new(
            FunctionDescriptor::new("panic", "Always panics"),
            |_| async {
                if std::hint::black_box(true) {
                    panic!("function body panicked");
                }
                Ok(Value::Null)
            },
        ))
        .with(FnFunction::new(
            FunctionDescriptor::new("noop", "Returns nothing"),
            |_| async { Ok(Value::Null) },
        ))
        .with(FnFunction::new(
            FunctionDescriptor::new("is_open", "Whether the shop is open"),
            |_| async { Ok(json!("true")) },
        ));

    FunctionRegistry::new()
        .with_group(time)
        .with_group(math)
        .with_group(util)
}
