use crate::functions::{Arguments, QUALIFIER_SEPARATOR};
use crate::model::ToolCall;
use serde_json::Value;

/// Field that marks an embedded function-call instruction.
pub const CALL_MARKER: &str = "function_call";

/// Sibling field carrying the natural-language response template.
pub const RESPONSE_FIELD: &str = "response_format";

/// Token in a response template replaced by the function's result.
pub const RESULT_PLACEHOLDER: &str = "{result}";

/// A function call recovered from model output.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Name as written by the model, possibly group-qualified.
    pub name: String,
    pub arguments: Arguments,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Split a qualified `group-name` (or `group.name`) into its parts.
    pub fn qualifier(&self) -> Option<(&str, &str)> {
        let (group, name) = self
            .name
            .split_once(QUALIFIER_SEPARATOR)
            .or_else(|| self.name.split_once('.'))?;
        (!group.is_empty() && !name.is_empty()).then_some((group, name))
    }

    /// The call as a structured tool call for chat history.
    pub fn to_tool_call(&self, id: impl Into<String>) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: self.name.clone(),
            input: self.arguments.to_json(),
        }
    }
}

/// What the parser recovered from a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedCall {
    /// The model asked for a function, optionally with a template for the
    /// final answer.
    Call {
        call: FunctionCall,
        response_format: Option<String>,
    },
    /// The model explicitly declined to call anything; the template, if any,
    /// is its answer.
    Respond { response_format: Option<String> },
}

impl ParsedCall {
    pub fn call(&self) -> Option<&FunctionCall> {
        match self {
            Self::Call { call, .. } => Some(call),
            Self::Respond { .. } => None,
        }
    }

    pub fn response_format(&self) -> Option<&str> {
        match self {
            Self::Call {
                response_format, ..
            }
            | Self::Respond { response_format } => response_format.as_deref(),
        }
    }
}

/// Which fields of a call object are honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Schema {
    /// Call field plus the response template.
    Full,
    /// Call field only.
    Minimal,
}

/// Decode a complete JSON document holding a call object.
pub(crate) fn decode_call_object(text: &str, schema: Schema) -> Option<ParsedCall> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    let object = value.as_object()?;
    let call = object.get(CALL_MARKER)?;

    let response_format = match schema {
        Schema::Full => object
            .get(RESPONSE_FIELD)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
        Schema::Minimal => None,
    };

    match call {
        Value::Null => Some(ParsedCall::Respond { response_format }),
        Value::Object(fields) if fields.is_empty() => {
            Some(ParsedCall::Respond { response_format })
        }
        Value::Object(fields) => {
            let name = fields.get("name")?.as_str()?.trim();
            if name.is_empty() {
                return None;
            }
            let arguments = fields
                .get("arguments")
                .map(Arguments::from_json)
                .unwrap_or_default();
            Some(ParsedCall::Call {
                call: FunctionCall::new(name, arguments),
                response_format,
            })
        }
        Value::String(name) if !name.trim().is_empty() => Some(ParsedCall::Call {
            call: FunctionCall::new(name.trim(), Arguments::new()),
            response_format,
        }),
        _ => None,
    }
}
