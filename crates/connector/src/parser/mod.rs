//! Recovery of function calls from free-text model output.
//!
//! Models served without native function calling are told to answer with a
//! JSON object such as `{"function_call": {"name": "now", "arguments": {}}}`,
//! but they do not reliably do so. [`parse`] tries a fixed sequence of
//! extraction strategies, cheapest and most precise first, and returns the
//! first call any of them recovers:
//!
//! 1. the whole text as a call object;
//! 2. the same after closing braces lost to truncation;
//! 3. an empty call on the first line, the remaining lines being the answer;
//! 4. a call object inside a code fence or inline backticks;
//! 5. a call object embedded in surrounding prose (call field only);
//! 6. a pseudo-call such as `function_call: now({})`.
//!
//! Every strategy is a pure function of the text.

mod call;
mod scan;

pub use call::{CALL_MARKER, FunctionCall, ParsedCall, RESPONSE_FIELD, RESULT_PLACEHOLDER};

pub(crate) use scan::open_braces;

use crate::functions::Arguments;
use call::{Schema, decode_call_object};
use regex::Regex;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").expect("valid fenced block pattern")
});

static INLINE_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`(\{[^`]*\})`").expect("valid inline object pattern"));

static PSEUDO_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:function_call|call|invoke)\s*:?\s*([A-Za-z_][\w.\-]*)\s*\((.*)\)")
        .expect("valid pseudo-call pattern")
});

type Strategy = fn(&str) -> Option<ParsedCall>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("direct", direct),
    ("brace_repair", brace_repair),
    ("split_first_line", split_first_line),
    ("code_fence", code_fence),
    ("embedded_object", embedded_object),
    ("pseudo_call", pseudo_call),
];

/// Whether `text` mentions the call marker at all.
pub fn contains_call_marker(text: &str) -> bool {
    text.contains(CALL_MARKER)
}

/// Cheap pre-check: the marker together with a brace pair.
pub fn may_contain_call(text: &str) -> bool {
    contains_call_marker(text) && text.contains('{') && text.contains('}')
}

/// Recover a function call from model output.
///
/// `None` means the text is an ordinary answer.
pub fn parse(text: &str) -> Option<ParsedCall> {
    if !may_contain_call(text) {
        return None;
    }

    for (strategy, extract) in STRATEGIES {
        if let Some(parsed) = extract(text) {
            tracing::debug!(strategy = *strategy, call = ?parsed.call().map(|c| &c.name), "recovered function call");
            return Some(parsed);
        }
    }

    tracing::debug!(len = text.len(), "call marker present but no call recovered");
    None
}

fn direct(text: &str) -> Option<ParsedCall> {
    decode_call_object(text, Schema::Full)
}

fn brace_repair(text: &str) -> Option<ParsedCall> {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') || !contains_call_marker(trimmed) {
        return None;
    }
    let missing = open_braces(trimmed);
    if missing <= 0 {
        return None;
    }

    let mut repaired = trimmed.to_string();
    repaired.extend(std::iter::repeat_n('}', missing as usize));
    direct(&repaired)
}

fn split_first_line(text: &str) -> Option<ParsedCall> {
    let (first, rest) = text.trim().split_once('\n')?;
    match direct(first)? {
        ParsedCall::Respond { .. } => {
            let rest = rest.trim();
            Some(ParsedCall::Respond {
                response_format: (!rest.is_empty()).then(|| rest.to_string()),
            })
        }
        ParsedCall::Call { .. } => None,
    }
}

fn code_fence(text: &str) -> Option<ParsedCall> {
    FENCED_BLOCK
        .captures_iter(text)
        .chain(INLINE_OBJECT.captures_iter(text))
        .filter_map(|captures| captures.get(1))
        .map(|inner| inner.as_str())
        .filter(|inner| contains_call_marker(inner))
        .find_map(|inner| direct(inner).or_else(|| brace_repair(inner)))
}

fn embedded_object(text: &str) -> Option<ParsedCall> {
    text.match_indices('{')
        .filter_map(|(start, _)| scan::balanced_object(text, start))
        .filter(|object| contains_call_marker(object))
        .find_map(|object| decode_call_object(object, Schema::Minimal))
}

fn pseudo_call(text: &str) -> Option<ParsedCall> {
    let captures = PSEUDO_CALL.captures(text)?;
    let name = captures.get(1)?.as_str();
    let arguments = captures
        .get(2)
        .map(|args| Arguments::from_text(args.as_str()))
        .unwrap_or_default();

    Some(ParsedCall::Call {
        call: FunctionCall::new(name, arguments),
        response_format: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{ArgValue, RAW_INPUT_ARGUMENT};

    fn call_of(parsed: Option<ParsedCall>) -> FunctionCall {
        parsed.and_then(|p| p.call().cloned()).expect("a concrete call")
    }

    #[test]
    fn plain_text_is_not_a_call() {
        assert_eq!(parse("The capital of France is Paris."), None);
        assert_eq!(parse("Use {braces} freely."), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn marker_without_braces_is_rejected_early() {
        assert_eq!(parse("I could use function_call here"), None);
    }

    #[test]
    fn well_formed_call() {
        let call = call_of(parse(
            r#"{"function_call": {"name": "get_weather", "arguments": {"city": "Paris", "days": 3, "metric": true}}}"#,
        ));
        assert_eq!(call.name, "get_weather");
        assert_eq!(call.arguments.len(), 3);
        assert_eq!(call.arguments.get("city"), Some(&ArgValue::String("Paris".into())));
        assert_eq!(call.arguments.get("days"), Some(&ArgValue::Integer(3)));
        assert_eq!(call.arguments.get("metric"), Some(&ArgValue::Bool(true)));
    }

    #[test]
    fn call_with_template() {
        let parsed = parse(
            r#"{"function_call": {"name": "now", "arguments": {}}, "response_format": "The time is {result}"}"#,
        )
        .unwrap();
        assert_eq!(parsed.call().unwrap().name, "now");
        assert_eq!(parsed.response_format(), Some("The time is {result}"));
    }

    #[test]
    fn empty_call_is_natural_language() {
        let parsed = parse(r#"{"function_call": {}, "response_format": "Hello there!"}"#);
        assert_eq!(
            parsed,
            Some(ParsedCall::Respond {
                response_format: Some("Hello there!".into())
            })
        );
    }

    #[test]
    fn string_call_is_bare_name() {
        let call = call_of(parse(r#"{"function_call": "now"}"#));
        assert_eq!(call.name, "now");
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn truncated_call_matches_complete_one() {
        let truncated = r#"{"function_call":{"name":"N","arguments":{}}"#;
        let complete = r#"{"function_call":{"name":"N","arguments":{}}}"#;
        assert!(direct(truncated).is_none());
        assert_eq!(parse(truncated), parse(complete));
        assert!(parse(truncated).is_some());
    }

    #[test]
    fn deeply_truncated_call_is_repaired() {
        let text = r#"{"function_call": {"name": "add", "arguments": {"a": 1, "b": {"c": 2}"#;
        assert_eq!(open_braces(text), 3);
        let call = call_of(parse(text));
        assert_eq!(call.arguments.get("b"), Some(&ArgValue::Json(r#"{"c":2}"#.into())));
    }

    #[test]
    fn first_line_empty_call_then_answer() {
        let text = "{\"function_call\": {}}\nParis is the capital of France.\nIt is lovely.";
        assert_eq!(
            parse(text),
            Some(ParsedCall::Respond {
                response_format: Some("Paris is the capital of France.\nIt is lovely.".into())
            })
        );
    }

    #[test]
    fn fenced_json_block() {
        let text = "Sure!\n```json\n{\"function_call\": {\"name\": \"now\", \"arguments\": {\"format\": \"%H:%M\"}}}\n```\n";
        let call = call_of(parse(text));
        assert_eq!(call.name, "now");
        assert_eq!(call.arguments.get("format"), Some(&ArgValue::String("%H:%M".into())));
    }

    #[test]
    fn untagged_fence_and_inline_backticks() {
        let fenced = "```\n{\"function_call\": {\"name\": \"now\"}}\n```";
        assert_eq!(call_of(parse(fenced)).name, "now");

        let inline = "Calling `{\"function_call\": {\"name\": \"now\"}}` for you.";
        assert_eq!(call_of(parse(inline)).name, "now");
    }

    #[test]
    fn fenced_truncated_call() {
        let text = "```json\n{\"function_call\": {\"name\": \"now\", \"arguments\": {}}\n```";
        assert_eq!(call_of(parse(text)).name, "now");
    }

    #[test]
    fn call_buried_in_sentence() {
        let text = r#"Let me check. {"function_call": {"name": "now", "arguments": {"tz": "UTC"}}, "response_format": "It is {result}"} One moment."#;
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.call().unwrap().name, "now");
        assert_eq!(parsed.response_format(), None);
    }

    #[test]
    fn pseudo_call_with_json_arguments() {
        let call = call_of(parse(r#"function_call: add({"a": 1, "b": 2})"#));
        assert_eq!(call.name, "add");
        assert_eq!(call.arguments.get("a"), Some(&ArgValue::Integer(1)));
    }

    #[test]
    fn pseudo_call_with_opaque_arguments() {
        let call = call_of(parse("function_call: search(weather in {city})"));
        assert_eq!(call.name, "search");
        assert_eq!(
            call.arguments.get(RAW_INPUT_ARGUMENT),
            Some(&ArgValue::String("weather in {city}".into()))
        );
    }

    #[test]
    fn invalid_arguments_become_input() {
        let call = call_of(parse(
            r#"{"function_call": {"name": "search", "arguments": "weather in Paris"}}"#,
        ));
        assert_eq!(call.arguments.len(), 1);
        assert_eq!(
            call.arguments.get(RAW_INPUT_ARGUMENT),
            Some(&ArgValue::String("weather in Paris".into()))
        );
    }

    #[test]
    fn unrecoverable_call_shape() {
        assert_eq!(parse(r#"{"function_call": {"arguments": {}}} and more"#), None);
    }
}
