//! System prompt that teaches the model the function-call grammar.

use crate::config::ToolCallingConfig;
use crate::functions::render_definitions;
use crate::model::{Message, Role};
use policy::Behavior;

const CALL_GRAMMAR: &str = r#"When a function is needed, respond with ONLY a JSON object in this exact format:
{"function_call": {"name": "function_name", "arguments": {"parameter": "value"}}}

You may add a "response_format" field next to "function_call" holding the sentence to show the user. Write {result} where the function's return value belongs, for example:
{"function_call": {"name": "function_name", "arguments": {}}, "response_format": "The answer is {result}."}"#;

const NO_CALL_GRAMMAR: &str = r#"When no function is needed, respond with ONLY:
{"function_call": {}, "response_format": "your complete answer"}"#;

const REQUIRED_CALL: &str = "You must call exactly one of the functions above.";

const CLOSING: &str = "Do not write anything outside the JSON object.";

/// The system instructions listing the advertised functions.
pub fn system_instructions(config: &ToolCallingConfig) -> String {
    let mut sections = vec![
        "You have access to the following functions:".to_string(),
        render_definitions(config.tools()),
        CALL_GRAMMAR.to_string(),
    ];
    match config.behavior() {
        Behavior::Required => sections.push(REQUIRED_CALL.to_string()),
        Behavior::Auto | Behavior::None => sections.push(NO_CALL_GRAMMAR.to_string()),
    }
    sections.push(CLOSING.to_string());
    sections.join("\n\n")
}

/// A copy of `history` with the function instructions injected.
///
/// A leading system message is extended; otherwise a new one is prepended.
/// The original history is left untouched.
pub fn augment(history: &[Message], config: &ToolCallingConfig) -> Vec<Message> {
    let instructions = system_instructions(config);
    let mut messages = history.to_vec();

    if messages.first().is_some_and(|m| m.role == Role::System) {
        let merged = format!("{}\n\n{instructions}", messages[0].text());
        messages[0] = Message::system(merged);
    } else {
        messages.insert(0, Message::system(instructions));
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{FunctionDescriptor, ParameterDescriptor, ParameterType, parse_definitions};
    use policy::FunctionChoice;

    fn config(choice: FunctionChoice) -> ToolCallingConfig {
        ToolCallingConfig::new(
            choice,
            vec![
                FunctionDescriptor::new("now", "Current local time").with_parameter(
                    ParameterDescriptor::optional("format", ParameterType::String, "strftime format"),
                ),
            ],
        )
    }

    #[test]
    fn instructions_carry_definitions_and_grammar() {
        let text = system_instructions(&config(FunctionChoice::auto()));
        assert!(text.contains(r#""name": "now""#));
        assert!(text.contains(
            r#"{"function_call": {"name": "function_name", "arguments": {"parameter": "value"}}}"#
        ));
        assert!(text.contains(r#"{"function_call": {}, "response_format": "your complete answer"}"#));
        assert!(text.contains("{result}"));
        assert!(!text.contains(REQUIRED_CALL));
    }

    #[test]
    fn required_behavior_drops_the_no_call_shape() {
        let text = system_instructions(&config(FunctionChoice::required()));
        assert!(text.contains(REQUIRED_CALL));
        assert!(!text.contains("your complete answer"));
    }

    #[test]
    fn definitions_in_prompt_decode_back() {
        let text = system_instructions(&config(FunctionChoice::auto()));
        let block = text
            .split("\n\n")
            .find(|section| section.trim_start().starts_with('{'))
            .unwrap();
        let decoded = parse_definitions(block).unwrap();
        assert_eq!(decoded[0].name, "now");
        assert_eq!(decoded[0].description, "Current local time");
    }

    #[test]
    fn prepends_system_message() {
        let history = vec![Message::user("What time is it?")];
        let augmented = augment(&history, &config(FunctionChoice::auto()));

        assert_eq!(augmented.len(), 2);
        assert_eq!(augmented[0].role, Role::System);
        assert_eq!(augmented[1], history[0]);
    }

    #[test]
    fn extends_existing_system_message() {
        let history = vec![Message::system("Be brief."), Message::user("Time?")];
        let augmented = augment(&history, &config(FunctionChoice::auto()));

        assert_eq!(augmented.len(), 2);
        assert!(augmented[0].text().starts_with("Be brief.\n\nYou have access"));
        assert_eq!(history[0].text(), "Be brief.");
    }
}
