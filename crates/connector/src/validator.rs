//! Validation of recovered calls against the advertised set.

use crate::config::ToolCallingConfig;
use crate::parser::FunctionCall;
use policy::Decision;

/// Check a call against the functions advertised for this request.
///
/// Allowed unconditionally under allow-any; otherwise the call's name must
/// exactly match an advertised plain or qualified name.
pub fn check(call: &FunctionCall, config: &ToolCallingConfig) -> Decision {
    let advertised = config.advertised_names();
    config
        .choice()
        .check(&call.name, advertised.iter().map(String::as_str))
}

pub fn is_valid(call: &FunctionCall, config: &ToolCallingConfig) -> bool {
    check(call, config).is_allowed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{Arguments, FunctionDescriptor};
    use policy::FunctionChoice;

    fn config(allow_any: bool) -> ToolCallingConfig {
        ToolCallingConfig::new(
            FunctionChoice::auto().with_allow_any(allow_any),
            vec![FunctionDescriptor::new("now", "Current time").in_group("time")],
        )
    }

    fn call(name: &str) -> FunctionCall {
        FunctionCall::new(name, Arguments::new())
    }

    #[test]
    fn advertised_names_are_valid() {
        assert!(is_valid(&call("now"), &config(false)));
        assert!(is_valid(&call("time-now"), &config(false)));
    }

    #[test]
    fn unadvertised_name_rejected_unless_allow_any() {
        assert!(!is_valid(&call("shutdown"), &config(false)));
        assert!(is_valid(&call("shutdown"), &config(true)));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(!is_valid(&call("Now"), &config(false)));
        assert!(matches!(check(&call("Now"), &config(false)), Decision::Deny { .. }));
    }
}
