//! Function-choice configuration and enforcement.

use crate::{Behavior, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Function-choice settings, usually embedded in execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionChoice {
    /// Whether functions are advertised and how strongly.
    #[serde(default)]
    pub behavior: Behavior,

    /// Invoke a detected call without asking the caller first.
    #[serde(default = "default_auto_invoke")]
    pub auto_invoke: bool,

    /// Accept calls to registered functions that were never advertised.
    #[serde(default)]
    pub allow_any: bool,

    /// Names (plain or `group-name`) to advertise. Empty means all.
    #[serde(default)]
    pub functions: Vec<String>,

    /// Invocation options forwarded to the function-calling layer.
    #[serde(default)]
    pub options: InvocationOptions,
}

/// Options governing how detected calls are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationOptions {
    /// Functions may run concurrently with each other.
    #[serde(default)]
    pub allow_concurrent_invocation: bool,

    /// The model may request more than one call per response.
    #[serde(default)]
    pub allow_parallel_calls: bool,
}

fn default_auto_invoke() -> bool {
    true
}

impl Default for FunctionChoice {
    fn default() -> Self {
        Self::auto()
    }
}

/// Result of checking a call against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl FunctionChoice {
    /// Load function-choice settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse function-choice settings from a TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        let choice: Self = toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))?;
        choice.validate()?;
        Ok(choice)
    }

    /// Advertise every function and auto-invoke calls.
    pub fn auto() -> Self {
        Self {
            behavior: Behavior::Auto,
            auto_invoke: true,
            allow_any: false,
            functions: Vec::new(),
            options: InvocationOptions::default(),
        }
    }

    /// Require the model to call one of the advertised functions.
    pub fn required() -> Self {
        Self {
            behavior: Behavior::Required,
            ..Self::auto()
        }
    }

    /// Advertise nothing.
    pub fn none() -> Self {
        Self {
            behavior: Behavior::None,
            auto_invoke: false,
            ..Self::auto()
        }
    }

    /// Restrict advertisement to the given names.
    pub fn with_functions(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.functions = names.into_iter().map(Into::into).collect();
        self
    }

    /// Accept calls to any registered function.
    pub fn with_allow_any(mut self, allow_any: bool) -> Self {
        self.allow_any = allow_any;
        self
    }

    /// Reject configurations that can never do anything useful.
    pub fn validate(&self) -> Result<()> {
        if self.behavior == Behavior::None && !self.functions.is_empty() {
            return Err(Error::Invalid(
                "functions are listed but behavior is \"none\"".to_string(),
            ));
        }
        if self.functions.iter().any(|name| name.trim().is_empty()) {
            return Err(Error::Invalid("empty function name".to_string()));
        }
        Ok(())
    }

    /// Whether a registered function should be advertised.
    ///
    /// `qualified` is the `group-name` form when the function belongs to a
    /// group.
    pub fn selects(&self, name: &str, qualified: Option<&str>) -> bool {
        if !self.behavior.advertises() {
            return false;
        }
        if self.functions.is_empty() {
            return true;
        }
        self.functions
            .iter()
            .any(|wanted| wanted == name || Some(wanted.as_str()) == qualified)
    }

    /// Check a requested call against the advertised names.
    ///
    /// Matching is exact and case-sensitive.
    pub fn check<'a>(
        &self,
        name: &str,
        advertised: impl IntoIterator<Item = &'a str>,
    ) -> Decision {
        if self.allow_any {
            return Decision::Allow;
        }

        if advertised.into_iter().any(|candidate| candidate == name) {
            Decision::Allow
        } else {
            Decision::Deny {
                reason: format!("function {name} was not advertised"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_rejects_unadvertised() {
        let choice = FunctionChoice::auto();
        let decision = choice.check("delete_files", ["now", "add"]);
        assert!(!decision.is_allowed());
        assert_eq!(
            decision,
            Decision::Deny {
                reason: "function delete_files was not advertised".to_string()
            }
        );
    }

    #[test]
    fn test_check_is_case_sensitive() {
        let choice = FunctionChoice::auto();
        assert!(choice.check("now", ["now"]).is_allowed());
        assert!(!choice.check("Now", ["now"]).is_allowed());
    }

    #[test]
    fn test_allow_any_bypasses_advertised_set() {
        let choice = FunctionChoice::auto().with_allow_any(true);
        assert!(choice.check("delete_files", std::iter::empty()).is_allowed());
    }

    #[test]
    fn test_selects_by_plain_or_qualified_name() {
        let choice = FunctionChoice::auto().with_functions(["time-now", "add"]);
        assert!(choice.selects("now", Some("time-now")));
        assert!(choice.selects("add", Some("math-add")));
        assert!(!choice.selects("now", Some("clock-now")));

        assert!(FunctionChoice::auto().selects("anything", None));
        assert!(!FunctionChoice::none().selects("anything", None));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
behavior = "required"
allow_any = true
functions = ["time-now"]

[options]
allow_concurrent_invocation = true
"#;
        let choice = FunctionChoice::parse(toml).unwrap();

        assert_eq!(choice.behavior, Behavior::Required);
        assert!(choice.auto_invoke);
        assert!(choice.allow_any);
        assert_eq!(choice.functions, vec!["time-now".to_string()]);
        assert!(choice.options.allow_concurrent_invocation);
        assert!(!choice.options.allow_parallel_calls);
    }

    #[test]
    fn test_parse_empty_document_uses_defaults() {
        let choice = FunctionChoice::parse("").unwrap();
        assert_eq!(choice, FunctionChoice::auto());
    }

    #[test]
    fn test_parse_rejects_functions_with_behavior_none() {
        let toml = r#"
behavior = "none"
functions = ["now"]
"#;
        assert!(matches!(
            FunctionChoice::parse(toml),
            Err(Error::Invalid(_))
        ));
    }

    #[test]
    fn test_round_trips_through_json() {
        let choice = FunctionChoice::required().with_functions(["add"]);
        let json = serde_json::to_string(&choice).unwrap();
        let back: FunctionChoice = serde_json::from_str(&json).unwrap();
        assert_eq!(back, choice);
    }
}
