//! Demo functions registered by the binary.

use chrono::Local;
use connector::{
    ArgValue, FnFunction, FunctionDescriptor, FunctionError, FunctionGroup, FunctionRegistry,
    ParameterDescriptor, ParameterType,
};
use serde_json::json;
use std::fmt::Write;

const DEFAULT_TIME_FORMAT: &str = "%H:%M";

pub fn registry() -> FunctionRegistry {
    FunctionRegistry::new()
        .with_group(time())
        .with_group(math())
}

fn time() -> FunctionGroup {
    FunctionGroup::new("time").with(FnFunction::new(
        FunctionDescriptor::new("now", "Get the current local date and time").with_parameter(
            ParameterDescriptor::optional(
                "format",
                ParameterType::String,
                "strftime format, defaults to %H:%M",
            ),
        ),
        |args| async move {
            let format = args
                .get("format")
                .and_then(ArgValue::as_str)
                .unwrap_or(DEFAULT_TIME_FORMAT)
                .to_string();
            let mut now = String::new();
            write!(now, "{}", Local::now().format(&format))
                .map_err(|_| FunctionError::invalid_argument("format", "not a strftime format"))?;
            Ok(json!(now))
        },
    ))
}

fn math() -> FunctionGroup {
    FunctionGroup::new("math").with(FnFunction::new(
        FunctionDescriptor::new("add", "Add two numbers")
            .with_parameter(ParameterDescriptor::required("a", ParameterType::Number, "first addend"))
            .with_parameter(ParameterDescriptor::required("b", ParameterType::Number, "second addend")),
        |args| async move {
            let sum = args.require_f64("a")? + args.require_f64("b")?;
            if sum.fract() == 0.0 && sum.abs() < i64::MAX as f64 {
                Ok(json!(sum as i64))
            } else {
                Ok(json!(sum))
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector::{Arguments, Function};

    #[tokio::test]
    async fn add_sums_numbers() {
        let registry = registry();
        let add = registry.find(Some("math"), "add").unwrap();

        let args = Arguments::from_text(r#"{"a": 2, "b": "3"}"#);
        assert_eq!(add.invoke(&args).await.unwrap(), json!(5));

        let args = Arguments::from_text(r#"{"a": 0.5, "b": 1}"#);
        assert_eq!(add.invoke(&args).await.unwrap(), json!(1.5));

        assert!(add.invoke(&Arguments::new()).await.is_err());
    }

    #[tokio::test]
    async fn now_honours_format() {
        let now = registry().find(None, "now").unwrap();
        let args = Arguments::from_text(r#"{"format": "%Y"}"#);
        let year = now.invoke(&args).await.unwrap();
        assert_eq!(year.as_str().unwrap().len(), 4);

        let args = Arguments::from_text(r#"{"format": "%Q"}"#);
        assert!(now.invoke(&args).await.is_err());
    }
}
