//! Function-choice policy.
//!
//! Decides which locally registered functions a model may see and call for
//! a single request. The policy is plain data (loadable from TOML) plus one
//! pure check: a call is allowed only if its name was advertised, unless the
//! policy explicitly allows any function.
//!
//! ```
//! use policy::{Behavior, FunctionChoice};
//!
//! let choice = FunctionChoice::parse(r#"
//! behavior = "auto"
//! functions = ["time-now"]
//! "#)?;
//!
//! assert_eq!(choice.behavior, Behavior::Auto);
//! assert!(choice.check("now", ["now"]).is_allowed());
//! assert!(!choice.check("shutdown", ["now"]).is_allowed());
//! # Ok::<(), policy::Error>(())
//! ```

mod behavior;
mod choice;
mod error;

pub use behavior::Behavior;
pub use choice::{Decision, FunctionChoice, InvocationOptions};
pub use error::{Error, Result};
