//! Locally registered functions: descriptors, arguments and lookup.

mod arguments;
mod catalog;
mod errors;
mod registry;

pub use arguments::{ArgValue, Arguments, RAW_INPUT_ARGUMENT};
pub use catalog::{
    FunctionDescriptor, ParameterDescriptor, ParameterType, QUALIFIER_SEPARATOR,
    ReturnDescriptor, parse_definitions, render_definitions,
};
pub use errors::{CatalogError, FunctionError};
pub use registry::{FnFunction, Function, FunctionGroup, FunctionRegistry};
