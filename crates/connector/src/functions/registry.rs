//! Function groups and lookup.

use super::{Arguments, FunctionDescriptor, FunctionError};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A locally executable function.
///
/// This is the boundary between the connector and side effects.
#[async_trait]
pub trait Function: Send + Sync {
    /// How the function is described to the model.
    fn descriptor(&self) -> &FunctionDescriptor;

    /// Run the function.
    async fn invoke(&self, arguments: &Arguments) -> Result<Value, FunctionError>;
}

type BoxedHandler = Box<
    dyn Fn(Arguments) -> Pin<Box<dyn Future<Output = Result<Value, FunctionError>> + Send>>
        + Send
        + Sync,
>;

/// A function backed by an async closure.
pub struct FnFunction {
    descriptor: FunctionDescriptor,
    handler: BoxedHandler,
}

impl FnFunction {
    pub fn new<F, Fut>(descriptor: FunctionDescriptor, handler: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, FunctionError>> + Send + 'static,
    {
        Self {
            descriptor,
            handler: Box::new(move |args| Box::pin(handler(args))),
        }
    }
}

impl std::fmt::Debug for FnFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnFunction")
            .field("name", &self.descriptor.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Function for FnFunction {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, arguments: &Arguments) -> Result<Value, FunctionError> {
        (self.handler)(arguments.clone()).await
    }
}

/// A named group of functions (a plugin).
#[derive(Clone)]
pub struct FunctionGroup {
    name: String,
    functions: Vec<Arc<dyn Function>>,
}

impl FunctionGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    pub fn with(mut self, function: impl Function + 'static) -> Self {
        self.functions.push(Arc::new(function));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions
            .iter()
            .find(|f| f.descriptor().name == name)
            .cloned()
    }

    /// Descriptors qualified with this group's name.
    pub fn descriptors(&self) -> impl Iterator<Item = FunctionDescriptor> + '_ {
        self.functions
            .iter()
            .map(|f| f.descriptor().clone().in_group(self.name.clone()))
    }
}

impl std::fmt::Debug for FunctionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionGroup")
            .field("name", &self.name)
            .field(
                "functions",
                &self
                    .functions
                    .iter()
                    .map(|f| f.descriptor().name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// All locally registered function groups, in registration order.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    groups: Vec<FunctionGroup>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group. A group with the same name is replaced.
    pub fn register(&mut self, group: FunctionGroup) {
        self.groups.retain(|g| g.name != group.name);
        self.groups.push(group);
    }

    pub fn with_group(mut self, group: FunctionGroup) -> Self {
        self.register(group);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.functions.is_empty())
    }

    /// Every registered function's descriptor.
    pub fn descriptors(&self) -> Vec<FunctionDescriptor> {
        self.groups.iter().flat_map(|g| g.descriptors()).collect()
    }

    /// Look up a function.
    ///
    /// With a group qualifier only that group is searched; otherwise every
    /// group is scanned in order and the first match wins.
    pub fn find(&self, group: Option<&str>, name: &str) -> Option<Arc<dyn Function>> {
        match group {
            Some(group) => self
                .groups
                .iter()
                .find(|g| g.name == group)
                .and_then(|g| g.get(name)),
            None => self.groups.iter().find_map(|g| g.get(name)),
        }
    }
}
