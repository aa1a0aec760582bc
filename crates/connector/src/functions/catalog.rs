//! Function descriptors and their model-facing definitions.
//!
//! A [`FunctionDescriptor`] renders to a JSON definition (name, description,
//! JSON-schema parameters) that is embedded verbatim in the prompt, and the
//! same definition decodes back into a descriptor.

use super::CatalogError;
use crate::model::ToolSpec;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Separator between group and function name in a qualified name.
pub const QUALIFIER_SEPARATOR: char = '-';

/// Semantic type of a parameter or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParameterType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    fn parse(tag: &str) -> Result<Self, CatalogError> {
        match tag {
            "string" => Ok(Self::String),
            "integer" => Ok(Self::Integer),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            "array" => Ok(Self::Array),
            "object" => Ok(Self::Object),
            other => Err(CatalogError::UnknownType(other.to_string())),
        }
    }
}

/// A single function parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ParameterType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterDescriptor {
    pub fn required(
        name: impl Into<String>,
        kind: ParameterType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: true,
            default: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        kind: ParameterType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    fn schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), Value::from(self.kind.as_str()));
        if !self.description.is_empty() {
            schema.insert("description".into(), Value::from(self.description.clone()));
        }
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }
        Value::Object(schema)
    }
}

/// What a function returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnDescriptor {
    #[serde(rename = "type")]
    pub kind: ParameterType,
    pub description: String,
}

/// A locally available function as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    /// Group (plugin) the function belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<ReturnDescriptor>,
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            plugin: None,
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            returns: None,
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_returns(mut self, kind: ParameterType, description: impl Into<String>) -> Self {
        self.returns = Some(ReturnDescriptor {
            kind,
            description: description.into(),
        });
        self
    }

    /// Place the function in a group.
    pub fn in_group(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    /// `group-name` when grouped, the bare name otherwise.
    pub fn qualified_name(&self) -> String {
        match &self.plugin {
            Some(plugin) => format!("{plugin}{QUALIFIER_SEPARATOR}{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Names a call may use to refer to this function.
    pub fn names(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.name.clone()).chain(self.plugin.as_ref().map(|_| self.qualified_name()))
    }

    /// Names of all required parameters, in declaration order.
    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// JSON schema of the parameter object.
    pub fn parameters_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.schema()))
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_parameters(),
        })
    }

    /// The definition embedded in the prompt.
    pub fn to_definition(&self) -> Value {
        let mut definition = Map::new();
        definition.insert("name".into(), Value::from(self.name.clone()));
        if let Some(plugin) = &self.plugin {
            definition.insert("plugin".into(), Value::from(plugin.clone()));
        }
        definition.insert("description".into(), Value::from(self.description.clone()));
        definition.insert("parameters".into(), self.parameters_schema());
        if let Some(returns) = &self.returns {
            definition.insert(
                "returns".into(),
                json!({ "type": returns.kind.as_str(), "description": returns.description }),
            );
        }
        Value::Object(definition)
    }

    /// Decode a definition produced by [`FunctionDescriptor::to_definition`].
    pub fn from_definition(definition: &Value) -> Result<Self, CatalogError> {
        let object = definition.as_object().ok_or(CatalogError::NotAnObject)?;

        let name = string_field(object, "name")?;
        let description = object
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let plugin = object
            .get("plugin")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut parameters = Vec::new();
        if let Some(schema) = object.get("parameters") {
            let schema = schema.as_object().ok_or(CatalogError::Field("parameters"))?;
            let required: Vec<&str> = schema
                .get("required")
                .and_then(Value::as_array)
                .map(|names| names.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();

            if let Some(properties) = schema.get("properties") {
                let properties = properties
                    .as_object()
                    .ok_or(CatalogError::Field("properties"))?;
                for (param_name, property) in properties {
                    let kind = property
                        .get("type")
                        .and_then(Value::as_str)
                        .ok_or(CatalogError::Field("type"))
                        .and_then(ParameterType::parse)?;
                    parameters.push(ParameterDescriptor {
                        name: param_name.clone(),
                        description: property
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        kind,
                        required: required.contains(&param_name.as_str()),
                        default: property.get("default").cloned(),
                    });
                }
            }
        }

        let returns = match object.get("returns") {
            Some(returns) => {
                let kind = returns
                    .get("type")
                    .and_then(Value::as_str)
                    .ok_or(CatalogError::Field("returns"))
                    .and_then(ParameterType::parse)?;
                Some(ReturnDescriptor {
                    kind,
                    description: returns
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
            }
            None => None,
        };

        Ok(Self {
            plugin,
            name,
            description,
            parameters,
            returns,
        })
    }

    /// The native tool spec for backends with structured function calling.
    pub fn to_tool_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            schema: self.parameters_schema(),
        }
    }
}

fn string_field(object: &Map<String, Value>, field: &'static str) -> Result<String, CatalogError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(CatalogError::Field(field))
}

/// Render descriptors as the function-definition block of a prompt.
///
/// One pretty-printed JSON definition per function, separated by blank lines.
pub fn render_definitions(descriptors: &[FunctionDescriptor]) -> String {
    descriptors
        .iter()
        .map(|d| {
            serde_json::to_string_pretty(&d.to_definition()).unwrap_or_else(|_| d.name.clone())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Decode a block produced by [`render_definitions`].
pub fn parse_definitions(block: &str) -> Result<Vec<FunctionDescriptor>, CatalogError> {
    serde_json::Deserializer::from_str(block)
        .into_iter::<Value>()
        .map(|value| {
            value
                .map_err(|_| CatalogError::NotAnObject)
                .and_then(|v| FunctionDescriptor::from_definition(&v))
        })
        .collect()
}
