//! Ideas, package proposals and the shape check applied to model output.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Caller-supplied seed for one package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub prompt: String,
    pub number_of_functions: usize,
    pub name_prefix: String,
}

impl Idea {
    pub fn new(prompt: &str, number_of_functions: usize, name_prefix: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            number_of_functions,
            name_prefix: name_prefix.to_string(),
        }
    }
}

/// `[[ideas]]` tables of an ideas file
#[derive(Debug, Clone, Deserialize)]
pub struct IdeasFile {
    #[serde(default)]
    pub ideas: Vec<Idea>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub function_name: String,
    pub function_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_data: Option<Value>,
}

impl FunctionDescriptor {
    pub fn new(function_name: &str, function_summary: &str) -> Self {
        Self {
            function_name: function_name.to_string(),
            function_summary: function_summary.to_string(),
            example_data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSchema {
    pub name: String,
    pub description: String,
    pub functions: Vec<FunctionDescriptor>,
}

impl PackageSchema {
    pub fn meta(&self) -> PackageMeta {
        PackageMeta::new(&self.name, &self.description)
    }
}

/// The part of a schema the per-function stages need.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageMeta {
    pub name: String,
    pub description: String,
}

impl PackageMeta {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("response does not match the package schema shape")]
    Shape,
}

/// True only when `value` is an array whose every element has string
/// `name`/`description`, an array `functions`, and every function has
/// string `function_name`/`function_summary`. One bad entry fails the lot.
pub fn validate_packages(value: &Value) -> bool {
    let Some(packages) = value.as_array() else {
        return false;
    };

    packages.iter().all(|package| {
        let has_text = |key: &str| package.get(key).is_some_and(Value::is_string);
        if !has_text("name") || !has_text("description") {
            return false;
        }
        let Some(functions) = package.get("functions").and_then(Value::as_array) else {
            return false;
        };
        functions.iter().all(|func| {
            func.get("function_name").is_some_and(Value::is_string)
                && func.get("function_summary").is_some_and(Value::is_string)
        })
    })
}

/// Remove one wrapping ```json ... ``` fence, if the whole response is fenced.
fn strip_json_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !(trimmed.starts_with("```") && trimmed.ends_with("```")) || trimmed.len() < 6 {
        return trimmed;
    }
    let inner = &trimmed[3..trimmed.len() - 3];
    // drop the info string ("json") on the opening line
    match inner.find('\n') {
        Some(idx) => inner[idx + 1..].trim(),
        None => inner.trim(),
    }
}

/// Parse a completion into package schemas. A lone object is accepted as a
/// one-element list.
pub fn parse_packages(text: &str) -> Result<Vec<PackageSchema>, SchemaError> {
    let mut value: Value = serde_json::from_str(strip_json_fence(text))?;
    if value.is_object() {
        value = Value::Array(vec![value]);
    }
    if !validate_packages(&value) {
        return Err(SchemaError::Shape);
    }
    Ok(serde_json::from_value(value)?)
}
