//! Cached catalog of the tools exposed by the connected capability provider.

use crate::ToolDef;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Name, description and argument schema of one provider tool.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_input_schema")]
    pub input_schema: serde_json::Value,
}

pub(crate) fn default_input_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Function-calling definition sent to the model.
    pub fn to_tool_def(&self) -> ToolDef {
        ToolDef::new(&self.name, &self.description, self.input_schema.clone())
    }
}

impl From<ToolDef> for ToolDescriptor {
    fn from(def: ToolDef) -> Self {
        Self::new(def.function.name, def.function.description, def.function.parameters)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown tool '{0}'")]
    NotFound(String),
}

/// Registry of tool descriptors in provider order.
///
/// Populated once per provider connection and cleared on disconnect. Reads
/// never block each other.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: RwLock<Vec<ToolDescriptor>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the catalog. The first descriptor wins when a provider
    /// advertises the same name twice.
    pub fn populate(&self, descriptors: Vec<ToolDescriptor>) {
        let mut unique: Vec<ToolDescriptor> = Vec::with_capacity(descriptors.len());
        for d in descriptors {
            if unique.iter().any(|u| u.name == d.name) {
                warn!("Provider advertised tool '{}' twice, keeping the first", d.name);
                continue;
            }
            unique.push(d);
        }
        debug!("Tool registry populated with {} tool(s)", unique.len());
        *self.tools.write().unwrap_or_else(PoisonError::into_inner) = unique;
    }

    pub fn clear(&self) {
        self.tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// All descriptors in provider order.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn describe(&self, name: &str) -> Result<ToolDescriptor, RegistryError> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|d| d.name == name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Function-calling definitions for every registered tool.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(ToolDescriptor::to_tool_def)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
