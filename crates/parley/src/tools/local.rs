//! In-process capability provider.
//!
//! Tools are [`LocalTool`] implementors, most conveniently [`FnTool`]
//! closures with typed arguments. Used by the terminal binary's demo tools
//! and throughout the tests.

use super::provider::{CapabilityProvider, ProviderError};
use super::registry::ToolDescriptor;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`LocalTool::execute`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

/// A tool executed inside the current process.
pub trait LocalTool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    /// Run the tool. `Err` carries a message the model will see.
    fn execute(&self, arguments: serde_json::Value) -> ToolFuture<'_>;

    fn name(&self) -> String {
        self.descriptor().name
    }
}

type ErasedToolHandler = Box<
    dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send>>
        + Send
        + Sync,
>;

/// A closure-based tool that deserializes its arguments into `A`.
///
/// ```ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct WeatherArgs { location: String }
///
/// let tool = FnTool::new(
///     ToolDescriptor::new("get_weather", "Current weather", json_schema_for::<WeatherArgs>()),
///     |args: WeatherArgs| async move { Ok(format!("Sunny in {}", args.location)) },
/// );
/// ```
pub struct FnTool {
    descriptor: ToolDescriptor,
    handler: ErasedToolHandler,
}

impl FnTool {
    pub fn new<A, F, Fut>(descriptor: ToolDescriptor, handler: F) -> Self
    where
        A: serde::de::DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, String>> + Send + 'static,
    {
        let erased = move |raw: serde_json::Value| -> Pin<
            Box<dyn Future<Output = Result<String, String>> + Send>,
        > {
            match serde_json::from_value::<A>(raw) {
                Ok(args) => Box::pin(handler(args)),
                Err(e) => Box::pin(async move { Err(format!("invalid tool arguments: {e}")) }),
            }
        };
        Self {
            descriptor,
            handler: Box::new(erased),
        }
    }
}

impl LocalTool for FnTool {
    fn descriptor(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    fn execute(&self, arguments: serde_json::Value) -> ToolFuture<'_> {
        (self.handler)(arguments)
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.descriptor.name)
            .finish()
    }
}

/// Provider backed by a list of [`LocalTool`]s, advertised in registration
/// order.
#[derive(Default)]
pub struct LocalProvider {
    tools: Vec<Box<dyn LocalTool>>,
}

impl LocalProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any earlier tool with the same name.
    pub fn register(&mut self, tool: impl LocalTool + 'static) {
        let name = tool.name();
        self.tools.retain(|t| t.name() != name);
        self.tools.push(Box::new(tool));
    }

    pub fn with(mut self, tool: impl LocalTool + 'static) -> Self {
        self.register(tool);
        self
    }

    pub fn with_if(self, condition: bool, tool: impl LocalTool + 'static) -> Self {
        if condition { self.with(tool) } else { self }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for LocalProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalProvider")
            .field(
                "tools",
                &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl CapabilityProvider for LocalProvider {
    fn list_tools(&self) -> BoxFuture<'_, Result<Vec<ToolDescriptor>, ProviderError>> {
        let descriptors = self.tools.iter().map(|t| t.descriptor()).collect();
        Box::pin(async move { Ok(descriptors) })
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: serde_json::Value,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(async move {
            let tool = self
                .tools
                .iter()
                .find(|t| t.name() == name)
                .ok_or_else(|| ProviderError::Remote(format!("unknown tool '{name}'")))?;
            tool.execute(arguments).await.map_err(ProviderError::Remote)
        })
    }
}
