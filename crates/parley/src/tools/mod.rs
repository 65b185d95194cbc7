//! Tools: the registry of what the model may call, the providers that run
//! the calls, and the invoker in between.
//!
//! - [`registry`]: [`ToolRegistry`] and [`ToolDescriptor`].
//! - [`provider`]: the [`CapabilityProvider`] trait and [`ProviderSpec`].
//! - [`local`]: in-process [`LocalProvider`] with closure-based [`FnTool`]s.
//! - [`mcp`]: JSON-RPC providers over stdio and HTTP.
//! - [`session`]: [`ProviderSession`], the connect/disconnect lifecycle.
//! - [`invoker`]: [`CapabilityInvoker`], turning a `ToolCall` into a `ToolResult`.

pub mod invoker;
pub mod local;
pub mod mcp;
pub mod provider;
pub mod registry;
pub mod session;

pub use invoker::{CapabilityInvoker, InvokerConfig};
pub use local::{FnTool, LocalProvider, LocalTool};
pub use mcp::{HttpMcpProvider, StdioMcpProvider};
pub use provider::{CapabilityProvider, ProviderError, ProviderSpec};
pub use registry::{RegistryError, ToolDescriptor, ToolRegistry};
pub use session::ProviderSession;
