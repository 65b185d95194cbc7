//! Model Context Protocol providers (JSON-RPC 2.0).

pub mod http;
pub mod protocol;
pub mod stdio;

pub use http::HttpMcpProvider;
pub use stdio::StdioMcpProvider;
