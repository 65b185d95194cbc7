//! Explicit provider connection state shared by every turn.

use super::provider::{CapabilityProvider, ProviderError};
use super::registry::{ToolDescriptor, ToolRegistry};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// The connected capability provider plus the registry of its tools.
///
/// Held in an `Arc` by the gateway and borrowed by orchestrators. Connecting
/// a new provider replaces the previous one.
#[derive(Default)]
pub struct ProviderSession {
    registry: ToolRegistry,
    provider: RwLock<Option<Arc<dyn CapabilityProvider>>>,
}

impl ProviderSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// List the provider's tools, populate the registry and make it the
    /// active provider. Returns the advertised tools.
    ///
    /// On failure the previous connection (if any) stays in place.
    pub async fn connect(
        &self,
        provider: Arc<dyn CapabilityProvider>,
    ) -> Result<Vec<ToolDescriptor>, ProviderError> {
        let tools = provider.list_tools().await?;
        let previous = {
            // Registry and provider change together under the provider lock.
            let mut active = self.provider.write().unwrap_or_else(PoisonError::into_inner);
            self.registry.populate(tools);
            active.replace(provider)
        };
        if let Some(previous) = previous
            && let Err(e) = previous.shutdown().await
        {
            warn!("Failed to shut down previous provider: {e}");
        }
        let tools = self.registry.list();
        info!(
            "Provider connected with {} tool(s): {}",
            tools.len(),
            tools
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(tools)
    }

    /// Shut the provider down and clear the registry. A no-op when nothing is
    /// connected.
    pub async fn disconnect(&self) -> Result<(), ProviderError> {
        let previous = {
            let mut active = self.provider.write().unwrap_or_else(PoisonError::into_inner);
            self.registry.clear();
            active.take()
        };
        if let Some(previous) = previous {
            previous.shutdown().await?;
            info!("Provider disconnected");
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.provider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The active provider, if any.
    pub fn provider(&self) -> Option<Arc<dyn CapabilityProvider>> {
        self.provider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

impl std::fmt::Debug for ProviderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSession")
            .field("connected", &self.is_connected())
            .field("tools", &self.registry.len())
            .finish()
    }
}
