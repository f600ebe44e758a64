use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::CompletionError;
use crate::provider::{ProviderAdapter, registered_factories};
use crate::stream::StreamEventStream;
use crate::types::Request;

/// Provider-indexed completion client.
///
/// Requests carry an optional provider name; otherwise the default (first
/// registered) provider handles them.
#[derive(Clone, Default)]
pub struct Client {
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
    default_provider: Option<String>,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(provider: Arc<dyn ProviderAdapter>) -> Self {
        let mut client = Self::default();
        client.register_provider(provider);
        client
    }

    pub fn register_provider(&mut self, provider: Arc<dyn ProviderAdapter>) {
        let name = provider.name().to_string();
        if self.default_provider.is_none() {
            self.default_provider = Some(name.clone());
        }
        self.providers.insert(name, provider);
    }

    pub fn set_default_provider(&mut self, provider: impl Into<String>) {
        self.default_provider = Some(provider.into());
    }

    /// Build a client from every factory that finds its environment
    /// variables set.
    pub fn from_env() -> Result<Self, CompletionError> {
        let mut client = Self::default();
        for factory in registered_factories() {
            if let Some(adapter) = factory.from_env() {
                client.register_provider(adapter);
            }
        }
        Ok(client)
    }

    pub async fn stream(&self, request: Request) -> Result<StreamEventStream, CompletionError> {
        let adapter = self.resolve_adapter(&request)?;
        adapter.stream(request).await
    }

    fn resolve_adapter(&self, request: &Request) -> Result<Arc<dyn ProviderAdapter>, CompletionError> {
        let name = request
            .provider
            .as_deref()
            .or(self.default_provider.as_deref())
            .ok_or_else(|| CompletionError::Configuration("no provider configured".to_string()))?;
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| {
                CompletionError::Configuration(format!("provider '{name}' is not registered"))
            })
    }
}
