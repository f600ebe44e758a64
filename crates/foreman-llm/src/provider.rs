//! Provider adapter contract and environment-based bootstrapping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;

use crate::errors::CompletionError;
use crate::stream::StreamEventStream;
use crate::types::Request;

/// One completion-service backend. Adapters must support streaming with
/// tool-call fragments; assistant-prefix continuation is expressed through
/// the request itself.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn stream(&self, request: Request) -> Result<StreamEventStream, CompletionError>;
}

/// Builds an adapter from environment variables, if configured.
pub trait ProviderFactory: Send + Sync {
    fn provider_id(&self) -> &'static str;
    fn from_env(&self) -> Option<Arc<dyn ProviderAdapter>>;
}

static FACTORIES: OnceLock<Mutex<HashMap<&'static str, Arc<dyn ProviderFactory>>>> =
    OnceLock::new();

fn factories() -> &'static Mutex<HashMap<&'static str, Arc<dyn ProviderFactory>>> {
    FACTORIES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Register a factory for [`crate::Client::from_env`]. Adapter modules call
/// this during initialization.
pub fn register_provider_factory(factory: Arc<dyn ProviderFactory>) {
    let mut registry = factories().lock().expect("provider factory registry");
    registry.insert(factory.provider_id(), factory);
}

pub fn registered_factories() -> Vec<Arc<dyn ProviderFactory>> {
    let registry = factories().lock().expect("provider factory registry");
    registry.values().cloned().collect()
}
