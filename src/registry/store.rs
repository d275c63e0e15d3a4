use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::rpc::registry::ServiceEndpoint;

/// Name to endpoint mapping owned by the registry. Lives as long as the
/// registry process; nothing is persisted.
#[derive(Debug, Default)]
pub struct Store {
    services: RwLock<HashMap<String, ServiceEndpoint>>,
}

impl Store {
    pub fn new() -> Self {
        let services = RwLock::new(HashMap::new());
        Store { services }
    }

    /// Replaces any endpoint already registered under `name` and returns it.
    pub async fn put(&self, name: &str, endpoint: ServiceEndpoint) -> Option<ServiceEndpoint> {
        let mut services = self.services.write().await;
        (*services).insert(name.to_owned(), endpoint)
    }

    pub async fn get(&self, name: &str) -> Option<ServiceEndpoint> {
        let services = self.services.read().await;
        (*services).get(name).cloned()
    }

    /// Point-in-time copy of every registration.
    pub async fn list(&self) -> HashMap<String, ServiceEndpoint> {
        let services = self.services.read().await;
        (*services).clone()
    }

    pub async fn len(&self) -> usize {
        self.services.read().await.len()
    }
}
