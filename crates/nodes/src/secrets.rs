//! Secrets and integration lookup — credential storage and OAuth token
//! refresh are external concerns, exposed to node implementations only
//! through these two provider traits.

use async_trait::async_trait;
use serde_json::Value;

/// A connected third-party integration (e.g. an OAuth-backed API account)
/// available to a node implementation.
#[derive(Debug, Clone)]
pub struct Integration {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub token: String,
    pub metadata: Option<Value>,
}

#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Look up a secret by name, scoped to the calling node's organization.
    /// Absence is not an error — nodes treat a missing optional secret as
    /// "not configured."
    async fn get_secret(&self, name: &str) -> Option<String>;
}

#[async_trait]
pub trait IntegrationProvider: Send + Sync {
    async fn get_integration(&self, id: &str) -> Option<Integration>;
}

/// A provider with nothing configured; used in tests and for nodes that
/// never look anything up.
#[derive(Default)]
pub struct NoopSecretProvider;

#[async_trait]
impl SecretProvider for NoopSecretProvider {
    async fn get_secret(&self, _name: &str) -> Option<String> {
        None
    }
}

#[async_trait]
impl IntegrationProvider for NoopSecretProvider {
    async fn get_integration(&self, _id: &str) -> Option<Integration> {
        None
    }
}
