//! The node execution contract: `NodeContext` and `ExecutableNode`.
//!
//! Defined in `nodes` so both `engine` and individual node implementations
//! can import it without `engine` ever needing to depend back on a
//! concrete node catalog.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NodeError;
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::secrets::{Integration, IntegrationProvider, SecretProvider};
use crate::value::{BinaryValue, BlobReference, NodeRuntimeValues, ParameterSpec};

/// Whether the runtime is being exercised in development (credit checks
/// bypassed) or serving real traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    Dev,
    Prod,
}

/// Progress callback a node may invoke with a value in `0.0..=1.0`.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Everything a node implementation's `execute` sees.
pub struct NodeContext {
    pub node_id: String,
    pub workflow_id: String,
    pub organization_id: String,
    pub execution_id: String,
    pub mode: RuntimeMode,
    pub inputs: NodeRuntimeValues,
    /// Provider-defined environment bag (feature flags, base URLs, ...).
    pub env: Value,
    pub object_store: Arc<dyn ObjectStore>,
    secret_provider: Arc<dyn SecretProvider>,
    integration_provider: Arc<dyn IntegrationProvider>,
    pub on_progress: Option<ProgressFn>,
}

impl NodeContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node_id: impl Into<String>,
        workflow_id: impl Into<String>,
        organization_id: impl Into<String>,
        execution_id: impl Into<String>,
        mode: RuntimeMode,
        inputs: NodeRuntimeValues,
        env: Value,
        object_store: Arc<dyn ObjectStore>,
        secret_provider: Arc<dyn SecretProvider>,
        integration_provider: Arc<dyn IntegrationProvider>,
        on_progress: Option<ProgressFn>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            workflow_id: workflow_id.into(),
            organization_id: organization_id.into(),
            execution_id: execution_id.into(),
            mode,
            inputs,
            env,
            object_store,
            secret_provider,
            integration_provider,
            on_progress,
        }
    }

    pub async fn get_secret(&self, name: &str) -> Option<String> {
        self.secret_provider.get_secret(name).await
    }

    pub async fn get_integration(&self, id: &str) -> Option<Integration> {
        self.integration_provider.get_integration(id).await
    }

    pub fn report_progress(&self, fraction: f64) {
        if let Some(cb) = &self.on_progress {
            cb(fraction.clamp(0.0, 1.0));
        }
    }

    /// Resolve a [`BlobReference`] carried in `inputs` into the actual bytes
    /// a node implementation needs to work with. Never reaches for the
    /// object store directly against a raw id — always through a reference
    /// the marshaler or an upstream node produced.
    pub async fn read_blob(&self, reference: &BlobReference) -> Result<BinaryValue, ObjectStoreError> {
        let object = self.object_store.read(reference.id).await?;
        Ok(BinaryValue {
            data: object.data,
            mime_type: object.metadata.mime_type,
            filename: object.metadata.filename,
        })
    }
}

/// What a node implementation returns on success: its outputs plus the
/// compute usage it consumed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeOutcome {
    pub outputs: NodeRuntimeValues,
    pub usage: u64,
}

/// Static metadata describing a node type, as the registry needs it.
#[derive(Debug, Clone)]
pub struct NodeTypeMeta {
    pub id: String,
    pub inputs: Vec<ParameterSpec>,
    pub outputs: Vec<ParameterSpec>,
    /// Declared compute cost, used for credit pre-check estimation.
    pub usage: u64,
    pub tags: Vec<String>,
    pub documentation: Option<String>,
    /// Nodes flagged `subscription_only` are rejected unless the caller
    /// has an active subscription, checked before the node ever runs.
    pub subscription_only: bool,
}

/// The core node trait. All built-in nodes and any future plugin catalog
/// must implement this.
#[async_trait]
pub trait ExecutableNode: Send + Sync {
    /// Static metadata for this node type (used by the registry and by the
    /// scheduler's credit pre-check).
    fn node_type(&self) -> NodeTypeMeta;

    /// Execute the node. `NodeError::Retryable` may be retried by the step
    /// runner transparently; `NodeError::Fatal` never is.
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutcome, NodeError>;
}
