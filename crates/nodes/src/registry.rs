//! Node registry / executable factory — the component that hides the
//! concrete catalog behind a lookup by `node_type` id.
//!
//! Deliberately not a process-wide singleton: built once per process from
//! an explicit registration list and injected into the `Scheduler` that
//! needs it, rather than a global `lazy_static!` map every caller reaches
//! into directly.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::traits::{ExecutableNode, NodeTypeMeta};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("node type not implemented: {0}")]
    UnknownNodeType(String),
}

/// Maps a `node_type` id to its (stateless, shared) implementation.
///
/// Node implementations in this codebase are stateless singletons, so
/// "constructing an executable" for a `NodeSpec` amounts to cloning the
/// `Arc` already built at registration time — `create_executable` still
/// takes the type id (rather than just indexing) so a future catalog with
/// per-node configuration can swap the behaviour in without moving the
/// call site.
pub struct NodeRegistry {
    entries: HashMap<String, Arc<dyn ExecutableNode>>,
}

impl NodeRegistry {
    /// Build a registry from an explicit list — the only mutation point.
    pub fn new(nodes: Vec<Arc<dyn ExecutableNode>>) -> Self {
        let entries = nodes
            .into_iter()
            .map(|node| (node.node_type().id.clone(), node))
            .collect();
        Self { entries }
    }

    pub fn get_node_type(&self, id: &str) -> Result<NodeTypeMeta, RegistryError> {
        self.entries
            .get(id)
            .map(|n| n.node_type())
            .ok_or_else(|| RegistryError::UnknownNodeType(id.to_string()))
    }

    /// Look up the executable for a node type. Returns `None` rather than
    /// erroring — the caller (the node executor) turns a miss into a
    /// per-node `errored` result, not a fatal one.
    pub fn create_executable(&self, node_type: &str) -> Option<Arc<dyn ExecutableNode>> {
        self.entries.get(node_type).cloned()
    }

    pub fn list(&self) -> Vec<NodeTypeMeta> {
        self.entries.values().map(|n| n.node_type()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockNode;
    use serde_json::json;

    #[test]
    fn unknown_type_is_none_not_a_panic() {
        let registry = NodeRegistry::new(vec![]);
        assert!(registry.create_executable("nope").is_none());
        assert!(matches!(
            registry.get_node_type("nope"),
            Err(RegistryError::UnknownNodeType(id)) if id == "nope"
        ));
    }

    #[test]
    fn registered_node_is_found_by_its_type_id() {
        let mock: Arc<dyn ExecutableNode> =
            Arc::new(MockNode::returning("echo", json!({"ok": true})));
        let registry = NodeRegistry::new(vec![mock]);
        assert!(registry.create_executable("echo").is_some());
        assert_eq!(registry.list().len(), 1);
    }
}
