//! Core domain models for the workflow graph.
//!
//! These types are the source of truth for what a workflow looks like in
//! memory. They can be serialised to/from the JSONB `definition` column of
//! the `workflows` table (see the `db` crate).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nodes::value::{NodeRuntimeValues, ParameterSpec};

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// How a workflow is started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Triggered manually via the REST API.
    Manual,
    /// Triggered by an incoming HTTP request to `/webhook/{path}`.
    Http { path: String },
    /// Triggered by an inbound email to `address`.
    Email { address: String },
    /// Triggered on a cron schedule.
    Cron {
        /// Standard cron expression (5 fields).
        expression: String,
    },
}

// ---------------------------------------------------------------------------
// NodeSpec
// ---------------------------------------------------------------------------

/// A single step in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique identifier within this workflow (referenced by edges).
    pub id: String,
    /// Maps to a registered `ExecutableNode` implementation.
    pub node_type: String,
    /// Declared input parameters.
    pub inputs: Vec<ParameterSpec>,
    /// Declared output parameters.
    pub outputs: Vec<ParameterSpec>,
    /// Literal values bound to inputs that have no inbound edge.
    #[serde(default)]
    pub literals: NodeRuntimeValues,
}

impl NodeSpec {
    pub fn input(&self, name: &str) -> Option<&ParameterSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&ParameterSpec> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed edge carrying one named output of the source node into one
/// named input of the target node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub source_output: String,
    pub target: String,
    pub target_input: String,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A complete, immutable workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub handle: String,
    pub name: String,
    pub trigger: Trigger,
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<Edge>,
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    /// Convenience constructor for testing.
    pub fn new(
        handle: impl Into<String>,
        name: impl Into<String>,
        trigger: Trigger,
        nodes: Vec<NodeSpec>,
        edges: Vec<Edge>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            handle: handle.into(),
            name: name.into(),
            trigger,
            nodes,
            edges,
            created_at: Utc::now(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Inbound edges for a given target node, in declaration order — the
    /// order that determines fan-in sequence position.
    pub fn inbound_edges<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == target)
    }
}
