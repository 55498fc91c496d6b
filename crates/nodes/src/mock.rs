//! `MockNode` — a test double for `ExecutableNode`.
//!
//! Useful in unit and integration tests where a real node implementation is
//! either unavailable or irrelevant.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::NodeError;
use crate::traits::{ExecutableNode, NodeContext, NodeOutcome, NodeTypeMeta};
use crate::value::{NodeRuntimeValues, ParameterValue, RuntimeValue};

/// Behaviour injected into `MockNode` at construction time.
pub enum MockBehaviour {
    /// Return the given output values.
    ReturnValues(NodeRuntimeValues),
    /// Fail with a `Retryable` error.
    FailRetryable(String),
    /// Fail with a `Fatal` error.
    FailFatal(String),
}

/// A mock node that records every call it receives and returns a
/// programmer-specified result.
pub struct MockNode {
    /// Label used in test assertions and as the node's registry type id.
    pub name: String,
    pub behaviour: MockBehaviour,
    pub usage: u64,
    pub subscription_only: bool,
    /// All inputs seen by this node (in call order).
    pub calls: Arc<Mutex<Vec<NodeRuntimeValues>>>,
}

impl MockNode {
    /// Create a mock that always succeeds, converting a plain JSON object
    /// into the equivalent single-valued outputs.
    pub fn returning(name: impl Into<String>, value: serde_json::Value) -> Self {
        let mut outputs = NodeRuntimeValues::new();
        if let serde_json::Value::Object(map) = value {
            for (k, v) in map {
                outputs.insert(k, ParameterValue::Single(json_to_runtime(v)));
            }
        }
        Self {
            name: name.into(),
            behaviour: MockBehaviour::ReturnValues(outputs),
            usage: 0,
            subscription_only: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock with precise `NodeRuntimeValues` outputs and a declared
    /// usage cost — needed for credit-accounting and fan-in tests.
    pub fn returning_outputs(name: impl Into<String>, outputs: NodeRuntimeValues, usage: u64) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::ReturnValues(outputs),
            usage,
            subscription_only: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always fails with a `Fatal` error.
    pub fn failing_fatal(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::FailFatal(msg.into()),
            usage: 0,
            subscription_only: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always fails with a `Retryable` error.
    pub fn failing_retryable(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::FailRetryable(msg.into()),
            usage: 0,
            subscription_only: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Mark this mock as subscription-gated, for exercising the executor's
    /// credit gate in tests.
    pub fn with_subscription_only(mut self) -> Self {
        self.subscription_only = true;
        self
    }

    /// Number of times this node has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn json_to_runtime(v: serde_json::Value) -> RuntimeValue {
    match v {
        serde_json::Value::String(s) => RuntimeValue::String(s),
        serde_json::Value::Number(n) => RuntimeValue::Number(n.as_f64().unwrap_or_default()),
        serde_json::Value::Bool(b) => RuntimeValue::Boolean(b),
        serde_json::Value::Array(a) => {
            RuntimeValue::Array(a.into_iter().map(json_to_runtime).collect())
        }
        serde_json::Value::Object(map) => RuntimeValue::Object(map),
        serde_json::Value::Null => RuntimeValue::Object(serde_json::Map::new()),
    }
}

#[async_trait]
impl ExecutableNode for MockNode {
    fn node_type(&self) -> NodeTypeMeta {
        NodeTypeMeta {
            id: self.name.clone(),
            inputs: vec![],
            outputs: vec![],
            usage: self.usage,
            tags: vec!["mock".into()],
            documentation: None,
            subscription_only: self.subscription_only,
        }
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutcome, NodeError> {
        self.calls.lock().unwrap().push(ctx.inputs.clone());

        match &self.behaviour {
            MockBehaviour::ReturnValues(outputs) => Ok(NodeOutcome {
                outputs: outputs.clone(),
                usage: self.usage,
            }),
            MockBehaviour::FailRetryable(msg) => Err(NodeError::Retryable(msg.clone())),
            MockBehaviour::FailFatal(msg) => Err(NodeError::Fatal(msg.clone())),
        }
    }
}
