//! A small demonstration catalog — enough to express an end-to-end
//! arithmetic scenario (`num1 -> add -> mult`), a conditional branch, and
//! a blob round-trip through the object store. The full HTTP/AI/image/geo
//! catalog is out of scope; this exists so the engine has something real
//! to execute in its own tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::NodeError;
use crate::object_store::{ObjectStore, PutObject};
use crate::traits::{ExecutableNode, NodeContext, NodeOutcome, NodeTypeMeta};
use crate::value::{NodeRuntimeValues, ParameterSpec, ParameterValue, RuntimeValue, SemanticType};

/// The registration list `NodeRegistry::new` expects — every node type a
/// fresh process knows about out of the box. `api`/`cli` both build their
/// registry from this rather than hand-listing the catalog at each call
/// site.
pub fn catalog() -> Vec<Arc<dyn ExecutableNode>> {
    vec![
        Arc::new(ConstNumberNode),
        Arc::new(AddNode),
        Arc::new(MultiplyNode),
        Arc::new(BranchNode),
        Arc::new(MakeBlobNode),
        Arc::new(ReadBlobTextNode),
    ]
}

fn number_input(name: &str, required: bool) -> ParameterSpec {
    ParameterSpec {
        name: name.to_string(),
        ty: SemanticType::Number,
        required,
        default: None,
        hidden: false,
    }
}

fn number_output(name: &str) -> ParameterSpec {
    ParameterSpec {
        name: name.to_string(),
        ty: SemanticType::Number,
        required: true,
        default: None,
        hidden: false,
    }
}

fn required_number(inputs: &NodeRuntimeValues, name: &str) -> Result<f64, NodeError> {
    inputs
        .get(name)
        .and_then(ParameterValue::as_single)
        .and_then(RuntimeValue::as_number)
        .ok_or_else(|| NodeError::Fatal(format!("missing required numeric input '{name}'")))
}

/// Emits a single literal number on output `value`. Configured via its own
/// `value` literal on the `NodeSpec` (bound as an input with no upstream
/// edge).
pub struct ConstNumberNode;

#[async_trait]
impl ExecutableNode for ConstNumberNode {
    fn node_type(&self) -> NodeTypeMeta {
        NodeTypeMeta {
            id: "const_number".into(),
            inputs: vec![number_input("value", true)],
            outputs: vec![number_output("value")],
            usage: 0,
            tags: vec!["builtin".into(), "arithmetic".into()],
            documentation: Some("Emits a configured literal number.".into()),
            subscription_only: false,
        }
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutcome, NodeError> {
        let value = required_number(&ctx.inputs, "value")?;
        let mut outputs = NodeRuntimeValues::new();
        outputs.insert("value".into(), ParameterValue::Single(RuntimeValue::Number(value)));
        Ok(NodeOutcome { outputs, usage: 0 })
    }
}

/// `result = a + b`.
pub struct AddNode;

#[async_trait]
impl ExecutableNode for AddNode {
    fn node_type(&self) -> NodeTypeMeta {
        NodeTypeMeta {
            id: "add".into(),
            inputs: vec![number_input("a", true), number_input("b", true)],
            outputs: vec![number_output("result")],
            usage: 1,
            tags: vec!["builtin".into(), "arithmetic".into()],
            documentation: Some("Adds two numbers.".into()),
            subscription_only: false,
        }
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutcome, NodeError> {
        let a = required_number(&ctx.inputs, "a")?;
        let b = required_number(&ctx.inputs, "b")?;
        let mut outputs = NodeRuntimeValues::new();
        outputs.insert("result".into(), ParameterValue::Single(RuntimeValue::Number(a + b)));
        Ok(NodeOutcome { outputs, usage: 1 })
    }
}

/// `result = a * b`.
pub struct MultiplyNode;

#[async_trait]
impl ExecutableNode for MultiplyNode {
    fn node_type(&self) -> NodeTypeMeta {
        NodeTypeMeta {
            id: "multiply".into(),
            inputs: vec![number_input("a", true), number_input("b", true)],
            outputs: vec![number_output("result")],
            usage: 1,
            tags: vec!["builtin".into(), "arithmetic".into()],
            documentation: Some("Multiplies two numbers.".into()),
            subscription_only: false,
        }
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutcome, NodeError> {
        let a = required_number(&ctx.inputs, "a")?;
        let b = required_number(&ctx.inputs, "b")?;
        let mut outputs = NodeRuntimeValues::new();
        outputs.insert("result".into(), ParameterValue::Single(RuntimeValue::Number(a * b)));
        Ok(NodeOutcome { outputs, usage: 1 })
    }
}

/// A conditional fork: populates exactly one of `then`/`else` depending on
/// its `condition` input, leaving the other branch's consumers to be
/// classified `conditional_branch` by the skip classifier.
pub struct BranchNode;

#[async_trait]
impl ExecutableNode for BranchNode {
    fn node_type(&self) -> NodeTypeMeta {
        NodeTypeMeta {
            id: "branch".into(),
            inputs: vec![ParameterSpec {
                name: "condition".into(),
                ty: SemanticType::Boolean,
                required: true,
                default: None,
                hidden: false,
            }],
            outputs: vec![
                ParameterSpec {
                    name: "then".into(),
                    ty: SemanticType::Json,
                    required: false,
                    default: None,
                    hidden: false,
                },
                ParameterSpec {
                    name: "else".into(),
                    ty: SemanticType::Json,
                    required: false,
                    default: None,
                    hidden: false,
                },
            ],
            usage: 0,
            tags: vec!["builtin".into(), "control-flow".into()],
            documentation: Some("Routes to exactly one of `then`/`else`.".into()),
            subscription_only: false,
        }
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutcome, NodeError> {
        let condition = match ctx.inputs.get("condition").and_then(ParameterValue::as_single) {
            Some(RuntimeValue::Boolean(b)) => *b,
            _ => return Err(NodeError::Fatal("missing required boolean input 'condition'".into())),
        };

        let mut outputs = NodeRuntimeValues::new();
        let branch = if condition { "then" } else { "else" };
        outputs.insert(
            branch.to_string(),
            ParameterValue::Single(RuntimeValue::Boolean(true)),
        );
        Ok(NodeOutcome { outputs, usage: 0 })
    }
}

/// Writes a literal string to the object store as bytes, emitting only a
/// [`crate::value::BlobReference`] — the text itself never appears again in
/// node state once this node runs.
pub struct MakeBlobNode;

#[async_trait]
impl ExecutableNode for MakeBlobNode {
    fn node_type(&self) -> NodeTypeMeta {
        NodeTypeMeta {
            id: "make_blob".into(),
            inputs: vec![ParameterSpec {
                name: "text".into(),
                ty: SemanticType::String,
                required: true,
                default: None,
                hidden: false,
            }],
            outputs: vec![ParameterSpec {
                name: "blob".into(),
                ty: SemanticType::Blob,
                required: true,
                default: None,
                hidden: false,
            }],
            usage: 1,
            tags: vec!["builtin".into(), "blob".into()],
            documentation: Some("Writes a literal string to the object store as bytes.".into()),
            subscription_only: false,
        }
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutcome, NodeError> {
        let text = ctx
            .inputs
            .get("text")
            .and_then(ParameterValue::as_single)
            .and_then(RuntimeValue::as_str)
            .ok_or_else(|| NodeError::Fatal("missing required string input 'text'".into()))?
            .to_string();

        let reference = ctx
            .object_store
            .write(PutObject {
                data: bytes::Bytes::from(text.into_bytes()),
                mime_type: "text/plain".into(),
                organization_id: ctx.organization_id.clone(),
                execution_id: Some(ctx.execution_id.clone()),
                filename: None,
            })
            .await
            .map_err(|e| NodeError::Fatal(format!("object store write failed: {e}")))?;

        let mut outputs = NodeRuntimeValues::new();
        outputs.insert("blob".into(), ParameterValue::Single(RuntimeValue::Blob(reference)));
        Ok(NodeOutcome { outputs, usage: 1 })
    }
}

/// Reads a blob's bytes back out of the object store and decodes them as
/// UTF-8 text — the counterpart to [`MakeBlobNode`], demonstrating that only
/// a reference ever crosses node boundaries, not the bytes themselves.
pub struct ReadBlobTextNode;

#[async_trait]
impl ExecutableNode for ReadBlobTextNode {
    fn node_type(&self) -> NodeTypeMeta {
        NodeTypeMeta {
            id: "read_blob_text".into(),
            inputs: vec![ParameterSpec {
                name: "blob".into(),
                ty: SemanticType::Blob,
                required: true,
                default: None,
                hidden: false,
            }],
            outputs: vec![ParameterSpec {
                name: "text".into(),
                ty: SemanticType::String,
                required: true,
                default: None,
                hidden: false,
            }],
            usage: 1,
            tags: vec!["builtin".into(), "blob".into()],
            documentation: Some("Reads a blob's bytes back as UTF-8 text.".into()),
            subscription_only: false,
        }
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutcome, NodeError> {
        let reference = ctx
            .inputs
            .get("blob")
            .and_then(ParameterValue::as_single)
            .and_then(RuntimeValue::as_blob)
            .ok_or_else(|| NodeError::Fatal("missing required blob input 'blob'".into()))?
            .clone();

        let binary = ctx
            .read_blob(&reference)
            .await
            .map_err(|e| NodeError::Fatal(format!("object store read failed: {e}")))?;

        let text = String::from_utf8(binary.data.to_vec())
            .map_err(|e| NodeError::Fatal(format!("blob is not valid UTF-8: {e}")))?;

        let mut outputs = NodeRuntimeValues::new();
        outputs.insert("text".into(), ParameterValue::Single(RuntimeValue::String(text)));
        Ok(NodeOutcome { outputs, usage: 1 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::RuntimeMode;
    use crate::object_store::InMemoryObjectStore;
    use crate::secrets::NoopSecretProvider;
    use std::sync::Arc;

    fn ctx_with_store(inputs: NodeRuntimeValues, object_store: Arc<InMemoryObjectStore>) -> NodeContext {
        NodeContext::new(
            "n1",
            "wf1",
            "org1",
            "exec1",
            RuntimeMode::Dev,
            inputs,
            serde_json::json!({}),
            object_store,
            Arc::new(NoopSecretProvider),
            Arc::new(NoopSecretProvider),
            None,
        )
    }

    fn ctx_with(inputs: NodeRuntimeValues) -> NodeContext {
        NodeContext::new(
            "n1",
            "wf1",
            "org1",
            "exec1",
            RuntimeMode::Dev,
            inputs,
            serde_json::json!({}),
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(NoopSecretProvider),
            Arc::new(NoopSecretProvider),
            None,
        )
    }

    #[tokio::test]
    async fn add_sums_two_numbers() {
        let mut inputs = NodeRuntimeValues::new();
        inputs.insert("a".into(), ParameterValue::Single(RuntimeValue::Number(5.0)));
        inputs.insert("b".into(), ParameterValue::Single(RuntimeValue::Number(3.0)));

        let outcome = AddNode.execute(ctx_with(inputs)).await.unwrap();
        let result = outcome.outputs.get("result").unwrap().as_single().unwrap();
        assert_eq!(result.as_number(), Some(8.0));
        assert_eq!(outcome.usage, 1);
    }

    #[tokio::test]
    async fn branch_populates_only_the_active_output() {
        let mut inputs = NodeRuntimeValues::new();
        inputs.insert("condition".into(), ParameterValue::Single(RuntimeValue::Boolean(true)));

        let outcome = BranchNode.execute(ctx_with(inputs)).await.unwrap();
        assert!(outcome.outputs.contains_key("then"));
        assert!(!outcome.outputs.contains_key("else"));
    }

    #[tokio::test]
    async fn make_blob_then_read_blob_text_round_trips_through_the_object_store() {
        let store = Arc::new(InMemoryObjectStore::new());

        let mut inputs = NodeRuntimeValues::new();
        inputs.insert("text".into(), ParameterValue::Single(RuntimeValue::String("hello blob".into())));

        let made = MakeBlobNode.execute(ctx_with_store(inputs, store.clone())).await.unwrap();
        let blob = made.outputs.get("blob").unwrap().as_single().unwrap().as_blob().unwrap().clone();

        // Only a reference crossed the node boundary, never the bytes.
        assert_eq!(made.outputs.len(), 1);

        let mut read_inputs = NodeRuntimeValues::new();
        read_inputs.insert("blob".into(), ParameterValue::Single(RuntimeValue::Blob(blob)));

        let read = ReadBlobTextNode.execute(ctx_with_store(read_inputs, store)).await.unwrap();
        assert_eq!(
            read.outputs.get("text").unwrap().as_single().unwrap().as_str(),
            Some("hello blob")
        );
    }
}
