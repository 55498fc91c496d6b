//! Parameter marshaling between the untyped JSON boundary (API requests,
//! literal values stored in a workflow definition) and the typed
//! [`RuntimeValue`] model nodes execute against.
//!
//! Binary [`SemanticType`]s never carry bytes across this boundary: the
//! wire representation is always a [`BlobReference`]. `api_to_runtime`
//! and `runtime_to_api` consult the [`ObjectStore`] for these types —
//! not to move bytes through `RuntimeValue` (it only ever holds the
//! reference, per `nodes::value`), but because an id that doesn't
//! resolve in the store is exactly the "unknown id" case spec.md §4.4
//! calls out: it must fail marshaling, not silently pass a made-up
//! reference through to a node.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use nodes::object_store::{ObjectStore, ObjectStoreError};
use nodes::value::{BlobReference, NodeRuntimeValues, ParameterSpec, ParameterValue, RuntimeValue, SemanticType};

use crate::error::EngineError;
use crate::models::Workflow;

fn object_store_err(err: ObjectStoreError) -> EngineError {
    match err {
        ObjectStoreError::NotFound(id) => EngineError::InvalidInput(format!("unknown blob id: {id}")),
        other => EngineError::ObjectStore(other),
    }
}

/// Convert one JSON value from the API boundary into a typed `RuntimeValue`,
/// validating it against the parameter's declared `SemanticType`. For a
/// binary type this confirms the referenced blob actually exists in
/// `store` before returning it.
pub async fn api_to_runtime(ty: SemanticType, value: &Value, store: &dyn ObjectStore) -> Result<RuntimeValue, EngineError> {
    if ty.is_binary() {
        let reference: BlobReference = serde_json::from_value(value.clone())
            .map_err(|e| EngineError::InvalidInput(format!("expected blob reference: {e}")))?;
        store.read(reference.id).await.map_err(object_store_err)?;
        return Ok(RuntimeValue::Blob(reference));
    }

    match ty {
        SemanticType::String => value
            .as_str()
            .map(|s| RuntimeValue::String(s.to_string()))
            .ok_or_else(|| EngineError::InvalidInput(format!("expected string, got {value}"))),
        SemanticType::Number => value
            .as_f64()
            .map(RuntimeValue::Number)
            .ok_or_else(|| EngineError::InvalidInput(format!("expected number, got {value}"))),
        SemanticType::Boolean => value
            .as_bool()
            .map(RuntimeValue::Boolean)
            .ok_or_else(|| EngineError::InvalidInput(format!("expected boolean, got {value}"))),
        SemanticType::Json | SemanticType::Geojson => Ok(json_value_to_runtime(value)),
        _ => unreachable!("binary types handled above"),
    }
}

/// The inverse of [`api_to_runtime`]: flatten a `RuntimeValue` back to plain
/// JSON for an API response. For a `Blob` this re-confirms the reference
/// still resolves in `store` before handing it back — `organization_id`
/// is threaded through for a future org-scoped backend (the in-memory
/// store doesn't enforce tenancy itself; `db`'s repositories already do
/// that at the row level for everything that isn't blob-shaped).
pub fn runtime_to_api<'a>(
    value: &'a RuntimeValue,
    store: &'a dyn ObjectStore,
    organization_id: &'a str,
) -> Pin<Box<dyn Future<Output = Result<Value, EngineError>> + Send + 'a>> {
    Box::pin(async move {
        match value {
            RuntimeValue::String(s) => Ok(Value::String(s.clone())),
            RuntimeValue::Number(n) => Ok(serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null)),
            RuntimeValue::Boolean(b) => Ok(Value::Bool(*b)),
            RuntimeValue::Blob(reference) => {
                store.read(reference.id).await.map_err(object_store_err)?;
                let _ = organization_id;
                Ok(serde_json::to_value(reference).unwrap_or(Value::Null))
            }
            RuntimeValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(runtime_to_api(item, store, organization_id).await?);
                }
                Ok(Value::Array(out))
            }
            RuntimeValue::Object(map) => Ok(Value::Object(map.clone())),
        }
    })
}

fn json_value_to_runtime(value: &Value) -> RuntimeValue {
    match value {
        Value::String(s) => RuntimeValue::String(s.clone()),
        Value::Number(n) => RuntimeValue::Number(n.as_f64().unwrap_or_default()),
        Value::Bool(b) => RuntimeValue::Boolean(*b),
        Value::Array(items) => RuntimeValue::Array(items.iter().map(json_value_to_runtime).collect()),
        Value::Object(map) => RuntimeValue::Object(map.clone()),
        Value::Null => RuntimeValue::Object(serde_json::Map::new()),
    }
}

/// Marshal a trigger payload (a flat JSON object keyed by parameter name)
/// into a `NodeRuntimeValues` map for the entry node(s) of a manual/HTTP
/// execution, validating required parameters are present.
pub async fn gather_node_inputs(
    spec: &[ParameterSpec],
    raw: &Value,
    store: &dyn ObjectStore,
) -> Result<NodeRuntimeValues, EngineError> {
    let object = raw
        .as_object()
        .ok_or_else(|| EngineError::InvalidInput("expected a JSON object of named parameters".into()))?;

    let mut inputs = NodeRuntimeValues::new();
    for param in spec {
        match object.get(&param.name) {
            Some(value) => {
                inputs.insert(param.name.clone(), ParameterValue::Single(api_to_runtime(param.ty, value, store).await?));
            }
            None => {
                if let Some(default) = &param.default {
                    inputs.insert(param.name.clone(), ParameterValue::Single(default.clone()));
                } else if param.required {
                    return Err(EngineError::InvalidInput(format!("missing required parameter '{}'", param.name)));
                }
            }
        }
    }
    Ok(inputs)
}

/// Find the nodes with no inbound edge and bind any matching key of `input`
/// onto their declared inputs as a literal — the trigger payload (HTTP body,
/// webhook payload, or a CLI `run --input`) becomes the entry node's inputs.
pub async fn inject_entry_inputs(workflow: &mut Workflow, input: &Value, store: &dyn ObjectStore) -> Result<(), EngineError> {
    if input.is_null() {
        return Ok(());
    }

    let entry_node_ids: Vec<String> = workflow
        .nodes
        .iter()
        .filter(|n| workflow.inbound_edges(&n.id).next().is_none())
        .map(|n| n.id.clone())
        .collect();

    for node_id in entry_node_ids {
        let node = workflow.nodes.iter_mut().find(|n| n.id == node_id).expect("id from own node list");
        let gathered = gather_node_inputs(&node.inputs, input, store).await?;
        for (name, value) in gathered {
            node.literals.insert(name, value);
        }
    }

    Ok(())
}

/// Flatten a node's settled outputs back to a plain JSON object for the API
/// layer (`GET /executions/{id}` node result payloads).
pub async fn outputs_to_api(
    outputs: &NodeRuntimeValues,
    store: &dyn ObjectStore,
    organization_id: &str,
) -> Result<Value, EngineError> {
    let mut object = serde_json::Map::new();
    for (name, value) in outputs {
        let json = match value {
            ParameterValue::Single(v) => runtime_to_api(v, store, organization_id).await?,
            ParameterValue::Many(vs) => {
                let mut items = Vec::with_capacity(vs.len());
                for v in vs {
                    items.push(runtime_to_api(v, store, organization_id).await?);
                }
                Value::Array(items)
            }
        };
        object.insert(name.clone(), json);
    }
    Ok(Value::Object(object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodes::object_store::{InMemoryObjectStore, PutObject};
    use serde_json::json;
    use uuid::Uuid;

    fn spec(name: &str, ty: SemanticType, required: bool) -> ParameterSpec {
        ParameterSpec { name: name.into(), ty, required, default: None, hidden: false }
    }

    #[tokio::test]
    async fn string_round_trips() {
        let store = InMemoryObjectStore::new();
        let value = api_to_runtime(SemanticType::String, &json!("hello"), &store).await.unwrap();
        assert_eq!(value, RuntimeValue::String("hello".into()));
        assert_eq!(runtime_to_api(&value, &store, "org_1").await.unwrap(), json!("hello"));
    }

    #[tokio::test]
    async fn number_type_mismatch_is_rejected() {
        let store = InMemoryObjectStore::new();
        let err = api_to_runtime(SemanticType::Number, &json!("not a number"), &store).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn blob_reference_round_trips_when_it_exists_in_the_store() {
        let store = InMemoryObjectStore::new();
        let reference = store
            .write(PutObject {
                data: bytes::Bytes::from_static(b"\x89PNG"),
                mime_type: "image/png".into(),
                organization_id: "org_1".into(),
                execution_id: None,
                filename: None,
            })
            .await
            .unwrap();

        let wire = json!({ "id": reference.id, "mimeType": "image/png" });
        let value = api_to_runtime(SemanticType::Image, &wire, &store).await.unwrap();
        assert!(matches!(value, RuntimeValue::Blob(_)));
        assert_eq!(runtime_to_api(&value, &store, "org_1").await.unwrap()["mimeType"], json!("image/png"));
    }

    #[tokio::test]
    async fn blob_reference_to_an_unknown_id_is_rejected() {
        let store = InMemoryObjectStore::new();
        let wire = json!({ "id": Uuid::new_v4(), "mimeType": "image/png" });
        let err = api_to_runtime(SemanticType::Image, &wire, &store).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn gather_applies_default_for_missing_optional() {
        let store = InMemoryObjectStore::new();
        let params = vec![ParameterSpec {
            name: "count".into(),
            ty: SemanticType::Number,
            required: false,
            default: Some(RuntimeValue::Number(3.0)),
            hidden: false,
        }];
        let gathered = gather_node_inputs(&params, &json!({}), &store).await.unwrap();
        assert_eq!(
            gathered.get("count").unwrap().as_single().unwrap().as_number(),
            Some(3.0)
        );
    }

    #[tokio::test]
    async fn gather_rejects_missing_required_parameter() {
        let store = InMemoryObjectStore::new();
        let params = vec![spec("name", SemanticType::String, true)];
        let err = gather_node_inputs(&params, &json!({}), &store).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn inject_entry_inputs_binds_onto_nodes_with_no_inbound_edges() {
        use crate::models::{Edge, NodeSpec, Trigger};
        use std::collections::BTreeMap as Map;

        let store = InMemoryObjectStore::new();
        let mut workflow = Workflow::new(
            "wf",
            "wf",
            Trigger::Manual,
            vec![
                NodeSpec {
                    id: "entry".into(),
                    node_type: "const_number".into(),
                    inputs: vec![spec("value", SemanticType::Number, true)],
                    outputs: vec![],
                    literals: Map::new(),
                },
                NodeSpec {
                    id: "downstream".into(),
                    node_type: "add".into(),
                    inputs: vec![],
                    outputs: vec![],
                    literals: Map::new(),
                },
            ],
            vec![Edge {
                source: "entry".into(),
                source_output: "value".into(),
                target: "downstream".into(),
                target_input: "a".into(),
            }],
        );

        inject_entry_inputs(&mut workflow, &json!({ "value": 42.0 }), &store).await.unwrap();

        let entry = workflow.node("entry").unwrap();
        assert_eq!(
            entry.literals.get("value").unwrap().as_single().unwrap().as_number(),
            Some(42.0)
        );
        assert!(workflow.node("downstream").unwrap().literals.is_empty());
    }

    #[tokio::test]
    async fn outputs_to_api_flattens_fan_in_to_array() {
        let store = InMemoryObjectStore::new();
        let mut outputs = NodeRuntimeValues::new();
        outputs.insert(
            "items".into(),
            ParameterValue::Many(vec![RuntimeValue::Number(1.0), RuntimeValue::Number(2.0)]),
        );
        let json = outputs_to_api(&outputs, &store, "org_1").await.unwrap();
        assert_eq!(json["items"], json!([1.0, 2.0]));
    }
}
