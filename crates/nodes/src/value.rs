//! The value model shared across node implementations and the engine.
//!
//! Defined here — the lowest crate in the dependency graph — so both the
//! engine and individual node implementations can import it without a
//! circular dependency.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Semantic type tag carried by every `ParameterSpec`. Dispatches marshaling
/// (`engine::marshal`) and gives node implementations a declared schema
/// instead of ad-hoc `typeof` checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    String,
    Number,
    Boolean,
    Json,
    Geojson,
    Image,
    Audio,
    Video,
    Document,
    Blob,
}

impl SemanticType {
    /// Binary types flow through the object store as a [`BlobReference`] on
    /// the wire; everything else passes through untouched.
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            SemanticType::Image | SemanticType::Audio | SemanticType::Video
                | SemanticType::Document | SemanticType::Blob
        )
    }
}

/// Opaque pointer to bytes held in the object store. Never inlines bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobReference {
    pub id: Uuid,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// A decoded value flowing between nodes at runtime.
///
/// `Blob` is kept as its own variant (rather than folded into `Object`) so
/// the marshaler can recognise it without a heuristic — round-tripping an
/// arbitrary JSON object that merely *looks like* a `BlobReference` would
/// otherwise be ambiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuntimeValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Blob(BlobReference),
    Array(Vec<RuntimeValue>),
    Object(serde_json::Map<String, serde_json::Value>),
}

impl RuntimeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RuntimeValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            RuntimeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&BlobReference> {
        match self {
            RuntimeValue::Blob(b) => Some(b),
            _ => None,
        }
    }
}

/// The raw bytes + mime type a node implementation works with for a binary
/// parameter, decoded from a [`BlobReference`] by `NodeContext::read_blob`.
#[derive(Debug, Clone)]
pub struct BinaryValue {
    pub data: bytes::Bytes,
    pub mime_type: String,
    pub filename: Option<String>,
}

/// Declared shape of one node input or output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: SemanticType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<RuntimeValue>,
    /// UI-only; carries no execution semantics.
    #[serde(default)]
    pub hidden: bool,
}

/// A node input may be bound by at most one edge (ordinary input) or by
/// several edges landing on a declared fan-in input, which accumulates a
/// sequence in edge order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Single(RuntimeValue),
    Many(Vec<RuntimeValue>),
}

impl ParameterValue {
    /// Flatten to a `Vec` regardless of arity, for callers that don't care
    /// whether the edge was fan-in.
    pub fn into_vec(self) -> Vec<RuntimeValue> {
        match self {
            ParameterValue::Single(v) => vec![v],
            ParameterValue::Many(vs) => vs,
        }
    }

    pub fn as_single(&self) -> Option<&RuntimeValue> {
        match self {
            ParameterValue::Single(v) => Some(v),
            ParameterValue::Many(vs) if vs.len() == 1 => vs.first(),
            _ => None,
        }
    }
}

/// Mapping from parameter name to bound value. `BTreeMap` for deterministic
/// iteration order — the scheduler's determinism guarantees (spec §5, §8)
/// extend to anything that walks these maps.
pub type NodeRuntimeValues = BTreeMap<String, ParameterValue>;
