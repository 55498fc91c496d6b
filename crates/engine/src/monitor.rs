//! Live progress monitoring.
//!
//! Broadcasting is best-effort: a lagging subscriber drops intermediate
//! snapshots rather than stall the scheduler, which only guarantees that
//! the *final* snapshot for an execution is eventually delivered.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use nodes::value::NodeRuntimeValues;

use crate::state::{SkipReason, WorkflowExecutionStatus};

/// Per-node progress summary carried in a [`Snapshot`] — outputs are
/// included so a monitoring UI can render partial results without a
/// separate round trip to the execution store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub status: NodeSnapshotStatus,
    pub outputs: Option<NodeRuntimeValues>,
    pub error: Option<String>,
    pub skip_reason: Option<SkipReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeSnapshotStatus {
    Pending,
    Completed,
    Skipped,
    Errored,
}

/// A point-in-time view of one execution, pushed after every level applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub execution_id: Uuid,
    pub status: WorkflowExecutionStatus,
    pub nodes: HashMap<String, NodeSnapshot>,
}

#[async_trait]
pub trait ExecutionMonitor: Send + Sync {
    /// Push a snapshot to subscribers of this execution. Never blocks the
    /// scheduler for more than a bounded time.
    fn broadcast(&self, snapshot: Snapshot);

    /// Subscribe to snapshots for any execution tracked by this monitor.
    fn subscribe(&self) -> broadcast::Receiver<Snapshot>;
}

/// `tokio::sync::broadcast`-backed implementation — the default. Capacity
/// is fixed at construction; once the channel is full, the oldest unread
/// snapshot is dropped for lagging receivers (`RecvError::Lagged`) — dropped
/// intermediate updates are acceptable, losing the final one is not.
pub struct BroadcastMonitor {
    sender: broadcast::Sender<Snapshot>,
}

impl BroadcastMonitor {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl ExecutionMonitor for BroadcastMonitor {
    fn broadcast(&self, snapshot: Snapshot) {
        // No subscribers is not an error — most unit tests and CLI `run`
        // invocations never subscribe.
        let _ = self.sender.send(snapshot);
    }

    fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(execution_id: Uuid) -> Snapshot {
        Snapshot { execution_id, status: WorkflowExecutionStatus::Executing, nodes: HashMap::new() }
    }

    #[tokio::test]
    async fn subscriber_receives_broadcast_snapshot() {
        let monitor = BroadcastMonitor::new(8);
        let mut receiver = monitor.subscribe();
        let id = Uuid::new_v4();
        monitor.broadcast(snapshot(id));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.execution_id, id);
    }

    #[tokio::test]
    async fn broadcast_with_no_subscribers_does_not_panic() {
        let monitor = BroadcastMonitor::new(8);
        monitor.broadcast(snapshot(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn lagging_subscriber_drops_intermediate_snapshots_but_not_final() {
        let monitor = BroadcastMonitor::new(2);
        let mut receiver = monitor.subscribe();
        let id = Uuid::new_v4();

        for _ in 0..5 {
            monitor.broadcast(snapshot(id));
        }
        // Drain whatever is still buffered; a lagged receiver sees an error
        // on the next recv, not a panic, and can resume.
        loop {
            match receiver.recv().await {
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => break,
                Err(broadcast::error::RecvError::Closed) => panic!("channel closed unexpectedly"),
            }
        }
    }
}
