//! Lifecycle events.
//!
//! The engine owns an [`EventBus`] and broadcasts a [`TreeEvent`] at
//! every lifecycle point of a run. Subscribers receive events through a
//! `tokio::sync::broadcast` channel; a subscriber that falls behind the
//! channel capacity observes a lag, never blocks the run.

use std::sync::Arc;

use arbor_tree::{ExecutionInfo, PlanFunction};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::RunError;

/// The function node an event refers to.
#[derive(Debug, Clone)]
pub struct NodeInfo {
  pub name: String,
  pub display_name: Option<String>,
}

impl From<&PlanFunction> for NodeInfo {
  fn from(function: &PlanFunction) -> Self {
    Self {
      name: function.name().to_string(),
      display_name: function.display_name().map(str::to_string),
    }
  }
}

/// One lifecycle event of a run.
///
/// Per run, `Start` fires once, then function-level events in traversal
/// order, then exactly one of `End` (completion), `Abort` (deliberate
/// early termination), or `Error` (failure).
#[derive(Debug, Clone)]
pub enum TreeEvent {
  Start {
    session: ExecutionInfo,
    payload: Value,
  },
  FunctionStart {
    session: ExecutionInfo,
    node: NodeInfo,
    payload: Value,
  },
  /// The function deferred its result; the run is suspended until the
  /// future settles.
  AsyncFunction {
    session: ExecutionInfo,
    node: NodeInfo,
    payload: Value,
  },
  FunctionEnd {
    session: ExecutionInfo,
    node: NodeInfo,
    payload: Value,
  },
  Abort {
    session: ExecutionInfo,
    node: NodeInfo,
    payload: Value,
  },
  End {
    session: ExecutionInfo,
    payload: Value,
  },
  /// The run failed. Carries the same error instance the run future
  /// resolves with.
  Error {
    error: Arc<RunError>,
    session: ExecutionInfo,
    payload: Value,
  },
}

impl TreeEvent {
  pub fn name(&self) -> &'static str {
    match self {
      TreeEvent::Start { .. } => "start",
      TreeEvent::FunctionStart { .. } => "function_start",
      TreeEvent::AsyncFunction { .. } => "async_function",
      TreeEvent::FunctionEnd { .. } => "function_end",
      TreeEvent::Abort { .. } => "abort",
      TreeEvent::End { .. } => "end",
      TreeEvent::Error { .. } => "error",
    }
  }
}

/// Broadcast channel for lifecycle events, owned by the engine.
#[derive(Clone)]
pub struct EventBus {
  sender: broadcast::Sender<TreeEvent>,
}

impl EventBus {
  pub(crate) fn new(capacity: usize) -> Self {
    let (sender, _) = broadcast::channel(capacity);
    Self { sender }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
    self.sender.subscribe()
  }

  /// Fire and forget; a send with no subscribers is not an error.
  pub(crate) fn emit(&self, event: TreeEvent) {
    let _ = self.sender.send(event);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Utc;
  use serde_json::json;
  use uuid::Uuid;

  fn test_session() -> ExecutionInfo {
    ExecutionInfo {
      id: Uuid::new_v4(),
      name: None,
      started_at: Utc::now(),
    }
  }

  #[test]
  fn test_emit_without_subscribers_is_silent() {
    let bus = EventBus::new(8);
    bus.emit(TreeEvent::Start {
      session: test_session(),
      payload: json!({}),
    });
  }

  #[test]
  fn test_subscribers_receive_in_order() {
    let bus = EventBus::new(8);
    let mut rx = bus.subscribe();

    bus.emit(TreeEvent::Start {
      session: test_session(),
      payload: json!({}),
    });
    bus.emit(TreeEvent::End {
      session: test_session(),
      payload: json!({}),
    });

    assert_eq!(rx.try_recv().unwrap().name(), "start");
    assert_eq!(rx.try_recv().unwrap().name(), "end");
    assert!(rx.try_recv().is_err());
  }
}
