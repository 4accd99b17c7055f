//! The engine entry point.

use std::sync::Arc;

use arbor_tree::{ExecutionInfo, Tree};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::cache::PlanCache;
use crate::error::RunError;
use crate::events::{EventBus, TreeEvent};
use crate::provider::{Capabilities, ContextProvider};
use crate::runner::{Flow, RunContext, execute_nodes};
use crate::session::Session;

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Builds an [`Engine`] bound to an ordered provider chain.
pub struct EngineBuilder {
  providers: Vec<Arc<dyn ContextProvider>>,
  event_capacity: usize,
}

impl EngineBuilder {
  fn new() -> Self {
    Self {
      providers: Vec::new(),
      event_capacity: DEFAULT_EVENT_CAPACITY,
    }
  }

  /// Append a provider to the chain. Providers fold in registration
  /// order.
  pub fn provider(mut self, provider: impl ContextProvider + 'static) -> Self {
    self.providers.push(Arc::new(provider));
    self
  }

  /// Append a plain capability map to the chain.
  pub fn capabilities(self, capabilities: Capabilities) -> Self {
    self.provider(capabilities)
  }

  /// Buffer size of the lifecycle event channel.
  pub fn event_capacity(mut self, capacity: usize) -> Self {
    self.event_capacity = capacity;
    self
  }

  pub fn build(self) -> Engine {
    Engine {
      providers: self.providers.into(),
      cache: PlanCache::new(),
      bus: EventBus::new(self.event_capacity),
    }
  }
}

/// Optional per-run settings.
///
/// The tree itself is a required `run` argument; everything else is a
/// named optional field.
#[derive(Debug, Default)]
pub struct RunRequest {
  name: Option<String>,
  payload: Value,
}

impl RunRequest {
  pub fn new() -> Self {
    Self::default()
  }

  /// Caller-supplied label carried on the session.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Initial payload; must be a JSON object (or `Null` for empty).
  pub fn payload(mut self, payload: Value) -> Self {
    self.payload = payload;
    self
  }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
  /// The plan was exhausted.
  Completed,
  /// A function signalled abort; deliberate early termination.
  Aborted,
}

/// The resolved result of a run.
#[derive(Debug, Serialize)]
pub struct RunOutcome {
  pub session: ExecutionInfo,
  pub payload: Value,
  pub status: RunStatus,
}

/// The function-tree execution engine.
///
/// Owns the plan cache, the provider chain, and the event bus. One
/// engine serves any number of concurrent runs; each run gets its own
/// session.
pub struct Engine {
  providers: Arc<[Arc<dyn ContextProvider>]>,
  cache: PlanCache,
  bus: EventBus,
}

impl Engine {
  pub fn builder() -> EngineBuilder {
    EngineBuilder::new()
  }

  /// An engine with no providers beyond the built-in capabilities.
  pub fn new() -> Self {
    Self::builder().build()
  }

  /// Subscribe to lifecycle events.
  pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TreeEvent> {
    self.bus.subscribe()
  }

  /// Drop all cached plans.
  pub fn clear_cache(&self) {
    self.cache.clear();
  }

  /// Execute a tree to completion.
  ///
  /// Resolves exactly once: `Ok` on completion or abort, `Err` on any
  /// in-run failure. On failure the same error instance is broadcast as
  /// a [`TreeEvent::Error`] immediately before the future resolves.
  /// Configuration errors (non-object payload, compile failure) surface
  /// synchronously and are never broadcast.
  #[instrument(name = "tree_run", skip(self, tree, request), fields(tree_id = %tree.id()))]
  pub async fn run(&self, tree: &Tree, request: RunRequest) -> Result<RunOutcome, Arc<RunError>> {
    let initial = match request.payload {
      Value::Null => Value::Object(serde_json::Map::new()),
      payload @ Value::Object(_) => payload,
      other => {
        return Err(Arc::new(RunError::InvalidPayload {
          got: other.to_string(),
        }));
      }
    };

    let plan = self.cache.get_or_compile(tree).map_err(Arc::new)?;
    let session = Session::new(request.name, plan);

    info!(
      execution_id = %session.info.id,
      name = session.info.name.as_deref().unwrap_or(""),
      "run started"
    );
    self.bus.emit(TreeEvent::Start {
      session: session.info.clone(),
      payload: initial.clone(),
    });

    let run = RunContext {
      session: session.info.clone(),
      bus: self.bus.clone(),
      providers: self.providers.clone(),
    };

    match execute_nodes(&run, session.plan.nodes(), initial.clone()).await {
      Ok(Flow::Continue(payload)) => {
        info!(execution_id = %session.info.id, "run completed");
        self.bus.emit(TreeEvent::End {
          session: session.info.clone(),
          payload: payload.clone(),
        });
        Ok(RunOutcome {
          session: session.info,
          payload,
          status: RunStatus::Completed,
        })
      }
      Ok(Flow::Aborted(payload)) => {
        info!(execution_id = %session.info.id, "run aborted");
        Ok(RunOutcome {
          session: session.info,
          payload,
          status: RunStatus::Aborted,
        })
      }
      Err(run_error) => {
        error!(
          execution_id = %session.info.id,
          error = %run_error,
          "run failed"
        );
        let run_error = Arc::new(run_error);
        self.bus.emit(TreeEvent::Error {
          error: run_error.clone(),
          session: session.info,
          payload: initial,
        });
        Err(run_error)
      }
    }
  }
}

impl Default for Engine {
  fn default() -> Self {
    Self::new()
  }
}
