//! The execution context handed to every function invocation.
//!
//! A [`Context`] is built fresh for each invocation (never reused across
//! nodes) because providers may need invocation-specific details: the
//! current function node and the current payload. It is exclusive to one
//! invocation's call stack and dropped once the result is classified.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::output::Output;

/// Identity and bookkeeping for one top-level run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionInfo {
  /// Unique id for this run, distinct across concurrent runs.
  pub id: Uuid,
  /// Optional caller-supplied label.
  pub name: Option<String>,
  /// When the run was created.
  pub started_at: DateTime<Utc>,
}

/// A caller-registered capability stored in the context.
pub type Capability = Arc<dyn Any + Send + Sync>;

/// Provider-assembled container of named capabilities.
///
/// Three capabilities are built in: the execution view ([`execution`],
/// [`abort`]), the read-only input view ([`input`]), and the path
/// builder ([`path`]). Providers layer further capabilities on top via
/// [`insert`].
///
/// [`execution`]: Context::execution
/// [`abort`]: Context::abort
/// [`input`]: Context::input
/// [`path`]: Context::path
/// [`insert`]: Context::insert
pub struct Context {
  execution: ExecutionInfo,
  function_name: String,
  input: Value,
  capabilities: HashMap<String, Capability>,
}

impl Context {
  pub fn new(execution: ExecutionInfo, function_name: impl Into<String>, input: Value) -> Self {
    Self {
      execution,
      function_name: function_name.into(),
      input,
      capabilities: HashMap::new(),
    }
  }

  /// The current run's identity.
  pub fn execution(&self) -> &ExecutionInfo {
    &self.execution
  }

  /// Name of the function node this context was built for.
  pub fn function_name(&self) -> &str {
    &self.function_name
  }

  /// Read-only view of the current payload.
  pub fn input(&self) -> &Value {
    &self.input
  }

  /// Build a branch-selection result for the current node.
  pub fn path(&self, branch: impl Into<String>, payload: Value) -> Output {
    Output::path(branch, payload)
  }

  /// Build the stop-the-run result.
  pub fn abort(&self) -> Output {
    Output::Abort
  }

  /// Register a named capability, replacing any previous one under the
  /// same name (shallow merge semantics).
  pub fn insert(&mut self, name: impl Into<String>, capability: Capability) {
    self.capabilities.insert(name.into(), capability);
  }

  /// Look up a capability by name, downcast to its concrete type.
  pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
    self
      .capabilities
      .get(name)
      .cloned()
      .and_then(|capability| capability.downcast::<T>().ok())
  }
}
