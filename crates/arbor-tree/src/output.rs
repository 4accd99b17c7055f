//! Function results.
//!
//! Every tree function resolves to exactly one [`Output`] variant. The
//! variants form the full vocabulary a function has for steering
//! traversal: contribute a value, select a branch, stop the run, or
//! defer the decision to a future.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::context::Context;

/// What a function invocation resolves to.
pub type FunctionResult = Result<Output, anyhow::Error>;

/// The callable stored in a function node.
pub type TreeFn = Arc<dyn Fn(Context) -> FunctionResult + Send + Sync>;

/// An explicit branch selection: continue traversal down the sub-tree
/// registered under `branch`, carrying `payload` forward as the new
/// payload (replacing, not merging, the current one).
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
  branch: String,
  payload: Value,
}

impl Path {
  pub fn new(branch: impl Into<String>, payload: Value) -> Self {
    Self {
      branch: branch.into(),
      payload,
    }
  }

  pub fn branch(&self) -> &str {
    &self.branch
  }

  pub fn payload(&self) -> &Value {
    &self.payload
  }

  pub fn into_parts(self) -> (String, Value) {
    (self.branch, self.payload)
  }
}

/// A function's resolved result.
///
/// Dispatch is by construction, not by runtime shape inspection: a
/// function states what it means by picking the variant.
pub enum Output {
  /// An ordinary value, shallow-merged into the current payload when the
  /// node declares no outputs. Only JSON objects (and `Null`, meaning
  /// "no value") are valid here; arrays and scalars are rejected by the
  /// interpreter.
  Value(Value),
  /// An explicit branch selection.
  Path(Path),
  /// Terminate the run now. Not an error; carries no payload.
  Abort,
  /// The result is not known yet. The engine emits its async lifecycle
  /// event, awaits the future, and classifies the settled result exactly
  /// as a synchronous return.
  Deferred(BoxFuture<'static, FunctionResult>),
}

impl Output {
  /// An empty result: valid, merges nothing, traversal continues.
  pub fn none() -> Self {
    Output::Value(Value::Null)
  }

  pub fn value(value: Value) -> Self {
    Output::Value(value)
  }

  pub fn path(branch: impl Into<String>, payload: Value) -> Self {
    Output::Path(Path::new(branch, payload))
  }

  pub fn abort() -> Self {
    Output::Abort
  }

  /// Defer resolution to a future. The settled result is classified by
  /// the same rules as a synchronous return.
  pub fn deferred<F>(future: F) -> Self
  where
    F: Future<Output = FunctionResult> + Send + 'static,
  {
    Output::Deferred(future.boxed())
  }
}

impl fmt::Debug for Output {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Output::Value(value) => f.debug_tuple("Value").field(value).finish(),
      Output::Path(path) => f.debug_tuple("Path").field(path).finish(),
      Output::Abort => write!(f, "Abort"),
      Output::Deferred(_) => write!(f, "Deferred(..)"),
    }
  }
}
