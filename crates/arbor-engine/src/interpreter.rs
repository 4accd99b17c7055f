//! Result classification.
//!
//! Exactly one classification outcome occurs per function invocation.
//! Deferred results are awaited by the runner and their settled value is
//! fed back through the same table, so suspension is part of a single
//! outcome.

use arbor_tree::{Output, PlanFunction};
use serde_json::Value;

use crate::error::RunError;

/// The next traversal step a function's result selects.
#[derive(Debug, PartialEq)]
pub(crate) enum Interpretation {
  /// Carry on sequentially with the merged payload.
  Continue(Value),
  /// Descend into the sub-tree registered under `key`, replacing the
  /// payload.
  Branch { key: String, payload: Value },
  /// Terminate the run; deliberate, not an error.
  Abort,
}

/// Classify a settled output against the node's outputs declaration.
///
/// Order matters and mirrors the contract: abort wins outright, a path
/// is always acceptable, a declared-outputs node accepts nothing but a
/// path, and only object-shaped (or null) values merge.
pub(crate) fn classify(
  function: &PlanFunction,
  output: Output,
  payload: &Value,
) -> Result<Interpretation, RunError> {
  match output {
    Output::Abort => Ok(Interpretation::Abort),
    Output::Path(path) => {
      let (key, branch_payload) = path.into_parts();
      Ok(Interpretation::Branch {
        key,
        payload: branch_payload,
      })
    }
    Output::Value(value) if function.declares_outputs() => Err(RunError::NotAPath {
      function: function.name().to_string(),
      result: value.to_string(),
    }),
    Output::Value(Value::Null) => Ok(Interpretation::Continue(payload.clone())),
    Output::Value(value @ Value::Object(_)) => {
      Ok(Interpretation::Continue(merge_payload(payload, &value)))
    }
    Output::Value(value) => Err(RunError::InvalidResult {
      function: function.name().to_string(),
      result: value.to_string(),
    }),
    // The runner resolves deferred outputs before classification.
    Output::Deferred(_) => unreachable!("deferred output reached classification"),
  }
}

/// Shallow merge: `addition`'s entries replace `payload`'s under the
/// same key; everything else is carried over.
pub(crate) fn merge_payload(payload: &Value, addition: &Value) -> Value {
  let mut merged = match payload {
    Value::Object(map) => map.clone(),
    _ => serde_json::Map::new(),
  };
  if let Value::Object(map) = addition {
    for (key, value) in map {
      merged.insert(key.clone(), value.clone());
    }
  }
  Value::Object(merged)
}
