//! Error types for tree execution.

use arbor_tree::CompileError;
use thiserror::Error;

/// Errors that can end a run.
///
/// `InvalidPayload` and `Compile` are configuration errors: they surface
/// synchronously from the run entry point and are never broadcast as an
/// `error` event. Everything else is an in-run failure routed through
/// the single error path.
#[derive(Debug, Error)]
pub enum RunError {
  /// The run payload was not a JSON object.
  #[error("run payload must be a JSON object, got {got}")]
  InvalidPayload { got: String },

  /// The tree description failed to compile.
  #[error(transparent)]
  Compile(#[from] CompileError),

  /// A function declaring outputs resolved to something other than a path.
  #[error("the result {result} from function '{function}' needs to be a path")]
  NotAPath { function: String, result: String },

  /// A function resolved to an unclassifiable value (array or scalar).
  #[error("the result {result} from function '{function}' is not a valid result")]
  InvalidResult { function: String, result: String },

  /// A path selected a branch key with no registered sub-tree.
  #[error("function '{function}' selected unknown branch '{branch}'")]
  UnknownBranch { function: String, branch: String },

  /// A function failed with an application error.
  #[error("function '{function}' failed: {source}")]
  Function {
    function: String,
    #[source]
    source: anyhow::Error,
  },

  /// A parallel sibling task could not be joined.
  #[error("parallel group task failed to join: {message}")]
  Join { message: String },

  /// The plan cache lock was poisoned.
  #[error("plan cache lock poisoned: {message}")]
  CachePoisoned { message: String },
}
