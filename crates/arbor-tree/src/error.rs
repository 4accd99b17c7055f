use thiserror::Error;

/// Structural violations detected while compiling a tree description.
///
/// These are configuration errors: they surface synchronously to the
/// caller and are never routed through a run's error path.
#[derive(Debug, Error)]
pub enum CompileError {
  #[error("tree has no nodes")]
  EmptyTree,

  #[error("sequence node has no nodes")]
  EmptySequence,

  #[error("parallel group has no nodes")]
  EmptyGroup,

  #[error("function node has an empty name")]
  UnnamedFunction,

  #[error("duplicate branch key '{key}' on function '{function}'")]
  DuplicateBranchKey { function: String, key: String },

  #[error("branch '{key}' on function '{function}' has no nodes")]
  EmptyBranch { function: String, key: String },
}
