//! Arbor Engine
//!
//! This crate executes compiled function trees. The [`Engine`] owns:
//! - a plan cache (each [`Tree`] compiles at most once per engine)
//! - an ordered context-provider chain, folded into a fresh execution
//!   context for every function invocation
//! - an event bus broadcasting typed lifecycle events
//!
//! A run walks the plan depth-first in declared order, fans parallel
//! groups out onto tasks and joins them deterministically, and resolves
//! each function's result through an explicit classification step:
//! value, branch selection, abort, deferred, or error.
//!
//! Failure is reported, never recovered: the run future resolves with
//! the error and a [`TreeEvent::Error`] is broadcast; callers decide
//! retry policy.

mod cache;
mod engine;
mod error;
mod events;
mod interpreter;
mod provider;
mod runner;
mod session;

pub use cache::PlanCache;
pub use engine::{Engine, EngineBuilder, RunOutcome, RunRequest, RunStatus};
pub use error::RunError;
pub use events::{EventBus, NodeInfo, TreeEvent};
pub use provider::{Capabilities, ContextProvider};

pub use arbor_tree::{
  CompileError, Context, ExecutionInfo, FunctionNode, FunctionResult, Output, Path, StaticPlan,
  Tree, TreeId, TreeNode, compile, function, parallel, sequence,
};
