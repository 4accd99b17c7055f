//! Arbor Tree
//!
//! This crate provides the declarative description of a function tree and
//! its compiled, execution-ready form.
//!
//! A [`Tree`] is an ordered composition of function nodes: sequential
//! chains, parallel groups, and conditional sub-trees selected by a
//! function's [`Path`] result. [`compile`] validates the description and
//! produces an immutable [`StaticPlan`] the engine traverses.
//!
//! Key properties of the compiled form:
//! - Node order mirrors declaration order (order is traversal order)
//! - Structural violations (duplicate branch keys, empty sub-trees) are
//!   rejected at compile time, never deferred into a run
//! - A function node declaring outputs must resolve to a [`Path`]

mod context;
mod error;
mod output;
mod plan;
mod tree;

pub use context::{Capability, Context, ExecutionInfo};
pub use error::CompileError;
pub use output::{FunctionResult, Output, Path, TreeFn};
pub use plan::{PlanFunction, PlanNode, StaticPlan, compile};
pub use tree::{FunctionNode, Tree, TreeId, TreeNode, function, parallel, sequence};
