//! Compilation of a tree description into its locked, execution-ready
//! form.
//!
//! Compilation is pure and deterministic: the same description always
//! yields the same plan structure, and plan node order mirrors declared
//! order. Structural violations are rejected here, synchronously, never
//! deferred into a run.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::error::CompileError;
use crate::output::{FunctionResult, TreeFn};
use crate::tree::{FunctionNode, Tree, TreeId, TreeNode};

/// A compiled function node.
pub struct PlanFunction {
  name: String,
  display_name: Option<String>,
  function: TreeFn,
  /// Declared branch sub-trees, in declaration order, keys unique.
  /// `Some` obligates the function to resolve to a path.
  outputs: Option<Vec<(String, Vec<PlanNode>)>>,
}

impl PlanFunction {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn display_name(&self) -> Option<&str> {
    self.display_name.as_deref()
  }

  /// Whether this node declared outputs, i.e. must resolve to a path.
  pub fn declares_outputs(&self) -> bool {
    self.outputs.is_some()
  }

  /// The sub-tree registered under a branch key, if any.
  pub fn branch(&self, key: &str) -> Option<&[PlanNode]> {
    self
      .outputs
      .as_ref()
      .and_then(|outputs| outputs.iter().find(|(k, _)| k == key))
      .map(|(_, nodes)| nodes.as_slice())
  }

  /// Invoke the underlying function.
  pub fn call(&self, context: Context) -> FunctionResult {
    (self.function)(context)
  }
}

impl fmt::Debug for PlanFunction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PlanFunction")
      .field("name", &self.name)
      .field("display_name", &self.display_name)
      .field(
        "outputs",
        &self
          .outputs
          .as_ref()
          .map(|outputs| outputs.iter().map(|(key, _)| key).collect::<Vec<_>>()),
      )
      .finish_non_exhaustive()
  }
}

/// One node of a compiled plan.
#[derive(Debug, Clone)]
pub enum PlanNode {
  Function(Arc<PlanFunction>),
  Sequence(Vec<PlanNode>),
  Parallel(Vec<PlanNode>),
}

/// The compiled, read-only representation of a [`Tree`].
#[derive(Debug)]
pub struct StaticPlan {
  tree_id: TreeId,
  nodes: Vec<PlanNode>,
}

impl StaticPlan {
  pub fn tree_id(&self) -> TreeId {
    self.tree_id
  }

  pub fn nodes(&self) -> &[PlanNode] {
    &self.nodes
  }
}

/// Compile a tree description into a [`StaticPlan`].
///
/// Rejects empty trees, empty sequences/groups/branches, unnamed
/// functions, and duplicate branch keys. Cyclic node references are
/// unrepresentable in the owned tree structure, so no cycle check is
/// needed.
pub fn compile(tree: &Tree) -> Result<StaticPlan, CompileError> {
  if tree.nodes().is_empty() {
    return Err(CompileError::EmptyTree);
  }

  Ok(StaticPlan {
    tree_id: tree.id(),
    nodes: compile_nodes(tree.nodes())?,
  })
}

fn compile_nodes(nodes: &[TreeNode]) -> Result<Vec<PlanNode>, CompileError> {
  nodes
    .iter()
    .map(|node| match node {
      TreeNode::Function(function) => compile_function(function),
      TreeNode::Sequence(nodes) => {
        if nodes.is_empty() {
          return Err(CompileError::EmptySequence);
        }
        Ok(PlanNode::Sequence(compile_nodes(nodes)?))
      }
      TreeNode::Parallel(nodes) => {
        if nodes.is_empty() {
          return Err(CompileError::EmptyGroup);
        }
        Ok(PlanNode::Parallel(compile_nodes(nodes)?))
      }
    })
    .collect()
}

fn compile_function(node: &FunctionNode) -> Result<PlanNode, CompileError> {
  if node.name.is_empty() {
    return Err(CompileError::UnnamedFunction);
  }

  let outputs = if node.outputs.is_empty() {
    None
  } else {
    let mut seen = HashSet::new();
    let mut compiled = Vec::with_capacity(node.outputs.len());

    for (key, nodes) in &node.outputs {
      if !seen.insert(key.clone()) {
        return Err(CompileError::DuplicateBranchKey {
          function: node.name.clone(),
          key: key.clone(),
        });
      }
      if nodes.is_empty() {
        return Err(CompileError::EmptyBranch {
          function: node.name.clone(),
          key: key.clone(),
        });
      }
      compiled.push((key.clone(), compile_nodes(nodes)?));
    }

    Some(compiled)
  };

  Ok(PlanNode::Function(Arc::new(PlanFunction {
    name: node.name.clone(),
    display_name: node.display_name.clone(),
    function: node.function.clone(),
    outputs,
  })))
}
