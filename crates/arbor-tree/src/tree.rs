//! Caller-authored tree descriptions.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::context::Context;
use crate::output::{FunctionResult, TreeFn};

/// Opaque identity token for a [`Tree`].
///
/// Assigned once at construction and preserved by `Clone`, so a cloned
/// tree shares its original's compiled plan while a structurally
/// identical but separately built tree compiles and caches on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(Uuid);

impl TreeId {
  fn new() -> Self {
    Self(Uuid::new_v4())
  }
}

impl fmt::Display for TreeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// One entry in a tree description.
#[derive(Debug, Clone)]
pub enum TreeNode {
  /// A single function.
  Function(FunctionNode),
  /// An ordered sub-tree; entries run one after another.
  Sequence(Vec<TreeNode>),
  /// Sibling sub-trees started together and joined when all settle.
  Parallel(Vec<TreeNode>),
}

/// A function entry: the callable plus its declared metadata.
///
/// `outputs` registers the conditional sub-trees the function may select
/// with a path result. Declaring outputs obligates the function to
/// resolve to a path; anything else is a contract violation at run time.
#[derive(Clone)]
pub struct FunctionNode {
  pub(crate) name: String,
  pub(crate) display_name: Option<String>,
  pub(crate) function: TreeFn,
  pub(crate) outputs: Vec<(String, Vec<TreeNode>)>,
}

impl FunctionNode {
  pub fn new<F>(name: impl Into<String>, function: F) -> Self
  where
    F: Fn(Context) -> FunctionResult + Send + Sync + 'static,
  {
    Self {
      name: name.into(),
      display_name: None,
      function: Arc::new(function),
      outputs: Vec::new(),
    }
  }

  /// Optional human-facing name carried through plan and events.
  pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
    self.display_name = Some(display_name.into());
    self
  }

  /// Register the sub-tree for one branch key. Duplicate keys are
  /// rejected at compile time.
  pub fn output(mut self, key: impl Into<String>, nodes: Vec<TreeNode>) -> Self {
    self.outputs.push((key.into(), nodes));
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

impl fmt::Debug for FunctionNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FunctionNode")
      .field("name", &self.name)
      .field("display_name", &self.display_name)
      .field(
        "outputs",
        &self.outputs.iter().map(|(key, _)| key).collect::<Vec<_>>(),
      )
      .finish_non_exhaustive()
  }
}

/// Shorthand for a plain function node.
pub fn function<F>(name: impl Into<String>, f: F) -> TreeNode
where
  F: Fn(Context) -> FunctionResult + Send + Sync + 'static,
{
  TreeNode::Function(FunctionNode::new(name, f))
}

/// Shorthand for a sequential sub-tree.
pub fn sequence(nodes: Vec<TreeNode>) -> TreeNode {
  TreeNode::Sequence(nodes)
}

/// Shorthand for a parallel group.
pub fn parallel(nodes: Vec<TreeNode>) -> TreeNode {
  TreeNode::Parallel(nodes)
}

/// A complete, immutable tree description.
#[derive(Debug, Clone)]
pub struct Tree {
  id: TreeId,
  nodes: Arc<Vec<TreeNode>>,
}

impl Tree {
  pub fn new(nodes: Vec<TreeNode>) -> Self {
    Self {
      id: TreeId::new(),
      nodes: Arc::new(nodes),
    }
  }

  pub fn id(&self) -> TreeId {
    self.id
  }

  pub fn nodes(&self) -> &[TreeNode] {
    &self.nodes
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::output::Output;

  #[test]
  fn test_clone_preserves_identity() {
    let tree = Tree::new(vec![function("noop", |_| Ok(Output::none()))]);
    let clone = tree.clone();

    assert_eq!(tree.id(), clone.id());
  }

  #[test]
  fn test_identical_structure_distinct_identity() {
    let a = Tree::new(vec![function("noop", |_| Ok(Output::none()))]);
    let b = Tree::new(vec![function("noop", |_| Ok(Output::none()))]);

    assert_ne!(a.id(), b.id());
  }
}
