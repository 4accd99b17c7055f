//! Context providers.
//!
//! The execution context handed to a function is assembled by folding
//! the engine's registered providers, in registration order, over a seed
//! context that already carries the built-in capabilities (execution
//! view, input view, path builder). Each provider mutates the one
//! context in place; replacing the context is not expressible, so every
//! function observes a single consistent context identity.
//!
//! The fold runs once per function invocation. Providers therefore see
//! the current function node and the current payload, never a stale one.

use std::any::Any;
use std::sync::Arc;

use arbor_tree::{Capability, Context, ExecutionInfo, PlanFunction};
use serde_json::Value;

use crate::events::NodeInfo;

/// A context-contributing unit in the engine's provider chain.
pub trait ContextProvider: Send + Sync {
  fn provide(&self, context: &mut Context, node: &NodeInfo, payload: &Value);
}

impl<F> ContextProvider for F
where
  F: Fn(&mut Context, &NodeInfo, &Value) + Send + Sync,
{
  fn provide(&self, context: &mut Context, node: &NodeInfo, payload: &Value) {
    self(context, node, payload)
  }
}

/// A plain capability map merged shallowly into the context.
///
/// The non-callable provider form: entries are inserted in registration
/// order, later entries (from this or later providers) replacing earlier
/// ones under the same name.
#[derive(Default)]
pub struct Capabilities {
  entries: Vec<(String, Capability)>,
}

impl Capabilities {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
    self.entries.push((name.into(), Arc::new(value)));
    self
  }
}

impl ContextProvider for Capabilities {
  fn provide(&self, context: &mut Context, _node: &NodeInfo, _payload: &Value) {
    for (name, capability) in &self.entries {
      context.insert(name.clone(), capability.clone());
    }
  }
}

/// Build the context for one function invocation: seed with the
/// built-ins, then fold the provider chain in registration order.
pub(crate) fn build_context(
  providers: &[Arc<dyn ContextProvider>],
  session: &ExecutionInfo,
  function: &PlanFunction,
  payload: &Value,
) -> Context {
  let node = NodeInfo::from(function);
  let mut context = Context::new(session.clone(), function.name(), payload.clone());

  for provider in providers {
    provider.provide(&mut context, &node, payload);
  }

  context
}
