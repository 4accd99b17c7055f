//! Plan caching.
//!
//! Trees are compiled once and cached for the lifetime of the engine
//! instance. The cache is keyed by [`TreeId`], so a cloned tree reuses
//! its original's plan while a structurally identical but separately
//! built tree compiles on its own. No eviction.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use arbor_tree::{StaticPlan, Tree, TreeId, compile};

use crate::error::RunError;

/// Caches compiled plans by tree identity.
pub struct PlanCache {
  cache: RwLock<HashMap<TreeId, Arc<StaticPlan>>>,
}

impl PlanCache {
  pub fn new() -> Self {
    Self {
      cache: RwLock::new(HashMap::new()),
    }
  }

  /// Get a compiled plan from cache, or compile and cache it.
  ///
  /// Two runs racing on the same uncached tree may both compile;
  /// compilation is pure, and the `entry` insert keeps one winner so
  /// both observe the same plan.
  pub fn get_or_compile(&self, tree: &Tree) -> Result<Arc<StaticPlan>, RunError> {
    // Try read lock first
    {
      let cache = self.cache.read().map_err(|e| RunError::CachePoisoned {
        message: e.to_string(),
      })?;
      if let Some(plan) = cache.get(&tree.id()) {
        return Ok(plan.clone());
      }
    }

    // Compile outside the lock, insert with write lock
    let plan = Arc::new(compile(tree)?);

    let mut cache = self.cache.write().map_err(|e| RunError::CachePoisoned {
      message: e.to_string(),
    })?;
    Ok(cache.entry(tree.id()).or_insert(plan).clone())
  }

  /// Drop all cached plans.
  pub fn clear(&self) {
    let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
    cache.clear();
  }
}

impl Default for PlanCache {
  fn default() -> Self {
    Self::new()
  }
}
