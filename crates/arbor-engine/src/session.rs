//! Per-run bookkeeping.

use std::sync::Arc;

use arbor_tree::{ExecutionInfo, StaticPlan};
use chrono::Utc;
use uuid::Uuid;

/// One top-level run: identity, creation time, and the resolved plan.
///
/// Created immediately before traversal starts and owned exclusively by
/// that run; never reused.
pub(crate) struct Session {
  pub info: ExecutionInfo,
  pub plan: Arc<StaticPlan>,
}

impl Session {
  pub fn new(name: Option<String>, plan: Arc<StaticPlan>) -> Self {
    Self {
      info: ExecutionInfo {
        id: Uuid::new_v4(),
        name,
        started_at: Utc::now(),
      },
      plan,
    }
  }
}
