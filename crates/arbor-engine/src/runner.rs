//! Plan traversal.
//!
//! Sequential nodes run one after another, each function's interpreted
//! result feeding the next payload. Parallel groups start every sibling
//! as a task, join once all have settled, and process outcomes in
//! declared order so the merged payload is deterministic regardless of
//! settlement order. When a group fails, siblings that were already in
//! flight settle but their outcomes are discarded; their side effects
//! are not rolled back.

use std::sync::Arc;

use arbor_tree::{ExecutionInfo, Output, PlanFunction, PlanNode};
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::RunError;
use crate::events::{EventBus, NodeInfo, TreeEvent};
use crate::interpreter::{Interpretation, classify, merge_payload};
use crate::provider::{ContextProvider, build_context};

/// How a (sub-)traversal ended.
#[derive(Debug)]
pub(crate) enum Flow {
  /// Plan segment exhausted; carry this payload forward.
  Continue(Value),
  /// A function signalled abort; stop the whole run. Carries the
  /// payload the aborting function received.
  Aborted(Value),
}

/// State shared by every invocation of one run.
#[derive(Clone)]
pub(crate) struct RunContext {
  pub session: ExecutionInfo,
  pub bus: EventBus,
  pub providers: Arc<[Arc<dyn ContextProvider>]>,
}

/// Walk a list of sibling nodes in declared order.
pub(crate) fn execute_nodes<'a>(
  run: &'a RunContext,
  nodes: &'a [PlanNode],
  payload: Value,
) -> BoxFuture<'a, Result<Flow, RunError>> {
  async move {
    let mut payload = payload;
    for node in nodes {
      match execute_node(run, node, payload).await? {
        Flow::Continue(next) => payload = next,
        aborted @ Flow::Aborted(_) => return Ok(aborted),
      }
    }
    Ok(Flow::Continue(payload))
  }
  .boxed()
}

async fn execute_node(
  run: &RunContext,
  node: &PlanNode,
  payload: Value,
) -> Result<Flow, RunError> {
  match node {
    PlanNode::Function(function) => invoke_function(run, function, payload).await,
    PlanNode::Sequence(nodes) => execute_nodes(run, nodes, payload).await,
    PlanNode::Parallel(group) => execute_group(run, group, payload).await,
  }
}

/// Start all siblings without waiting for any to settle, join them all,
/// then process outcomes in declared order.
async fn execute_group(
  run: &RunContext,
  group: &[PlanNode],
  payload: Value,
) -> Result<Flow, RunError> {
  let mut handles = Vec::with_capacity(group.len());
  for sibling in group {
    let run = run.clone();
    let sibling = vec![sibling.clone()];
    let payload = payload.clone();
    handles.push(tokio::spawn(async move {
      execute_nodes(&run, &sibling, payload).await
    }));
  }

  let settled = join_all(handles).await;

  let mut merged = payload;
  let mut outcomes = settled.into_iter();
  while let Some(joined) = outcomes.next() {
    let outcome = joined.map_err(|e| RunError::Join {
      message: e.to_string(),
    })?;
    match outcome {
      Ok(Flow::Continue(contribution)) => {
        merged = merge_payload(&merged, &contribution);
      }
      Ok(Flow::Aborted(abort_payload)) => {
        if outcomes.len() > 0 {
          warn!(
            execution_id = %run.session.id,
            discarded = outcomes.len(),
            "parallel group aborted; discarding remaining sibling outcomes"
          );
        }
        return Ok(Flow::Aborted(abort_payload));
      }
      Err(error) => {
        if outcomes.len() > 0 {
          warn!(
            execution_id = %run.session.id,
            discarded = outcomes.len(),
            "parallel group failed; discarding remaining sibling outcomes"
          );
        }
        return Err(error);
      }
    }
  }

  Ok(Flow::Continue(merged))
}

/// One function invocation: build the context, call, resolve deferred
/// results, classify, and act.
async fn invoke_function(
  run: &RunContext,
  function: &Arc<PlanFunction>,
  payload: Value,
) -> Result<Flow, RunError> {
  let node = NodeInfo::from(function.as_ref());

  info!(
    execution_id = %run.session.id,
    function = %node.name,
    "function started"
  );
  run.bus.emit(TreeEvent::FunctionStart {
    session: run.session.clone(),
    node: node.clone(),
    payload: payload.clone(),
  });

  let context = build_context(&run.providers, &run.session, function, &payload);
  let mut result = function.call(context);

  let output = loop {
    match result {
      Err(source) => {
        return Err(RunError::Function {
          function: node.name.clone(),
          source,
        });
      }
      Ok(Output::Deferred(future)) => {
        info!(
          execution_id = %run.session.id,
          function = %node.name,
          "function deferred"
        );
        run.bus.emit(TreeEvent::AsyncFunction {
          session: run.session.clone(),
          node: node.clone(),
          payload: payload.clone(),
        });
        result = future.await;
      }
      Ok(output) => break output,
    }
  };

  match classify(function, output, &payload)? {
    Interpretation::Abort => {
      info!(
        execution_id = %run.session.id,
        function = %node.name,
        "run aborted by function"
      );
      run.bus.emit(TreeEvent::Abort {
        session: run.session.clone(),
        node,
        payload: payload.clone(),
      });
      Ok(Flow::Aborted(payload))
    }
    Interpretation::Continue(next_payload) => {
      run.bus.emit(TreeEvent::FunctionEnd {
        session: run.session.clone(),
        node,
        payload,
      });
      Ok(Flow::Continue(next_payload))
    }
    Interpretation::Branch {
      key,
      payload: branch_payload,
    } => {
      let Some(branch) = function.branch(&key) else {
        return Err(RunError::UnknownBranch {
          function: node.name,
          branch: key,
        });
      };
      run.bus.emit(TreeEvent::FunctionEnd {
        session: run.session.clone(),
        node,
        payload,
      });
      execute_nodes(run, branch, branch_payload).await
    }
  }
}
