//! Integration tests for Engine::run covering traversal, branching,
//! parallel joins, abort, error routing, and the event protocol.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arbor_engine::{
  Capabilities, Engine, FunctionNode, Output, RunError, RunRequest, RunStatus, Tree, TreeEvent,
  TreeNode, function, parallel,
};
use serde_json::{Value, json};
use tokio::sync::broadcast::Receiver;

/// Marker error for asserting the exact instance travels through.
#[derive(Debug)]
struct Boom;

impl fmt::Display for Boom {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "boom")
  }
}

impl std::error::Error for Boom {}

type Trace = Arc<Mutex<Vec<String>>>;

fn trace() -> Trace {
  Arc::new(Mutex::new(Vec::new()))
}

fn traced(trace: &Trace, name: &str, output: Value) -> TreeNode {
  let trace = trace.clone();
  let name_owned = name.to_string();
  function(name, move |_| {
    trace.lock().unwrap().push(name_owned.clone());
    Ok(Output::value(output.clone()))
  })
}

fn drain(rx: &mut Receiver<TreeEvent>) -> Vec<TreeEvent> {
  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }
  events
}

fn event_names(events: &[TreeEvent]) -> Vec<&'static str> {
  events.iter().map(TreeEvent::name).collect()
}

#[tokio::test]
async fn test_sequential_chain_merges_payload_in_declared_order() {
  let engine = Engine::new();
  let trace = trace();
  let tree = Tree::new(vec![
    traced(&trace, "f1", json!({"payload": 1})),
    traced(&trace, "f2", json!({"payload": 2})),
    traced(&trace, "f3", json!({"payload": 3})),
  ]);

  let outcome = engine.run(&tree, RunRequest::new()).await.unwrap();

  assert_eq!(outcome.status, RunStatus::Completed);
  assert_eq!(outcome.payload, json!({"payload": 3}));
  assert_eq!(*trace.lock().unwrap(), vec!["f1", "f2", "f3"]);
}

#[tokio::test]
async fn test_lifecycle_events_in_order() {
  let engine = Engine::new();
  let mut rx = engine.subscribe();
  let trace = trace();
  let tree = Tree::new(vec![
    traced(&trace, "f1", json!({"a": 1})),
    traced(&trace, "f2", json!({"b": 2})),
  ]);

  engine.run(&tree, RunRequest::new()).await.unwrap();

  let events = drain(&mut rx);
  assert_eq!(
    event_names(&events),
    vec![
      "start",
      "function_start",
      "function_end",
      "function_start",
      "function_end",
      "end",
    ]
  );

  let started: Vec<_> = events
    .iter()
    .filter_map(|event| match event {
      TreeEvent::FunctionStart { node, .. } => Some(node.name.clone()),
      _ => None,
    })
    .collect();
  assert_eq!(started, vec!["f1", "f2"]);
}

#[tokio::test]
async fn test_outputs_function_returning_value_fails_run() {
  let engine = Engine::new();
  let trace_cells = trace();
  let successor = traced(&trace_cells, "after", json!({}));
  let tree = Tree::new(vec![
    TreeNode::Function(
      FunctionNode::new("decide", |_| Ok(Output::value(json!({"not": "a path"}))))
        .output("success", vec![function("ok", |_| Ok(Output::none()))]),
    ),
    successor,
  ]);

  let error = engine.run(&tree, RunRequest::new()).await.unwrap_err();

  assert!(matches!(&*error, RunError::NotAPath { function, .. } if function == "decide"));
  assert!(trace_cells.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_abort_halts_traversal() {
  let engine = Engine::new();
  let mut rx = engine.subscribe();
  let trace_cells = trace();
  let tree = Tree::new(vec![
    function("stop", |ctx| Ok(ctx.abort())),
    traced(&trace_cells, "after", json!({})),
  ]);

  let outcome = engine
    .run(&tree, RunRequest::new().payload(json!({"k": 1})))
    .await
    .unwrap();

  assert_eq!(outcome.status, RunStatus::Aborted);
  assert_eq!(outcome.payload, json!({"k": 1}));
  assert!(trace_cells.lock().unwrap().is_empty());

  let events = drain(&mut rx);
  let names = event_names(&events);
  assert!(names.contains(&"abort"));
  assert!(!names.contains(&"end"));
  assert!(!names.contains(&"function_end"));
}

#[tokio::test]
async fn test_parallel_merges_in_declared_order() {
  let engine = Engine::new();
  let tree = Tree::new(vec![parallel(vec![
    function("a", |_| {
      Ok(Output::deferred(async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(Output::value(json!({"winner": "a", "a": 1})))
      }))
    }),
    function("b", |_| {
      Ok(Output::deferred(async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(Output::value(json!({"winner": "b", "b": 2})))
      }))
    }),
  ])]);

  let outcome = engine.run(&tree, RunRequest::new()).await.unwrap();

  // b settles first, but declared order a then b decides the merge
  assert_eq!(outcome.payload, json!({"winner": "b", "a": 1, "b": 2}));
}

#[tokio::test]
async fn test_abort_in_parallel_group_aborts_run() {
  let engine = Engine::new();
  let tree = Tree::new(vec![
    parallel(vec![
      function("quit", |ctx| Ok(ctx.abort())),
      function("slow", |_| {
        Ok(Output::deferred(async {
          tokio::time::sleep(Duration::from_millis(10)).await;
          Ok(Output::value(json!({"slow": true})))
        }))
      }),
    ]),
    function("after", |_| Ok(Output::value(json!({"after": true})))),
  ]);

  let outcome = engine.run(&tree, RunRequest::new()).await.unwrap();

  assert_eq!(outcome.status, RunStatus::Aborted);
  assert!(outcome.payload.get("after").is_none());
}

#[tokio::test]
async fn test_sync_error_delivers_exact_instance() {
  let engine = Engine::new();
  let mut rx = engine.subscribe();
  let tree = Tree::new(vec![function("explode", |_| Err(anyhow::Error::new(Boom)))]);

  let error = engine.run(&tree, RunRequest::new()).await.unwrap_err();

  match &*error {
    RunError::Function { function, source } => {
      assert_eq!(function, "explode");
      assert!(source.downcast_ref::<Boom>().is_some());
    }
    other => panic!("expected function error, got {:?}", other),
  }

  let events = drain(&mut rx);
  assert!(!event_names(&events).contains(&"function_end"));

  // the broadcast error is the same instance the run resolved with
  match events.last() {
    Some(TreeEvent::Error { error: broadcast, .. }) => {
      assert!(Arc::ptr_eq(broadcast, &error));
    }
    other => panic!("expected trailing error event, got {:?}", other),
  }
}

#[tokio::test]
async fn test_branch_selection_replaces_payload() {
  let engine = Engine::new();
  let trace_cells = trace();
  let tree = Tree::new(vec![
    TreeNode::Function(
      FunctionNode::new("decide", |ctx| {
        Ok(ctx.path("success", json!({"from_path": true})))
      })
      .output("success", vec![traced(&trace_cells, "on_success", json!({}))])
      .output("failure", vec![traced(&trace_cells, "on_failure", json!({}))]),
    ),
    function("tail", |_| Ok(Output::value(json!({"tail": true})))),
  ]);

  let outcome = engine
    .run(&tree, RunRequest::new().payload(json!({"orig": 1})))
    .await
    .unwrap();

  // path payload replaced the original; traversal resumed after decide
  assert_eq!(outcome.payload, json!({"from_path": true, "tail": true}));
  assert_eq!(*trace_cells.lock().unwrap(), vec!["on_success"]);
}

#[tokio::test]
async fn test_unknown_branch_key_fails() {
  let engine = Engine::new();
  let tree = Tree::new(vec![TreeNode::Function(
    FunctionNode::new("decide", |ctx| Ok(ctx.path("missing", json!({}))))
      .output("success", vec![function("ok", |_| Ok(Output::none()))]),
  )]);

  let error = engine.run(&tree, RunRequest::new()).await.unwrap_err();

  assert!(
    matches!(&*error, RunError::UnknownBranch { function, branch }
      if function == "decide" && branch == "missing")
  );
}

#[tokio::test]
async fn test_deferred_value_emits_async_event() {
  let engine = Engine::new();
  let mut rx = engine.subscribe();
  let tree = Tree::new(vec![function("later", |_| {
    Ok(Output::deferred(async {
      Ok(Output::value(json!({"deferred": true})))
    }))
  })]);

  let outcome = engine.run(&tree, RunRequest::new()).await.unwrap();

  assert_eq!(outcome.payload, json!({"deferred": true}));
  assert_eq!(
    event_names(&drain(&mut rx)),
    vec![
      "start",
      "function_start",
      "async_function",
      "function_end",
      "end",
    ]
  );
}

#[tokio::test]
async fn test_deferred_error_routed_to_error_path() {
  let engine = Engine::new();
  let tree = Tree::new(vec![function("later", |_| {
    Ok(Output::deferred(async { Err(anyhow::Error::new(Boom)) }))
  })]);

  let error = engine.run(&tree, RunRequest::new()).await.unwrap_err();

  match &*error {
    RunError::Function { source, .. } => {
      assert!(source.downcast_ref::<Boom>().is_some());
    }
    other => panic!("expected function error, got {:?}", other),
  }
}

#[tokio::test]
async fn test_deferred_path_selects_branch() {
  let engine = Engine::new();
  let tree = Tree::new(vec![TreeNode::Function(
    FunctionNode::new("decide", |_| {
      Ok(Output::deferred(async {
        Ok(Output::path("success", json!({"via": "deferred"})))
      }))
    })
    .output(
      "success",
      vec![function("ok", |_| Ok(Output::value(json!({"ok": true}))))],
    ),
  )]);

  let outcome = engine.run(&tree, RunRequest::new()).await.unwrap();

  assert_eq!(outcome.payload, json!({"via": "deferred", "ok": true}));
}

#[tokio::test]
async fn test_deferred_outputs_violation_is_error() {
  let engine = Engine::new();
  let tree = Tree::new(vec![TreeNode::Function(
    FunctionNode::new("decide", |_| {
      Ok(Output::deferred(async {
        Ok(Output::value(json!({"not": "a path"})))
      }))
    })
    .output("success", vec![function("ok", |_| Ok(Output::none()))]),
  )]);

  let error = engine.run(&tree, RunRequest::new()).await.unwrap_err();
  assert!(matches!(&*error, RunError::NotAPath { .. }));
}

#[tokio::test]
async fn test_non_object_payload_is_config_error() {
  let engine = Engine::new();
  let mut rx = engine.subscribe();
  let tree = Tree::new(vec![function("noop", |_| Ok(Output::none()))]);

  let error = engine
    .run(&tree, RunRequest::new().payload(json!([1, 2])))
    .await
    .unwrap_err();

  assert!(matches!(&*error, RunError::InvalidPayload { .. }));
  // configuration errors never reach the event bus
  assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_compile_error_surfaces_without_events() {
  let engine = Engine::new();
  let mut rx = engine.subscribe();
  let tree = Tree::new(vec![]);

  let error = engine.run(&tree, RunRequest::new()).await.unwrap_err();

  assert!(matches!(&*error, RunError::Compile(_)));
  assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_provider_capabilities_visible_to_functions() {
  let engine = Engine::builder()
    .capabilities(Capabilities::new().with("greeting", "hello".to_string()))
    .build();

  let tree = Tree::new(vec![function("greet", |ctx| {
    let greeting = ctx
      .get::<String>("greeting")
      .map(|s| s.as_str().to_string())
      .unwrap_or_default();
    Ok(Output::value(json!({"greeting": greeting})))
  })]);

  let outcome = engine.run(&tree, RunRequest::new()).await.unwrap();
  assert_eq!(outcome.payload, json!({"greeting": "hello"}));
}

#[tokio::test]
async fn test_named_run_carries_label() {
  let engine = Engine::new();
  let mut rx = engine.subscribe();
  let tree = Tree::new(vec![function("noop", |_| Ok(Output::none()))]);

  let outcome = engine
    .run(&tree, RunRequest::new().name("checkout"))
    .await
    .unwrap();

  assert_eq!(outcome.session.name.as_deref(), Some("checkout"));
  match drain(&mut rx).first() {
    Some(TreeEvent::Start { session, .. }) => {
      assert_eq!(session.id, outcome.session.id);
      assert_eq!(session.name.as_deref(), Some("checkout"));
    }
    other => panic!("expected start event, got {:?}", other),
  }
}

#[tokio::test]
async fn test_concurrent_runs_have_distinct_sessions() {
  let engine = Arc::new(Engine::new());
  let tree = Tree::new(vec![function("noop", |_| {
    Ok(Output::deferred(async {
      tokio::time::sleep(Duration::from_millis(5)).await;
      Ok(Output::none())
    }))
  })]);

  let first = engine.run(&tree, RunRequest::new());
  let second = engine.run(&tree, RunRequest::new());
  let (first, second) = tokio::join!(first, second);

  assert_ne!(first.unwrap().session.id, second.unwrap().session.id);
}
