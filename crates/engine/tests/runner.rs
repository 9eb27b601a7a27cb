//! Integration tests for the run orchestrator against the in-memory
//! store: sequential execution, gate pause/approve/resume, credit
//! metering and races, cancellation, and cycle handling.

mod support;

use assert_matches::assert_matches;
use serde_json::json;

use atelier_core::nodes::NodeKind;
use atelier_db::models::status::{NodeResultStatus, RunStatus};
use atelier_engine::store::OrchestratorStore;
use atelier_engine::EngineError;

use support::{edge, harness, node, seeded};

/// prompt -> generate(sdxl, batch 2): 2 * 2 credits.
fn simple_graph() -> (Vec<atelier_core::graph::NodeDef>, Vec<atelier_core::graph::EdgeDef>) {
    let nodes = vec![
        node(
            "p1",
            NodeKind::Prompt,
            json!({"text": "a portrait of {{model.name}}"}),
        ),
        node(
            "g1",
            NodeKind::GenerateImage,
            json!({"model": "sdxl", "batch_size": 2}),
        ),
    ];
    let edges = vec![edge("p1", "text", "g1", "prompt")];
    (nodes, edges)
}

#[tokio::test]
async fn linear_run_completes_and_meters_credits() {
    let (nodes, edges) = simple_graph();
    let h = harness(seeded(nodes, edges));

    let run = h.runner.start_run(100).await.unwrap();
    h.runner.run_workflow(run.id).await.unwrap();

    let run = h.store.run(run.id).await.unwrap();
    assert_eq!(run.status_id, RunStatus::Completed.id());
    assert!(run.completed_at.is_some());
    // sdxl at 2 credits per image, batch of 2.
    assert_eq!(run.credits_used, 4);
    assert_eq!(h.store.credit_balance(1).await.unwrap(), 96);

    let results = h.store.node_results(run.id).await.unwrap();
    assert!(results
        .iter()
        .all(|r| r.status_id == NodeResultStatus::Completed.id()));

    // The generate node consumed the template-resolved upstream prompt.
    let submissions = h.pool.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0]["prompt"], "a portrait of Lena");
    assert_eq!(submissions[0]["model"], "sdxl");
}

#[tokio::test]
async fn generate_output_feeds_downstream_ports() {
    let (nodes, edges) = simple_graph();
    let h = harness(seeded(nodes, edges));

    let run = h.runner.start_run(100).await.unwrap();
    h.runner.run_workflow(run.id).await.unwrap();

    let results = h.store.node_results(run.id).await.unwrap();
    let generate = results.iter().find(|r| r.node_id == "g1").unwrap();
    let images = generate.output.as_ref().unwrap()["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
}

#[tokio::test]
async fn gate_pauses_then_approval_resumes_downstream() {
    // prompt -> generate -> pick -> edit(hosted) -> upscale -> video.
    let nodes = vec![
        node("p1", NodeKind::Prompt, json!({"text": "studio shot"})),
        node(
            "g1",
            NodeKind::GenerateImage,
            json!({"model": "sdxl", "batch_size": 2}),
        ),
        node("k1", NodeKind::Pick, json!({})),
        node(
            "e1",
            NodeKind::EditImage,
            json!({"instruction": "warmer light"}),
        ),
        node("u1", NodeKind::UpscaleImage, json!({})),
        node(
            "v1",
            NodeKind::GenerateVideo,
            json!({"model": "wan-video", "duration_secs": 5}),
        ),
    ];
    let edges = vec![
        edge("p1", "text", "g1", "prompt"),
        edge("g1", "images", "k1", "images"),
        edge("k1", "image", "e1", "image"),
        edge("e1", "image", "u1", "image"),
        edge("u1", "image", "v1", "image"),
    ];
    let h = harness(seeded(nodes, edges));

    let run = h.runner.start_run(100).await.unwrap();
    h.runner.run_workflow(run.id).await.unwrap();

    // The run halts at the pick gate before any downstream node runs.
    let paused = h.store.run(run.id).await.unwrap();
    assert_eq!(paused.status_id, RunStatus::WaitingForReview.id());

    let results = h.store.node_results(run.id).await.unwrap();
    let pick = results.iter().find(|r| r.node_id == "k1").unwrap();
    assert_eq!(pick.status_id, NodeResultStatus::WaitingForReview.id());
    assert_eq!(
        pick.output.as_ref().unwrap()["candidates"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
    let edit = results.iter().find(|r| r.node_id == "e1").unwrap();
    assert_eq!(edit.status_id, NodeResultStatus::Pending.id());

    let generate_submissions_before = h.pool.submission_count();

    // Approve with a selection; the pick completes with exactly that item.
    h.runner.approve(run.id, "k1", Some(1)).await.unwrap();
    h.runner.run_workflow(run.id).await.unwrap();

    let run = h.store.run(run.id).await.unwrap();
    assert_eq!(run.status_id, RunStatus::Completed.id());

    let results = h.store.node_results(run.id).await.unwrap();
    let pick = results.iter().find(|r| r.node_id == "k1").unwrap();
    assert_eq!(
        pick.output.as_ref().unwrap(),
        &json!({"image": "https://cdn.example/gen-2.png"})
    );

    // Resume never re-executed the generate node.
    let generate_submissions: usize = h
        .pool
        .submissions()
        .iter()
        .filter(|p| p["task"] == "image")
        .count();
    assert_eq!(generate_submissions, 1);
    assert!(h.pool.submission_count() > generate_submissions_before);

    // The hosted edit saw the selected image.
    let hosted_requests = h.hosted.requests.lock().unwrap();
    let edit_req = hosted_requests.iter().find(|r| r.task == "edit").unwrap();
    assert_eq!(edit_req.params["image"], "https://cdn.example/gen-2.png");
    drop(hosted_requests);

    // generate 4 + edit 6 + upscale 2 + video (wan 6/s * 5s) 30 = 42.
    let run = h.store.run(run.id).await.unwrap();
    assert_eq!(run.credits_used, 42);
    assert_eq!(h.store.credit_balance(1).await.unwrap(), 100 - 42);
}

#[tokio::test]
async fn cyclic_graph_fails_run_without_touching_node_results() {
    let nodes = vec![
        node("e1", NodeKind::EditImage, json!({"instruction": "a"})),
        node("e2", NodeKind::EditImage, json!({"instruction": "b"})),
    ];
    let edges = vec![
        edge("e1", "image", "e2", "image"),
        edge("e2", "image", "e1", "image"),
    ];
    let h = harness(seeded(nodes, edges));

    let run = h.runner.start_run(100).await.unwrap();
    let err = h.runner.run_workflow(run.id).await.unwrap_err();
    assert_matches!(
        err,
        EngineError::Core(atelier_core::error::CoreError::Cycle(_))
    );

    let run = h.store.run(run.id).await.unwrap();
    assert_eq!(run.status_id, RunStatus::Failed.id());
    assert!(run.error.unwrap().contains("cycle"));

    // No node result was written beyond the pre-run pending state.
    let results = h.store.node_results(run.id).await.unwrap();
    assert!(results
        .iter()
        .all(|r| r.status_id == NodeResultStatus::Pending.id() && r.output.is_none()));
}

#[tokio::test]
async fn racing_runs_cannot_overspend_the_balance() {
    let (nodes, edges) = simple_graph();
    let store = seeded(nodes, edges);
    // Exactly one generate node's worth of credits.
    store.add_agency(1, "Northlight", 4);
    let h = harness(store);

    let run_a = h.runner.start_run(100).await.unwrap();
    let run_b = h.runner.start_run(100).await.unwrap();

    let (a, b) = tokio::join!(
        h.runner.run_workflow(run_a.id),
        h.runner.run_workflow(run_b.id),
    );

    let outcomes = [
        h.store.run(run_a.id).await.unwrap().status_id,
        h.store.run(run_b.id).await.unwrap().status_id,
    ];
    let completed = outcomes
        .iter()
        .filter(|&&s| s == RunStatus::Completed.id())
        .count();
    let failed = outcomes
        .iter()
        .filter(|&&s| s == RunStatus::Failed.id())
        .count();

    assert_eq!(completed, 1, "exactly one run may win the credits");
    assert_eq!(failed, 1);
    assert_eq!(h.store.credit_balance(1).await.unwrap(), 0);
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
}

#[tokio::test]
async fn insufficient_credits_fail_node_and_run() {
    let (nodes, edges) = simple_graph();
    let store = seeded(nodes, edges);
    store.add_agency(1, "Northlight", 1);
    let h = harness(store);

    let run = h.runner.start_run(100).await.unwrap();
    let err = h.runner.run_workflow(run.id).await.unwrap_err();
    assert_matches!(err, EngineError::InsufficientCredits { needed: 4 });

    let run = h.store.run(run.id).await.unwrap();
    assert_eq!(run.status_id, RunStatus::Failed.id());
    assert_eq!(run.failed_node_id.as_deref(), Some("g1"));
    assert!(run.error.unwrap().contains("Insufficient credits"));
    // Balance untouched: the debit is all-or-nothing.
    assert_eq!(h.store.credit_balance(1).await.unwrap(), 1);
}

#[tokio::test]
async fn cancel_skips_open_nodes_and_blocks_reexecution() {
    let (nodes, edges) = simple_graph();
    let h = harness(seeded(nodes, edges));

    let run = h.runner.start_run(100).await.unwrap();
    h.runner.cancel(run.id).await.unwrap();

    let run_row = h.store.run(run.id).await.unwrap();
    assert_eq!(run_row.status_id, RunStatus::Cancelled.id());

    let results = h.store.node_results(run.id).await.unwrap();
    assert!(results
        .iter()
        .all(|r| r.status_id == NodeResultStatus::Skipped.id()));

    // A cancelled run is terminal for both re-execution and re-cancel.
    assert_matches!(
        h.runner.run_workflow(run.id).await.unwrap_err(),
        EngineError::RunTerminal(_)
    );
    assert_matches!(
        h.runner.cancel(run.id).await.unwrap_err(),
        EngineError::RunTerminal(_)
    );
}

#[tokio::test]
async fn completed_run_rejects_reexecution() {
    let (nodes, edges) = simple_graph();
    let h = harness(seeded(nodes, edges));

    let run = h.runner.start_run(100).await.unwrap();
    h.runner.run_workflow(run.id).await.unwrap();

    assert_matches!(
        h.runner.run_workflow(run.id).await.unwrap_err(),
        EngineError::RunTerminal(_)
    );
    // And nothing was re-submitted.
    assert_eq!(h.pool.submission_count(), 1);
}

#[tokio::test]
async fn approval_requires_a_paused_run_and_the_paused_node() {
    let nodes = vec![
        node("p1", NodeKind::Prompt, json!({"text": "x"})),
        node("g1", NodeKind::GenerateImage, json!({"model": "sdxl"})),
        node("k1", NodeKind::Pick, json!({})),
    ];
    let edges = vec![
        edge("p1", "text", "g1", "prompt"),
        edge("g1", "images", "k1", "images"),
    ];
    let h = harness(seeded(nodes, edges));

    let run = h.runner.start_run(100).await.unwrap();

    // Not paused yet.
    assert_matches!(
        h.runner.approve(run.id, "k1", None).await.unwrap_err(),
        EngineError::InvalidApproval(_)
    );

    h.runner.run_workflow(run.id).await.unwrap();

    // Wrong node.
    assert_matches!(
        h.runner.approve(run.id, "g1", None).await.unwrap_err(),
        EngineError::InvalidApproval(_)
    );

    // Out-of-range selection.
    assert_matches!(
        h.runner.approve(run.id, "k1", Some(9)).await.unwrap_err(),
        EngineError::InvalidApproval(_)
    );

    // A valid approval without a selection defaults to the first item.
    h.runner.approve(run.id, "k1", None).await.unwrap();
    h.runner.run_workflow(run.id).await.unwrap();

    let results = h.store.node_results(run.id).await.unwrap();
    let pick = results.iter().find(|r| r.node_id == "k1").unwrap();
    assert_eq!(
        pick.output.as_ref().unwrap()["image"],
        "https://cdn.example/gen-1.png"
    );
    assert_eq!(
        h.store.run(run.id).await.unwrap().status_id,
        RunStatus::Completed.id()
    );
}

#[tokio::test]
async fn inactive_workflow_cannot_start_a_run() {
    let (nodes, edges) = simple_graph();
    let store = support::MemoryStore::new();
    store.add_agency(1, "Northlight", 100);
    store.add_profile(10, 1, "Lena");
    store.add_workflow(
        100,
        1,
        Some(10),
        atelier_db::models::status::WorkflowStatus::Draft,
        nodes,
        edges,
    );
    let h = harness(store);

    let err = h.runner.start_run(100).await.unwrap_err();
    assert!(err.to_string().contains("active"));
}

#[tokio::test]
async fn workflow_without_model_profile_cannot_start() {
    let (nodes, edges) = simple_graph();
    let store = support::MemoryStore::new();
    store.add_agency(1, "Northlight", 100);
    store.add_workflow(
        100,
        1,
        None,
        atelier_db::models::status::WorkflowStatus::Active,
        nodes,
        edges,
    );
    let h = harness(store);

    let err = h.runner.start_run(100).await.unwrap_err();
    assert!(err.to_string().contains("model profile"));
}
