//! Human-input pause/resume across engine invocations.

mod common;

use std::sync::Arc;

use serde_json::json;

use agentflow_engine::{EngineError, ExecutionState, FlowEvent, HumanInput};

use common::*;

fn human_flow() -> agentflow_engine::FlowGraphDef {
    flow_def(
        vec![
            start_node("start_0"),
            simple_node("human_0", "humanInputAgentflow"),
            simple_node("llm_final", "llmAgentflow"),
        ],
        vec![
            edge("start_0", 0, "human_0"),
            edge("human_0", 0, "llm_final"),
        ],
    )
}

fn human_harness() -> Harness {
    Harness::new(human_flow(), |registry| {
        registry.register("startAgentflow", Arc::new(ContentRunner));
        registry.register("humanInputAgentflow", Arc::new(HumanResume));
        registry.register("llmAgentflow", Arc::new(ContentRunner));
    })
}

fn resume_input() -> HumanInput {
    HumanInput {
        start_node_id: "human_0".to_string(),
        feedback: Some("ok".to_string()),
        response: Some("proceed".to_string()),
    }
}

#[tokio::test]
async fn test_pause_at_human_input_node() {
    let harness = human_harness();
    let out = harness.run_question("deploy?").await;
    let result = out.result.unwrap();

    let rows = harness.execution_store.rows().await;
    assert_eq!(rows[0].state, ExecutionState::Stopped);
    assert!(rows[0].stopped_date.is_some());

    let last = result.agent_flow_executed_data.last().unwrap();
    assert_eq!(last.node_id, "human_0");
    assert_eq!(last.status, ExecutionState::Stopped);
    let action = &last.data["output"]["humanInputAction"];
    assert_eq!(action["id"], json!("human_0"));
    assert!(action["elements"].is_array());

    // the pause streamed an action event and a STOPPED flow status
    assert!(out
        .events
        .iter()
        .any(|m| matches!(m.event, FlowEvent::Action { .. })));
    assert!(matches!(
        out.events.last().unwrap().event,
        FlowEvent::AgentFlow { status: ExecutionState::Stopped }
    ));

    // the api chat row carries the pending action
    let messages = harness.chat_store.messages().await;
    let api_row = messages.last().unwrap();
    assert!(api_row.action.is_some());

    // nothing past the human node ran
    assert!(!result
        .agent_flow_executed_data
        .iter()
        .any(|e| e.node_id == "llm_final"));
}

#[tokio::test]
async fn test_resume_replays_from_human_node() {
    let harness = human_harness();
    harness.run_question("deploy?").await.result.unwrap();

    let out = harness.run_resume(resume_input()).await;
    let result = out.result.unwrap();

    let entries = &result.agent_flow_executed_data;
    // the stale STOPPED entry was dropped; human_0 appears once, FINISHED
    let human_entries: Vec<_> = entries.iter().filter(|e| e.node_id == "human_0").collect();
    assert_eq!(human_entries.len(), 1);
    assert_eq!(human_entries[0].status, ExecutionState::Finished);
    assert_eq!(
        human_entries[0].data["output"]["content"],
        json!("approved: ok")
    );

    assert_eq!(entries.last().unwrap().node_id, "llm_final");
    assert_eq!(result.text, "llm_final output");

    let rows = harness.execution_store.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].state, ExecutionState::Finished);

    // the pending action was cleared from the paused api row
    let messages = harness.chat_store.messages().await;
    assert!(messages.iter().all(|m| m.action.is_none()));
}

#[tokio::test]
async fn test_resume_rehydrates_state_from_checkpoint() {
    let def = flow_def(
        vec![
            start_node("start_0"),
            simple_node("counter", "stepAgentflow"),
            simple_node("human_0", "humanInputAgentflow"),
            prompt_node("llm_final", "count was {{ $flow.state.count }}"),
        ],
        vec![
            edge("start_0", 0, "counter"),
            edge("counter", 0, "human_0"),
            edge("human_0", 0, "llm_final"),
        ],
    );
    let harness = Harness::new(def, |registry| {
        registry.register("startAgentflow", Arc::new(ContentRunner));
        registry.register("stepAgentflow", Arc::new(StateCounter));
        registry.register("humanInputAgentflow", Arc::new(HumanResume));
        registry.register("llmAgentflow", Arc::new(PromptEcho));
    });

    harness.run_question("go").await.result.unwrap();
    let out = harness.run_resume(resume_input()).await;
    let result = out.result.unwrap();
    // state.count survived the process boundary via the checkpoint
    assert_eq!(result.text, "count was 1");
}

#[tokio::test]
async fn test_second_resume_is_rejected() {
    let harness = human_harness();
    harness.run_question("deploy?").await.result.unwrap();

    harness.run_resume(resume_input()).await.result.unwrap();
    let second = harness.run_resume(resume_input()).await;
    assert!(matches!(second.result, Err(EngineError::InvalidResume(_))));
}

#[tokio::test]
async fn test_resume_of_finished_execution_is_rejected() {
    let def = flow_def(
        vec![start_node("start_0"), simple_node("llm_0", "llmAgentflow")],
        vec![edge("start_0", 0, "llm_0")],
    );
    let harness = Harness::new(def, |registry| {
        registry.register("startAgentflow", Arc::new(ContentRunner));
        registry.register("llmAgentflow", Arc::new(ContentRunner));
    });
    harness.run_question("hi").await.result.unwrap();

    let out = harness
        .run_resume(HumanInput {
            start_node_id: "llm_0".to_string(),
            feedback: None,
            response: None,
        })
        .await;
    assert!(matches!(out.result, Err(EngineError::InvalidResume(_))));
}

#[tokio::test]
async fn test_resume_without_prior_execution_is_rejected() {
    let harness = human_harness();
    let out = harness.run_resume(resume_input()).await;
    assert!(matches!(out.result, Err(EngineError::InvalidResume(_))));
}

#[tokio::test]
async fn test_resume_with_unknown_node_is_rejected() {
    let harness = human_harness();
    harness.run_question("deploy?").await.result.unwrap();

    let out = harness
        .run_resume(HumanInput {
            start_node_id: "ghost".to_string(),
            feedback: None,
            response: None,
        })
        .await;
    assert!(matches!(
        out.result,
        Err(EngineError::NodeNotInCheckpoint(ref id)) if id == "ghost"
    ));
    // the execution stays STOPPED and resumable
    let rows = harness.execution_store.rows().await;
    assert_eq!(rows[0].state, ExecutionState::Stopped);
}

#[tokio::test]
async fn test_loop_clears_human_input_before_reentry() {
    // step -> human -> loop(back to step): the resume answer applies to the
    // first human pass only; the loop re-entry pauses again
    let def = flow_def(
        vec![
            start_node("start_0"),
            simple_node("step", "stepAgentflow"),
            simple_node("human_0", "humanInputAgentflow"),
            node_with_inputs(
                "loop_0",
                "loopAgentflow",
                json!({"nodeID": "step", "maxLoopCount": 5}),
            ),
        ],
        vec![
            edge("start_0", 0, "step"),
            edge("step", 0, "human_0"),
            edge("human_0", 0, "loop_0"),
        ],
    );
    let harness = Harness::new(def, |registry| {
        registry.register("startAgentflow", Arc::new(ContentRunner));
        registry.register("stepAgentflow", Arc::new(StateCounter));
        registry.register("humanInputAgentflow", Arc::new(HumanResume));
        registry.register("loopAgentflow", Arc::new(LoopRunner));
    });

    harness.run_question("go").await.result.unwrap();
    let out = harness.run_resume(resume_input()).await;
    let result = out.result.unwrap();

    // resumed human ran, loop re-entered step, and the second human pass
    // paused the flow again
    let rows = harness.execution_store.rows().await;
    assert_eq!(rows[0].state, ExecutionState::Stopped);
    let last = result.agent_flow_executed_data.last().unwrap();
    assert_eq!(last.node_id, "human_0");
    assert_eq!(last.status, ExecutionState::Stopped);
    let step_count = result
        .agent_flow_executed_data
        .iter()
        .filter(|e| e.node_id == "step")
        .count();
    assert_eq!(step_count, 2);
}
