//! Integration tests for the plan → search → summarize → judge → answer loop
//!
//! All model and store calls go through scripted fakes, so every run is
//! deterministic.

mod common;

use std::sync::Arc;

use serde_json::json;

use common::{chunk, engine, fast_config, Reply, ScriptedLlm, ScriptedStore};
use rig_agentic_rag::workflow::nodes::{
    FALLBACK_ANSWER, FALLBACK_PURPOSE, INSUFFICIENT_WITHOUT_FOLLOW_UP_NOTE, NO_RESULTS_SUMMARY,
};
use rig_agentic_rag::{
    event_channel, ChatMessage, NodeContext, RagState, Role, WorkflowConfig, WorkflowEvent, WorkflowStep,
};

fn follow_up(query: &str) -> serde_json::Value {
    json!([{ "purpose": "follow-up", "queries": [query] }])
}

// =============================================================================
// Retrieval and fusion
// =============================================================================

#[tokio::test]
async fn test_fused_order_prefers_similarity_at_equal_rank() {
    let llm = Arc::new(
        ScriptedLlm::new().with_plan(Reply::plan(json!([{ "purpose": "P", "queries": ["q1"] }]))),
    );
    let store = Arc::new(ScriptedStore::new().with_rankings(
        "q1",
        vec![chunk("A", "alpha text")],
        vec![chunk("B", "beta text")],
    ));

    let state = engine(llm, store, fast_config()).invoke("X").await;

    assert_eq!(
        state.search_results,
        vec!["[Purpose: P]\nalpha text\n---\nbeta text".to_string()]
    );
}

#[tokio::test]
async fn test_heavy_keyword_weight_reverses_order() {
    let llm = Arc::new(
        ScriptedLlm::new().with_plan(Reply::plan(json!([{ "purpose": "P", "queries": ["q1"] }]))),
    );
    let store = Arc::new(ScriptedStore::new().with_rankings(
        "q1",
        vec![chunk("A", "alpha text")],
        vec![chunk("B", "beta text")],
    ));
    let config = fast_config().with_keyword_weight(0.8);

    let state = engine(llm, store, config).invoke("X").await;

    assert_eq!(
        state.search_results,
        vec!["[Purpose: P]\nbeta text\n---\nalpha text".to_string()]
    );
}

#[tokio::test]
async fn test_chunk_found_by_both_searches_appears_once() {
    let llm = Arc::new(
        ScriptedLlm::new().with_plan(Reply::plan(json!([{ "purpose": "P", "queries": ["q1"] }]))),
    );
    let store = Arc::new(ScriptedStore::new().with_rankings(
        "q1",
        vec![chunk("A", "alpha"), chunk("B", "beta")],
        vec![chunk("B", "beta"), chunk("C", "gamma")],
    ));

    let state = engine(llm, store, fast_config()).invoke("X").await;

    // B: 0.7/62 + 0.3/61 beats A: 0.7/61, and C: 0.3/62 comes last
    assert_eq!(
        state.search_results,
        vec!["[Purpose: P]\nbeta\n---\nalpha\n---\ngamma".to_string()]
    );
}

#[tokio::test]
async fn test_one_block_per_subtask_across_queries() {
    let llm = Arc::new(ScriptedLlm::new().with_plan(Reply::plan(json!([
        { "purpose": "first", "queries": ["a", "b"] },
        { "purpose": "second", "queries": ["c"] },
    ]))));
    let store = Arc::new(ScriptedStore::new());

    let state = engine(llm, store, fast_config()).invoke("X").await;

    assert_eq!(
        state.search_results,
        vec![
            "[Purpose: first]\ntext for a\n---\ntext for b".to_string(),
            "[Purpose: second]\ntext for c".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_long_chunks_are_truncated() {
    let llm = Arc::new(
        ScriptedLlm::new().with_plan(Reply::plan(json!([{ "purpose": "P", "queries": ["q"] }]))),
    );
    let long_text = "x".repeat(50);
    let store = Arc::new(ScriptedStore::new().with_rankings(
        "q",
        vec![chunk("A", &long_text)],
        vec![],
    ));
    let mut config = fast_config();
    config.retrieval.max_return_chars = 10;

    let state = engine(llm, store, config).invoke("X").await;

    assert_eq!(state.search_results, vec![format!("[Purpose: P]\n{}", "x".repeat(10))]);
}

// =============================================================================
// Planning
// =============================================================================

#[tokio::test]
async fn test_plan_failure_uses_fallback_subtask() {
    let llm = Arc::new(ScriptedLlm::new().with_plan(Reply::Fail("model offline".into())));
    let store = Arc::new(ScriptedStore::new());

    let state = engine(Arc::clone(&llm), Arc::clone(&store), fast_config())
        .invoke("what is rrf?")
        .await;

    assert_eq!(store.queries(), vec!["what is rrf?".to_string()]);
    assert_eq!(
        state.search_results,
        vec![format!("[Purpose: {}]\ntext for what is rrf?", FALLBACK_PURPOSE)]
    );
    assert!(!state.answer.is_empty());
}

#[tokio::test]
async fn test_empty_plan_uses_fallback_subtask() {
    let llm = Arc::new(ScriptedLlm::new().with_plan(Reply::plan(json!([]))));
    let store = Arc::new(ScriptedStore::new());

    engine(llm, Arc::clone(&store), fast_config())
        .invoke("question")
        .await;

    assert_eq!(store.queries(), vec!["question".to_string()]);
}

#[tokio::test]
async fn test_malformed_plan_uses_fallback_subtask() {
    let llm = Arc::new(ScriptedLlm::new().with_plan(Reply::Json(json!({ "steps": 3 }))));
    let store = Arc::new(ScriptedStore::new());

    engine(llm, Arc::clone(&store), fast_config())
        .invoke("question")
        .await;

    assert_eq!(store.queries(), vec!["question".to_string()]);
}

#[tokio::test]
async fn test_plan_timeout_uses_fallback_subtask() {
    let llm = Arc::new(ScriptedLlm::new().with_plan(Reply::Hang));
    let store = Arc::new(ScriptedStore::new());

    let state = engine(llm, Arc::clone(&store), fast_config())
        .invoke("question")
        .await;

    assert_eq!(store.queries(), vec!["question".to_string()]);
    assert!(!state.answer.is_empty());
}

#[tokio::test]
async fn test_plan_is_capped_at_max_subtasks() {
    let llm = Arc::new(ScriptedLlm::new().with_plan(Reply::plan(json!([
        { "purpose": "1", "queries": ["q1"] },
        { "purpose": "2", "queries": ["q2"] },
        { "purpose": "3", "queries": ["q3"] },
        { "purpose": "4", "queries": ["q4"] },
        { "purpose": "5", "queries": ["q5"] },
    ]))));
    let store = Arc::new(ScriptedStore::new());

    let state = engine(llm, Arc::clone(&store), fast_config())
        .invoke("X")
        .await;

    assert_eq!(store.queries(), vec!["q1", "q2", "q3"]);
    assert_eq!(state.search_results.len(), 3);
}

// =============================================================================
// Search failures
// =============================================================================

#[tokio::test]
async fn test_search_failure_keeps_earlier_blocks_and_clears_subtasks() {
    let llm = Arc::new(ScriptedLlm::new().with_plan(Reply::plan(json!([
        { "purpose": "p1", "queries": ["ok"] },
        { "purpose": "p2", "queries": ["bad"] },
        { "purpose": "p3", "queries": ["later"] },
    ]))));
    let store = Arc::new(ScriptedStore::new().with_failure("bad"));

    let state = engine(llm, Arc::clone(&store), fast_config())
        .invoke("X")
        .await;

    assert_eq!(state.search_results, vec!["[Purpose: p1]\ntext for ok".to_string()]);
    assert!(state.subtasks.is_empty());
    assert!(!store.queries().contains(&"later".to_string()));
    assert!(!state.answer.is_empty());
}

#[tokio::test]
async fn test_search_failure_on_first_subtask_leads_to_no_results_summary() {
    let llm = Arc::new(ScriptedLlm::new());
    let store = Arc::new(ScriptedStore::new().with_failure("X"));

    let state = engine(Arc::clone(&llm), store, fast_config())
        .invoke("X")
        .await;

    assert!(state.search_results.is_empty());
    assert_eq!(state.summary, NO_RESULTS_SUMMARY);
    assert_eq!(llm.summary_calls(), 0);
    assert!(!state.answer.is_empty());
}

// =============================================================================
// Summarize
// =============================================================================

#[tokio::test]
async fn test_empty_results_summary_skips_model() {
    let llm = Arc::new(ScriptedLlm::new());
    let store = Arc::new(ScriptedStore::new().with_empty("nothing here"));

    let state = engine(Arc::clone(&llm), store, fast_config())
        .invoke("nothing here")
        .await;

    assert!(state.search_results.is_empty());
    assert_eq!(state.summary, NO_RESULTS_SUMMARY);
    assert_eq!(llm.summary_calls(), 0);
}

#[tokio::test]
async fn test_summary_failure_falls_back_to_raw_results() {
    let llm = Arc::new(ScriptedLlm::new().with_summary(Reply::Fail("overloaded".into())));
    let store = Arc::new(ScriptedStore::new());

    let state = engine(Arc::clone(&llm), store, fast_config())
        .invoke("X")
        .await;

    assert_eq!(state.summary, state.joined_results());
    assert_eq!(llm.summary_calls(), 1);
}

#[tokio::test]
async fn test_empty_summary_falls_back_to_raw_results() {
    let llm = Arc::new(ScriptedLlm::new().with_summary(Reply::Text("   ".into())));
    let store = Arc::new(ScriptedStore::new());

    let state = engine(llm, store, fast_config()).invoke("X").await;

    assert_eq!(state.summary, state.joined_results());
}

// =============================================================================
// Judge and loop bound
// =============================================================================

#[tokio::test]
async fn test_insufficient_without_follow_up_proceeds_to_answer() {
    let llm = Arc::new(
        ScriptedLlm::new().with_judgment(Reply::insufficient("missing data", json!([]))),
    );
    let store = Arc::new(ScriptedStore::new());
    let (tx, mut rx) = event_channel();

    let state = engine(Arc::clone(&llm), store, fast_config())
        .invoke_with_events(RagState::new("X"), tx)
        .await;

    assert_eq!(llm.judge_calls(), 1);
    assert_eq!(state.loop_count, 1);
    assert!(state.subtasks.is_empty());

    let mut judged = None;
    while let Ok(event) = rx.try_recv() {
        if let WorkflowEvent::Judged {
            sufficient, reason, ..
        } = event
        {
            judged = Some((sufficient, reason));
        }
    }
    let (sufficient, reason) = judged.expect("judge event");
    assert!(sufficient);
    assert!(reason.contains(INSUFFICIENT_WITHOUT_FOLLOW_UP_NOTE));
}

#[tokio::test]
async fn test_loop_stops_at_max_loop_count() {
    let llm = Arc::new(
        ScriptedLlm::new()
            .with_judgment(Reply::insufficient("need more", follow_up("f1")))
            .with_judgment(Reply::insufficient("still need more", follow_up("f2")))
            .with_judgment(Reply::insufficient("never enough", follow_up("f3"))),
    );
    let store = Arc::new(ScriptedStore::new());
    let config = fast_config().with_max_loop_count(2);

    let state = engine(Arc::clone(&llm), Arc::clone(&store), config)
        .invoke("X")
        .await;

    assert_eq!(llm.judge_calls(), 2);
    assert_eq!(state.loop_count, 2);
    assert!(state.subtasks.is_empty());
    assert_eq!(store.queries(), vec!["X", "f1"]);
    assert_eq!(llm.answer_calls(), 1);
    assert!(!state.answer.is_empty());
}

#[tokio::test]
async fn test_judge_calls_never_exceed_loop_bound() {
    for max_loop_count in 1..=3u32 {
        let mut llm = ScriptedLlm::new();
        for i in 0..5 {
            llm = llm.with_judgment(Reply::insufficient(
                "not yet",
                follow_up(&format!("follow-up {}", i)),
            ));
        }
        let llm = Arc::new(llm);
        let store = Arc::new(ScriptedStore::new());
        let config = fast_config().with_max_loop_count(max_loop_count);

        let state = engine(Arc::clone(&llm), store, config).invoke("X").await;

        assert_eq!(llm.judge_calls(), max_loop_count as usize);
        assert_eq!(state.loop_count, max_loop_count);
        assert_eq!(state.search_results.len(), max_loop_count as usize);
        assert!(state.subtasks.is_empty());
        assert!(!state.answer.is_empty());
    }
}

#[tokio::test]
async fn test_search_results_accumulate_across_loops() {
    let llm = Arc::new(
        ScriptedLlm::new()
            .with_judgment(Reply::insufficient("need the constant", follow_up("rrf constant")))
            .with_judgment(Reply::sufficient("complete")),
    );
    let store = Arc::new(ScriptedStore::new());

    let state = engine(Arc::clone(&llm), store, fast_config())
        .invoke("what is rrf")
        .await;

    assert_eq!(
        state.search_results,
        vec![
            "[Purpose: default]\ntext for what is rrf".to_string(),
            "[Purpose: follow-up]\ntext for rrf constant".to_string(),
        ]
    );
    assert_eq!(state.loop_count, 2);

    // The second summary sees both blocks
    let prompts = llm.summary_prompts();
    assert_eq!(prompts.len(), 2);
    let second = &prompts[1].last().expect("user message").content;
    assert!(second.contains("text for what is rrf"));
    assert!(second.contains("text for rrf constant"));
}

#[tokio::test]
async fn test_judge_timeout_treated_as_sufficient() {
    let llm = Arc::new(ScriptedLlm::new().with_judgment(Reply::Hang));
    let store = Arc::new(ScriptedStore::new());

    let state = engine(Arc::clone(&llm), store, fast_config())
        .invoke("X")
        .await;

    assert_eq!(llm.judge_calls(), 1);
    assert_eq!(state.loop_count, 1);
    assert!(state.subtasks.is_empty());
    assert_eq!(llm.answer_calls(), 1);
}

#[tokio::test]
async fn test_judge_schema_violation_treated_as_sufficient() {
    let llm = Arc::new(ScriptedLlm::new().with_judgment(Reply::Text("looks fine to me".into())));
    let store = Arc::new(ScriptedStore::new());

    let state = engine(Arc::clone(&llm), store, fast_config())
        .invoke("X")
        .await;

    assert_eq!(state.loop_count, 1);
    assert_eq!(llm.answer_calls(), 1);
}

// =============================================================================
// Answer
// =============================================================================

#[tokio::test]
async fn test_answer_stream_error_before_tokens_uses_fallback() {
    let llm = Arc::new(ScriptedLlm::new().with_answer(Reply::BrokenStream(Vec::new())));
    let store = Arc::new(ScriptedStore::new());

    let state = engine(llm, store, fast_config()).invoke("X").await;

    assert_eq!(state.answer, FALLBACK_ANSWER);
}

#[tokio::test]
async fn test_answer_stream_error_midway_uses_fallback() {
    let llm = Arc::new(
        ScriptedLlm::new().with_answer(Reply::BrokenStream(vec!["partial ".into(), "answ".into()])),
    );
    let store = Arc::new(ScriptedStore::new());

    let state = engine(llm, store, fast_config()).invoke("X").await;

    assert_eq!(state.answer, FALLBACK_ANSWER);
}

#[tokio::test]
async fn test_answer_open_failure_uses_fallback() {
    let llm = Arc::new(ScriptedLlm::new().with_answer(Reply::Fail("connection refused".into())));
    let store = Arc::new(ScriptedStore::new());

    let state = engine(llm, store, fast_config()).invoke("X").await;

    assert_eq!(state.answer, FALLBACK_ANSWER);
}

#[tokio::test]
async fn test_answer_timeout_uses_fallback() {
    let llm = Arc::new(ScriptedLlm::new().with_answer(Reply::Hang));
    let store = Arc::new(ScriptedStore::new());

    let state = engine(llm, store, fast_config()).invoke("X").await;

    assert_eq!(state.answer, FALLBACK_ANSWER);
}

#[tokio::test]
async fn test_answer_is_concatenated_fragments() {
    let llm = Arc::new(ScriptedLlm::new().with_answer(Reply::Fragments(vec![
        "RRF ".into(),
        "uses ".into(),
        "k=60.".into(),
    ])));
    let store = Arc::new(ScriptedStore::new());

    let state = engine(llm, store, fast_config()).invoke("X").await;

    assert_eq!(state.answer, "RRF uses k=60.");
}

#[tokio::test]
async fn test_answer_sees_all_results_not_summary() {
    let llm = Arc::new(ScriptedLlm::new().with_summary(Reply::Text("SUMMARY-ONLY".into())));
    let store = Arc::new(ScriptedStore::new());

    engine(Arc::clone(&llm), store, fast_config())
        .invoke("X")
        .await;

    let prompts = llm.answer_prompts();
    let request = &prompts[0].last().expect("user message").content;
    assert!(request.contains("[Purpose: default]\ntext for X"));
    assert!(request.contains("## Question\nX"));
    assert!(!request.contains("SUMMARY-ONLY"));
}

#[tokio::test]
async fn test_answer_history_is_windowed_and_truncated() {
    let llm = Arc::new(ScriptedLlm::new());
    let store = Arc::new(ScriptedStore::new());
    let config = fast_config().with_history(4, 10);

    let history: Vec<ChatMessage> = (0..6)
        .map(|i| {
            let content = format!("turn {} with a fairly long body", i);
            if i % 2 == 0 {
                ChatMessage::user(content)
            } else {
                ChatMessage::assistant(content)
            }
        })
        .collect();
    let state = RagState::new("X").with_chat_history(history);

    engine(Arc::clone(&llm), store, config)
        .invoke_with_context(state, &NodeContext::new())
        .await;

    let messages = &llm.answer_prompts()[0];
    // system + 4 history turns + request
    assert_eq!(messages.len(), 6);
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[1].content, "turn 2 wit");
    assert_eq!(messages[4].content, "turn 5 wit");
    assert_eq!(messages[5].role, Role::User);
}

// =============================================================================
// Events
// =============================================================================

fn label(event: &WorkflowEvent) -> String {
    match event {
        WorkflowEvent::StepStarted { step } => format!("start:{}", step),
        WorkflowEvent::Planned { .. } => "planned".to_string(),
        WorkflowEvent::Searched { .. } => "searched".to_string(),
        WorkflowEvent::Summarized { .. } => "summarized".to_string(),
        WorkflowEvent::Thinking { step, .. } => format!("thinking:{}", step),
        WorkflowEvent::Judged { .. } => "judged".to_string(),
        WorkflowEvent::AnswerDelta { text } => format!("delta:{}", text),
        WorkflowEvent::Finished { .. } => "finished".to_string(),
    }
}

#[tokio::test]
async fn test_events_follow_step_order() {
    let llm = Arc::new(
        ScriptedLlm::new().with_answer(Reply::Fragments(vec!["Hel".into(), "lo".into()])),
    );
    let store = Arc::new(ScriptedStore::new());
    let (tx, mut rx) = event_channel();

    let state = engine(llm, store, fast_config())
        .invoke_with_events(RagState::new("X"), tx)
        .await;

    let mut labels = Vec::new();
    while let Some(event) = rx.recv().await {
        labels.push(label(&event));
    }

    assert_eq!(
        labels,
        vec![
            "start:plan",
            "planned",
            "start:search",
            "searched",
            "start:summarize",
            "summarized",
            "start:judge",
            "judged",
            "start:answer",
            "delta:Hel",
            "delta:lo",
            "finished",
        ]
    );
    assert_eq!(state.answer, "Hello");
}

#[tokio::test]
async fn test_planned_event_marks_fallback() {
    let llm = Arc::new(ScriptedLlm::new().with_plan(Reply::Fail("down".into())));
    let store = Arc::new(ScriptedStore::new());
    let (tx, mut rx) = event_channel();

    engine(llm, store, fast_config())
        .invoke_with_events(RagState::new("X"), tx)
        .await;

    let mut planned = None;
    while let Some(event) = rx.recv().await {
        if let WorkflowEvent::Planned { subtasks, fallback } = event {
            planned = Some((subtasks, fallback));
        }
    }
    let (subtasks, fallback) = planned.expect("planned event");
    assert!(fallback);
    assert_eq!(subtasks.len(), 1);
    assert_eq!(subtasks[0].purpose, FALLBACK_PURPOSE);
    assert_eq!(subtasks[0].queries, vec!["X".to_string()]);
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_engine_rejects_invalid_config() {
    let llm = Arc::new(ScriptedLlm::new());
    let store = Arc::new(ScriptedStore::new());

    let result = rig_agentic_rag::WorkflowEngine::new(
        llm,
        store,
        Arc::new(rig_agentic_rag::PassthroughReranker),
        WorkflowConfig::default().with_max_loop_count(0),
    );

    assert!(matches!(result, Err(rig_agentic_rag::RagError::Config(_))));
}

#[test]
fn test_steps_round_trip_through_names() {
    assert_eq!(WorkflowStep::Plan.as_str(), "plan");
    assert_eq!(WorkflowStep::Done.to_string(), "done");
}

// =============================================================================
// Reranking
// =============================================================================

/// Reverses the fused order and keeps `top_k`
struct ReversingReranker;

#[async_trait::async_trait]
impl rig_agentic_rag::Reranker for ReversingReranker {
    async fn rerank(
        &self,
        _query: &str,
        mut results: Vec<rig_agentic_rag::SearchResult>,
        top_k: usize,
    ) -> Result<Vec<rig_agentic_rag::SearchResult>, rig_agentic_rag::RagError> {
        results.reverse();
        results.truncate(top_k);
        Ok(results)
    }
}

/// Fails every call
struct FailingReranker;

#[async_trait::async_trait]
impl rig_agentic_rag::Reranker for FailingReranker {
    async fn rerank(
        &self,
        _query: &str,
        _results: Vec<rig_agentic_rag::SearchResult>,
        _top_k: usize,
    ) -> Result<Vec<rig_agentic_rag::SearchResult>, rig_agentic_rag::RagError> {
        Err(rig_agentic_rag::RagError::port_failure("reranker", "model not loaded"))
    }
}

fn two_hit_store() -> Arc<ScriptedStore> {
    Arc::new(ScriptedStore::new().with_rankings(
        "q1",
        vec![chunk("A", "alpha"), chunk("B", "beta"), chunk("C", "gamma")],
        vec![],
    ))
}

#[tokio::test]
async fn test_reranker_order_and_top_k_are_used() {
    let llm = Arc::new(
        ScriptedLlm::new().with_plan(Reply::plan(json!([{ "purpose": "P", "queries": ["q1"] }]))),
    );
    let mut config = fast_config();
    config.retrieval.rerank_top_k = 2;

    let engine = rig_agentic_rag::WorkflowEngine::new(
        llm,
        two_hit_store(),
        Arc::new(ReversingReranker),
        config,
    )
    .expect("engine");
    let state = engine.invoke("X").await;

    assert_eq!(
        state.search_results,
        vec!["[Purpose: P]\ngamma\n---\nbeta".to_string()]
    );
}

#[tokio::test]
async fn test_reranker_failure_counts_as_search_failure() {
    let llm = Arc::new(
        ScriptedLlm::new().with_plan(Reply::plan(json!([{ "purpose": "P", "queries": ["q1"] }]))),
    );

    let engine = rig_agentic_rag::WorkflowEngine::new(
        llm.clone(),
        two_hit_store(),
        Arc::new(FailingReranker),
        fast_config(),
    )
    .expect("engine");
    let state = engine.invoke("X").await;

    assert!(state.search_results.is_empty());
    assert!(state.subtasks.is_empty());
    assert_eq!(state.summary, NO_RESULTS_SUMMARY);
    assert_eq!(state.answer, "scripted answer");
}

#[tokio::test]
async fn test_llm_reranker_reorders_fused_results() {
    let llm = Arc::new(
        ScriptedLlm::new()
            .with_plan(Reply::plan(json!([{ "purpose": "P", "queries": ["q1"] }])))
            .with_reranking(Reply::Json(json!({
                "scores": [
                    { "index": 0, "score": 1.0 },
                    { "index": 1, "score": 3.0 },
                    { "index": 2, "score": 8.0 }
                ]
            }))),
    );
    let mut config = fast_config();
    config.retrieval.rerank_top_k = 2;

    let engine = rig_agentic_rag::WorkflowEngine::new(
        llm.clone(),
        two_hit_store(),
        Arc::new(rig_agentic_rag::LlmReranker::new(llm.clone())),
        config,
    )
    .expect("engine");
    let state = engine.invoke("X").await;

    assert_eq!(llm.rerank_calls(), 1);
    assert_eq!(
        state.search_results,
        vec!["[Purpose: P]\ngamma\n---\nbeta".to_string()]
    );
}

// =============================================================================
// Reasoning trace
// =============================================================================

#[tokio::test]
async fn test_summary_reasoning_is_reported_before_summary() {
    let llm = Arc::new(ScriptedLlm::new().with_summary(Reply::Reasoned {
        text: "condensed".to_string(),
        thinking: "only one block matters".to_string(),
    }));
    let store = Arc::new(ScriptedStore::new());
    let (tx, mut rx) = event_channel();

    let state = engine(llm, store, fast_config())
        .invoke_with_events(RagState::new("X"), tx)
        .await;

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let thinking_at = events
        .iter()
        .position(|e| {
            *e == WorkflowEvent::Thinking {
                step: WorkflowStep::Summarize,
                trace: "only one block matters".to_string(),
            }
        })
        .expect("thinking event");
    let summarized_at = events
        .iter()
        .position(|e| matches!(e, WorkflowEvent::Summarized { fallback: false, .. }))
        .expect("summarized event");

    assert!(thinking_at < summarized_at);
    assert_eq!(state.summary, "condensed");
}
