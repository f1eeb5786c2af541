//! Tool provider integration tests
//!
//! Drives the orchestrator against real shell subprocesses speaking the
//! line-delimited JSON protocol, plus a scripted chat model for the
//! conversation loop. Unix-only: the fake providers are `sh` scripts.

#![cfg(unix)]

mod common;

use std::time::Duration;

use vox_gateway::config::ToolsConfig;
use vox_gateway::llm::ChatMessage;
use vox_gateway::tools::{ProviderRegistry, ToolOrchestrator};

use common::{fake_provider, one_shot_provider, ScriptedModel};

fn tools_config() -> ToolsConfig {
    ToolsConfig {
        enabled: true,
        registry_path: None,
        max_tool_rounds: 8,
        request_timeout_secs: 5,
    }
}

#[tokio::test]
async fn duplicate_tool_names_stay_distinct_across_providers() {
    let mut registry = ProviderRegistry::new();
    registry
        .insert("providerA".to_string(), fake_provider("from A"))
        .unwrap();
    registry
        .insert("providerB".to_string(), fake_provider("from B"))
        .unwrap();

    let orchestrator = ToolOrchestrator::from_registry(&tools_config(), &registry);
    orchestrator.start_all_enabled().await;

    // Both providers expose a tool literally named "search"; the catalog
    // carries two distinct qualified names
    let mut names: Vec<String> = orchestrator
        .catalog()
        .await
        .into_iter()
        .map(|d| d.qualified_name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["providerA_search", "providerB_search"]);

    // And each qualified name routes to the correct subprocess
    let a = orchestrator
        .invoke("providerA_search", serde_json::json!({"query": "x"}))
        .await
        .unwrap();
    assert_eq!(a, "from A");

    let b = orchestrator
        .invoke("providerB_search", serde_json::json!({"query": "x"}))
        .await
        .unwrap();
    assert_eq!(b, "from B");

    orchestrator.shutdown_all().await;
}

#[tokio::test]
async fn conversation_turn_executes_tools_and_returns_final_text() {
    let mut registry = ProviderRegistry::new();
    registry
        .insert("wiki".to_string(), fake_provider("tokio is a runtime"))
        .unwrap();

    let orchestrator = ToolOrchestrator::from_registry(&tools_config(), &registry);
    orchestrator.start_all_enabled().await;

    let model = ScriptedModel::new(vec![
        ScriptedModel::tool_call("call_1", "wiki_search", r#"{"query":"tokio"}"#),
        ScriptedModel::text("Tokio is an async runtime."),
    ]);

    let reply = orchestrator
        .run_conversation_turn(&model, vec![ChatMessage::user("what is tokio?")])
        .await
        .unwrap();
    assert_eq!(reply, "Tokio is an async runtime.");

    // The second round carried the tool result with its correlation id
    let seen = model.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    let tool_turn = seen[1].last().unwrap();
    assert_eq!(tool_turn.role, "tool");
    assert_eq!(tool_turn.tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(tool_turn.content.as_deref(), Some("tokio is a runtime"));
    drop(seen);

    orchestrator.shutdown_all().await;
}

#[tokio::test]
async fn never_started_provider_becomes_error_content_not_a_failed_turn() {
    let mut registry = ProviderRegistry::new();
    registry
        .insert("wiki".to_string(), fake_provider("unused"))
        .unwrap();

    // Registered but never started: its tools are not in the catalog
    let orchestrator = ToolOrchestrator::from_registry(&tools_config(), &registry);

    let model = ScriptedModel::new(vec![
        ScriptedModel::tool_call("call_1", "wiki_search", "{}"),
        ScriptedModel::text("answered without the tool"),
    ]);

    let reply = orchestrator
        .run_conversation_turn(&model, vec![ChatMessage::user("hi")])
        .await
        .unwrap();
    assert_eq!(reply, "answered without the tool");

    let seen = model.seen.lock().unwrap();
    let tool_turn = seen[1].last().unwrap();
    assert_eq!(tool_turn.content.as_deref(), Some("Error executing tool"));
}

#[tokio::test]
async fn dead_subprocess_fails_invoke_and_empties_catalog() {
    let mut registry = ProviderRegistry::new();
    registry
        .insert("flaky".to_string(), one_shot_provider())
        .unwrap();

    let config = ToolsConfig {
        request_timeout_secs: 2,
        ..tools_config()
    };
    let orchestrator = ToolOrchestrator::from_registry(&config, &registry);
    orchestrator.start_all_enabled().await;

    // Discovery succeeded before the process exited
    assert_eq!(orchestrator.catalog().await.len(), 1);

    // Let the exit propagate to the reader task
    tokio::time::sleep(Duration::from_millis(300)).await;

    let err = orchestrator
        .invoke("flaky_search", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, vox_gateway::Error::Provider(_)));

    // The dead provider's tools are gone from the following catalog call
    assert!(orchestrator.catalog().await.is_empty());
}

#[tokio::test]
async fn disabled_provider_start_is_skipped_until_enabled() {
    let mut config = fake_provider("hello");
    config.enabled = false;

    let mut registry = ProviderRegistry::new();
    registry.insert("late".to_string(), config).unwrap();

    let orchestrator = ToolOrchestrator::from_registry(&tools_config(), &registry);
    assert!(!orchestrator.start("late").await.unwrap());
    assert!(orchestrator.catalog().await.is_empty());

    orchestrator.enable("late").await.unwrap();
    assert!(orchestrator.start("late").await.unwrap());
    assert_eq!(orchestrator.catalog().await.len(), 1);

    orchestrator.shutdown_all().await;
}

#[tokio::test]
async fn stop_is_idempotent_and_clears_catalog() {
    let mut registry = ProviderRegistry::new();
    registry
        .insert("wiki".to_string(), fake_provider("x"))
        .unwrap();

    let orchestrator = ToolOrchestrator::from_registry(&tools_config(), &registry);
    orchestrator.start_all_enabled().await;
    assert_eq!(orchestrator.catalog().await.len(), 1);

    orchestrator.stop("wiki").await.unwrap();
    assert!(orchestrator.catalog().await.is_empty());

    // Stopping again is a no-op, not an error
    orchestrator.stop("wiki").await.unwrap();
}
