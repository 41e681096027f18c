use anyhow::{bail, Result};
use runner_agent::{AgentAdapter, AgentCapability, FailingAgent, MainAgent};
use runner_core::context::EMPTY_TRANSCRIPT;
use runner_core::{LogStore, LogStoreConfig, Role, SessionState};
use runner_web::UiController;
use serde_json::Value;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

fn controller_with(capability: AgentCapability) -> (UiController, TempDir) {
    let dir = tempdir().unwrap();
    let store = LogStore::open(LogStoreConfig::at(dir.path().join("spaces_app.log"))).unwrap();
    (UiController::new(capability, Arc::new(store)), dir)
}

fn log_messages(logs: &str) -> Vec<String> {
    logs.lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|value| value["message"].as_str().map(str::to_string))
        .collect()
}

struct PanickingAgent;

impl AgentAdapter for PanickingAgent {
    fn name(&self) -> &str {
        "panicking_agent"
    }

    fn invoke(&self, _input: &str) -> Result<String> {
        panic!("agent blew up");
    }
}

struct PickyAgent;

impl AgentAdapter for PickyAgent {
    fn name(&self) -> &str {
        "picky_agent"
    }

    fn invoke(&self, input: &str) -> Result<String> {
        if input.is_empty() {
            bail!("empty prompt");
        }
        Ok(input.to_uppercase())
    }
}

#[test]
fn test_submit_appends_exactly_one_exchange() {
    let (controller, _dir) = controller_with(AgentCapability::available(MainAgent::new()));

    for input in ["hello", "", "multi\nline", "ünïcødé"] {
        let mut session = SessionState::new();
        controller.submit(input, &mut session);

        let turns = session.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role(), Role::User);
        assert_eq!(turns[0].text(), input);
        assert_eq!(turns[1].role(), Role::Assistant);
        assert!(!turns[1].text().is_empty());
    }
}

#[test]
fn test_submit_hello_echoes_in_transcript() {
    let (controller, _dir) = controller_with(AgentCapability::available(MainAgent::new()));
    let mut session = SessionState::new();

    let outcome = controller.submit("hello", &mut session);

    assert!(outcome.transcript.contains("Echo from MainAgent: hello"));
    assert!(outcome.transcript.starts_with("## Conversation"));
    let messages = log_messages(&outcome.logs);
    assert_eq!(messages, vec!["received_input", "agent_response"]);
}

#[test]
fn test_agent_error_is_shown_and_logged() {
    let (controller, _dir) = controller_with(AgentCapability::available(FailingAgent::new("boom")));
    let mut session = SessionState::new();

    let outcome = controller.submit("anything", &mut session);

    let reply = session.turns()[1].text();
    assert!(reply.contains("boom"));
    assert!(reply.starts_with("Agent invocation failed with an exception."));

    let logs = controller.refresh_logs();
    let failure = logs
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).unwrap())
        .find(|value| value["message"] == "agent_call_failed")
        .expect("failure record");
    assert_eq!(failure["level"], "ERROR");
    assert!(failure["exception"].as_str().unwrap().contains("boom"));
    assert_eq!(failure["user_input"], "anything");
    assert_eq!(outcome.logs, logs);
}

#[test]
fn test_agent_error_only_for_failing_inputs() {
    let (controller, _dir) = controller_with(AgentCapability::available(PickyAgent));
    let mut session = SessionState::new();

    controller.submit("ok", &mut session);
    controller.submit("", &mut session);

    assert_eq!(session.len(), 4);
    assert_eq!(session.turns()[1].text(), "OK");
    assert!(session.turns()[3].text().contains("empty prompt"));
}

#[test]
fn test_panicking_agent_becomes_error_turn() {
    let (controller, _dir) = controller_with(AgentCapability::available(PanickingAgent));
    let mut session = SessionState::new();

    controller.submit("hi", &mut session);

    assert_eq!(session.len(), 2);
    assert!(session.turns()[1].text().contains("agent blew up"));
}

#[test]
fn test_unavailable_adapter_returns_fixed_diagnostic() {
    let (controller, _dir) =
        controller_with(AgentCapability::unavailable("planner", "not registered"));
    let mut session = SessionState::new();

    controller.submit("first", &mut session);
    controller.submit("second", &mut session);

    assert_eq!(session.len(), 4);
    let first = session.turns()[1].text().to_string();
    assert!(first.starts_with("Error: the agent adapter 'planner' is not available."));
    assert_eq!(session.turns()[3].text(), first);

    let messages = log_messages(&controller.refresh_logs());
    assert_eq!(messages.iter().filter(|m| *m == "run_agent_missing").count(), 2);
}

#[test]
fn test_announce_records_capability() {
    let (controller, _dir) =
        controller_with(AgentCapability::unavailable("planner", "not registered"));
    controller.announce();

    let messages = log_messages(&controller.refresh_logs());
    assert_eq!(messages, vec!["agent_adapter_unavailable"]);
}

#[test]
fn test_clear_resets_any_session() {
    let (controller, _dir) = controller_with(AgentCapability::available(MainAgent::new()));

    let mut empty = SessionState::new();
    let outcome = controller.clear(&mut empty);
    assert!(empty.is_empty());
    assert_eq!(outcome.transcript, EMPTY_TRANSCRIPT);

    let mut busy = SessionState::new();
    for i in 0..5 {
        controller.submit(&format!("msg {}", i), &mut busy);
    }
    let outcome = controller.clear(&mut busy);
    assert!(busy.is_empty());
    assert_eq!(outcome.transcript, "## Conversation\n_No messages yet._");
}

#[test]
fn test_refresh_logs_is_idempotent() {
    let (controller, _dir) = controller_with(AgentCapability::available(MainAgent::new()));
    assert_eq!(controller.refresh_logs(), "No logs yet.");

    let mut session = SessionState::new();
    controller.submit("hello", &mut session);

    let first = controller.refresh_logs();
    let second = controller.refresh_logs();
    assert_eq!(first, second);
    assert_eq!(session.len(), 2);
}

#[test]
fn test_many_submissions_tail_keeps_latest() {
    let (controller, _dir) = controller_with(AgentCapability::available(MainAgent::new()));
    let mut session = SessionState::new();

    for i in 0..600 {
        controller.submit(&format!("prompt {}", i), &mut session);
    }
    assert_eq!(session.len(), 1200);

    let logs = controller.refresh_logs();
    let lines: Vec<&str> = logs.lines().collect();
    assert!(lines.len() <= 500);

    let last: Value = serde_json::from_str(lines[lines.len() - 1]).unwrap();
    assert_eq!(last["message"], "agent_response");
    assert_eq!(last["response"], "Echo from MainAgent: prompt 599");
}
