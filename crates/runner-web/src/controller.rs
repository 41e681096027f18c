use anyhow::{anyhow, Result};
use runner_agent::{AgentAdapter, AgentCapability};
use runner_core::context::{timestamp_now, EMPTY_TRANSCRIPT};
use runner_core::logging::store::DEFAULT_TAIL_LINES;
use runner_core::{LogRecord, LogStore, SessionState, Turn};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Longest diagnostic shown to the user for a failed agent call. The full
/// error always goes to the log store.
pub const MAX_DIAGNOSTIC_CHARS: usize = 2000;

/// What the page redraws after an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub transcript: String,
    pub logs: String,
}

/// Orchestrates one round trip: user turn, agent call, assistant turn,
/// transcript, log tail.
///
/// Holds no per-session data; callers pass the session they own. Every
/// failure is turned into assistant-visible text, so none of these
/// operations return an error.
pub struct UiController {
    capability: AgentCapability,
    log_store: Arc<LogStore>,
    tail_lines: usize,
}

impl UiController {
    pub fn new(capability: AgentCapability, log_store: Arc<LogStore>) -> Self {
        Self {
            capability,
            log_store,
            tail_lines: DEFAULT_TAIL_LINES,
        }
    }

    pub fn with_tail_lines(mut self, tail_lines: usize) -> Self {
        self.tail_lines = tail_lines;
        self
    }

    pub fn capability(&self) -> &AgentCapability {
        &self.capability
    }

    pub fn log_store(&self) -> &Arc<LogStore> {
        &self.log_store
    }

    /// Record the startup capability check in the log store
    pub fn announce(&self) {
        match &self.capability {
            AgentCapability::Available(agent) => {
                info!("Agent adapter '{}' ready", agent.name());
                self.log_store
                    .emit(LogRecord::info("agent_adapter_ready").with("adapter", agent.name()));
            }
            AgentCapability::Unavailable { requested, reason } => {
                error!("Agent adapter '{}' unavailable: {}", requested, reason);
                self.log_store.emit(
                    LogRecord::error("agent_adapter_unavailable")
                        .with("adapter", requested.as_str())
                        .with("reason", reason.as_str()),
                );
            }
        }
    }

    /// Run one submission against `session` and return the redrawn panels
    pub fn submit(&self, text: &str, session: &mut SessionState) -> SubmitOutcome {
        let user_turn = Turn::user(text);
        self.log_store.emit(
            LogRecord::info("received_input")
                .with("user_input", text)
                .with("timestamp", user_turn.time()),
        );

        let reply = self.answer(text);
        session.record_exchange(user_turn, Turn::assistant(reply));
        debug!("Session has {} turns after submit", session.len());

        SubmitOutcome {
            transcript: session.render_transcript(),
            logs: self.refresh_logs(),
        }
    }

    pub fn clear(&self, session: &mut SessionState) -> SubmitOutcome {
        session.clear();
        SubmitOutcome {
            transcript: EMPTY_TRANSCRIPT.to_string(),
            logs: self.refresh_logs(),
        }
    }

    pub fn refresh_logs(&self) -> String {
        self.log_store.tail(self.tail_lines)
    }

    fn answer(&self, text: &str) -> String {
        let agent = match &self.capability {
            AgentCapability::Available(agent) => agent,
            AgentCapability::Unavailable { requested, .. } => {
                let detail = unavailable_message(requested);
                error!("Agent call skipped, adapter '{}' unavailable", requested);
                self.log_store
                    .emit(LogRecord::error("run_agent_missing").with("detail", detail.as_str()));
                return detail;
            }
        };

        match invoke_guarded(agent.as_ref(), text) {
            Ok(response) => {
                self.log_store.emit(
                    LogRecord::info("agent_response")
                        .with("response", response.as_str())
                        .with("timestamp", timestamp_now()),
                );
                response
            }
            Err(e) => {
                error!("Agent '{}' failed: {:#}", agent.name(), e);
                self.log_store.emit(
                    LogRecord::error("agent_call_failed")
                        .with("adapter", agent.name())
                        .with("user_input", text)
                        .with("exception", format!("{:?}", e)),
                );
                failure_message(&e, self.log_store.path().display())
            }
        }
    }
}

fn unavailable_message(adapter: &str) -> String {
    format!(
        "Error: the agent adapter '{}' is not available. \
         Configure agent.adapter with a registered adapter that exposes invoke(input) -> output.",
        adapter
    )
}

fn failure_message(err: &anyhow::Error, log_path: impl std::fmt::Display) -> String {
    let full = format!(
        "Agent invocation failed with an exception. Check {} for details.\n\n{}\n{:?}",
        log_path, err, err
    );
    truncate_chars(&full, MAX_DIAGNOSTIC_CHARS)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\n[truncated]", &text[..cut]),
        None => text.to_string(),
    }
}

// A panicking agent is reported like any other failure
fn invoke_guarded(agent: &dyn AgentAdapter, input: &str) -> Result<String> {
    match panic::catch_unwind(AssertUnwindSafe(|| agent.invoke(input))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(anyhow!("agent panicked: {}", message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_keeps_short_text() {
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        let text = "é".repeat(5);
        assert_eq!(truncate_chars(&text, 3), "ééé\n[truncated]");
    }

    #[test]
    fn test_failure_message_mentions_log_and_error() {
        let err = anyhow!("boom");
        let message = failure_message(&err, "spaces_app.log");
        assert!(message.starts_with("Agent invocation failed with an exception."));
        assert!(message.contains("spaces_app.log"));
        assert!(message.contains("boom"));
    }
}
