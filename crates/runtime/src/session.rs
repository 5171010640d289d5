//! Session management and the tool-orchestration loop.

use std::sync::Arc;

use chrono::Local;
use tracing::{debug, warn};

use crate::Result;
use crate::history::History;
use crate::model::{Backend, Message, ModelRequest, ModelResponse, Role};
use crate::registry::ToolRegistry;
use storage::{Event, EventKind, EventStore, SessionId};

/// Framing prepended, together with the current date, to the first user
/// message of a session.
const FIRST_MESSAGE_FRAMING: &str = "You are a helpful personal assistant. \
If you are uncertain, ask the user for clarification. If you do not know \
the answer and a connected tool can find it, use the tools available.";

/// Surfaced when the model produced no text by the time the loop ended.
const NO_RESPONSE_PLACEHOLDER: &str = "(no response from the model)";

/// Orchestration-loop knobs.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Maximum tool round trips per user query before the loop
    /// force-terminates.
    pub max_tool_turns: usize,
    /// Sampling temperature for the first model call of a query.
    pub initial_temperature: f32,
    /// Sampling temperature once tool results are in play.
    pub continuation_temperature: f32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_tool_turns: 10,
            initial_temperature: 0.0,
            continuation_temperature: 1.0,
        }
    }
}

/// A conversation session.
///
/// Owns the conversation history outright; the registry is shared with
/// the caller (which tears it down after the session ends) but only this
/// loop ever dispatches through it.
pub struct Session<B: Backend> {
    pub id: SessionId,
    store: EventStore,
    backend: B,
    registry: Arc<ToolRegistry>,
    history: History,
    options: SessionOptions,
}

impl<B: Backend> Session<B> {
    /// Create a new session with the given store, backend, and registry.
    pub fn new(store: EventStore, backend: B, registry: Arc<ToolRegistry>) -> Result<Self> {
        let id = SessionId::new();
        store.append(&Event::new(id, EventKind::SessionStart))?;
        for (provider, tools) in registry.provider_catalog() {
            store.append(&Event::new(
                id,
                EventKind::ProviderConnected { provider, tools },
            ))?;
        }

        Ok(Self {
            id,
            store,
            backend,
            registry,
            history: History::new(),
            options: SessionOptions::default(),
        })
    }

    /// Override the default loop options.
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// The conversation history so far.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Send a user message and drive the tool loop to a final answer.
    pub async fn chat(&mut self, user_input: &str) -> Result<String> {
        let text = if self.history.is_empty() {
            let today = Local::now().format("%Y-%m-%d");
            format!("Today's date is {today}. {FIRST_MESSAGE_FRAMING}\n\n{user_input}")
        } else {
            user_input.to_string()
        };

        self.history.append(Message::user(&text));
        self.store
            .append(&Event::message(self.id, storage::Role::User, &text))?;

        let mut response = self.call_model(self.options.initial_temperature).await?;
        self.record_model_turn(&response)?;

        let mut tool_turns = 0;
        loop {
            let calls = response.message.tool_calls();
            if calls.is_empty() {
                break;
            }
            if tool_turns >= self.options.max_tool_turns {
                warn!(
                    max_tool_turns = self.options.max_tool_turns,
                    pending = calls.len(),
                    "tool round-trip budget exhausted; returning last model text"
                );
                break;
            }
            tool_turns += 1;

            // Strictly sequential, in model order: later calls may depend
            // on state mutated by earlier ones.
            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                self.store.append(&Event::tool_call(
                    self.id,
                    &call.id,
                    &call.name,
                    call.arguments.clone(),
                ))?;

                let result = self.registry.dispatch(call).await;

                self.store.append(&Event::tool_result(
                    self.id,
                    &result.tool_call_id,
                    &result.name,
                    result.outcome.is_error(),
                    result.outcome.text(),
                ))?;
                results.push(result);
            }

            self.history.append(Message::tool_results(results));

            response = self
                .call_model(self.options.continuation_temperature)
                .await?;
            self.record_model_turn(&response)?;
        }

        let answer = response.message.text();
        if answer.is_empty() {
            Ok(NO_RESPONSE_PLACEHOLDER.to_string())
        } else {
            Ok(answer)
        }
    }

    /// Clear the conversation history. User-initiated only.
    pub fn reset(&mut self) -> Result<()> {
        self.history.clear();
        self.store
            .append(&Event::new(self.id, EventKind::HistoryCleared))?;
        Ok(())
    }

    /// End the session.
    pub fn end(self) -> Result<()> {
        self.store
            .append(&Event::new(self.id, EventKind::SessionEnd))?;
        Ok(())
    }

    async fn call_model(&self, temperature: f32) -> Result<ModelResponse> {
        let request = ModelRequest {
            messages: self.history.snapshot(),
            tools: self.registry.declarations(),
            temperature,
        };
        let response = self.backend.call(request).await?;
        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            tool_calls = response.message.tool_calls().len(),
            "model call complete"
        );
        Ok(response)
    }

    fn record_model_turn(&mut self, response: &ModelResponse) -> Result<()> {
        self.history.append(response.message.clone());
        self.store.append(&Event::message(
            self.id,
            storage::Role::Assistant,
            response.message.text(),
        ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelError, Part, ToolCall, Usage};
    use crate::provider::{ProviderError, ToolDescriptor, ToolOutput, ToolProvider};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    // Shadow the crate-level alias; trait signatures below need the
    // two-parameter form.
    use std::result::Result;
    use std::sync::Mutex;

    /// Backend that replays a fixed script of responses, then repeats the
    /// last one forever.
    struct ScriptedBackend {
        script: Mutex<Vec<Message>>,
        calls_seen: Mutex<Vec<f32>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Message>) -> Self {
            Self {
                script: Mutex::new(script),
                calls_seen: Mutex::new(Vec::new()),
            }
        }

        fn temperatures(&self) -> Vec<f32> {
            self.calls_seen.lock().unwrap().clone()
        }
    }

    impl Backend for ScriptedBackend {
        async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
            self.calls_seen.lock().unwrap().push(request.temperature);
            let mut script = self.script.lock().unwrap();
            let message = if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            };
            Ok(ModelResponse {
                message,
                usage: Usage::default(),
            })
        }
    }

    struct EchoProvider;

    #[async_trait]
    impl ToolProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
            Ok(vec![ToolDescriptor {
                name: "echo".into(),
                description: "echo".into(),
                input_schema: json!({"type": "object"}),
            }])
        }

        async fn invoke(&self, _name: &str, arguments: Value) -> Result<ToolOutput, ProviderError> {
            Ok(ToolOutput {
                is_error: false,
                content: arguments.to_string(),
            })
        }

        async fn close(&self) {}
    }

    struct FaultingProvider;

    #[async_trait]
    impl ToolProvider for FaultingProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
            Ok(vec![ToolDescriptor {
                name: "flaky_op".into(),
                description: "always fails".into(),
                input_schema: json!({"type": "object"}),
            }])
        }

        async fn invoke(&self, _name: &str, _arguments: Value) -> Result<ToolOutput, ProviderError> {
            Err("socket closed".into())
        }

        async fn close(&self) {}
    }

    fn tool_call_message(name: &str) -> Message {
        Message {
            role: Role::Assistant,
            parts: vec![Part::ToolCall(ToolCall {
                id: "call-1".into(),
                name: name.into(),
                arguments: json!({}),
            })],
        }
    }

    async fn registry_with(provider: impl ToolProvider + 'static) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register_provider(Arc::new(provider)).await;
        Arc::new(registry)
    }

    fn session_with(
        backend: ScriptedBackend,
        registry: Arc<ToolRegistry>,
        options: SessionOptions,
    ) -> Session<ScriptedBackend> {
        let store = EventStore::in_memory().unwrap();
        Session::new(store, backend, registry)
            .unwrap()
            .with_options(options)
    }

    #[tokio::test]
    async fn plain_answer_ends_after_one_model_call() {
        let backend = ScriptedBackend::new(vec![Message::assistant("hello there")]);
        let registry = registry_with(EchoProvider).await;
        let mut session = session_with(backend, registry, SessionOptions::default());

        let answer = session.chat("hi").await.unwrap();
        assert_eq!(answer, "hello there");
        // user turn + model turn
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn loop_terminates_at_round_trip_bound() {
        // Model asks for a tool on every single call.
        let backend = ScriptedBackend::new(vec![tool_call_message("echo")]);
        let registry = registry_with(EchoProvider).await;
        let options = SessionOptions {
            max_tool_turns: 2,
            ..SessionOptions::default()
        };
        let mut session = session_with(backend, registry, options);

        let answer = session.chat("loop forever").await.unwrap();
        assert!(!answer.is_empty());
        assert_eq!(answer, NO_RESPONSE_PLACEHOLDER);

        // user, model, results, model, results, model: exactly 2 tool
        // round trips before the forced stop.
        let tool_result_turns = session
            .history()
            .snapshot()
            .iter()
            .filter(|m| !m.tool_results_in().is_empty())
            .count();
        assert_eq!(tool_result_turns, 2);
    }

    #[tokio::test]
    async fn provider_fault_is_contained() {
        let backend = ScriptedBackend::new(vec![
            tool_call_message("flaky_op"),
            Message::assistant("that tool is down, sorry"),
        ]);
        let registry = registry_with(FaultingProvider).await;
        let mut session = session_with(backend, registry, SessionOptions::default());

        let answer = session.chat("try the flaky thing").await.unwrap();
        assert_eq!(answer, "that tool is down, sorry");

        // The model-facing history contains a structured error entry.
        let snapshot = session.history().snapshot();
        let error_results: Vec<_> = snapshot
            .iter()
            .flat_map(|m| m.tool_results_in())
            .filter(|r| r.outcome.is_error())
            .collect();
        assert_eq!(error_results.len(), 1);
        assert!(error_results[0].outcome.text().contains("socket closed"));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_not_fatal() {
        let backend = ScriptedBackend::new(vec![
            tool_call_message("z"),
            Message::assistant("no such tool, moving on"),
        ]);
        let registry = registry_with(EchoProvider).await;
        let mut session = session_with(backend, registry, SessionOptions::default());

        let answer = session.chat("use tool z").await.unwrap();
        assert_eq!(answer, "no such tool, moving on");

        let snapshot = session.history().snapshot();
        let error_texts: Vec<_> = snapshot
            .iter()
            .flat_map(|m| m.tool_results_in())
            .map(|r| r.outcome.text().to_string())
            .collect();
        assert_eq!(error_texts, vec!["unknown tool: z".to_string()]);
    }

    #[tokio::test]
    async fn first_message_is_augmented_exactly_once() {
        let backend = ScriptedBackend::new(vec![Message::assistant("ok")]);
        let registry = registry_with(EchoProvider).await;
        let mut session = session_with(backend, registry, SessionOptions::default());

        session.chat("first question").await.unwrap();
        session.chat("second question").await.unwrap();

        let snapshot = session.history().snapshot();
        let first = snapshot[0].text();
        assert!(first.contains("Today's date is"));
        assert!(first.contains("first question"));
        assert_eq!(first.matches("Today's date is").count(), 1);

        let second = snapshot[2].text();
        assert_eq!(second, "second question");
    }

    #[tokio::test]
    async fn reset_restores_augmentation() {
        let backend = ScriptedBackend::new(vec![Message::assistant("ok")]);
        let registry = registry_with(EchoProvider).await;
        let mut session = session_with(backend, registry, SessionOptions::default());

        session.chat("first").await.unwrap();
        session.reset().unwrap();
        assert!(session.history().is_empty());

        session.chat("fresh start").await.unwrap();
        assert!(session.history().snapshot()[0].text().contains("Today's date is"));
    }

    #[tokio::test]
    async fn temperature_switches_after_first_call() {
        let backend = ScriptedBackend::new(vec![
            tool_call_message("echo"),
            Message::assistant("done"),
        ]);
        let registry = registry_with(EchoProvider).await;
        let mut session = session_with(backend, registry, SessionOptions::default());

        session.chat("go").await.unwrap();

        let temps = session.backend.temperatures();
        assert_eq!(temps, vec![0.0, 1.0]);
    }
}
