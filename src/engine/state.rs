//! Mutable per-execution scratch: `state`, `form`, `chatHistory`.

use serde_json::{Map, Value};

use crate::chat::ChatTurn;

/// Runtime state folded from node outputs as the flow progresses.
///
/// `state` updates are last-writer-wins; under the single-threaded scheduler
/// the winner is determined by queue order.
#[derive(Debug, Clone, Default)]
pub struct RuntimeState {
    pub state: Map<String, Value>,
    /// Starting form values, persisted across sessions.
    pub form: Map<String, Value>,
    pub chat_history: Vec<ChatTurn>,
}

impl RuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_form(form: Map<String, Value>) -> Self {
        RuntimeState {
            form,
            ..Self::default()
        }
    }

    /// Fold one node output into the runtime state.
    pub fn absorb(&mut self, output: &Value) {
        if let Some(state) = output.get("state").and_then(Value::as_object) {
            self.state = state.clone();
        }
        if let Some(turns) = output.get("chatHistory").and_then(Value::as_array) {
            for turn in turns {
                if let Ok(turn) = serde_json::from_value::<ChatTurn>(turn.clone()) {
                    self.chat_history.push(turn);
                }
            }
        }
        if let Some(form) = output
            .get("output")
            .and_then(|o| o.get("form"))
            .and_then(Value::as_object)
        {
            self.form = form.clone();
        }
    }

    /// Replace `state` wholesale, used when rehydrating from a checkpoint.
    pub fn rehydrate_state(&mut self, state: &Value) {
        if let Some(map) = state.as_object() {
            self.state = map.clone();
        }
    }

    pub fn state_value(&self) -> Value {
        Value::Object(self.state.clone())
    }
}
