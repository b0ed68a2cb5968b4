use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// The state emitted on stdout once all input has been processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    /// The `value` of the most recent `STATE` message, passed through untouched.
    Explicit(Value),
    /// Stream name to the key-property values of that stream's latest record,
    /// in stream registration order.
    Accumulated(IndexMap<String, Vec<Value>>),
}

impl StateValue {
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Tracks what the target would report as its resume point.
///
/// An explicit `STATE` message shadows the accumulated key mapping until the
/// next record is processed, so the snapshot always reflects whichever came
/// last in the input.
#[derive(Debug, Default)]
pub struct StateTracker {
    explicit: Option<Value>,
    accumulated: IndexMap<String, Option<Vec<Value>>>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the stream's position in the accumulated mapping.
    pub fn on_stream_registered(&mut self, stream: &str) {
        if !self.accumulated.contains_key(stream) {
            self.accumulated.insert(stream.to_string(), None);
        }
    }

    pub fn on_state_message(&mut self, value: Value) {
        debug!("setting state to {value}");
        self.explicit = Some(value);
    }

    pub fn on_record_processed(&mut self, stream: &str, record: &Value, key_properties: &[String]) {
        if self.explicit.take().is_some() {
            debug!(stream, "record after STATE message; resuming key tracking");
        }
        let keys = key_properties
            .iter()
            .map(|key| record.get(key).cloned().unwrap_or(Value::Null))
            .collect();
        match self.accumulated.get_mut(stream) {
            Some(slot) => *slot = Some(keys),
            None => {
                self.accumulated.insert(stream.to_string(), Some(keys));
            }
        }
    }

    pub fn snapshot(&self) -> StateValue {
        if let Some(value) = &self.explicit {
            return StateValue::Explicit(value.clone());
        }
        StateValue::Accumulated(
            self.accumulated
                .iter()
                .filter_map(|(stream, keys)| Some((stream.clone(), keys.clone()?)))
                .collect(),
        )
    }
}
