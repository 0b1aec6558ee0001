//! `(channel, commandType)` to decoder map.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

use super::command::{camel_case, Command, FROM_ALGO, TO_ALGO};
use crate::error::{PodarError, Result};

/// Decodes the payload fields of one command kind.
pub type Decoder = fn(&mut Fields) -> Result<Command>;

/// Payload fields of a command being decoded.
///
/// Each [`Fields::take`] removes one field; whatever is left over when
/// decoding finishes is logged and ignored.
#[derive(Debug)]
pub struct Fields {
    kind: String,
    map: Map<String, Value>,
}

impl Fields {
    fn new(kind: String, map: Map<String, Value>) -> Self {
        Self { kind, map }
    }

    /// Remove and deserialize the field `name` (given in `snake_case`).
    pub fn take<T: DeserializeOwned>(&mut self, name: &str) -> Result<T> {
        let key = camel_case(name);
        let value = self.map.remove(&key).ok_or_else(|| PodarError::MalformedCommand {
            message: format!("{}: missing field {key}", self.kind),
        })?;
        serde_json::from_value(value).map_err(|e| PodarError::MalformedCommand {
            message: format!("{}: field {key}: {e}", self.kind),
        })
    }

    fn finish(self) {
        if !self.map.is_empty() {
            let keys: Vec<&String> = self.map.keys().collect();
            warn!(command = %self.kind, fields = ?keys, "cannot recognize fields");
        }
    }
}

/// Registry of command decoders keyed by `(channel, commandType)`.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    decoders: HashMap<(String, String), Decoder>,
}

impl CommandRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every standard command.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(TO_ALGO, "initialize", |f| {
            Ok(Command::Initialize {
                config: f.take("config")?,
            })
        });
        registry.register(TO_ALGO, "report-metric-data", |f| {
            Ok(Command::ReportMetricData {
                parameter_id: f.take("parameter_id")?,
                value: f.take("value")?,
                metric_type: f.take("type")?,
            })
        });
        registry.register(TO_ALGO, "update-search-space", |f| {
            Ok(Command::UpdateSearchSpace {
                search_space: f.take("search_space")?,
            })
        });
        registry.register(TO_ALGO, "import-data", |f| {
            Ok(Command::ImportData {
                parameter: f.take("parameter")?,
                value: f.take("value")?,
            })
        });
        registry.register(TO_ALGO, "trial-end", |f| {
            Ok(Command::TrialEnd {
                trial_job_id: f.take("trial_job_id")?,
            })
        });
        registry.register(TO_ALGO, "terminate", |_| Ok(Command::Terminate));
        registry.register(FROM_ALGO, "initialization-complete", |_| {
            Ok(Command::InitializationComplete)
        });
        registry.register(FROM_ALGO, "new-trial-job", |f| {
            Ok(Command::NewTrialJob {
                parameter_id: f.take("parameter_id")?,
                parameter: f.take("parameter")?,
            })
        });
        registry.register(FROM_ALGO, "kill-trial-job", |f| {
            Ok(Command::KillTrialJob {
                trial_job_id: f.take("trial_job_id")?,
            })
        });
        registry
    }

    /// Register a decoder, replacing any previous one for the same key.
    pub fn register(&mut self, channel: &str, kind: &str, decoder: Decoder) {
        self.decoders
            .insert((channel.to_string(), kind.to_string()), decoder);
    }

    /// Check if a decoder is registered.
    pub fn contains(&self, channel: &str, kind: &str) -> bool {
        self.decoders
            .contains_key(&(channel.to_string(), kind.to_string()))
    }

    /// Number of registered decoders.
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decode a JSON command string.
    pub fn decode(&self, text: &str) -> Result<Command> {
        let value: Value = serde_json::from_str(text).map_err(|e| PodarError::MalformedCommand {
            message: e.to_string(),
        })?;
        self.decode_value(value)
    }

    /// Decode an already-parsed JSON command.
    pub fn decode_value(&self, value: Value) -> Result<Command> {
        let Value::Object(mut map) = value else {
            return Err(PodarError::MalformedCommand {
                message: "command is not a JSON object".to_string(),
            });
        };
        let channel = take_str(&mut map, "channel")?;
        let kind = take_str(&mut map, "commandType")?;

        let decoder = self
            .decoders
            .get(&(channel.clone(), kind.clone()))
            .ok_or_else(|| PodarError::UnknownCommand {
                channel,
                kind: kind.clone(),
            })?;
        let mut fields = Fields::new(kind, map);
        let command = decoder(&mut fields)?;
        fields.finish();
        Ok(command)
    }
}

fn take_str(map: &mut Map<String, Value>, key: &str) -> Result<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(PodarError::MalformedCommand {
            message: format!("{key} must be a string, got {other}"),
        }),
        None => Err(PodarError::MalformedCommand {
            message: format!("missing {key}"),
        }),
    }
}
