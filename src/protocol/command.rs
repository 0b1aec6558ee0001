//! Tuner/trainer commands.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Channel of commands sent to the algorithm.
pub const TO_ALGO: &str = "to-algo";
/// Channel of commands sent by the algorithm.
pub const FROM_ALGO: &str = "from-algo";

/// Kind of reported metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricType {
    Final,
    Periodical,
}

/// A decoded protocol command.
///
/// Payloads the algorithm does not interpret (experiment config, search
/// space, hyper-parameters, metric values) stay as raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // to-algo
    Initialize {
        config: Value,
    },
    ReportMetricData {
        parameter_id: i64,
        value: Value,
        metric_type: MetricType,
    },
    UpdateSearchSpace {
        search_space: Value,
    },
    ImportData {
        parameter: Value,
        value: Value,
    },
    TrialEnd {
        trial_job_id: String,
    },
    Terminate,

    // from-algo
    InitializationComplete,
    NewTrialJob {
        parameter_id: i64,
        parameter: Value,
    },
    KillTrialJob {
        trial_job_id: String,
    },
}

impl Command {
    /// Channel the command travels on.
    pub fn channel(&self) -> &'static str {
        match self {
            Command::Initialize { .. }
            | Command::ReportMetricData { .. }
            | Command::UpdateSearchSpace { .. }
            | Command::ImportData { .. }
            | Command::TrialEnd { .. }
            | Command::Terminate => TO_ALGO,
            Command::InitializationComplete
            | Command::NewTrialJob { .. }
            | Command::KillTrialJob { .. } => FROM_ALGO,
        }
    }

    /// Wire `commandType`.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Initialize { .. } => "initialize",
            Command::ReportMetricData { .. } => "report-metric-data",
            Command::UpdateSearchSpace { .. } => "update-search-space",
            Command::ImportData { .. } => "import-data",
            Command::TrialEnd { .. } => "trial-end",
            Command::Terminate => "terminate",
            Command::InitializationComplete => "initialization-complete",
            Command::NewTrialJob { .. } => "new-trial-job",
            Command::KillTrialJob { .. } => "kill-trial-job",
        }
    }

    /// Wire form: `{"channel", "commandType", ...camelCase fields}`.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("channel".into(), Value::from(self.channel()));
        map.insert("commandType".into(), Value::from(self.kind()));
        match self {
            Command::Initialize { config } => {
                map.insert("config".into(), config.clone());
            }
            Command::ReportMetricData {
                parameter_id,
                value,
                metric_type,
            } => {
                map.insert("parameterId".into(), Value::from(*parameter_id));
                map.insert("value".into(), value.clone());
                map.insert(
                    "type".into(),
                    serde_json::to_value(metric_type).unwrap_or(Value::Null),
                );
            }
            Command::UpdateSearchSpace { search_space } => {
                map.insert("searchSpace".into(), search_space.clone());
            }
            Command::ImportData { parameter, value } => {
                map.insert("parameter".into(), parameter.clone());
                map.insert("value".into(), value.clone());
            }
            Command::TrialEnd { trial_job_id } | Command::KillTrialJob { trial_job_id } => {
                map.insert("trialJobId".into(), Value::from(trial_job_id.as_str()));
            }
            Command::NewTrialJob {
                parameter_id,
                parameter,
            } => {
                map.insert("parameterId".into(), Value::from(*parameter_id));
                map.insert("parameter".into(), parameter.clone());
            }
            Command::Terminate | Command::InitializationComplete => {}
        }
        Value::Object(map)
    }

    /// Encode as a JSON string.
    pub fn encode(&self) -> String {
        self.to_value().to_string()
    }
}

/// `snake_case` field name to its wire `camelCase` key.
pub fn camel_case(name: &str) -> String {
    let mut words = name.split('_');
    let mut out = words.next().unwrap_or_default().to_string();
    for word in words {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}
