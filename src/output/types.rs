use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

pub const SCHEMA_VERSION: &str = "digest.v1";

/// Body of an envelope: what would be done (`plan`) or what was done (`result`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Plan(Value),
    Result(Value),
}

/// The single JSON document a command prints on stdout in `--json` mode.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub schema_version: &'static str,
    pub time: DateTime<Utc>,
    pub request_id: Uuid,
    pub op: &'static str,
    pub apply: bool,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Envelope {
    fn new(op: &'static str, payload: Payload) -> Self {
        Envelope {
            schema_version: SCHEMA_VERSION,
            time: Utc::now(),
            request_id: Uuid::new_v4(),
            op,
            apply: matches!(payload, Payload::Result(_)),
            payload,
        }
    }

    pub fn plan<T: Serialize>(op: &'static str, plan: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(op, Payload::Plan(serde_json::to_value(plan)?)))
    }

    pub fn result<T: Serialize>(op: &'static str, result: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(op, Payload::Result(serde_json::to_value(result)?)))
    }

    pub fn body(&self) -> &Value {
        match &self.payload {
            Payload::Plan(v) | Payload::Result(v) => v,
        }
    }
}
