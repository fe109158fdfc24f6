// Network usage record written to sinks: one JSON document per sample.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const FORMAT: &str = "v1";
pub const SCHEMA_ID_KEY: &str = "schema_id";
pub const NETWORK_SCHEMA_ID: &str = "network_schema_id";

/// Who the usage is attributed to. Supplied by configuration, never hard-coded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub root_org_id: String,
    pub org_id: String,
    pub env_id: String,
    pub asset_id: String,
    pub worker_id: String,
    pub billable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
    pub root_org_id: String,
    pub org_id: String,
    pub env_id: String,
    pub asset_id: String,
    pub worker_id: String,
    pub usage_bytes: u64,
    pub billable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub format: String,
    /// Unix epoch milliseconds.
    pub time: i64,
    pub events: Vec<UsageEvent>,
    pub metadata: BTreeMap<String, String>,
}

impl UsageRecord {
    /// Single-event record for `usage_bytes` taken at `timestamp_ms`.
    pub fn new(identity: &Identity, usage_bytes: u64, timestamp_ms: i64) -> Self {
        let event = UsageEvent {
            id: Uuid::new_v4().to_string(),
            timestamp: timestamp_ms,
            root_org_id: identity.root_org_id.clone(),
            org_id: identity.org_id.clone(),
            env_id: identity.env_id.clone(),
            asset_id: identity.asset_id.clone(),
            worker_id: identity.worker_id.clone(),
            usage_bytes,
            billable: identity.billable,
        };
        let metadata = BTreeMap::from([(SCHEMA_ID_KEY.to_string(), NETWORK_SCHEMA_ID.to_string())]);
        Self {
            format: FORMAT.to_string(),
            time: timestamp_ms,
            events: vec![event],
            metadata,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
