//! Request and response bodies for the trigger API

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::stats::{DayBreakdown, Requester};

/// Requester as sent by clients. Both fields may be missing; validation
/// happens in the handler so a blank name is a 400, not a parse error.
#[derive(Debug, Default, Deserialize)]
pub struct RequesterBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub contact: String,
}

impl From<RequesterBody> for Requester {
    fn from(body: RequesterBody) -> Self {
        Requester::new(body.name.trim(), body.contact.trim())
    }
}

/// Request to open a channel
#[derive(Debug, Deserialize)]
pub struct OpenRequest {
    #[serde(default)]
    pub requester: Option<RequesterBody>,
    /// Override for the hold-open duration, capped by configuration
    pub hold_open_ms: Option<u64>,
}

/// Response to an open request
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OpenResponse {
    Opening {
        channel: String,
        hold_open_ms: u64,
        requester: Requester,
        opened_at: DateTime<Utc>,
        message: String,
    },
    Unavailable {
        channel: String,
        message: String,
    },
}

/// Availability of one channel
#[derive(Debug, Serialize)]
pub struct ChannelStatus {
    pub channel: String,
    pub available: bool,
    pub devices: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChannelsResponse {
    pub channels: Vec<ChannelStatus>,
}

/// Usage statistics
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UsageResponse {
    NoData {
        message: String,
    },
    Ok {
        since: DateTime<Utc>,
        total: u64,
        days: BTreeMap<NaiveDate, DayBreakdown>,
        channels: BTreeMap<String, u64>,
        estimated_seconds_saved: u64,
        message: String,
    },
}
