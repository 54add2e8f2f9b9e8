//! HTTP trigger handlers

use std::collections::BTreeSet;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::device::is_valid_channel_name;
use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::stats::{DailyAggregate, Requester};
use crate::triggers::OpenOutcome;

use super::models::{
    ChannelStatus, ChannelsResponse, OpenRequest, OpenResponse, UsageResponse,
};

fn validate_channel(channel: &str) -> Result<()> {
    if is_valid_channel_name(channel) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Invalid channel label: {:?}", channel)))
    }
}

fn channel_status(state: &AppState, channel: &str) -> ChannelStatus {
    let info = state.registry.channel_info(channel);
    ChannelStatus {
        channel: info.name,
        available: state.relay.available(channel),
        devices: info.device_count,
        description: state
            .settings
            .relay
            .channels
            .get(channel)
            .and_then(|c| c.description.clone()),
    }
}

/// List configured channels plus any a device declared on its own
#[tracing::instrument(name = "http.list_channels", skip(state))]
pub async fn list_channels(State(state): State<AppState>) -> Json<ChannelsResponse> {
    let mut names: BTreeSet<String> = state.settings.relay.channels.keys().cloned().collect();
    names.extend(state.registry.stats().channels.into_keys());

    let channels = names
        .iter()
        .map(|name| channel_status(&state, name))
        .collect();

    Json(ChannelsResponse { channels })
}

#[tracing::instrument(name = "http.get_channel", skip(state))]
pub async fn get_channel(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<ChannelStatus>> {
    validate_channel(&channel)?;

    let configured = state.settings.relay.channels.contains_key(&channel);
    if !configured && !state.relay.available(&channel) {
        return Err(AppError::NotFound(format!("Unknown channel: {}", channel)));
    }

    Ok(Json(channel_status(&state, &channel)))
}

/// Open a door or garage on behalf of a named requester
#[tracing::instrument(
    name = "http.open_channel",
    skip(state, request),
    fields(hold_open_ms = ?request.hold_open_ms)
)]
pub async fn open_channel(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Json(request): Json<OpenRequest>,
) -> Result<Json<OpenResponse>> {
    validate_channel(&channel)?;

    let requester: Requester = request.requester.unwrap_or_default().into();
    if !requester.is_recognized() {
        return Err(AppError::Validation("Unrecognized user".to_string()));
    }

    let outcome = state
        .open_service
        .open(&channel, &requester, request.hold_open_ms)
        .await?;

    let response = match outcome {
        OpenOutcome::Opened {
            channel,
            hold_open_ms,
            event,
        } => OpenResponse::Opening {
            message: opening_message(&channel, &event.requester),
            channel,
            hold_open_ms,
            opened_at: event.opened_at,
            requester: event.requester,
        },
        OpenOutcome::Unavailable { channel } => OpenResponse::Unavailable {
            message: format!(
                "The remote {} opening service is not operational at the moment.",
                channel
            ),
            channel,
        },
    };

    Ok(Json(response))
}

/// Daily usage breakdown and the estimated time saved
#[tracing::instrument(name = "http.usage", skip(state))]
pub async fn get_usage(State(state): State<AppState>) -> Result<Json<UsageResponse>> {
    let seconds_per_open = state.settings.stats.seconds_saved_per_open;

    let response = match state.stats_store.get_stats().await? {
        None => UsageResponse::NoData {
            message: "There are no usage statistics yet".to_string(),
        },
        Some(aggregate) => usage_report(&aggregate, seconds_per_open),
    };

    Ok(Json(response))
}

fn opening_message(channel: &str, requester: &Requester) -> String {
    if requester.contact.is_empty() {
        format!("Opening the {} as requested by {}...", channel, requester.name)
    } else {
        format!(
            "Opening the {} as requested by {} ({})...",
            channel, requester.name, requester.contact
        )
    }
}

pub(crate) fn usage_report(aggregate: &DailyAggregate, seconds_per_open: u64) -> UsageResponse {
    let total = aggregate.total();
    let saved = total.saturating_mul(seconds_per_open);

    let message = format!(
        "The remote opening service was used {} time{} since {}. \
         Assuming it takes ~{} seconds to open and get back, around {} have been saved.",
        total,
        if total == 1 { "" } else { "s" },
        aggregate.since().format("%Y-%m-%d %H:%M UTC"),
        seconds_per_open,
        humanize_seconds(saved)
    );

    UsageResponse::Ok {
        since: aggregate.since(),
        total,
        days: aggregate.days().clone(),
        channels: aggregate.channel_totals(),
        estimated_seconds_saved: saved,
        message,
    }
}

/// Coarse duration wording, largest fitting unit only
pub(crate) fn humanize_seconds(secs: u64) -> String {
    const UNITS: [(u64, &str); 4] = [(86_400, "day"), (3_600, "hour"), (60, "minute"), (1, "second")];

    let (size, unit) = UNITS
        .iter()
        .copied()
        .find(|(size, _)| secs >= *size)
        .unwrap_or((1, "second"));
    let n = ((secs as f64) / (size as f64)).round() as u64;

    format!("{} {}{}", n, unit, if n == 1 { "" } else { "s" })
}
