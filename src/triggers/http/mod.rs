//! HTTP trigger API
//!
//! - Channel availability
//! - Remote open requests
//! - Usage statistics

mod handlers;
mod models;

pub use handlers::{get_channel, get_usage, list_channels, open_channel};

pub use models::{
    ChannelStatus, ChannelsResponse, OpenRequest, OpenResponse, RequesterBody, UsageResponse,
};
