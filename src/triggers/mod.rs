mod http;
mod open;

pub use http::{
    get_channel, get_usage, list_channels, open_channel, ChannelStatus, ChannelsResponse,
    OpenRequest, OpenResponse, RequesterBody, UsageResponse,
};
pub use open::{OpenOutcome, OpenService};
