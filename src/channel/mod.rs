//! Deferred-result streaming channels.

pub mod contract;
pub mod stream;
pub mod ws;

pub use contract::{ChannelSocket, ChannelTransport};
pub use stream::{
    channel_url, ChannelKind, ChannelOutput, ChannelState, Exchange, Kickoff, Outcome, Step,
    StreamChannel,
};
pub use ws::WsChannelTransport;
