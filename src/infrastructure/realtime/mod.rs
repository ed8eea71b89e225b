pub mod channel_transport;

pub use channel_transport::{ChannelTransport, RealtimeEvent};
