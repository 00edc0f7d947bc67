mod client;

pub use interview_types as types;
pub use client::codec;
pub use client::config::{Config, ConfigBuilder};
pub use client::stats::Stats;
pub use client::{connect, connect_with_config, Client, ClientTx, RealtimeClient, ServerRx};
