mod client;
pub mod types;

pub use client::{Client, Config, RealtimeClient, ServerRx, connect_with_config};
