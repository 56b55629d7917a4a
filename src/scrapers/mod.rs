pub mod aisstream_ws; // Real-time WebSocket position feed

pub use aisstream_ws::{AisStreamClient, AisStreamSession, ConnectionError, SubscriptionMessage};
