#![forbid(unsafe_code)]

//! Chat server internals: QUIC listener configuration, per-connection
//! protocol handling, chat operations, and the pub/sub hub.

pub mod config;
pub mod quic;
pub mod server;
pub mod util;
