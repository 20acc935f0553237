//! # relay-server
//!
//! Axum HTTP + `WebSocket` relay server.
//!
//! - `/ws`: every message a client sends is broadcast to every connected
//!   client, the sender included
//! - `/health` and `/metrics` for operators
//! - One reader and one writer task per connection; a single broadcaster
//!   drains the dispatch queue and prunes peers whose send fails
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use relay::Relay;
pub use server::RelayServer;
