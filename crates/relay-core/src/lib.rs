//! # relay-core
//!
//! Foundation types shared by every board relay crate.
//!
//! - **Message**: the `{player, move, chat}` wire unit relayed to every client
//! - **Board**: the static 64-square opening layout (inert, never mutated)
//! - **IDs**: `ConnectionId` branded newtype used for registry membership
//! - **Errors**: receive/send/relay error taxonomy via `thiserror`
//! - **Logging**: `tracing` subscriber setup and in-memory capture for tests

#![deny(unsafe_code)]

pub mod board;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod message;

pub use board::{Board, Square};
pub use errors::{ReceiveError, RelayError, SendError};
pub use ids::ConnectionId;
pub use message::Message;
