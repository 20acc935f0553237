//! Connection handles, registry, dispatch queue, per-connection reader and
//! writer tasks, and the broadcaster that fans messages out.

pub mod broadcaster;
pub mod connection;
pub mod dispatch;
pub mod reader;
pub mod registry;
pub mod writer;
