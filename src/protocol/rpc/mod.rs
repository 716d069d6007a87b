//! ONC RPC version 2 (RFC 5531) over TCP.
//!
//! This layer turns a byte stream into RPC calls and replies:
//!
//! 1. Record marking: records are read fragment by fragment and reassembled
//!    ([`SocketMessageHandler`]), replies are written as single fragments
//!    ([`write_fragment`]).
//! 2. Call checks: RPC version, credentials (`AUTH_NONE` and `AUTH_UNIX`),
//!    program number.
//! 3. Retransmission detection by xid and client address
//!    ([`TransactionTracker`]).
//! 4. Ordered execution: calls of one connection run one at a time and their
//!    replies leave in arrival order.
//!
//! The only program served is NFS version 4; see [`crate::protocol::nfs::v4`].

mod command_queue;
mod context;
mod transaction_tracker;
mod wire;

pub use context::Context;
pub use transaction_tracker::TransactionTracker;
pub use wire::{handle_rpc, write_fragment, SocketMessageHandler, SocketMessageType};
