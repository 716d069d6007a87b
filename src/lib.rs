//! NFS Mamont v4 - an NFSv4.0 server library.
//!
//! The server speaks NFS version 4, minor version 0 (RFC 7530), over ONC RPC
//! on TCP, and exports any storage that implements [`store::BackingStore`].
//!
//! ## Main Components
//!
//! - `store`: the backing-store interface and its error type. Paths in,
//!   statuses out; no NFS types beyond times and file types.
//! - `state`: server-wide state (file handles, opens, client ids) and the
//!   per-COMPOUND session.
//! - `protocol`: XDR codecs, the RPC layer and the NFSv4 operation handlers.
//! - `tcp`: the listener that serves connections.
//! - `config`: server settings.
//! - `fs_util`: path helpers and local file system utilities.
//!
//! ## Usage
//!
//! Implement [`store::BackingStore`] and hand it to
//! [`tcp::NFSTcpListener::bind_with_config`], then call
//! [`tcp::NFSTcp::handle_forever`].

pub mod config;
pub mod fs_util;
pub mod protocol;
pub mod state;
pub mod store;
pub mod tcp;
mod write_counter;

pub use protocol::xdr;
