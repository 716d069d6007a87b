//! Per-connection context handed to every RPC call.

use std::fmt;
use std::sync::Arc;

use crate::protocol::xdr;
use crate::state::ServerState;

/// What a call needs to know about its connection and the server.
///
/// One `Context` is built per accepted connection and cloned for every call;
/// `auth` is overwritten with the credentials of each call.
#[derive(Clone)]
pub struct Context {
    /// Peer address (`ip:port`), used for logging and retransmission tracking.
    pub client_addr: String,

    /// `AUTH_UNIX` credentials of the current call, all zeros for `AUTH_NONE`.
    pub auth: xdr::rpc::auth_unix,

    /// Server-wide state: backing store, handles, open and client tables.
    pub state: Arc<ServerState>,

    /// Shared record of recent xids, for dropping retransmissions.
    pub transaction_tracker: Arc<super::TransactionTracker>,
}

impl Context {
    pub fn new(
        client_addr: &str,
        state: Arc<ServerState>,
        transaction_tracker: Arc<super::TransactionTracker>,
    ) -> Context {
        Context {
            client_addr: client_addr.to_string(),
            auth: xdr::rpc::auth_unix::default(),
            state,
            transaction_tracker,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("rpc::Context")
            .field("client_addr", &self.client_addr)
            .field("auth", &self.auth)
            .finish()
    }
}
