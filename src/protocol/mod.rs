//! Wire protocols spoken by the server.
//!
//! - `xdr`: External Data Representation (RFC 4506) codecs for RPC and NFSv4
//!   types.
//! - `rpc`: ONC RPC version 2 (RFC 5531) record marking, call checks and
//!   per-connection ordering.
//! - `nfs`: the NFSv4.0 program (RFC 7530): NULL, COMPOUND and its
//!   operations.

pub mod nfs;
pub mod rpc;
pub mod xdr;
