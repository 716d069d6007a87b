//! ONC RPC version 2 message structures (RFC 5531 section 9).
//!
//! Only what a server needs is modelled: decoding calls and encoding every
//! kind of reply. Names follow the RFC so the code can be read against it.

// Keep original RFC naming conventions for consistency with the specification
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::{deserialize, Deserialize, Serialize};
use crate::{DeserializeStruct, SerializeStruct, XdrEnum};

/// The only RPC protocol version this server speaks.
pub const RPC_VERSION: u32 = 2;

/// Authentication flavors (RFC 5531 section 8.2). Kept as plain numbers so
/// that calls carrying a flavor we do not know still decode and can be
/// rejected politely instead of breaking the connection.
pub const AUTH_NONE: u32 = 0;
pub const AUTH_UNIX: u32 = 1;
pub const AUTH_SHORT: u32 = 2;
pub const AUTH_DES: u32 = 3;
pub const RPCSEC_GSS: u32 = 6;

/// Why the server refused the caller's credentials.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum auth_stat {
    AUTH_OK = 0,
    #[default]
    AUTH_BADCRED = 1,
    AUTH_REJECTEDCRED = 2,
    AUTH_BADVERF = 3,
    AUTH_REJECTEDVERF = 4,
    AUTH_TOOWEAK = 5,
}
XdrEnum!(auth_stat);

/// Body of an `AUTH_UNIX` (a.k.a. `AUTH_SYS`) credential.
///
/// The identifiers are passed through to handlers untouched; no identity
/// mapping happens in the server.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct auth_unix {
    pub stamp: u32,
    pub machinename: String,
    pub uid: u32,
    pub gid: u32,
    pub gids: Vec<u32>,
}
DeserializeStruct!(auth_unix, stamp, machinename, uid, gid, gids);
SerializeStruct!(auth_unix, stamp, machinename, uid, gid, gids);

/// Credential or verifier: a flavor number and up to 400 bytes of flavor data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct opaque_auth {
    pub flavor: u32,
    pub body: Vec<u8>,
}
DeserializeStruct!(opaque_auth, flavor, body);
SerializeStruct!(opaque_auth, flavor, body);

/// An RPC message: transaction id plus a CALL or REPLY body.
///
/// The xid only pairs replies with calls; it is not a sequence number.
#[derive(Clone, Debug, Default)]
pub struct rpc_msg {
    pub xid: u32,
    pub body: rpc_body,
}
DeserializeStruct!(rpc_msg, xid, body);
SerializeStruct!(rpc_msg, xid, body);

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug)]
pub enum rpc_body {
    CALL(call_body),
    REPLY(reply_body),
}

impl Default for rpc_body {
    fn default() -> rpc_body {
        rpc_body::CALL(call_body::default())
    }
}

impl Serialize for rpc_body {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            rpc_body::CALL(v) => {
                0_u32.serialize(dest)?;
                v.serialize(dest)
            }
            rpc_body::REPLY(v) => {
                1_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}

impl Deserialize for rpc_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<u32>(src)? {
            0 => rpc_body::CALL(deserialize(src)?),
            1 => rpc_body::REPLY(deserialize(src)?),
            msg_type => {
                return Err(super::invalid_data(&format!(
                    "Invalid message type in rpc_body: {msg_type}"
                )))
            }
        };
        Ok(())
    }
}

/// Header of a call. Procedure arguments follow it on the wire.
#[derive(Clone, Debug, Default)]
pub struct call_body {
    pub rpcvers: u32,
    pub prog: u32,
    pub vers: u32,
    pub proc: u32,
    pub cred: opaque_auth,
    pub verf: opaque_auth,
}
DeserializeStruct!(call_body, rpcvers, prog, vers, proc, cred, verf);
SerializeStruct!(call_body, rpcvers, prog, vers, proc, cred, verf);

#[derive(Clone, Debug)]
pub enum reply_body {
    MSG_ACCEPTED(accepted_reply),
    MSG_DENIED(rejected_reply),
}

impl Default for reply_body {
    fn default() -> reply_body {
        reply_body::MSG_ACCEPTED(accepted_reply::default())
    }
}

impl Serialize for reply_body {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            reply_body::MSG_ACCEPTED(v) => {
                0_u32.serialize(dest)?;
                v.serialize(dest)
            }
            reply_body::MSG_DENIED(v) => {
                1_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}

impl Deserialize for reply_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<u32>(src)? {
            0 => reply_body::MSG_ACCEPTED(deserialize(src)?),
            1 => reply_body::MSG_DENIED(deserialize(src)?),
            stat => {
                return Err(super::invalid_data(&format!(
                    "Invalid reply status in reply_body: {stat}"
                )))
            }
        };
        Ok(())
    }
}

/// Lowest and highest supported version of whatever was mismatched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct mismatch_info {
    pub low: u32,
    pub high: u32,
}
DeserializeStruct!(mismatch_info, low, high);
SerializeStruct!(mismatch_info, low, high);

/// A call that passed authentication. `reply_data` may still report that the
/// program, version or procedure is unavailable.
#[derive(Clone, Debug, Default)]
pub struct accepted_reply {
    pub verf: opaque_auth,
    pub reply_data: accept_body,
}
DeserializeStruct!(accepted_reply, verf, reply_data);
SerializeStruct!(accepted_reply, verf, reply_data);

/// Discriminated by `accept_stat`. For `SUCCESS` the procedure results follow
/// the reply header on the wire.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum accept_body {
    #[default]
    SUCCESS,
    PROG_UNAVAIL,
    PROG_MISMATCH(mismatch_info),
    PROC_UNAVAIL,
    GARBAGE_ARGS,
    SYSTEM_ERR,
}

impl Serialize for accept_body {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            accept_body::SUCCESS => 0_u32.serialize(dest),
            accept_body::PROG_UNAVAIL => 1_u32.serialize(dest),
            accept_body::PROG_MISMATCH(v) => {
                2_u32.serialize(dest)?;
                v.serialize(dest)
            }
            accept_body::PROC_UNAVAIL => 3_u32.serialize(dest),
            accept_body::GARBAGE_ARGS => 4_u32.serialize(dest),
            accept_body::SYSTEM_ERR => 5_u32.serialize(dest),
        }
    }
}

impl Deserialize for accept_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<u32>(src)? {
            0 => accept_body::SUCCESS,
            1 => accept_body::PROG_UNAVAIL,
            2 => accept_body::PROG_MISMATCH(deserialize(src)?),
            3 => accept_body::PROC_UNAVAIL,
            4 => accept_body::GARBAGE_ARGS,
            5 => accept_body::SYSTEM_ERR,
            stat => {
                return Err(super::invalid_data(&format!(
                    "Invalid accept stat in accept_body: {stat}"
                )))
            }
        };
        Ok(())
    }
}

/// A call refused before reaching the program: wrong RPC version or bad auth.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum rejected_reply {
    RPC_MISMATCH(mismatch_info),
    AUTH_ERROR(auth_stat),
}

impl Default for rejected_reply {
    fn default() -> rejected_reply {
        rejected_reply::AUTH_ERROR(auth_stat::default())
    }
}

impl Serialize for rejected_reply {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            rejected_reply::RPC_MISMATCH(v) => {
                0_u32.serialize(dest)?;
                v.serialize(dest)
            }
            rejected_reply::AUTH_ERROR(v) => {
                1_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}

impl Deserialize for rejected_reply {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<u32>(src)? {
            0 => rejected_reply::RPC_MISMATCH(deserialize(src)?),
            1 => rejected_reply::AUTH_ERROR(deserialize(src)?),
            stat => {
                return Err(super::invalid_data(&format!(
                    "Invalid reject stat in rejected_reply: {stat}"
                )))
            }
        };
        Ok(())
    }
}

fn accepted(xid: u32, reply_data: accept_body) -> rpc_msg {
    let reply = reply_body::MSG_ACCEPTED(accepted_reply { verf: opaque_auth::default(), reply_data });
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Accepted reply header; the procedure results are written right after it.
pub fn make_success_reply(xid: u32) -> rpc_msg {
    accepted(xid, accept_body::SUCCESS)
}

pub fn prog_unavail_reply_message(xid: u32) -> rpc_msg {
    accepted(xid, accept_body::PROG_UNAVAIL)
}

pub fn prog_mismatch_reply_message(xid: u32, low: u32, high: u32) -> rpc_msg {
    accepted(xid, accept_body::PROG_MISMATCH(mismatch_info { low, high }))
}

pub fn proc_unavail_reply_message(xid: u32) -> rpc_msg {
    accepted(xid, accept_body::PROC_UNAVAIL)
}

pub fn garbage_args_reply_message(xid: u32) -> rpc_msg {
    accepted(xid, accept_body::GARBAGE_ARGS)
}

pub fn rpc_vers_mismatch(xid: u32) -> rpc_msg {
    let info = mismatch_info { low: RPC_VERSION, high: RPC_VERSION };
    let reply = reply_body::MSG_DENIED(rejected_reply::RPC_MISMATCH(info));
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

pub fn auth_error_reply_message(xid: u32, stat: auth_stat) -> rpc_msg {
    let reply = reply_body::MSG_DENIED(rejected_reply::AUTH_ERROR(stat));
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}
