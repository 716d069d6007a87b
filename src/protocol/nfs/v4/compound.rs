//! COMPOUND procedure (RFC 7530 section 15.2).
//!
//! A COMPOUND carries a tag, a minor version and a list of operations that are
//! executed strictly in order against one [`CompoundSession`]. Arguments are
//! decoded lazily, one operation at a time, so nothing after the first failure
//! is even looked at.

use std::io::{Read, Write};

use num_traits::FromPrimitive;
use tracing::{debug, warn};
use tracing_attributes::instrument;

use crate::protocol::rpc;
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4, COMPOUND4args_header, COMPOUND4res};
use crate::protocol::xdr::nfs4::{nfs_opnum4, nfsstat4, MINOR_VERSION};
use crate::protocol::xdr::{self, deserialize, Serialize};
use crate::state::{CompoundSession, ServerState};

/// Decodes the COMPOUND header, runs the operations and writes the reply.
///
/// An undecodable header is answered with `GARBAGE_ARGS`.
pub(super) async fn nfsproc4_compound(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let header = match deserialize::<COMPOUND4args_header>(input) {
        Ok(header) => header,
        Err(e) => {
            warn!("Malformed COMPOUND header in xid {}: {}", xid, e);
            xdr::rpc::garbage_args_reply_message(xid).serialize(output)?;
            return Ok(());
        }
    };
    debug!("nfsproc4_compound({:?}, {:?})", xid, header);

    let mut session = CompoundSession::new(context.auth.clone(), &context.client_addr);
    let res = execute_compound(&context.state, &mut session, &header, input).await;

    debug!("nfsproc4_compound {:?} --> {:?} ({} results)", xid, res.status, res.resarray.len());
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    res.serialize(output)?;
    Ok(())
}

/// Runs the operations that follow `header` in `input`.
///
/// Stops after the first operation whose status is not `NFS4_OK`.
///
/// # Arguments
///
/// * `state` - server-wide state shared with other connections
/// * `session` - current and saved file handles, updated in place
/// * `header` - the already decoded tag, minor version and operation count
/// * `input` - positioned at the first operation
///
/// # Returns
///
/// The reply body. Its status is the status of the last result, or
/// `NFS4_OK` for an empty request.
#[instrument(level = "debug", skip_all, fields(tag = %header.tag, numops = header.numops))]
pub async fn execute_compound(
    state: &ServerState,
    session: &mut CompoundSession,
    header: &COMPOUND4args_header,
    input: &mut impl Read,
) -> COMPOUND4res {
    let mut resarray = Vec::new();
    if header.minorversion != MINOR_VERSION {
        warn!("Unsupported NFSv4 minor version {}", header.minorversion);
        return COMPOUND4res {
            status: nfsstat4::NFS4ERR_MINOR_VERS_MISMATCH,
            tag: header.tag.clone(),
            resarray,
        };
    }

    for _ in 0..header.numops {
        let result = next_operation(state, session, input).await;
        let failed = result.status != nfsstat4::NFS4_OK;
        resarray.push(result);
        if failed {
            break;
        }
    }

    let status = resarray.last().map_or(nfsstat4::NFS4_OK, |res| res.status);
    COMPOUND4res { status, tag: header.tag.clone(), resarray }
}

async fn next_operation(
    state: &ServerState,
    session: &mut CompoundSession,
    input: &mut impl Read,
) -> nfs_resop4 {
    let opnum = match deserialize::<u32>(input) {
        Ok(opnum) => opnum,
        Err(_) => {
            warn!("COMPOUND truncated before the next operation");
            return nfs_resop4::error(nfs_opnum4::OP_ILLEGAL, nfsstat4::NFS4ERR_BADXDR);
        }
    };
    let op = match nfs_opnum4::from_u32(opnum) {
        Some(nfs_opnum4::OP_ILLEGAL) | None => {
            warn!("Illegal NFSv4 operation {}", opnum);
            return nfs_resop4::illegal();
        }
        Some(op) => op,
    };
    let Some(handler) = state.registry.get(op) else {
        debug!("No handler for {:?}", op);
        return nfs_resop4::error(op, nfsstat4::NFS4ERR_NOTSUPP);
    };
    let args = match nfs_argop4::decode(op, input) {
        Ok(Some(args)) => args,
        Ok(None) => return nfs_resop4::error(op, nfsstat4::NFS4ERR_NOTSUPP),
        Err(e) => {
            warn!("Cannot decode arguments of {:?}: {}", op, e);
            return nfs_resop4::error(op, nfsstat4::NFS4ERR_BADXDR);
        }
    };
    debug!("{:?}", args);
    let result = handler.handle(state, session, args).await;
    if result.status != nfsstat4::NFS4_OK {
        debug!("{:?} failed with {:?}", op, result.status);
    }
    result
}
