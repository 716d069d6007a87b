//! NFSv4.0 (RFC 7530) server procedures.
//!
//! NFSv4 has only two RPC procedures: NULL and COMPOUND. Everything else is an
//! *operation* inside a COMPOUND request. Each supported operation lives in its
//! own module as a stateless unit struct implementing [`OperationHandler`], and
//! [`HandlerRegistry::standard`] maps operation numbers to those handlers.
//!
//! Handlers never fail across the dispatch boundary: whatever goes wrong is
//! reported as an `nfsstat4` inside the operation result, and the COMPOUND
//! executor stops at the first result that is not `NFS4_OK`.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::protocol::rpc;
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4, resok4};
use crate::protocol::xdr::nfs4::{self, nfs_opnum4, nfsstat4};
use crate::protocol::xdr::{self, Serialize};
use crate::state::{CompoundSession, ServerState};
use crate::store::{OpenFile, OpenMode};

mod access;
pub mod attrs;
mod close;
mod commit;
mod compound;
mod create;
mod getattr;
mod getfh;
mod lookup;
mod lookupp;
mod open;
mod open_confirm;
mod putfh;
mod putrootfh;
mod read;
mod readdir;
mod remove;
mod rename;
mod renew;
mod savefh;
mod secinfo;
mod setattr;
mod setclientid;
mod write;

pub use compound::execute_compound;

/// One NFSv4 operation.
///
/// `args` always carries the variant registered for the handler's opcode.
/// On failure a handler must leave `session` as it found it.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4;
}

/// Maps operation numbers to their handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<nfs_opnum4, Arc<dyn OperationHandler>>,
}

impl HandlerRegistry {
    /// A registry with no operations at all.
    pub fn empty() -> HandlerRegistry {
        HandlerRegistry::default()
    }

    /// Every operation this server implements.
    pub fn standard() -> HandlerRegistry {
        use nfs_opnum4::*;
        let mut registry = HandlerRegistry::empty();
        registry
            .register(OP_ACCESS, Arc::new(access::Access))
            .register(OP_CLOSE, Arc::new(close::Close))
            .register(OP_COMMIT, Arc::new(commit::Commit))
            .register(OP_CREATE, Arc::new(create::Create))
            .register(OP_GETATTR, Arc::new(getattr::GetAttr))
            .register(OP_GETFH, Arc::new(getfh::GetFh))
            .register(OP_LOOKUP, Arc::new(lookup::Lookup))
            .register(OP_LOOKUPP, Arc::new(lookupp::LookupParent))
            .register(OP_OPEN, Arc::new(open::Open))
            .register(OP_OPEN_CONFIRM, Arc::new(open_confirm::OpenConfirm))
            .register(OP_PUTFH, Arc::new(putfh::PutFh))
            .register(OP_PUTPUBFH, Arc::new(putrootfh::PutRootFh))
            .register(OP_PUTROOTFH, Arc::new(putrootfh::PutRootFh))
            .register(OP_READ, Arc::new(read::Read))
            .register(OP_READDIR, Arc::new(readdir::ReadDir))
            .register(OP_REMOVE, Arc::new(remove::Remove))
            .register(OP_RENAME, Arc::new(rename::Rename))
            .register(OP_RENEW, Arc::new(renew::Renew))
            .register(OP_RESTOREFH, Arc::new(savefh::RestoreFh))
            .register(OP_SAVEFH, Arc::new(savefh::SaveFh))
            .register(OP_SECINFO, Arc::new(secinfo::SecInfo))
            .register(OP_SETATTR, Arc::new(setattr::SetAttr))
            .register(OP_SETCLIENTID, Arc::new(setclientid::SetClientId))
            .register(OP_SETCLIENTID_CONFIRM, Arc::new(setclientid::SetClientIdConfirm))
            .register(OP_WRITE, Arc::new(write::Write));
        registry
    }

    /// Adds or replaces the handler for `op`.
    pub fn register(
        &mut self,
        op: nfs_opnum4,
        handler: Arc<dyn OperationHandler>,
    ) -> &mut HandlerRegistry {
        self.handlers.insert(op, handler);
        self
    }

    pub fn get(&self, op: nfs_opnum4) -> Option<Arc<dyn OperationHandler>> {
        self.handlers.get(&op).cloned()
    }
}

/// Turns a handler's outcome into an operation result.
pub(crate) fn respond(op: nfs_opnum4, result: Result<resok4, nfsstat4>) -> nfs_resop4 {
    match result {
        Ok(resok) => nfs_resop4::ok(op, resok),
        Err(status) => nfs_resop4::error(op, status),
    }
}

/// Result for arguments that do not belong to the handler they were given to,
/// which means the registry was wired up wrongly.
pub(crate) fn mismatched_args(op: nfs_opnum4) -> nfs_resop4 {
    error!("handler for {:?} received arguments of another operation", op);
    nfs_resop4::error(op, nfsstat4::NFS4ERR_SERVERFAULT)
}

/// The file READ or WRITE operates on, and whether it was opened just for
/// this operation and must be closed afterwards.
///
/// Special stateids open the file transiently; any other stateid must name
/// an open of `path` whose mode includes `mode`.
///
/// # Returns
///
/// * `NFS4ERR_BAD_STATEID` if the stateid names an open of another file
/// * `NFS4ERR_OPENMODE` if the open does not allow `mode`
/// * the stateid table's error for unknown, old or stale stateids
pub(crate) async fn file_for_stateid(
    state: &ServerState,
    stateid: &nfs4::stateid4,
    path: &str,
    mode: OpenMode,
) -> Result<(OpenFile, bool), nfsstat4> {
    if stateid.is_special() {
        let file = state.store.open(path, mode).await.map_err(|e| e.to_nfsstat4())?;
        return Ok((file, true));
    }
    let open = state.opens.get(stateid)?;
    if open.file.path != path {
        warn!("stateid {:?} belongs to {}, not {}", stateid, open.file.path, path);
        return Err(nfsstat4::NFS4ERR_BAD_STATEID);
    }
    let allowed = match mode {
        OpenMode::Read => open.file.mode.can_read(),
        OpenMode::Write => open.file.mode.can_write(),
        OpenMode::ReadWrite => open.file.mode == OpenMode::ReadWrite,
    };
    if !allowed {
        return Err(nfsstat4::NFS4ERR_OPENMODE);
    }
    Ok((open.file, false))
}

/// Main handler for the NFSv4 program.
///
/// Answers NULL directly and hands COMPOUND to the executor. Any other
/// procedure number is `PROC_UNAVAIL`; a version other than 4 is
/// `PROG_MISMATCH`.
pub async fn handle_nfs(
    xid: u32,
    call: xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if call.vers != nfs4::VERSION {
        warn!("Invalid NFS Version number {} != {}", call.vers, nfs4::VERSION);
        xdr::rpc::prog_mismatch_reply_message(xid, nfs4::VERSION, nfs4::VERSION)
            .serialize(output)?;
        return Ok(());
    }
    match call.proc {
        nfs4::NFSPROC4_NULL => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
        }
        nfs4::NFSPROC4_COMPOUND => {
            compound::nfsproc4_compound(xid, input, output, context).await?;
        }
        proc => {
            warn!("Unimplemented NFSv4 procedure {}", proc);
            xdr::rpc::proc_unavail_reply_message(xid).serialize(output)?;
        }
    }
    Ok(())
}
