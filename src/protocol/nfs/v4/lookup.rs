//! LOOKUP (RFC 7530 section 16.13).
//!
//! Looks up one name in the current directory and makes the result the
//! current file handle. The handle is allocated on first lookup and stays the
//! same for as long as the object lives.

use async_trait::async_trait;
use tracing::debug;

use super::{mismatched_args, respond, OperationHandler};
use crate::fs_util::{join_path, validate_component};
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4, resok4, LOOKUP4args};
use crate::protocol::xdr::nfs4::{nfs_opnum4, nfsstat4};
use crate::state::{CompoundSession, ServerState};
use crate::store::FileKind;

pub struct Lookup;

#[async_trait]
impl OperationHandler for Lookup {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_LOOKUP(args) = args else {
            return mismatched_args(nfs_opnum4::OP_LOOKUP);
        };
        respond(nfs_opnum4::OP_LOOKUP, lookup(state, session, args).await)
    }
}

async fn lookup(
    state: &ServerState,
    session: &mut CompoundSession,
    args: LOOKUP4args,
) -> Result<resok4, nfsstat4> {
    let (dir, status) = state.resolve_current(session).await?;
    match status.kind {
        FileKind::Directory => {}
        FileKind::Symlink => return Err(nfsstat4::NFS4ERR_SYMLINK),
        _ => return Err(nfsstat4::NFS4ERR_NOTDIR),
    }
    validate_component(&args.objname)?;

    let path = join_path(&dir, &args.objname);
    state.store.getattr(&path).await.map_err(|e| e.to_nfsstat4())?;
    let fh = state.handles.get_or_create(&path);
    debug!("lookup {} -> {:?}", path, fh);
    session.set_current_file_handle(fh);
    Ok(resok4::Void)
}
