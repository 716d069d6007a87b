//! RENAME (RFC 7530 section 16.26).
//!
//! The saved file handle is the source directory and the current file handle
//! the target directory. Handles and open state follow the renamed object, so
//! a client holding a handle to it (or to anything below it) keeps using it.

use async_trait::async_trait;
use tracing::{debug, error};

use super::{mismatched_args, respond, OperationHandler};
use crate::fs_util::{is_same_or_descendant, join_path, validate_component};
use crate::protocol::xdr::nfs4::ops::{
    nfs_argop4, nfs_resop4, resok4, RENAME4args, RENAME4resok,
};
use crate::protocol::xdr::nfs4::{change_info4, nfs_opnum4, nfsstat4};
use crate::state::{CompoundSession, ServerState};
use crate::store::FileStatus;

pub struct Rename;

#[async_trait]
impl OperationHandler for Rename {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_RENAME(args) = args else {
            return mismatched_args(nfs_opnum4::OP_RENAME);
        };
        respond(nfs_opnum4::OP_RENAME, rename(state, session, args).await)
    }
}

fn cinfo(before: &FileStatus, after: &FileStatus) -> change_info4 {
    change_info4 { atomic: false, before: before.change(), after: after.change() }
}

async fn rename(
    state: &ServerState,
    session: &CompoundSession,
    args: RENAME4args,
) -> Result<resok4, nfsstat4> {
    let (source_dir, source_before) = state.resolve_saved(session).await?;
    if !source_before.is_dir() {
        return Err(nfsstat4::NFS4ERR_NOTDIR);
    }
    let (target_dir, target_before) = state.resolve_current_dir(session).await?;
    validate_component(&args.oldname)?;
    validate_component(&args.newname)?;

    let from = join_path(&source_dir, &args.oldname);
    let to = join_path(&target_dir, &args.newname);
    if from == to {
        state.store.getattr(&from).await.map_err(|e| e.to_nfsstat4())?;
        return Ok(resok4::RENAME(RENAME4resok {
            source_cinfo: cinfo(&source_before, &source_before),
            target_cinfo: cinfo(&target_before, &target_before),
        }));
    }
    if is_same_or_descendant(&to, &from) {
        return Err(nfsstat4::NFS4ERR_INVAL);
    }

    debug!("rename {} -> {}", from, to);
    state.store.rename(&from, &to).await.map_err(|e| {
        debug!("rename {} -> {} failed: {}", from, to, e);
        e.to_nfsstat4()
    })?;
    state.handles.rename_path(&from, &to);
    state.opens.rename_path(&from, &to);

    let source_after = state.store.getattr(&source_dir).await.map_err(|e| {
        error!("cannot stat {} after rename: {}", source_dir, e);
        e.to_nfsstat4()
    })?;
    let target_after = state.store.getattr(&target_dir).await.map_err(|e| e.to_nfsstat4())?;
    Ok(resok4::RENAME(RENAME4resok {
        source_cinfo: cinfo(&source_before, &source_after),
        target_cinfo: cinfo(&target_before, &target_after),
    }))
}
