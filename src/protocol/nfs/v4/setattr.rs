//! SETATTR (RFC 7530 section 16.32).
//!
//! The reply carries the bitmap of applied attributes even on failure, where
//! it is empty: either everything is applied or nothing is reported.

use async_trait::async_trait;
use tracing::{debug, error};

use super::{attrs, mismatched_args, OperationHandler};
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4, resok4, SETATTR4args};
use crate::protocol::xdr::nfs4::{bitmap4, nfs_opnum4, nfsstat4};
use crate::state::{CompoundSession, ServerState};

pub struct SetAttr;

#[async_trait]
impl OperationHandler for SetAttr {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_SETATTR(args) = args else {
            return mismatched_args(nfs_opnum4::OP_SETATTR);
        };
        match setattr(state, session, args).await {
            Ok(attrsset) => nfs_resop4::ok(nfs_opnum4::OP_SETATTR, resok4::SETATTR(attrsset)),
            Err(status) => nfs_resop4::error(nfs_opnum4::OP_SETATTR, status),
        }
    }
}

async fn setattr(
    state: &ServerState,
    session: &CompoundSession,
    args: SETATTR4args,
) -> Result<bitmap4, nfsstat4> {
    let (path, status) = state.resolve_current(session).await?;
    let (changes, attrsset) = attrs::decode_set_attributes(&args.obj_attributes)?;
    debug!("setattr {} {:?}", path, changes);

    if changes.size.is_some() {
        if status.is_dir() {
            return Err(nfsstat4::NFS4ERR_ISDIR);
        }
        // Truncation through an open must be allowed by that open.
        if !args.stateid.is_special() {
            let open = state.opens.get(&args.stateid)?;
            if open.file.path != path {
                return Err(nfsstat4::NFS4ERR_BAD_STATEID);
            }
            if !open.file.mode.can_write() {
                return Err(nfsstat4::NFS4ERR_OPENMODE);
            }
        }
    }
    if changes.is_empty() {
        return Ok(attrsset);
    }
    state.store.setattr(&path, &changes).await.map_err(|e| {
        error!("setattr {} failed: {}", path, e);
        e.to_nfsstat4()
    })?;
    Ok(attrsset)
}
