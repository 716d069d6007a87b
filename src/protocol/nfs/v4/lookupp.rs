//! LOOKUPP (RFC 7530 section 16.14).

use async_trait::async_trait;
use tracing::debug;

use super::{mismatched_args, respond, OperationHandler};
use crate::fs_util::parent_path;
use crate::protocol::xdr::nfs4::nfs_opnum4;
use crate::protocol::xdr::nfs4::nfsstat4;
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4, resok4};
use crate::state::{CompoundSession, ServerState};

/// LOOKUPP: makes the parent of the current directory current.
/// There is nothing above the export root.
pub struct LookupParent;

#[async_trait]
impl OperationHandler for LookupParent {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_LOOKUPP = args else {
            return mismatched_args(nfs_opnum4::OP_LOOKUPP);
        };
        respond(nfs_opnum4::OP_LOOKUPP, lookupp(state, session).await)
    }
}

async fn lookupp(state: &ServerState, session: &mut CompoundSession) -> Result<resok4, nfsstat4> {
    let (path, _) = state.resolve_current_dir(session).await?;
    if path == state.root_path() {
        return Err(nfsstat4::NFS4ERR_NOENT);
    }
    let parent = parent_path(&path).ok_or(nfsstat4::NFS4ERR_NOENT)?;
    let fh = state.handles.get_or_create(&parent);
    debug!("lookupp {} -> {}", path, parent);
    session.set_current_file_handle(fh);
    Ok(resok4::Void)
}
