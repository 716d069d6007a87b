//! REMOVE (RFC 7530 section 16.25): removes a file or an empty directory
//! from the current directory. Handles of the removed object go stale.

use async_trait::async_trait;
use tracing::debug;

use super::{mismatched_args, respond, OperationHandler};
use crate::fs_util::{join_path, validate_component};
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4, resok4, REMOVE4args};
use crate::protocol::xdr::nfs4::{change_info4, nfs_opnum4, nfsstat4};
use crate::state::{CompoundSession, ServerState};

pub struct Remove;

#[async_trait]
impl OperationHandler for Remove {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_REMOVE(args) = args else {
            return mismatched_args(nfs_opnum4::OP_REMOVE);
        };
        respond(nfs_opnum4::OP_REMOVE, remove(state, session, args).await)
    }
}

async fn remove(
    state: &ServerState,
    session: &CompoundSession,
    args: REMOVE4args,
) -> Result<resok4, nfsstat4> {
    let (dir, before) = state.resolve_current_dir(session).await?;
    validate_component(&args.target)?;
    let path = join_path(&dir, &args.target);
    debug!("remove {}", path);
    state.store.remove(&path).await.map_err(|e| e.to_nfsstat4())?;
    state.handles.invalidate_path(&path);
    let after = state.store.getattr(&dir).await.map_err(|e| e.to_nfsstat4())?;
    Ok(resok4::REMOVE(change_info4 {
        atomic: false,
        before: before.change(),
        after: after.change(),
    }))
}
