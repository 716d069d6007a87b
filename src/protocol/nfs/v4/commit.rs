//! COMMIT (RFC 7530 section 16.3).
//!
//! Flushes data written with `UNSTABLE4` through every open of the current
//! file. The byte range is not tracked; the whole file is synced.

use async_trait::async_trait;
use tracing::{debug, error};

use super::{mismatched_args, respond, OperationHandler};
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4, resok4, COMMIT4args};
use crate::protocol::xdr::nfs4::{nfs_opnum4, nfsstat4};
use crate::state::{CompoundSession, ServerState};

pub struct Commit;

#[async_trait]
impl OperationHandler for Commit {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_COMMIT(args) = args else {
            return mismatched_args(nfs_opnum4::OP_COMMIT);
        };
        respond(nfs_opnum4::OP_COMMIT, commit(state, session, args).await)
    }
}

async fn commit(
    state: &ServerState,
    session: &CompoundSession,
    args: COMMIT4args,
) -> Result<resok4, nfsstat4> {
    let (path, status) = state.resolve_current(session).await?;
    if status.is_dir() {
        return Err(nfsstat4::NFS4ERR_ISDIR);
    }
    debug!("commit {} offset {} count {}", path, args.offset, args.count);
    for file in state.opens.files_for_path(&path) {
        state.store.sync(&file).await.map_err(|e| {
            error!("sync of {} failed: {}", path, e);
            e.to_nfsstat4()
        })?;
    }
    Ok(resok4::COMMIT(state.write_verifier()))
}
