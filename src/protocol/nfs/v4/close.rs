//! CLOSE (RFC 7530 section 16.2): releases the open named by a stateid.

use async_trait::async_trait;
use tracing::{debug, error};

use super::{mismatched_args, respond, OperationHandler};
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4, resok4, CLOSE4args};
use crate::protocol::xdr::nfs4::{nfs_opnum4, nfsstat4, stateid4};
use crate::state::{CompoundSession, ServerState};

pub struct Close;

#[async_trait]
impl OperationHandler for Close {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_CLOSE(args) = args else {
            return mismatched_args(nfs_opnum4::OP_CLOSE);
        };
        respond(nfs_opnum4::OP_CLOSE, close(state, session, args).await)
    }
}

async fn close(
    state: &ServerState,
    session: &CompoundSession,
    args: CLOSE4args,
) -> Result<resok4, nfsstat4> {
    session.current_file_handle()?;
    let open = state.opens.remove(&args.open_stateid)?;
    debug!("close {} ({:?})", open.file.path, open.stateid);
    let stateid = stateid4 { seqid: open.stateid.seqid.wrapping_add(1), other: open.stateid.other };
    state.store.close(open.file).await.map_err(|e| {
        error!("close failed: {}", e);
        e.to_nfsstat4()
    })?;
    Ok(resok4::CLOSE(stateid))
}
