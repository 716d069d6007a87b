use async_trait::async_trait;
use tracing::debug;

use super::{mismatched_args, respond, OperationHandler};
use crate::protocol::xdr::nfs4::nfs_opnum4;
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4, resok4};
use crate::state::{CompoundSession, ServerState};

/// RENEW: keeps a client's lease alive.
pub struct Renew;

#[async_trait]
impl OperationHandler for Renew {
    async fn handle(
        &self,
        state: &ServerState,
        _session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_RENEW(args) = args else {
            return mismatched_args(nfs_opnum4::OP_RENEW);
        };
        debug!("renew {:x}", args.clientid);
        let result = state.renew_client(args.clientid).await.map(|()| resok4::Void);
        respond(nfs_opnum4::OP_RENEW, result)
    }
}
