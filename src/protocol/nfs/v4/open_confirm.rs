//! OPEN_CONFIRM (RFC 7530 section 16.17).
//!
//! Every OPEN asks for confirmation, so the first stateid a client gets back
//! has seqid 1 and the confirmed one seqid 2. Open-owner sequencing is not
//! tracked, so the request's `seqid` is not checked.

use async_trait::async_trait;
use tracing::debug;

use super::{mismatched_args, respond, OperationHandler};
use crate::protocol::xdr::nfs4::nfs_opnum4;
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4, resok4};
use crate::state::{CompoundSession, ServerState};

pub struct OpenConfirm;

#[async_trait]
impl OperationHandler for OpenConfirm {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_OPEN_CONFIRM(args) = args else {
            return mismatched_args(nfs_opnum4::OP_OPEN_CONFIRM);
        };
        let result = match session.current_file_handle() {
            Ok(_) => state.opens.confirm(&args.open_stateid).map(resok4::OPEN_CONFIRM),
            Err(status) => Err(status),
        };
        debug!("open_confirm {:?} -> {:?}", args.open_stateid, result);
        respond(nfs_opnum4::OP_OPEN_CONFIRM, result)
    }
}
