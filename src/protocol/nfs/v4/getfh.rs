//! GETFH (RFC 7530 section 16.8).

use async_trait::async_trait;

use super::{mismatched_args, OperationHandler};
use crate::protocol::xdr::nfs4::nfs_opnum4;
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4, resok4};
use crate::state::{CompoundSession, ServerState};

/// GETFH: returns the current file handle.
pub struct GetFh;

#[async_trait]
impl OperationHandler for GetFh {
    async fn handle(
        &self,
        _state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_GETFH = args else {
            return mismatched_args(nfs_opnum4::OP_GETFH);
        };
        match session.current_file_handle() {
            Ok(fh) => nfs_resop4::ok(nfs_opnum4::OP_GETFH, resok4::GETFH(fh.clone())),
            Err(status) => nfs_resop4::error(nfs_opnum4::OP_GETFH, status),
        }
    }
}
