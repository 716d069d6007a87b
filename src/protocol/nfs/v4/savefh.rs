//! SAVEFH and RESTOREFH (RFC 7530 sections 16.28 and 16.27).

use async_trait::async_trait;

use super::{mismatched_args, OperationHandler};
use crate::protocol::xdr::nfs4::nfs_opnum4;
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4};
use crate::state::{CompoundSession, ServerState};

pub struct SaveFh;

#[async_trait]
impl OperationHandler for SaveFh {
    async fn handle(
        &self,
        _state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_SAVEFH = args else {
            return mismatched_args(nfs_opnum4::OP_SAVEFH);
        };
        match session.save_file_handle() {
            Ok(()) => nfs_resop4::void(nfs_opnum4::OP_SAVEFH),
            Err(status) => nfs_resop4::error(nfs_opnum4::OP_SAVEFH, status),
        }
    }
}

pub struct RestoreFh;

#[async_trait]
impl OperationHandler for RestoreFh {
    async fn handle(
        &self,
        _state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_RESTOREFH = args else {
            return mismatched_args(nfs_opnum4::OP_RESTOREFH);
        };
        match session.restore_file_handle() {
            Ok(()) => nfs_resop4::void(nfs_opnum4::OP_RESTOREFH),
            Err(status) => nfs_resop4::error(nfs_opnum4::OP_RESTOREFH, status),
        }
    }
}
