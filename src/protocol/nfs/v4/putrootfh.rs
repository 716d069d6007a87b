//! PUTROOTFH and PUTPUBFH (RFC 7530 sections 16.22 and 16.21).
//!
//! Both make the export root current. No separate public file system is
//! exported.

use async_trait::async_trait;

use super::{mismatched_args, OperationHandler};
use crate::protocol::xdr::nfs4::nfs_opnum4;
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4};
use crate::state::{CompoundSession, ServerState};

/// PUTROOTFH and PUTPUBFH. The public handle is the root handle.
pub struct PutRootFh;

#[async_trait]
impl OperationHandler for PutRootFh {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let op = match args {
            nfs_argop4::OP_PUTROOTFH => nfs_opnum4::OP_PUTROOTFH,
            nfs_argop4::OP_PUTPUBFH => nfs_opnum4::OP_PUTPUBFH,
            _ => return mismatched_args(nfs_opnum4::OP_PUTROOTFH),
        };
        session.set_current_file_handle(state.root_handle());
        nfs_resop4::void(op)
    }
}
