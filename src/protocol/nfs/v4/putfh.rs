//! PUTFH (RFC 7530 section 16.20).
//!
//! The handle is checked against the handle table only. Whether the object
//! still exists is found out by the operation that uses it.

use async_trait::async_trait;
use tracing::debug;

use super::{mismatched_args, OperationHandler};
use crate::protocol::xdr::nfs4::nfs_opnum4;
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4};
use crate::state::{CompoundSession, ServerState};

pub struct PutFh;

#[async_trait]
impl OperationHandler for PutFh {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_PUTFH(args) = args else {
            return mismatched_args(nfs_opnum4::OP_PUTFH);
        };
        match state.handles.resolve(&args.object) {
            Ok(path) => {
                debug!("putfh {:?} -> {}", args.object, path);
                session.set_current_file_handle(args.object);
                nfs_resop4::void(nfs_opnum4::OP_PUTFH)
            }
            Err(status) => nfs_resop4::error(nfs_opnum4::OP_PUTFH, status),
        }
    }
}
