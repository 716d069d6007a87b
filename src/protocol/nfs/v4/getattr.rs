//! GETATTR (RFC 7530 section 16.7).

use async_trait::async_trait;
use tracing::debug;

use super::{attrs, mismatched_args, respond, OperationHandler};
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4, resok4, GETATTR4args};
use crate::protocol::xdr::nfs4::{nfs_opnum4, nfsstat4};
use crate::state::{CompoundSession, ServerState};

pub struct GetAttr;

#[async_trait]
impl OperationHandler for GetAttr {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_GETATTR(args) = args else {
            return mismatched_args(nfs_opnum4::OP_GETATTR);
        };
        respond(nfs_opnum4::OP_GETATTR, getattr(state, session, args).await)
    }
}

async fn getattr(
    state: &ServerState,
    session: &CompoundSession,
    args: GETATTR4args,
) -> Result<resok4, nfsstat4> {
    let fh = session.current_file_handle()?;
    let (path, status) = state.resolve_handle(fh).await?;
    debug!("getattr {} {:?}", path, args.attr_request);
    let attrs = attrs::encode_status(state, &args.attr_request, fh, &status)?;
    Ok(resok4::GETATTR(attrs))
}
