//! SECINFO (RFC 7530 section 16.31).

use async_trait::async_trait;
use tracing::debug;

use super::{mismatched_args, respond, OperationHandler};
use crate::fs_util::{join_path, validate_component};
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4, resok4, SECINFO4args};
use crate::protocol::xdr::nfs4::{nfs_opnum4, nfsstat4};
use crate::protocol::xdr::rpc::{AUTH_NONE, AUTH_UNIX};
use crate::state::{CompoundSession, ServerState};

pub struct SecInfo;

#[async_trait]
impl OperationHandler for SecInfo {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_SECINFO(args) = args else {
            return mismatched_args(nfs_opnum4::OP_SECINFO);
        };
        let result = secinfo(state, session, args).await;
        // The current filehandle is consumed by SECINFO.
        if result.is_ok() {
            session.clear_current_file_handle();
        }
        respond(nfs_opnum4::OP_SECINFO, result)
    }
}

async fn secinfo(
    state: &ServerState,
    session: &CompoundSession,
    args: SECINFO4args,
) -> Result<resok4, nfsstat4> {
    let (dir, _) = state.resolve_current_dir(session).await?;
    validate_component(&args.name)?;
    let path = join_path(&dir, &args.name);
    state.store.getattr(&path).await.map_err(|e| e.to_nfsstat4())?;
    debug!("secinfo {}", path);
    Ok(resok4::SECINFO(vec![AUTH_UNIX, AUTH_NONE]))
}
