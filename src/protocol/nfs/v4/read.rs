//! READ (RFC 7530 section 16.23).
//!
//! Reads through the open named by the stateid, or through a transient open
//! for the anonymous and bypass stateids. `count` is capped at the configured
//! maximum I/O size, which is also what `FATTR4_MAXREAD` reports.

use async_trait::async_trait;
use tracing::{debug, error};

use super::{file_for_stateid, mismatched_args, respond, OperationHandler};
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4, resok4, READ4args, READ4resok};
use crate::protocol::xdr::nfs4::{nfs_opnum4, nfsstat4};
use crate::state::{CompoundSession, ServerState};
use crate::store::OpenMode;

pub struct Read;

#[async_trait]
impl OperationHandler for Read {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_READ(args) = args else {
            return mismatched_args(nfs_opnum4::OP_READ);
        };
        respond(nfs_opnum4::OP_READ, read(state, session, args).await)
    }
}

async fn read(
    state: &ServerState,
    session: &CompoundSession,
    args: READ4args,
) -> Result<resok4, nfsstat4> {
    let (path, status) = state.resolve_current(session).await?;
    if status.is_dir() {
        return Err(nfsstat4::NFS4ERR_ISDIR);
    }
    let count = args.count.min(state.config.max_io_size);
    debug!("read {} offset {} count {}", path, args.offset, count);

    let (file, transient) = file_for_stateid(state, &args.stateid, &path, OpenMode::Read).await?;
    let result = state.store.read(&file, args.offset, count).await;
    if transient {
        if let Err(e) = state.store.close(file).await {
            error!("closing {} after read failed: {}", path, e);
        }
    }
    let (data, eof) = result.map_err(|e| {
        error!("read {} failed: {}", path, e);
        e.to_nfsstat4()
    })?;
    Ok(resok4::READ(READ4resok { eof, data }))
}
