//! WRITE (RFC 7530 section 16.36).
//!
//! `UNSTABLE4` writes are left to a later COMMIT. Any stronger request is
//! synced before replying and reported as `FILE_SYNC4`. Writes through a
//! special stateid use a transient open and are always synced.

use async_trait::async_trait;
use tracing::{debug, error};

use super::{file_for_stateid, mismatched_args, respond, OperationHandler};
use crate::protocol::xdr::nfs4::ops::{
    nfs_argop4, nfs_resop4, resok4, stable_how4, WRITE4args, WRITE4resok,
};
use crate::protocol::xdr::nfs4::{nfs_opnum4, nfsstat4};
use crate::state::{CompoundSession, ServerState};
use crate::store::{OpenFile, OpenMode};

pub struct Write;

#[async_trait]
impl OperationHandler for Write {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_WRITE(args) = args else {
            return mismatched_args(nfs_opnum4::OP_WRITE);
        };
        respond(nfs_opnum4::OP_WRITE, write(state, session, args).await)
    }
}

async fn write_and_sync(
    state: &ServerState,
    file: &OpenFile,
    args: &WRITE4args,
    sync: bool,
) -> Result<u32, nfsstat4> {
    let count = state.store.write(file, args.offset, &args.data).await.map_err(|e| {
        error!("write {} failed: {}", file.path, e);
        e.to_nfsstat4()
    })?;
    if sync {
        state.store.sync(file).await.map_err(|e| {
            error!("sync {} failed: {}", file.path, e);
            e.to_nfsstat4()
        })?;
    }
    Ok(count)
}

async fn write(
    state: &ServerState,
    session: &CompoundSession,
    args: WRITE4args,
) -> Result<resok4, nfsstat4> {
    let (path, status) = state.resolve_current(session).await?;
    if status.is_dir() {
        return Err(nfsstat4::NFS4ERR_ISDIR);
    }
    if args.data.len() > state.config.max_io_size as usize {
        return Err(nfsstat4::NFS4ERR_INVAL);
    }
    debug!("write {} offset {} len {} {:?}", path, args.offset, args.data.len(), args.stable);

    let (file, transient) = file_for_stateid(state, &args.stateid, &path, OpenMode::Write).await?;
    let sync = transient || args.stable != stable_how4::UNSTABLE4;
    let result = write_and_sync(state, &file, &args, sync).await;
    if transient {
        if let Err(e) = state.store.close(file).await {
            error!("closing {} after write failed: {}", path, e);
        }
    }
    let count = result?;
    let committed = if sync { stable_how4::FILE_SYNC4 } else { stable_how4::UNSTABLE4 };
    Ok(resok4::WRITE(WRITE4resok { count, committed, writeverf: state.write_verifier() }))
}
