//! CREATE (RFC 7530 section 16.4).
//!
//! Creates a non-regular object in the current directory. Regular files are
//! created with OPEN, so `NF4REG` is `NFS4ERR_BADTYPE`. Of the remaining
//! types only directories are supported by the backing store.

use async_trait::async_trait;
use tracing::{debug, error};

use super::{attrs, mismatched_args, respond, OperationHandler};
use crate::fs_util::{join_path, validate_component};
use crate::protocol::xdr::nfs4::ops::{
    createtype4, nfs_argop4, nfs_resop4, resok4, CREATE4args, CREATE4resok,
};
use crate::protocol::xdr::nfs4::{change_info4, nfs_ftype4, nfs_opnum4, nfsstat4};
use crate::state::{CompoundSession, ServerState};

pub struct Create;

#[async_trait]
impl OperationHandler for Create {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_CREATE(args) = args else {
            return mismatched_args(nfs_opnum4::OP_CREATE);
        };
        respond(nfs_opnum4::OP_CREATE, create(state, session, args).await)
    }
}

async fn create(
    state: &ServerState,
    session: &mut CompoundSession,
    args: CREATE4args,
) -> Result<resok4, nfsstat4> {
    let (dir, before) = state.resolve_current_dir(session).await?;
    validate_component(&args.objname)?;
    match args.objtype {
        createtype4::Other(nfs_ftype4::NF4DIR) => {}
        createtype4::Other(nfs_ftype4::NF4REG) => return Err(nfsstat4::NFS4ERR_BADTYPE),
        _ => return Err(nfsstat4::NFS4ERR_NOTSUPP),
    }
    let (changes, attrset) = attrs::decode_set_attributes(&args.createattrs)?;

    let path = join_path(&dir, &args.objname);
    debug!("create directory {}", path);
    state.store.mkdir(&path).await.map_err(|e| {
        debug!("mkdir {} failed: {}", path, e);
        e.to_nfsstat4()
    })?;
    if !changes.is_empty() {
        state.store.setattr(&path, &changes).await.map_err(|e| {
            error!("setattr on new directory {} failed: {}", path, e);
            e.to_nfsstat4()
        })?;
    }
    let after = state.store.getattr(&dir).await.map_err(|e| e.to_nfsstat4())?;

    session.set_current_file_handle(state.handles.get_or_create(&path));
    Ok(resok4::CREATE(CREATE4resok {
        cinfo: change_info4 { atomic: false, before: before.change(), after: after.change() },
        attrset,
    }))
}
