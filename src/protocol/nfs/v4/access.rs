//! Implementation of the ACCESS operation (RFC 7530 section 16.1).
//!
//! ACCESS tells the client which of the requested rights the caller has on
//! the current object. Rights are derived from the mode bits and the
//! `AUTH_UNIX` credentials of the request: the owner, group and other
//! triplets are checked in the usual order and uid 0 is granted everything.
//!
//! Only rights that make sense for the object type are reported as
//! `supported`: LOOKUP and DELETE for directories, EXECUTE for files.

use async_trait::async_trait;
use tracing::debug;

use super::{mismatched_args, respond, OperationHandler};
use crate::protocol::xdr::nfs4::ops::{
    nfs_argop4, nfs_resop4, resok4, ACCESS4args, ACCESS4resok, ACCESS4_DELETE, ACCESS4_EXECUTE,
    ACCESS4_EXTEND, ACCESS4_LOOKUP, ACCESS4_MODIFY, ACCESS4_READ,
};
use crate::protocol::xdr::nfs4::{nfs_opnum4, nfsstat4};
use crate::protocol::xdr::rpc::auth_unix;
use crate::state::{CompoundSession, ServerState};
use crate::store::FileStatus;

const FILE_RIGHTS: u32 = ACCESS4_READ | ACCESS4_MODIFY | ACCESS4_EXTEND | ACCESS4_EXECUTE;
const DIRECTORY_RIGHTS: u32 =
    ACCESS4_READ | ACCESS4_LOOKUP | ACCESS4_MODIFY | ACCESS4_EXTEND | ACCESS4_DELETE;

pub struct Access;

#[async_trait]
impl OperationHandler for Access {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_ACCESS(args) = args else {
            return mismatched_args(nfs_opnum4::OP_ACCESS);
        };
        respond(nfs_opnum4::OP_ACCESS, access(state, session, args).await)
    }
}

async fn access(
    state: &ServerState,
    session: &CompoundSession,
    args: ACCESS4args,
) -> Result<resok4, nfsstat4> {
    let (path, status) = state.resolve_current(session).await?;
    let applicable = if status.is_dir() { DIRECTORY_RIGHTS } else { FILE_RIGHTS };
    let supported = args.access & applicable;
    let access = supported & granted_rights(&status, &session.auth);
    debug!("access {} requested {:#x} granted {:#x}", path, args.access, access);
    Ok(resok4::ACCESS(ACCESS4resok { supported, access }))
}

/// Rights the caller holds on an object, before masking by object type.
fn granted_rights(status: &FileStatus, auth: &auth_unix) -> u32 {
    if auth.uid == 0 {
        return FILE_RIGHTS | DIRECTORY_RIGHTS;
    }
    let bits = if auth.uid == status.uid {
        status.mode >> 6
    } else if auth.gid == status.gid || auth.gids.contains(&status.gid) {
        status.mode >> 3
    } else {
        status.mode
    } & 0o7;

    let mut rights = 0;
    if bits & 0o4 != 0 {
        rights |= ACCESS4_READ;
    }
    if bits & 0o2 != 0 {
        rights |= ACCESS4_MODIFY | ACCESS4_EXTEND | ACCESS4_DELETE;
    }
    if bits & 0o1 != 0 {
        rights |= ACCESS4_EXECUTE | ACCESS4_LOOKUP;
    }
    rights
}
