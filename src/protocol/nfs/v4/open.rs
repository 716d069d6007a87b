//! OPEN (RFC 7530 section 16.16).
//!
//! Opens, and optionally creates, a regular file named relative to the current
//! directory. Only `CLAIM_NULL` is served; reclaims after a server restart and
//! delegation claims are `NFS4ERR_NOTSUPP` since no state survives a restart
//! and delegations are never handed out.
//!
//! The create modes behave as follows:
//!
//! - `UNCHECKED4` creates the file if needed and applies the create attributes
//!   either way. This is how clients truncate on open (`SIZE` = 0).
//! - `GUARDED4` fails with `NFS4ERR_EXIST` if the name is taken.
//! - `EXCLUSIVE4` stores the client's verifier in the file's access and
//!   modification times, so a retransmitted request finding its own verifier
//!   succeeds while a different creator gets `NFS4ERR_EXIST`.
//!
//! Every open must be confirmed with OPEN_CONFIRM before the client considers
//! the open owner established.

use async_trait::async_trait;
use tracing::{debug, error};

use super::{attrs, mismatched_args, respond, OperationHandler};
use crate::fs_util::{join_path, validate_component};
use crate::protocol::xdr::nfs4::attr::{FATTR4_TIME_ACCESS_SET, FATTR4_TIME_MODIFY_SET};
use crate::protocol::xdr::nfs4::ops::{
    createhow4, nfs_argop4, nfs_resop4, open_claim4, openflag4, resok4, OPEN4args, OPEN4resok,
    OPEN4_RESULT_CONFIRM, OPEN4_SHARE_ACCESS_BOTH, OPEN4_SHARE_ACCESS_READ,
    OPEN4_SHARE_ACCESS_WRITE, OPEN_DELEGATE_NONE,
};
use crate::protocol::xdr::nfs4::{
    bitmap4, change_info4, nfs_opnum4, nfsstat4, nfstime4, settime4, verifier4,
};
use crate::state::{CompoundSession, ServerState};
use crate::store::{FileKind, OpenMode, SetAttributes, StoreError};

pub struct Open;

#[async_trait]
impl OperationHandler for Open {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_OPEN(args) = args else {
            return mismatched_args(nfs_opnum4::OP_OPEN);
        };
        respond(nfs_opnum4::OP_OPEN, open(state, session, args).await)
    }
}

fn open_mode(share_access: u32) -> Result<OpenMode, nfsstat4> {
    match share_access & OPEN4_SHARE_ACCESS_BOTH {
        OPEN4_SHARE_ACCESS_READ => Ok(OpenMode::Read),
        OPEN4_SHARE_ACCESS_WRITE => Ok(OpenMode::Write),
        OPEN4_SHARE_ACCESS_BOTH => Ok(OpenMode::ReadWrite),
        _ => Err(nfsstat4::NFS4ERR_INVAL),
    }
}

/// The file times an exclusive create stamps its verifier into.
fn verifier_time(verifier: &verifier4) -> nfstime4 {
    let seconds = u32::from_be_bytes([verifier[0], verifier[1], verifier[2], verifier[3]]);
    let nseconds = u32::from_be_bytes([verifier[4], verifier[5], verifier[6], verifier[7]]);
    nfstime4 { seconds: seconds.into(), nseconds: nseconds % 1_000_000_000 }
}

async fn apply(state: &ServerState, path: &str, changes: &SetAttributes) -> Result<(), nfsstat4> {
    if changes.is_empty() {
        return Ok(());
    }
    state.store.setattr(path, changes).await.map_err(|e| {
        error!("setattr on open of {} failed: {}", path, e);
        e.to_nfsstat4()
    })
}

/// Creates `path` according to `how`, returning the attributes set on it.
async fn create(
    state: &ServerState,
    path: &str,
    how: &createhow4,
) -> Result<bitmap4, nfsstat4> {
    match how {
        createhow4::UNCHECKED4(createattrs) | createhow4::GUARDED4(createattrs) => {
            let (changes, attrset) = attrs::decode_set_attributes(createattrs)?;
            let exclusive = matches!(how, createhow4::GUARDED4(_));
            state.store.create(path, exclusive).await.map_err(|e| e.to_nfsstat4())?;
            let status = state.store.getattr(path).await.map_err(|e| e.to_nfsstat4())?;
            if status.is_dir() {
                return Err(nfsstat4::NFS4ERR_ISDIR);
            }
            apply(state, path, &changes).await?;
            Ok(attrset)
        }
        createhow4::EXCLUSIVE4(verifier) => {
            let stamp = verifier_time(verifier);
            match state.store.create(path, true).await {
                Ok(()) => {
                    let changes = SetAttributes {
                        atime: Some(settime4::SET_TO_CLIENT_TIME4(stamp)),
                        mtime: Some(settime4::SET_TO_CLIENT_TIME4(stamp)),
                        ..SetAttributes::default()
                    };
                    apply(state, path, &changes).await?;
                }
                Err(StoreError::AlreadyExists(_)) => {
                    let status = state.store.getattr(path).await.map_err(|e| e.to_nfsstat4())?;
                    if status.mtime != stamp {
                        return Err(nfsstat4::NFS4ERR_EXIST);
                    }
                    debug!("retransmitted exclusive create of {}", path);
                }
                Err(e) => return Err(e.to_nfsstat4()),
            }
            Ok(bitmap4::from_ids(&[FATTR4_TIME_ACCESS_SET, FATTR4_TIME_MODIFY_SET]))
        }
    }
}

async fn open(
    state: &ServerState,
    session: &mut CompoundSession,
    args: OPEN4args,
) -> Result<resok4, nfsstat4> {
    let (dir, before) = state.resolve_current_dir(session).await?;
    let name = match &args.claim {
        open_claim4::CLAIM_NULL(name) => name,
        claim => {
            debug!("unsupported open claim {:?}", claim);
            return Err(nfsstat4::NFS4ERR_NOTSUPP);
        }
    };
    validate_component(name)?;
    let mode = open_mode(args.share_access)?;
    state.renew_client(args.owner.clientid).await?;

    let path = join_path(&dir, name);
    debug!("open {} {:?} {:?}", path, mode, args.openhow);
    let attrset = match &args.openhow {
        openflag4::OPEN4_NOCREATE => bitmap4::new(),
        openflag4::OPEN4_CREATE(how) => create(state, &path, how).await?,
    };

    let status = state.store.getattr(&path).await.map_err(|e| e.to_nfsstat4())?;
    match status.kind {
        FileKind::Directory => return Err(nfsstat4::NFS4ERR_ISDIR),
        FileKind::Symlink => return Err(nfsstat4::NFS4ERR_SYMLINK),
        FileKind::File | FileKind::Other => {}
    }

    let file = state.store.open(&path, mode).await.map_err(|e| {
        debug!("open {} failed: {}", path, e);
        e.to_nfsstat4()
    })?;
    let stateid = state.opens.insert(file, args.owner.clientid, args.owner.owner);
    let after = state.store.getattr(&dir).await.map_err(|e| e.to_nfsstat4())?;

    session.set_current_file_handle(state.handles.get_or_create(&path));
    Ok(resok4::OPEN(OPEN4resok {
        stateid,
        cinfo: change_info4 { atomic: false, before: before.change(), after: after.change() },
        rflags: OPEN4_RESULT_CONFIRM,
        attrset,
        delegation_type: OPEN_DELEGATE_NONE,
    }))
}
