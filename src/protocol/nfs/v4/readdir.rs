//! READDIR (RFC 7530 section 16.24).
//!
//! Cookies are positions in the listing returned by the backing store: the
//! entry at zero-based index `i` carries cookie `i + 3`, since 0 means "start
//! of directory" and 1 and 2 are reserved. The cookie verifier is the server
//! generation, so cookies handed out by an earlier server instance are
//! refused with `NFS4ERR_NOT_SAME`.
//!
//! Entries are added while the encoded reply stays within `maxcount`. The
//! `dircount` hint is not used.

use async_trait::async_trait;
use tracing::{debug, error};

use super::{attrs, mismatched_args, respond, OperationHandler};
use crate::fs_util::join_path;
use crate::protocol::xdr::nfs4::ops::{
    dirlist4, entry4, nfs_argop4, nfs_resop4, resok4, READDIR4args, READDIR4resok,
};
use crate::protocol::xdr::nfs4::{nfs_opnum4, nfsstat4};
use crate::state::{CompoundSession, ServerState};
use crate::write_counter::encoded_len;

/// First cookie handed out for a real entry.
const FIRST_COOKIE: u64 = 3;

/// Reply bytes outside the entry list: the cookie verifier, the list
/// terminator and the eof flag.
const FIXED_REPLY_SIZE: usize = 16;

pub struct ReadDir;

#[async_trait]
impl OperationHandler for ReadDir {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_READDIR(args) = args else {
            return mismatched_args(nfs_opnum4::OP_READDIR);
        };
        respond(nfs_opnum4::OP_READDIR, readdir(state, session, args).await)
    }
}

async fn readdir(
    state: &ServerState,
    session: &CompoundSession,
    args: READDIR4args,
) -> Result<resok4, nfsstat4> {
    let (dir, _) = state.resolve_current_dir(session).await?;
    let cookieverf = state.generation().to_be_bytes();
    if args.cookie == 1 || args.cookie == 2 {
        return Err(nfsstat4::NFS4ERR_BAD_COOKIE);
    }
    if args.cookie != 0 && args.cookieverf != cookieverf {
        return Err(nfsstat4::NFS4ERR_NOT_SAME);
    }

    let listing = state.store.list(&dir).await.map_err(|e| {
        error!("listing {} failed: {}", dir, e);
        e.to_nfsstat4()
    })?;
    let start = if args.cookie == 0 { 0 } else { (args.cookie - FIRST_COOKIE + 1) as usize };
    if start > listing.len() {
        return Err(nfsstat4::NFS4ERR_BAD_COOKIE);
    }
    debug!(
        "readdir {} from cookie {} ({} entries, maxcount {})",
        dir,
        args.cookie,
        listing.len(),
        args.maxcount
    );

    let budget = (args.maxcount as usize).saturating_sub(FIXED_REPLY_SIZE);
    let mut used = 0;
    let mut entries = Vec::new();
    let mut eof = true;
    for (index, item) in listing.iter().enumerate().skip(start) {
        let fh = state.handles.get_or_create(&join_path(&dir, &item.name));
        let entry = entry4 {
            cookie: index as u64 + FIRST_COOKIE,
            name: item.name.clone(),
            attrs: attrs::encode_status(state, &args.attr_request, &fh, &item.status)?,
        };
        // Each entry is preceded by a "value follows" marker.
        let size = 4 + encoded_len(&entry).map_err(|_| nfsstat4::NFS4ERR_SERVERFAULT)?;
        if used + size > budget {
            if entries.is_empty() {
                return Err(nfsstat4::NFS4ERR_TOOSMALL);
            }
            eof = false;
            break;
        }
        used += size;
        entries.push(entry);
    }

    debug!("readdir {} returning {} entries, eof {}", dir, entries.len(), eof);
    Ok(resok4::READDIR(READDIR4resok { cookieverf, reply: dirlist4 { entries, eof } }))
}
