//! The file handles and caller identity carried from one operation of a
//! COMPOUND to the next.

use crate::protocol::xdr::nfs4::{nfs_fh4, nfsstat4};
use crate::protocol::xdr::rpc::auth_unix;

/// Per-COMPOUND state: the current and saved file handles plus the caller's
/// identity. Lives exactly as long as one COMPOUND request.
#[derive(Clone, Debug, Default)]
pub struct CompoundSession {
    /// Object most operations act on; set by PUTFH, LOOKUP, OPEN and friends.
    current: Option<nfs_fh4>,
    /// Slot written by SAVEFH and read by RESTOREFH and RENAME.
    saved: Option<nfs_fh4>,
    /// Credentials from the RPC header (`AUTH_UNIX`); all zeros for `AUTH_NONE`.
    pub auth: auth_unix,
    /// Peer address, for logging.
    pub client_addr: String,
}

impl CompoundSession {
    pub fn new(auth: auth_unix, client_addr: &str) -> CompoundSession {
        CompoundSession { auth, client_addr: client_addr.to_string(), ..Default::default() }
    }

    pub fn set_current_file_handle(&mut self, fh: nfs_fh4) {
        self.current = Some(fh);
    }

    pub fn current_file_handle(&self) -> Result<&nfs_fh4, nfsstat4> {
        self.current.as_ref().ok_or(nfsstat4::NFS4ERR_NOFILEHANDLE)
    }

    pub fn clear_current_file_handle(&mut self) {
        self.current = None;
    }

    /// SAVEFH: copies the current handle into the saved slot.
    pub fn save_file_handle(&mut self) -> Result<(), nfsstat4> {
        let current = self.current_file_handle()?.clone();
        self.saved = Some(current);
        Ok(())
    }

    pub fn saved_file_handle(&self) -> Result<&nfs_fh4, nfsstat4> {
        self.saved.as_ref().ok_or(nfsstat4::NFS4ERR_NOFILEHANDLE)
    }

    /// RESTOREFH: makes the saved handle current again.
    pub fn restore_file_handle(&mut self) -> Result<(), nfsstat4> {
        let saved = self.saved.clone().ok_or(nfsstat4::NFS4ERR_RESTOREFH)?;
        self.current = Some(saved);
        Ok(())
    }
}
