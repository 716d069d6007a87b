//! Open-file state created by OPEN and named by stateids.
//!
//! The 12-byte `other` field of every stateid issued here is the low 32 bits
//! of the server generation followed by a 64-bit counter. A stateid from a
//! previous server instance therefore fails with `NFS4ERR_STALE_STATEID`
//! instead of being confused with a live one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::fs_util::is_same_or_descendant;
use crate::protocol::xdr::nfs4::{nfsstat4, stateid4, NFS4_OTHER_SIZE};
use crate::store::OpenFile;

type StateKey = [u8; NFS4_OTHER_SIZE];

#[derive(Clone, Debug)]
pub struct OpenState {
    /// Current stateid, including its seqid.
    pub stateid: stateid4,
    /// The store's handle for the opened file.
    pub file: OpenFile,
    /// Client that opened the file.
    pub clientid: u64,
    /// Open owner within that client.
    pub owner: Vec<u8>,
    /// Set by OPEN_CONFIRM.
    pub confirmed: bool,
}

/// Opens currently held by clients, keyed by the `other` field of their
/// stateid.
pub struct OpenStateTable {
    /// Low 32 bits of the server generation, stamped into every stateid.
    generation: u32,
    /// Source of the counter half of `other`.
    next_id: AtomicU64,
    states: Mutex<HashMap<StateKey, OpenState>>,
}

impl OpenStateTable {
    pub fn new(generation: u64) -> OpenStateTable {
        OpenStateTable {
            generation: generation as u32,
            next_id: AtomicU64::new(1),
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Registers an opened file and returns its first stateid (seqid 1).
    pub fn insert(&self, file: OpenFile, clientid: u64, owner: Vec<u8>) -> stateid4 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut other = [0_u8; NFS4_OTHER_SIZE];
        other[..4].copy_from_slice(&self.generation.to_be_bytes());
        other[4..].copy_from_slice(&id.to_be_bytes());
        let stateid = stateid4 { seqid: 1, other };
        let state = OpenState { stateid, file, clientid, owner, confirmed: false };
        self.states.lock().unwrap_or_else(PoisonError::into_inner).insert(other, state);
        stateid
    }

    fn check<'a>(
        &self,
        states: &'a mut HashMap<StateKey, OpenState>,
        stateid: &stateid4,
    ) -> Result<&'a mut OpenState, nfsstat4> {
        if stateid.other[..4] != self.generation.to_be_bytes() {
            return Err(nfsstat4::NFS4ERR_STALE_STATEID);
        }
        let state = states.get_mut(&stateid.other).ok_or(nfsstat4::NFS4ERR_BAD_STATEID)?;
        if stateid.seqid < state.stateid.seqid {
            return Err(nfsstat4::NFS4ERR_OLD_STATEID);
        }
        if stateid.seqid > state.stateid.seqid {
            return Err(nfsstat4::NFS4ERR_BAD_STATEID);
        }
        Ok(state)
    }

    /// Looks up the open file named by `stateid`.
    pub fn get(&self, stateid: &stateid4) -> Result<OpenState, nfsstat4> {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        self.check(&mut states, stateid).map(|state| state.clone())
    }

    /// OPEN_CONFIRM: marks the open confirmed and bumps its seqid.
    pub fn confirm(&self, stateid: &stateid4) -> Result<stateid4, nfsstat4> {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let state = self.check(&mut states, stateid)?;
        state.confirmed = true;
        state.stateid.seqid = state.stateid.seqid.wrapping_add(1);
        Ok(state.stateid)
    }

    /// CLOSE: forgets the open and hands back its file for closing.
    pub fn remove(&self, stateid: &stateid4) -> Result<OpenState, nfsstat4> {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        self.check(&mut states, stateid)?;
        states.remove(&stateid.other).ok_or(nfsstat4::NFS4ERR_BAD_STATEID)
    }

    /// Forgets every open held by `clientid` and hands back the files for
    /// closing.
    pub fn remove_client(&self, clientid: u64) -> Vec<OpenFile> {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let held: Vec<StateKey> =
            states.iter().filter(|(_, s)| s.clientid == clientid).map(|(key, _)| *key).collect();
        held.iter().filter_map(|key| states.remove(key)).map(|s| s.file).collect()
    }

    /// Open files on `path`, for COMMIT.
    pub fn files_for_path(&self, path: &str) -> Vec<OpenFile> {
        let states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states.values().filter(|s| s.file.path == path).map(|s| s.file.clone()).collect()
    }

    /// Keeps recorded paths in step with a rename.
    pub fn rename_path(&self, from: &str, to: &str) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        for state in states.values_mut() {
            if is_same_or_descendant(&state.file.path, from) {
                state.file.path = format!("{}{}", to, &state.file.path[from.len()..]);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.states.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
