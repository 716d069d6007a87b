//! Mapping between opaque NFSv4 file handles and backing-store paths.
//!
//! A handle is 16 bytes: the server generation (8 bytes, big endian) followed
//! by a 64-bit digest of the path the handle was first issued for. The digest
//! only picks the bytes; the table is the authority, so a handle stays valid
//! across renames and a digest collision is resolved by salting.
//!
//! Both directions are kept under one lock so the two maps never disagree and
//! concurrent first lookups of a path allocate a single handle.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{PoisonError, RwLock};

use tracing::trace;

use crate::fs_util::is_same_or_descendant;
use crate::protocol::xdr::nfs4::{nfs_fh4, nfsstat4};

/// Length of every handle issued by this server.
pub const FILE_HANDLE_LENGTH: usize = 16;

#[derive(Default)]
struct HandleMaps {
    by_path: HashMap<String, nfs_fh4>,
    by_handle: HashMap<nfs_fh4, String>,
}

impl HandleMaps {
    fn remove_matching(&mut self, path: &str) -> Vec<(String, nfs_fh4)> {
        let matching: Vec<String> = self
            .by_path
            .keys()
            .filter(|candidate| is_same_or_descendant(candidate, path))
            .cloned()
            .collect();
        matching
            .into_iter()
            .filter_map(|p| {
                let fh = self.by_path.remove(&p)?;
                self.by_handle.remove(&fh);
                Some((p, fh))
            })
            .collect()
    }
}

pub struct FileHandleTable {
    generation: u64,
    maps: RwLock<HandleMaps>,
}

impl FileHandleTable {
    pub fn new(generation: u64) -> FileHandleTable {
        FileHandleTable { generation, maps: RwLock::new(HandleMaps::default()) }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn derive(&self, path: &str, salt: u64) -> nfs_fh4 {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        salt.hash(&mut hasher);
        let mut bytes = Vec::with_capacity(FILE_HANDLE_LENGTH);
        bytes.extend_from_slice(&self.generation.to_be_bytes());
        bytes.extend_from_slice(&hasher.finish().to_be_bytes());
        nfs_fh4(bytes)
    }

    /// Returns the handle of `path`, allocating one on first use.
    pub fn get_or_create(&self, path: &str) -> nfs_fh4 {
        if let Some(fh) = self.lookup(path) {
            return fh;
        }
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have won the race between the two locks.
        if let Some(fh) = maps.by_path.get(path) {
            return fh.clone();
        }
        let mut salt = 0;
        let mut fh = self.derive(path, salt);
        while maps.by_handle.contains_key(&fh) {
            salt += 1;
            fh = self.derive(path, salt);
        }
        trace!("new file handle {:?} for {}", fh, path);
        maps.by_path.insert(path.to_string(), fh.clone());
        maps.by_handle.insert(fh.clone(), path.to_string());
        fh
    }

    /// The handle already issued for `path`, if any.
    pub fn lookup(&self, path: &str) -> Option<nfs_fh4> {
        let maps = self.maps.read().unwrap_or_else(PoisonError::into_inner);
        maps.by_path.get(path).cloned()
    }

    /// Resolves a client-supplied handle to its path.
    ///
    /// Handles of the wrong size are `NFS4ERR_BADHANDLE`; handles from another
    /// server generation or for forgotten objects are `NFS4ERR_STALE`.
    pub fn resolve(&self, fh: &nfs_fh4) -> Result<String, nfsstat4> {
        let bytes = fh.as_bytes();
        if bytes.len() != FILE_HANDLE_LENGTH {
            return Err(nfsstat4::NFS4ERR_BADHANDLE);
        }
        let mut generation = [0_u8; 8];
        generation.copy_from_slice(&bytes[..8]);
        if u64::from_be_bytes(generation) != self.generation {
            return Err(nfsstat4::NFS4ERR_STALE);
        }
        let maps = self.maps.read().unwrap_or_else(PoisonError::into_inner);
        maps.by_handle.get(fh).cloned().ok_or(nfsstat4::NFS4ERR_STALE)
    }

    /// Forgets a single handle.
    pub fn invalidate(&self, fh: &nfs_fh4) {
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(path) = maps.by_handle.remove(fh) {
            maps.by_path.remove(&path);
        }
    }

    /// Forgets the handles of `path` and everything below it, but only while
    /// `fh` still names `path`. Returns whether anything was forgotten.
    ///
    /// A rename racing with the caller moves `fh` elsewhere, in which case the
    /// handles now living at `path` belong to other objects and are kept.
    pub fn invalidate_if_maps(&self, fh: &nfs_fh4, path: &str) -> bool {
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        if maps.by_handle.get(fh).map(String::as_str) != Some(path) {
            return false;
        }
        let removed = maps.remove_matching(path);
        trace!("invalidated {} handle(s) under {}", removed.len(), path);
        true
    }

    /// Forgets the handles of `path` and of everything below it.
    pub fn invalidate_path(&self, path: &str) {
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        let removed = maps.remove_matching(path);
        trace!("invalidated {} handle(s) under {}", removed.len(), path);
    }

    /// Moves `from` and its descendants to `to`, keeping their handles.
    /// Handles previously issued under `to` name replaced objects and are
    /// forgotten.
    pub fn rename_path(&self, from: &str, to: &str) {
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        let moved = maps.remove_matching(from);
        maps.remove_matching(to);
        for (path, fh) in moved {
            let new_path = format!("{}{}", to, &path[from.len()..]);
            maps.by_handle.insert(fh.clone(), new_path.clone());
            maps.by_path.insert(new_path, fh);
        }
    }

    pub fn len(&self) -> usize {
        self.maps.read().unwrap_or_else(PoisonError::into_inner).by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
