//! Server-wide state shared by all connections, and the per-COMPOUND session.
//!
//! [`ServerState`] owns the backing store, the file handle table, open-file
//! state, the client table and the operation registry. It is built once,
//! wrapped in an `Arc` and handed to every connection through the RPC
//! [`Context`](crate::protocol::rpc::Context).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, error};

use crate::config::ServerConfig;
use crate::fs_util;
use crate::protocol::nfs::v4::HandlerRegistry;
use crate::protocol::xdr::nfs4::{nfs_fh4, nfsstat4, verifier4};
use crate::store::{BackingStore, FileStatus, StoreError};

mod clients;
mod file_handles;
mod open_files;
mod session;

pub use clients::ClientTable;
pub use file_handles::{FileHandleTable, FILE_HANDLE_LENGTH};
pub use open_files::{OpenState, OpenStateTable};
pub use session::CompoundSession;

pub struct ServerState {
    /// Storage being exported.
    pub store: Arc<dyn BackingStore>,
    /// File handles issued so far.
    pub handles: FileHandleTable,
    /// Files held open by clients.
    pub opens: OpenStateTable,
    /// Client ids and their leases.
    pub clients: ClientTable,
    /// Handlers for the operations inside a COMPOUND.
    pub registry: Arc<HandlerRegistry>,
    pub config: ServerConfig,
    /// Identifies this server instance in handles, stateids and verifiers.
    generation: u64,
    /// Normalized export root.
    root: String,
}

impl ServerState {
    /// Builds the state for serving `store` with the standard operation set.
    ///
    /// The generation, which makes handles and stateids from earlier server
    /// instances stale, is taken from the current time.
    pub fn new(store: Arc<dyn BackingStore>, config: ServerConfig) -> Result<ServerState, StoreError> {
        let generation = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        ServerState::with_generation(store, config, generation)
    }

    pub fn with_generation(
        store: Arc<dyn BackingStore>,
        config: ServerConfig,
        generation: u64,
    ) -> Result<ServerState, StoreError> {
        let root = fs_util::check_path(&config.export_root)?;
        debug!("server generation {} exporting {}", generation, root);
        Ok(ServerState {
            store,
            handles: FileHandleTable::new(generation),
            opens: OpenStateTable::new(generation),
            clients: ClientTable::new(generation, config.lease_time),
            registry: Arc::new(HandlerRegistry::standard()),
            config,
            generation,
            root,
        })
    }

    /// Replaces the operation registry.
    pub fn with_registry(mut self, registry: HandlerRegistry) -> ServerState {
        self.registry = Arc::new(registry);
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Store path served as the NFS root.
    pub fn root_path(&self) -> &str {
        &self.root
    }

    pub fn root_handle(&self) -> nfs_fh4 {
        self.handles.get_or_create(&self.root)
    }

    /// Verifier returned by WRITE and COMMIT. It changes only when the server
    /// restarts, which tells clients to resend unstable writes.
    pub fn write_verifier(&self) -> verifier4 {
        self.generation.to_be_bytes()
    }

    /// Resolves `fh` to a path and checks that the object still exists.
    ///
    /// An object that vanished behind the server's back has its handle
    /// forgotten and is reported as `NFS4ERR_STALE`. If the handle was renamed
    /// while the store was being asked, the lookup is retried at the new path.
    pub async fn resolve_handle(&self, fh: &nfs_fh4) -> Result<(String, FileStatus), nfsstat4> {
        let mut path = self.handles.resolve(fh)?;
        let mut retried = false;
        loop {
            let result = self.store.getattr(&path).await;
            let current = self.handles.resolve(fh)?;
            if current != path && !retried {
                debug!("{:?} moved from {} to {} during lookup", fh, path, current);
                path = current;
                retried = true;
                continue;
            }
            return match result {
                Ok(status) => Ok((path, status)),
                Err(StoreError::NotFound(_)) => {
                    if self.handles.invalidate_if_maps(fh, &path) {
                        debug!("{} vanished, invalidating {:?}", path, fh);
                    }
                    Err(nfsstat4::NFS4ERR_STALE)
                }
                Err(e) => Err(e.to_nfsstat4()),
            };
        }
    }

    /// RENEW, and the implicit renewal done by OPEN. A client found expired
    /// loses its open state.
    pub async fn renew_client(&self, clientid: u64) -> Result<(), nfsstat4> {
        let result = self.clients.renew(clientid);
        if result == Err(nfsstat4::NFS4ERR_EXPIRED) {
            self.release_client(clientid).await;
        }
        result
    }

    /// SETCLIENTID_CONFIRM. Open state of superseded incarnations of the
    /// client is released.
    pub async fn confirm_client(&self, clientid: u64, confirm: verifier4) -> Result<(), nfsstat4> {
        for superseded in self.clients.confirm(clientid, confirm)? {
            self.release_client(superseded).await;
        }
        Ok(())
    }

    /// Drops clients whose lease ran out, closing the files they held.
    pub async fn expire_clients(&self) {
        for clientid in self.clients.expire() {
            self.release_client(clientid).await;
        }
    }

    /// Forgets the opens of `clientid` and closes their files in the store.
    async fn release_client(&self, clientid: u64) {
        for file in self.opens.remove_client(clientid) {
            debug!("releasing {} held by client {:x}", file.path, clientid);
            if let Err(e) = self.store.close(file).await {
                error!("close on release of client {:x} failed: {}", clientid, e);
            }
        }
    }

    /// Path and status of the session's current file handle.
    pub async fn resolve_current(
        &self,
        session: &CompoundSession,
    ) -> Result<(String, FileStatus), nfsstat4> {
        self.resolve_handle(session.current_file_handle()?).await
    }

    /// Path and status of the session's saved file handle.
    pub async fn resolve_saved(
        &self,
        session: &CompoundSession,
    ) -> Result<(String, FileStatus), nfsstat4> {
        self.resolve_handle(session.saved_file_handle()?).await
    }

    /// Like [`resolve_current`](Self::resolve_current) but fails with
    /// `NFS4ERR_NOTDIR` unless the object is a directory.
    pub async fn resolve_current_dir(
        &self,
        session: &CompoundSession,
    ) -> Result<(String, FileStatus), nfsstat4> {
        let (path, status) = self.resolve_current(session).await?;
        if !status.is_dir() {
            return Err(nfsstat4::NFS4ERR_NOTDIR);
        }
        Ok((path, status))
    }
}
