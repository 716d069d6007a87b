#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use nfs4_mamont::config::ServerConfig;
use nfs4_mamont::fs_util::{file_name, is_same_or_descendant, parent_path};
use nfs4_mamont::protocol::nfs::v4::{execute_compound, HandlerRegistry};
use nfs4_mamont::protocol::rpc::{Context, TransactionTracker};
use nfs4_mamont::state::{CompoundSession, ServerState};
use nfs4_mamont::store::{
    BackingStore, DirEntry, FileKind, FileStatus, OpenFile, OpenMode, SetAttributes, StoreError,
};
use nfs4_mamont::xdr::nfs4::ops::{nfs_argop4, COMPOUND4args_header, COMPOUND4res};
use nfs4_mamont::xdr::nfs4::{nfstime4, settime4};
use nfs4_mamont::xdr::{self, Serialize};

pub const GENERATION: u64 = 0x0102_0304_0506_0708;

#[derive(Clone, Debug)]
struct Node {
    status: FileStatus,
    data: Vec<u8>,
}

#[derive(Default)]
struct Tree {
    nodes: HashMap<String, Node>,
    clock: i64,
    next_fileid: u64,
}

impl Tree {
    fn tick(&mut self) -> nfstime4 {
        self.clock += 1;
        nfstime4 { seconds: self.clock, nseconds: 0 }
    }

    fn touch(&mut self, path: &str) {
        let now = self.tick();
        if let Some(node) = self.nodes.get_mut(path) {
            node.status.mtime = now;
            node.status.ctime = now;
        }
    }

    fn parent_dir(&self, path: &str) -> Result<String, StoreError> {
        let parent = parent_path(path).ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
        match self.nodes.get(&parent) {
            Some(node) if node.status.is_dir() => Ok(parent),
            Some(_) => Err(StoreError::NotADirectory(parent)),
            None => Err(StoreError::NotFound(parent)),
        }
    }

    fn insert(&mut self, path: &str, kind: FileKind, mode: u32, data: Vec<u8>) {
        self.next_fileid += 1;
        let now = self.tick();
        let status = FileStatus {
            kind,
            size: data.len() as u64,
            space_used: data.len() as u64,
            mode,
            nlink: if kind == FileKind::Directory { 2 } else { 1 },
            uid: 1000,
            gid: 1000,
            fileid: self.next_fileid,
            atime: now,
            mtime: now,
            ctime: now,
        };
        self.nodes.insert(path.to_string(), Node { status, data });
    }

    fn has_children(&self, path: &str) -> bool {
        self.nodes.keys().any(|p| p != path && is_same_or_descendant(p, path))
    }
}

/// In-memory backing store.
pub struct MemStore {
    tree: Mutex<Tree>,
    next_open: AtomicU64,
    open_files: Mutex<HashMap<u64, OpenFile>>,
    syncs: AtomicU64,
}

impl Default for MemStore {
    fn default() -> Self {
        MemStore::new()
    }
}

impl MemStore {
    pub fn new() -> MemStore {
        let mut tree = Tree::default();
        tree.insert("/", FileKind::Directory, 0o755, Vec::new());
        MemStore {
            tree: Mutex::new(tree),
            next_open: AtomicU64::new(1),
            open_files: Mutex::new(HashMap::new()),
            syncs: AtomicU64::new(0),
        }
    }

    pub fn add_dir(&self, path: &str) {
        self.tree.lock().unwrap().insert(path, FileKind::Directory, 0o755, Vec::new());
    }

    pub fn add_file(&self, path: &str, data: &[u8]) {
        self.tree.lock().unwrap().insert(path, FileKind::File, 0o644, data.to_vec());
    }

    /// Removes an object behind the server's back.
    pub fn delete(&self, path: &str) {
        self.tree.lock().unwrap().nodes.remove(path);
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.tree.lock().unwrap().nodes.get(path).map(|n| n.data.clone())
    }

    pub fn exists(&self, path: &str) -> bool {
        self.tree.lock().unwrap().nodes.contains_key(path)
    }

    pub fn open_count(&self) -> usize {
        self.open_files.lock().unwrap().len()
    }

    pub fn sync_count(&self) -> u64 {
        self.syncs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackingStore for MemStore {
    async fn open(&self, path: &str, mode: OpenMode) -> Result<OpenFile, StoreError> {
        let tree = self.tree.lock().unwrap();
        let node = tree.nodes.get(path).ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        if node.status.is_dir() {
            return Err(StoreError::IsADirectory(path.to_string()));
        }
        let id = self.next_open.fetch_add(1, Ordering::SeqCst);
        let file = OpenFile { id, path: path.to_string(), mode };
        self.open_files.lock().unwrap().insert(id, file.clone());
        Ok(file)
    }

    async fn create(&self, path: &str, exclusive: bool) -> Result<(), StoreError> {
        let mut tree = self.tree.lock().unwrap();
        let parent = tree.parent_dir(path)?;
        match tree.nodes.get(path) {
            Some(_) if exclusive => Err(StoreError::AlreadyExists(path.to_string())),
            Some(node) if node.status.is_dir() => Err(StoreError::IsADirectory(path.to_string())),
            Some(_) => Ok(()),
            None => {
                tree.insert(path, FileKind::File, 0o644, Vec::new());
                tree.touch(&parent);
                Ok(())
            }
        }
    }

    async fn read(
        &self,
        file: &OpenFile,
        offset: u64,
        count: u32,
    ) -> Result<(Vec<u8>, bool), StoreError> {
        let tree = self.tree.lock().unwrap();
        let node =
            tree.nodes.get(&file.path).ok_or_else(|| StoreError::NotFound(file.path.clone()))?;
        let len = node.data.len() as u64;
        let start = offset.min(len) as usize;
        let end = offset.saturating_add(count.into()).min(len) as usize;
        Ok((node.data[start..end].to_vec(), end as u64 >= len))
    }

    async fn write(&self, file: &OpenFile, offset: u64, data: &[u8]) -> Result<u32, StoreError> {
        let mut tree = self.tree.lock().unwrap();
        let now = tree.tick();
        let node = tree
            .nodes
            .get_mut(&file.path)
            .ok_or_else(|| StoreError::NotFound(file.path.clone()))?;
        let start = offset as usize;
        if node.data.len() < start + data.len() {
            node.data.resize(start + data.len(), 0);
        }
        node.data[start..start + data.len()].copy_from_slice(data);
        node.status.size = node.data.len() as u64;
        node.status.mtime = now;
        node.status.ctime = now;
        Ok(data.len() as u32)
    }

    async fn sync(&self, _file: &OpenFile) -> Result<(), StoreError> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self, file: OpenFile) -> Result<(), StoreError> {
        self.open_files.lock().unwrap().remove(&file.id);
        Ok(())
    }

    async fn getattr(&self, path: &str) -> Result<FileStatus, StoreError> {
        let tree = self.tree.lock().unwrap();
        tree.nodes
            .get(path)
            .map(|n| n.status.clone())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn setattr(&self, path: &str, attrs: &SetAttributes) -> Result<(), StoreError> {
        let mut tree = self.tree.lock().unwrap();
        let now = tree.tick();
        let node =
            tree.nodes.get_mut(path).ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        if let Some(size) = attrs.size {
            node.data.resize(size as usize, 0);
            node.status.size = size;
        }
        if let Some(mode) = attrs.mode {
            node.status.mode = mode;
        }
        if let Some(uid) = attrs.uid {
            node.status.uid = uid;
        }
        if let Some(gid) = attrs.gid {
            node.status.gid = gid;
        }
        let resolve = |time: &settime4| match time {
            settime4::SET_TO_SERVER_TIME4 => now,
            settime4::SET_TO_CLIENT_TIME4(t) => *t,
        };
        if let Some(atime) = &attrs.atime {
            node.status.atime = resolve(atime);
        }
        if let Some(mtime) = &attrs.mtime {
            node.status.mtime = resolve(mtime);
        }
        node.status.ctime = now;
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let mut tree = self.tree.lock().unwrap();
        if !tree.nodes.contains_key(from) {
            return Err(StoreError::NotFound(from.to_string()));
        }
        let to_parent = tree.parent_dir(to)?;
        if tree.nodes.get(to).is_some_and(|n| n.status.is_dir()) && tree.has_children(to) {
            return Err(StoreError::NotEmpty(to.to_string()));
        }
        tree.nodes.remove(to);
        let moved: Vec<String> =
            tree.nodes.keys().filter(|p| is_same_or_descendant(p, from)).cloned().collect();
        for path in moved {
            if let Some(node) = tree.nodes.remove(&path) {
                tree.nodes.insert(format!("{}{}", to, &path[from.len()..]), node);
            }
        }
        if let Some(from_parent) = parent_path(from) {
            tree.touch(&from_parent);
        }
        tree.touch(&to_parent);
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let mut tree = self.tree.lock().unwrap();
        if !tree.nodes.contains_key(path) {
            return Err(StoreError::NotFound(path.to_string()));
        }
        if tree.has_children(path) {
            return Err(StoreError::NotEmpty(path.to_string()));
        }
        tree.nodes.remove(path);
        if let Some(parent) = parent_path(path) {
            tree.touch(&parent);
        }
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> Result<(), StoreError> {
        let mut tree = self.tree.lock().unwrap();
        let parent = tree.parent_dir(path)?;
        if tree.nodes.contains_key(path) {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        tree.insert(path, FileKind::Directory, 0o755, Vec::new());
        tree.touch(&parent);
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, StoreError> {
        let tree = self.tree.lock().unwrap();
        match tree.nodes.get(path) {
            Some(node) if node.status.is_dir() => {}
            Some(_) => return Err(StoreError::NotADirectory(path.to_string())),
            None => return Err(StoreError::NotFound(path.to_string())),
        }
        let mut entries: Vec<DirEntry> = tree
            .nodes
            .iter()
            .filter(|(p, _)| p.as_str() != path && parent_path(p).as_deref() == Some(path))
            .map(|(p, node)| DirEntry {
                name: file_name(p).unwrap_or_default().to_string(),
                status: node.status.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

pub fn server_state(store: Arc<MemStore>) -> Arc<ServerState> {
    Arc::new(
        ServerState::with_generation(store, ServerConfig::default(), GENERATION)
            .expect("server state"),
    )
}

pub fn server_state_with_registry(
    store: Arc<MemStore>,
    registry: HandlerRegistry,
) -> Arc<ServerState> {
    let state = ServerState::with_generation(store, ServerConfig::default(), GENERATION)
        .expect("server state")
        .with_registry(registry);
    Arc::new(state)
}

pub fn test_context(state: Arc<ServerState>) -> Context {
    Context::new(
        "127.0.0.1:1234",
        state,
        Arc::new(TransactionTracker::new(Duration::from_secs(60))),
    )
}

/// Encodes a COMPOUND body (header plus operations).
pub fn compound_body(minorversion: u32, ops: &[nfs_argop4]) -> Vec<u8> {
    let header =
        COMPOUND4args_header { tag: "test".to_string(), minorversion, numops: ops.len() as u32 };
    let mut buf = Vec::new();
    header.serialize(&mut buf).expect("serialize header");
    for op in ops {
        op.serialize(&mut buf).expect("serialize op");
    }
    buf
}

/// Runs `ops` as one COMPOUND with a fresh session.
pub async fn run(state: &ServerState, ops: Vec<nfs_argop4>) -> COMPOUND4res {
    let mut session = CompoundSession::default();
    run_in(state, &mut session, ops).await
}

pub async fn run_in(
    state: &ServerState,
    session: &mut CompoundSession,
    ops: Vec<nfs_argop4>,
) -> COMPOUND4res {
    let body = compound_body(0, &ops);
    let mut input = Cursor::new(body);
    let header = xdr::deserialize::<COMPOUND4args_header>(&mut input).expect("header");
    execute_compound(state, session, &header, &mut input).await
}

/// Encodes an RPC call message.
pub fn rpc_call(xid: u32, rpcvers: u32, prog: u32, vers: u32, proc: u32, args: &[u8]) -> Vec<u8> {
    let call = xdr::rpc::call_body {
        rpcvers,
        prog,
        vers,
        proc,
        cred: xdr::rpc::opaque_auth::default(),
        verf: xdr::rpc::opaque_auth::default(),
    };
    let msg = xdr::rpc::rpc_msg { xid, body: xdr::rpc::rpc_body::CALL(call) };
    let mut buf = Vec::new();
    msg.serialize(&mut buf).expect("serialize rpc_msg");
    buf.extend_from_slice(args);
    buf
}
