//! Backing store interface between the NFSv4 server and the storage it exports.
//!
//! The server never touches storage directly. Every operation handler goes
//! through the [`BackingStore`] trait, which speaks in absolute, normalized,
//! `/`-separated paths (`"/"` is the export root) rather than in file handles:
//! handles are a protocol concern owned by [`crate::state::FileHandleTable`].
//!
//! Failures are reported as [`StoreError`] values and translated to NFSv4
//! status codes in exactly one place, [`StoreError::to_nfsstat4`].

use async_trait::async_trait;
use thiserror::Error;

use crate::protocol::xdr::nfs4::{nfs_ftype4, nfsstat4, nfstime4, settime4};

/// Errors reported by a [`BackingStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("directory not empty: {0}")]
    NotEmpty(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("no space left on device")]
    NoSpace,
    #[error("read-only store")]
    ReadOnly,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// The NFSv4 status reported to clients for this error.
    pub fn to_nfsstat4(&self) -> nfsstat4 {
        match self {
            StoreError::NotFound(_) => nfsstat4::NFS4ERR_NOENT,
            StoreError::AlreadyExists(_) => nfsstat4::NFS4ERR_EXIST,
            StoreError::PermissionDenied(_) => nfsstat4::NFS4ERR_ACCESS,
            StoreError::NotADirectory(_) => nfsstat4::NFS4ERR_NOTDIR,
            StoreError::IsADirectory(_) => nfsstat4::NFS4ERR_ISDIR,
            StoreError::NotEmpty(_) => nfsstat4::NFS4ERR_NOTEMPTY,
            StoreError::InvalidPath(_) => nfsstat4::NFS4ERR_INVAL,
            StoreError::NoSpace => nfsstat4::NFS4ERR_NOSPC,
            StoreError::ReadOnly => nfsstat4::NFS4ERR_ROFS,
            StoreError::Io(_) => nfsstat4::NFS4ERR_IO,
        }
    }

    /// Classifies a local I/O error raised while working on `path`.
    pub fn from_io(path: &str, err: std::io::Error) -> StoreError {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound => StoreError::NotFound(path.to_string()),
            ErrorKind::AlreadyExists => StoreError::AlreadyExists(path.to_string()),
            ErrorKind::PermissionDenied => StoreError::PermissionDenied(path.to_string()),
            ErrorKind::NotADirectory => StoreError::NotADirectory(path.to_string()),
            ErrorKind::IsADirectory => StoreError::IsADirectory(path.to_string()),
            ErrorKind::DirectoryNotEmpty => StoreError::NotEmpty(path.to_string()),
            ErrorKind::InvalidInput => StoreError::InvalidPath(path.to_string()),
            ErrorKind::StorageFull => StoreError::NoSpace,
            ErrorKind::ReadOnlyFilesystem => StoreError::ReadOnly,
            _ => StoreError::Io(err),
        }
    }
}

/// Access requested when opening a file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

impl OpenMode {
    pub fn can_read(&self) -> bool {
        matches!(self, OpenMode::Read | OpenMode::ReadWrite)
    }

    pub fn can_write(&self) -> bool {
        matches!(self, OpenMode::Write | OpenMode::ReadWrite)
    }
}

/// A file opened through [`BackingStore::open`].
///
/// `id` is chosen by the store and identifies its internal stream; the server
/// treats it as opaque.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenFile {
    pub id: u64,
    pub path: String,
    pub mode: OpenMode,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FileKind {
    #[default]
    File,
    Directory,
    Symlink,
    Other,
}

impl FileKind {
    pub fn to_ftype4(self) -> nfs_ftype4 {
        match self {
            FileKind::File | FileKind::Other => nfs_ftype4::NF4REG,
            FileKind::Directory => nfs_ftype4::NF4DIR,
            FileKind::Symlink => nfs_ftype4::NF4LNK,
        }
    }
}

/// Status of one object in the store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileStatus {
    pub kind: FileKind,
    pub size: u64,
    pub space_used: u64,
    /// Permission bits only (`0o7777`).
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    /// Stable object identifier, like an inode number. Zero is reserved.
    pub fileid: u64,
    pub atime: nfstime4,
    pub mtime: nfstime4,
    pub ctime: nfstime4,
}

impl FileStatus {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Value of the `change` attribute, derived from the change time.
    pub fn change(&self) -> u64 {
        (self.ctime.seconds as u64)
            .wrapping_mul(1_000_000_000)
            .wrapping_add(self.ctime.nseconds as u64)
    }
}

/// Attribute changes requested by SETATTR (or by OPEN/CREATE create attributes).
/// `None` leaves the attribute untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetAttributes {
    pub size: Option<u64>,
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub atime: Option<settime4>,
    pub mtime: Option<settime4>,
}

impl SetAttributes {
    pub fn is_empty(&self) -> bool {
        *self == SetAttributes::default()
    }
}

/// One directory entry returned by [`BackingStore::list`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub status: FileStatus,
}

/// Storage exported by the server.
///
/// Paths are absolute and already validated by the server. Implementations
/// must be safe to call from many connections at once.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Opens an existing regular file.
    async fn open(&self, path: &str, mode: OpenMode) -> Result<OpenFile, StoreError>;

    /// Creates an empty regular file.
    ///
    /// With `exclusive` set an existing object is an error
    /// ([`StoreError::AlreadyExists`]); otherwise an existing file is left as is.
    async fn create(&self, path: &str, exclusive: bool) -> Result<(), StoreError>;

    /// Reads up to `count` bytes at `offset`. The flag is true when the read
    /// reached the end of the file.
    async fn read(
        &self,
        file: &OpenFile,
        offset: u64,
        count: u32,
    ) -> Result<(Vec<u8>, bool), StoreError>;

    /// Writes `data` at `offset`, extending the file as needed. Returns the
    /// number of bytes written.
    async fn write(&self, file: &OpenFile, offset: u64, data: &[u8]) -> Result<u32, StoreError>;

    /// Makes previous writes through `file` durable.
    async fn sync(&self, file: &OpenFile) -> Result<(), StoreError>;

    /// Releases `file`. Unsynced data is flushed first.
    async fn close(&self, file: OpenFile) -> Result<(), StoreError>;

    async fn getattr(&self, path: &str) -> Result<FileStatus, StoreError>;

    async fn setattr(&self, path: &str, attrs: &SetAttributes) -> Result<(), StoreError>;

    /// Moves `from` to `to`, replacing `to` if it is a file.
    async fn rename(&self, from: &str, to: &str) -> Result<(), StoreError>;

    /// Removes a file or an empty directory.
    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    async fn mkdir(&self, path: &str) -> Result<(), StoreError>;

    /// Lists a directory. The order must be stable between calls while the
    /// directory is unchanged, since READDIR cookies are entry positions.
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, StoreError>;
}
