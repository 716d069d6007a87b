//! Path utilities shared by the server and by stores backed by a local
//! directory.
//!
//! The first half works on the server's own path strings: absolute,
//! `/`-separated and normalized. The second half works on local
//! [`std::path::Path`]s and is used when preparing or tearing down export
//! directories and by local-directory backing stores.

use std::fs::{Metadata, Permissions};
use std::io;
#[cfg(unix)]
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use tokio::fs::OpenOptions;
use tracing::debug;

use crate::protocol::xdr::nfs4::{nfsstat4, nfstime4, settime4};
use crate::store::{FileKind, FileStatus, SetAttributes, StoreError};

/// Longest accepted path component, in bytes.
pub const MAX_NAME_LENGTH: usize = 255;

/// Validates and normalizes an absolute path.
///
/// Empty components, `.` and repeated slashes are dropped and `..` climbs one
/// level (never above the root). Paths that are relative or contain `:` or
/// NUL are rejected.
pub fn check_path(path: &str) -> Result<String, StoreError> {
    if !path.starts_with('/') || path.contains(':') || path.contains('\0') {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    let mut components: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            name => components.push(name),
        }
    }
    Ok(format!("/{}", components.join("/")))
}

/// Appends `name` to the directory `dir`.
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Parent directory of `path`, or `None` for the root.
pub fn parent_path(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(index) => Some(path[..index].to_string()),
        None => None,
    }
}

/// Last component of `path`, or `None` for the root.
pub fn file_name(path: &str) -> Option<&str> {
    match path.rsplit('/').next() {
        Some("") | None => None,
        Some(name) => Some(name),
    }
}

/// True when `path` is `ancestor` or lies below it.
pub fn is_same_or_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return path.starts_with('/');
    }
    path == ancestor
        || (path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

/// Checks a single name sent by a client (LOOKUP, CREATE, OPEN, REMOVE, RENAME).
pub fn validate_component(name: &str) -> Result<(), nfsstat4> {
    if name.is_empty() {
        return Err(nfsstat4::NFS4ERR_INVAL);
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(nfsstat4::NFS4ERR_NAMETOOLONG);
    }
    if name == "." || name == ".." {
        return Err(nfsstat4::NFS4ERR_BADNAME);
    }
    if name.contains('/') || name.contains('\0') || name.contains(':') {
        return Err(nfsstat4::NFS4ERR_INVAL);
    }
    Ok(())
}

/// Creates `dir` if needed and proves it writable by creating and removing a
/// scratch file in it.
pub fn ensure_directory_is_writable(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} is not a directory", dir.display()),
        ));
    }
    let scratch = dir.join(format!(".write-check-{}", std::process::id()));
    std::fs::write(&scratch, b"")?;
    std::fs::remove_file(&scratch)
}

/// Deletes everything inside `dir`, keeping `dir` itself. Symlinks are
/// removed, never followed.
pub fn fully_delete_contents(dir: &Path) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        fully_delete(&entry?.path())?;
    }
    Ok(())
}

/// Deletes `path` and, for a directory, everything below it. A missing path
/// is not an error.
pub fn fully_delete(path: &Path) -> io::Result<()> {
    let meta = match path.symlink_metadata() {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        fully_delete_contents(path)?;
        std::fs::remove_dir(path)
    } else {
        std::fs::remove_file(path)
    }
}

/// Keeps permission bits only, forcing the owner write bit so that files
/// created through NFS stay writable by the server.
fn mode_unmask(mode: u32) -> u32 {
    let mode = Permissions::from_mode(mode | 0o200);
    mode.mode() & 0o7777
}

fn to_nfstime(seconds: i64, nseconds: i64) -> nfstime4 {
    nfstime4 { seconds, nseconds: nseconds as u32 }
}

/// Converts local metadata into a backing-store [`FileStatus`].
pub fn metadata_to_status(meta: &Metadata) -> FileStatus {
    let kind = if meta.is_dir() {
        FileKind::Directory
    } else if meta.file_type().is_symlink() {
        FileKind::Symlink
    } else if meta.is_file() {
        FileKind::File
    } else {
        FileKind::Other
    };
    FileStatus {
        kind,
        size: meta.size(),
        space_used: meta.blocks() * 512,
        mode: mode_unmask(meta.mode()),
        nlink: meta.nlink() as u32,
        uid: meta.uid(),
        gid: meta.gid(),
        fileid: meta.ino(),
        atime: to_nfstime(meta.atime(), meta.atime_nsec()),
        mtime: to_nfstime(meta.mtime(), meta.mtime_nsec()),
        ctime: to_nfstime(meta.ctime(), meta.ctime_nsec()),
    }
}

fn to_filetime(time: &settime4) -> filetime::FileTime {
    match time {
        settime4::SET_TO_SERVER_TIME4 => filetime::FileTime::now(),
        settime4::SET_TO_CLIENT_TIME4(t) => {
            filetime::FileTime::from_unix_time(t.seconds, t.nseconds)
        }
    }
}

/// Applies `attrs` to the local object at `path`.
///
/// Ownership changes are not supported for local files and are ignored.
pub async fn path_setattr(path: &Path, attrs: &SetAttributes) -> Result<(), StoreError> {
    let display = path.display().to_string();
    if let Some(atime) = &attrs.atime {
        filetime::set_file_atime(path, to_filetime(atime))
            .map_err(|e| StoreError::from_io(&display, e))?;
    }
    if let Some(mtime) = &attrs.mtime {
        filetime::set_file_mtime(path, to_filetime(mtime))
            .map_err(|e| StoreError::from_io(&display, e))?;
    }
    if let Some(mode) = attrs.mode {
        debug!(" -- set permissions {:?} {:o}", path, mode);
        tokio::fs::set_permissions(path, Permissions::from_mode(mode_unmask(mode)))
            .await
            .map_err(|e| StoreError::from_io(&display, e))?;
    }
    if attrs.uid.is_some() || attrs.gid.is_some() {
        debug!("Set uid/gid not implemented");
    }
    if let Some(size) = attrs.size {
        let file = OpenOptions::new()
            .write(true)
            .truncate(false)
            .open(path)
            .await
            .map_err(|e| StoreError::from_io(&display, e))?;
        debug!(" -- set size {:?} {:?}", path, size);
        file.set_len(size).await.map_err(|e| StoreError::from_io(&display, e))?;
    }
    Ok(())
}
