//! A [`BackingStore`] that mirrors a local directory.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

use nfs4_mamont::fs_util::{metadata_to_status, path_setattr};
use nfs4_mamont::store::{
    BackingStore, DirEntry, FileStatus, OpenFile, OpenMode, SetAttributes, StoreError,
};

/// Each open file has its own lock, so I/O on different files proceeds in
/// parallel; the map lock is only held to look a file up.
pub struct MirrorStore {
    root: PathBuf,
    next_id: AtomicU64,
    files: Mutex<HashMap<u64, Arc<Mutex<File>>>>,
}

impl MirrorStore {
    pub fn new(root: PathBuf) -> MirrorStore {
        MirrorStore { root, next_id: AtomicU64::new(1), files: Mutex::new(HashMap::new()) }
    }

    fn local(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    async fn file(&self, file: &OpenFile) -> Result<Arc<Mutex<File>>, StoreError> {
        let files = self.files.lock().await;
        files.get(&file.id).cloned().ok_or_else(|| StoreError::NotFound(file.path.clone()))
    }

    async fn status(&self, local: &Path, path: &str) -> Result<FileStatus, StoreError> {
        let meta = fs::symlink_metadata(local).await.map_err(|e| StoreError::from_io(path, e))?;
        Ok(metadata_to_status(&meta))
    }
}

#[async_trait]
impl BackingStore for MirrorStore {
    async fn open(&self, path: &str, mode: OpenMode) -> Result<OpenFile, StoreError> {
        let file = OpenOptions::new()
            .read(mode.can_read())
            .write(mode.can_write())
            .open(self.local(path))
            .await
            .map_err(|e| StoreError::from_io(path, e))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.files.lock().await.insert(id, Arc::new(Mutex::new(file)));
        debug!("opened {} as {} ({:?})", path, id, mode);
        Ok(OpenFile { id, path: path.to_string(), mode })
    }

    async fn create(&self, path: &str, exclusive: bool) -> Result<(), StoreError> {
        let mut options = OpenOptions::new();
        options.write(true);
        if exclusive {
            options.create_new(true);
        } else {
            options.create(true);
        }
        options.open(self.local(path)).await.map_err(|e| StoreError::from_io(path, e))?;
        Ok(())
    }

    async fn read(
        &self,
        file: &OpenFile,
        offset: u64,
        count: u32,
    ) -> Result<(Vec<u8>, bool), StoreError> {
        let handle = self.file(file).await?;
        let mut f = handle.lock().await;
        let len = f.metadata().await?.len();
        let start = offset.min(len);
        let end = offset.saturating_add(count.into()).min(len);
        f.seek(SeekFrom::Start(start)).await?;
        let mut buf = vec![0; (end - start) as usize];
        f.read_exact(&mut buf).await?;
        Ok((buf, end >= len))
    }

    async fn write(&self, file: &OpenFile, offset: u64, data: &[u8]) -> Result<u32, StoreError> {
        let handle = self.file(file).await?;
        let mut f = handle.lock().await;
        f.seek(SeekFrom::Start(offset)).await?;
        f.write_all(data).await?;
        debug!("write to {} {} {}", file.path, offset, data.len());
        Ok(data.len() as u32)
    }

    async fn sync(&self, file: &OpenFile) -> Result<(), StoreError> {
        let handle = self.files.lock().await.get(&file.id).cloned();
        if let Some(handle) = handle {
            let mut f = handle.lock().await;
            f.flush().await?;
            f.sync_all().await?;
        }
        Ok(())
    }

    async fn close(&self, file: OpenFile) -> Result<(), StoreError> {
        let removed = self.files.lock().await.remove(&file.id);
        if let Some(handle) = removed {
            let mut f = handle.lock().await;
            f.flush().await?;
            if file.mode.can_write() {
                f.sync_all().await?;
            }
        }
        Ok(())
    }

    async fn getattr(&self, path: &str) -> Result<FileStatus, StoreError> {
        self.status(&self.local(path), path).await
    }

    async fn setattr(&self, path: &str, attrs: &SetAttributes) -> Result<(), StoreError> {
        path_setattr(&self.local(path), attrs).await
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), StoreError> {
        fs::rename(self.local(from), self.local(to)).await.map_err(|e| StoreError::from_io(from, e))
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let local = self.local(path);
        let removed = if self.status(&local, path).await?.is_dir() {
            fs::remove_dir(&local).await
        } else {
            fs::remove_file(&local).await
        };
        removed.map_err(|e| StoreError::from_io(path, e))
    }

    async fn mkdir(&self, path: &str) -> Result<(), StoreError> {
        fs::create_dir(self.local(path)).await.map_err(|e| StoreError::from_io(path, e))
    }

    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, StoreError> {
        let mut dir = fs::read_dir(self.local(path)).await.map_err(|e| StoreError::from_io(path, e))?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                debug!("skipping non UTF-8 name in {}", path);
                continue;
            };
            let meta = entry.metadata().await?;
            entries.push(DirEntry { name, status: metadata_to_status(&meta) });
        }
        // Cookies are positions, so the order must not depend on the OS.
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
