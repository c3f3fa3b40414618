use std::collections::{BTreeMap, BTreeSet};

use heapless::String as HString;

use super::RamCard;
use crate::volume::{DirEntry, FatVolume, FileStat, FreeSpace, FsError};

pub(crate) struct RamFile {
    path: String,
    pos: usize,
    writable: bool,
}

/// In-memory stand-in for a FAT volume.
///
/// Files staged with [`RamVolume::stage_external`] only become visible on the
/// next mount, the way edits made from another host show up after a remount.
pub(crate) struct RamVolume {
    mounted: bool,
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    staged: Vec<(String, Vec<u8>)>,
    pub(crate) mounts: u32,
    pub(crate) unmounts: u32,
    pub(crate) formats: u32,
    pub(crate) creates: u32,
    pub(crate) fail_mount: Option<FsError>,
    pub(crate) fail_unmount: Option<FsError>,
    pub(crate) fail_create: Option<FsError>,
    pub(crate) fail_write: Option<FsError>,
    pub(crate) short_write: bool,
    pub(crate) fail_close: Option<FsError>,
    pub(crate) open_handles: u32,
    pub(crate) free: FreeSpace,
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

fn leaf_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

impl RamVolume {
    pub(crate) fn new() -> Self {
        Self {
            mounted: false,
            files: BTreeMap::new(),
            dirs: BTreeSet::new(),
            staged: Vec::new(),
            mounts: 0,
            unmounts: 0,
            formats: 0,
            creates: 0,
            fail_mount: None,
            fail_unmount: None,
            fail_create: None,
            fail_write: None,
            short_write: false,
            fail_close: None,
            open_handles: 0,
            free: FreeSpace {
                free_clusters: 1_000,
                sectors_per_cluster: 8,
            },
        }
    }

    pub(crate) fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub(crate) fn insert_file(&mut self, path: &str, data: &[u8]) {
        self.files.insert(normalize(path), data.to_vec());
    }

    pub(crate) fn insert_dir(&mut self, path: &str) {
        self.dirs.insert(normalize(path));
    }

    pub(crate) fn stage_external(&mut self, path: &str, data: &[u8]) {
        self.staged.push((normalize(path), data.to_vec()));
    }

    pub(crate) fn file(&self, path: &str) -> Option<&Vec<u8>> {
        self.files.get(&normalize(path))
    }

    pub(crate) fn file_count(&self) -> usize {
        self.files.len()
    }

    fn require_mounted(&self) -> Result<(), FsError> {
        if self.mounted {
            Ok(())
        } else {
            Err(FsError::NotReady)
        }
    }

    fn dir_exists(&self, path: &str) -> bool {
        path.is_empty() || self.dirs.contains(path)
    }

    fn open_for_write(&mut self, path: &str, exclusive: bool) -> Result<RamFile, FsError> {
        self.require_mounted()?;
        if let Some(error) = self.fail_create {
            return Err(error);
        }
        let key = normalize(path);
        if key.is_empty() || self.dirs.contains(&key) {
            return Err(FsError::InvalidName);
        }
        if !self.dir_exists(parent_of(&key)) {
            return Err(FsError::NoPath);
        }
        if exclusive && self.files.contains_key(&key) {
            return Err(FsError::Exists);
        }
        self.creates += 1;
        self.files.insert(key.clone(), Vec::new());
        self.open_handles += 1;
        Ok(RamFile {
            path: key,
            pos: 0,
            writable: true,
        })
    }
}

impl FatVolume<RamCard> for RamVolume {
    type File = RamFile;

    async fn mount(&mut self, card: &mut RamCard) -> Result<(), FsError> {
        if !card.connected {
            return Err(FsError::NotReady);
        }
        if let Some(error) = self.fail_mount {
            return Err(error);
        }
        for (path, data) in self.staged.drain(..) {
            self.files.insert(path, data);
        }
        self.mounted = true;
        self.mounts += 1;
        Ok(())
    }

    async fn unmount(&mut self, _card: &mut RamCard) -> Result<(), FsError> {
        self.mounted = false;
        self.unmounts += 1;
        match self.fail_unmount {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn format(&mut self, _card: &mut RamCard) -> Result<(), FsError> {
        self.require_mounted()?;
        self.files.clear();
        self.dirs.clear();
        self.formats += 1;
        Ok(())
    }

    async fn create_new(&mut self, _card: &mut RamCard, path: &str) -> Result<RamFile, FsError> {
        self.open_for_write(path, true)
    }

    async fn create(&mut self, _card: &mut RamCard, path: &str) -> Result<RamFile, FsError> {
        self.open_for_write(path, false)
    }

    async fn open_read(&mut self, _card: &mut RamCard, path: &str) -> Result<RamFile, FsError> {
        self.require_mounted()?;
        let key = normalize(path);
        if !self.files.contains_key(&key) {
            return Err(FsError::NoFile);
        }
        self.open_handles += 1;
        Ok(RamFile {
            path: key,
            pos: 0,
            writable: false,
        })
    }

    async fn write(
        &mut self,
        _card: &mut RamCard,
        file: &mut RamFile,
        data: &[u8],
    ) -> Result<usize, FsError> {
        self.require_mounted()?;
        if !file.writable {
            return Err(FsError::Denied);
        }
        if let Some(error) = self.fail_write {
            return Err(error);
        }
        let len = if self.short_write {
            data.len() / 2
        } else {
            data.len()
        };
        let content = self.files.get_mut(&file.path).ok_or(FsError::InvalidObject)?;
        let end = file.pos + len;
        if content.len() < end {
            content.resize(end, 0);
        }
        content[file.pos..end].copy_from_slice(&data[..len]);
        file.pos = end;
        Ok(len)
    }

    async fn read(
        &mut self,
        _card: &mut RamCard,
        file: &mut RamFile,
        out: &mut [u8],
    ) -> Result<usize, FsError> {
        self.require_mounted()?;
        let content = self.files.get(&file.path).ok_or(FsError::InvalidObject)?;
        let available = content.len().saturating_sub(file.pos);
        let len = available.min(out.len());
        out[..len].copy_from_slice(&content[file.pos..file.pos + len]);
        file.pos += len;
        Ok(len)
    }

    async fn close(&mut self, _card: &mut RamCard, _file: RamFile) -> Result<(), FsError> {
        self.open_handles = self.open_handles.saturating_sub(1);
        match self.fail_close {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn stat(&mut self, _card: &mut RamCard, path: &str) -> Result<FileStat, FsError> {
        self.require_mounted()?;
        let key = normalize(path);
        if let Some(content) = self.files.get(&key) {
            return Ok(FileStat {
                size: content.len() as u32,
                is_dir: false,
            });
        }
        if self.dirs.contains(&key) {
            return Ok(FileStat {
                size: 0,
                is_dir: true,
            });
        }
        Err(FsError::NoFile)
    }

    async fn remove(&mut self, _card: &mut RamCard, path: &str) -> Result<(), FsError> {
        self.require_mounted()?;
        match self.files.remove(&normalize(path)) {
            Some(_) => Ok(()),
            None => Err(FsError::NoFile),
        }
    }

    async fn list_dir(
        &mut self,
        _card: &mut RamCard,
        path: &str,
        skip: usize,
        out: &mut [DirEntry],
    ) -> Result<usize, FsError> {
        self.require_mounted()?;
        let key = normalize(path);
        if !self.dir_exists(&key) {
            return Err(FsError::NoPath);
        }
        let dirs = self
            .dirs
            .iter()
            .filter(|dir| !dir.is_empty() && parent_of(dir) == key)
            .map(|dir| (leaf_of(dir), 0u32, true));
        let files = self
            .files
            .iter()
            .filter(|(file, _)| parent_of(file) == key)
            .map(|(file, data)| (leaf_of(file), data.len() as u32, false));
        let mut written = 0;
        for (name, size, is_dir) in dirs.chain(files).skip(skip).take(out.len()) {
            let mut entry_name = HString::new();
            entry_name
                .push_str(name)
                .map_err(|_| FsError::InvalidName)?;
            out[written] = DirEntry {
                name: entry_name,
                size,
                is_dir,
            };
            written += 1;
        }
        Ok(written)
    }

    async fn free_space(&mut self, _card: &mut RamCard) -> Result<FreeSpace, FsError> {
        self.require_mounted()?;
        Ok(self.free)
    }
}
