use core::fmt::{self, Write};

use heapless::String;

use crate::{card::BlockTransport, SD_NAME_MAX};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FsError {
    Disk = 1,
    Internal = 2,
    NotReady = 3,
    NoFile = 4,
    NoPath = 5,
    InvalidName = 6,
    Denied = 7,
    Exists = 8,
    InvalidObject = 9,
    WriteProtected = 10,
    InvalidDrive = 11,
    NotEnabled = 12,
    NoFilesystem = 13,
    MkfsAborted = 14,
    Timeout = 15,
    Locked = 16,
    OutOfMemory = 17,
    TooManyOpenFiles = 18,
}

impl FsError {
    pub fn code(self) -> u8 {
        self as u8
    }
}

pub fn fs_error_label(error: FsError) -> &'static str {
    match error {
        FsError::Disk => "disk_err",
        FsError::Internal => "int_err",
        FsError::NotReady => "not_ready",
        FsError::NoFile => "no_file",
        FsError::NoPath => "no_path",
        FsError::InvalidName => "invalid_name",
        FsError::Denied => "denied",
        FsError::Exists => "exist",
        FsError::InvalidObject => "invalid_object",
        FsError::WriteProtected => "write_protected",
        FsError::InvalidDrive => "invalid_drive",
        FsError::NotEnabled => "not_enabled",
        FsError::NoFilesystem => "no_filesystem",
        FsError::MkfsAborted => "mkfs_aborted",
        FsError::Timeout => "timeout",
        FsError::Locked => "locked",
        FsError::OutOfMemory => "not_enough_core",
        FsError::TooManyOpenFiles => "too_many_open_files",
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String<SD_NAME_MAX>,
    pub size: u32,
    pub is_dir: bool,
}

impl DirEntry {
    pub const EMPTY: Self = Self {
        name: String::new(),
        size: 0,
        is_dir: false,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStat {
    pub size: u32,
    pub is_dir: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeSpace {
    pub free_clusters: u32,
    pub sectors_per_cluster: u32,
}

impl FreeSpace {
    pub fn free_bytes(&self, block_size: usize) -> u64 {
        (self.free_clusters as u64) * (self.sectors_per_cluster as u64) * (block_size as u64)
    }
}

pub fn write_free_space<W: Write>(out: &mut W, free: &FreeSpace, block_size: usize) -> fmt::Result {
    let kib = free.free_bytes(block_size) / 1024;
    write!(
        out,
        "FS: {} free clusters, {} sectors/cluster, {} bytes/sector\r\n",
        free.free_clusters, free.sectors_per_cluster, block_size
    )?;
    write!(out, "FS: {} KBytes free ({} MBytes free)\r\n", kib, kib / 1024)
}

/// FAT filesystem living on a [`BlockTransport`].
///
/// Every call receives the card it operates on; the volume itself only keeps
/// filesystem bookkeeping. Paths are `/`-separated and rooted at the volume.
#[allow(async_fn_in_trait)]
pub trait FatVolume<C: BlockTransport> {
    type File;

    async fn mount(&mut self, card: &mut C) -> Result<(), FsError>;

    async fn unmount(&mut self, card: &mut C) -> Result<(), FsError>;

    async fn format(&mut self, card: &mut C) -> Result<(), FsError>;

    /// Fails with [`FsError::Exists`] when `path` is already taken.
    async fn create_new(&mut self, card: &mut C, path: &str) -> Result<Self::File, FsError>;

    /// Creates `path` or truncates an existing file.
    async fn create(&mut self, card: &mut C, path: &str) -> Result<Self::File, FsError>;

    async fn open_read(&mut self, card: &mut C, path: &str) -> Result<Self::File, FsError>;

    async fn write(
        &mut self,
        card: &mut C,
        file: &mut Self::File,
        data: &[u8],
    ) -> Result<usize, FsError>;

    async fn read(
        &mut self,
        card: &mut C,
        file: &mut Self::File,
        out: &mut [u8],
    ) -> Result<usize, FsError>;

    async fn close(&mut self, card: &mut C, file: Self::File) -> Result<(), FsError>;

    async fn stat(&mut self, card: &mut C, path: &str) -> Result<FileStat, FsError>;

    async fn remove(&mut self, card: &mut C, path: &str) -> Result<(), FsError>;

    /// Fills `out` with entries of `path`, skipping the first `skip`; returns how many
    /// were written. A short page means the directory is exhausted.
    async fn list_dir(
        &mut self,
        card: &mut C,
        path: &str,
        skip: usize,
        out: &mut [DirEntry],
    ) -> Result<usize, FsError>;

    async fn free_space(&mut self, card: &mut C) -> Result<FreeSpace, FsError>;
}
