mod engine;
mod machine;

pub use engine::{LinkApplyStatus, LinkCommand, LinkPhase, LinkSnapshot};

use engine::{link_phase_label, LinkEngine};

use crate::{
    card::BlockTransport,
    volume::{fs_error_label, DirEntry, FatVolume, FileStat, FreeSpace, FsError},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountState {
    Unmounted,
    Mounted,
}

#[derive(Debug, PartialEq, Eq)]
pub enum MountError<E> {
    CardNotPresent,
    Connect(E),
    Mount(FsError),
}

impl<E> MountError<E> {
    pub fn code(&self) -> i32 {
        match self {
            Self::Connect(_) => -1,
            Self::Mount(_) => -2,
            Self::CardNotPresent => -3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountOutcome {
    AlreadyMounted,
    Mounted,
}

#[derive(Debug, PartialEq, Eq)]
pub enum UnmountReport<E> {
    AlreadyUnmounted,
    Unmounted,
    /// State is unmounted regardless; the listed teardown steps failed.
    Degraded {
        unmount: Option<FsError>,
        disconnect: Option<E>,
    },
}

impl<E> UnmountReport<E> {
    pub fn was_mounted(&self) -> bool {
        !matches!(self, Self::AlreadyUnmounted)
    }
}

/// Owns the card, the volume on it, and the link state between them.
pub struct SdSession<C, V> {
    card: C,
    volume: V,
    link: LinkEngine,
}

impl<C, V> SdSession<C, V>
where
    C: BlockTransport,
    V: FatVolume<C>,
{
    pub fn new(card: C, volume: V) -> Self {
        Self {
            card,
            volume,
            link: LinkEngine::new(),
        }
    }

    pub fn mount_state(&self) -> MountState {
        match self.link.snapshot().phase {
            LinkPhase::Mounted => MountState::Mounted,
            LinkPhase::Detached | LinkPhase::Connected => MountState::Unmounted,
        }
    }

    pub fn is_mounted(&self) -> bool {
        matches!(self.mount_state(), MountState::Mounted)
    }

    pub fn link(&self) -> LinkSnapshot {
        self.link.snapshot()
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self.link.snapshot().phase, LinkPhase::Detached)
    }

    pub fn card(&self) -> &C {
        &self.card
    }

    pub fn card_mut(&mut self) -> &mut C {
        &mut self.card
    }

    pub fn volume(&self) -> &V {
        &self.volume
    }

    pub fn volume_mut(&mut self) -> &mut V {
        &mut self.volume
    }

    /// Filesystem access, only handed out while mounted.
    pub fn fs(&mut self) -> Option<MountedVolume<'_, C, V>> {
        if !self.is_mounted() {
            return None;
        }
        Some(MountedVolume {
            card: &mut self.card,
            volume: &mut self.volume,
        })
    }

    /// Brings the transport up without mounting. No-op when already connected.
    pub async fn connect(&mut self) -> Result<(), MountError<C::Error>> {
        if self.is_connected() {
            return Ok(());
        }
        if !self.card.is_card_present() {
            log::warn!("sdsession: connect card_not_present");
            return Err(MountError::CardNotPresent);
        }
        if let Err(err) = self.card.connect().await {
            log::warn!("sdsession: connect_error err={:?}", err);
            return Err(MountError::Connect(err));
        }
        self.link.apply(LinkCommand::Connect);
        Ok(())
    }

    pub async fn ensure_mounted(&mut self) -> Result<MountOutcome, MountError<C::Error>> {
        if self.is_mounted() {
            return Ok(MountOutcome::AlreadyMounted);
        }
        self.connect().await?;
        if let Err(err) = self.volume.mount(&mut self.card).await {
            log::warn!("sdsession: mount_error fs={}", fs_error_label(err));
            if let Err(disconnect_err) = self.card.disconnect().await {
                log::warn!(
                    "sdsession: disconnect_after_mount_error err={:?}",
                    disconnect_err
                );
            }
            self.link.apply(LinkCommand::Disconnect);
            return Err(MountError::Mount(err));
        }
        let result = self.link.apply(LinkCommand::Mount);
        log::info!("sdsession: mount_ok mounts={}", result.after.mounts);
        Ok(MountOutcome::Mounted)
    }

    /// Leaves the volume unmounted but keeps the transport connected.
    pub async fn unmount_volume(&mut self) -> Result<(), FsError> {
        if !self.is_mounted() {
            return Ok(());
        }
        let result = self.volume.unmount(&mut self.card).await;
        self.link.apply(LinkCommand::Unmount);
        result
    }

    pub async fn disconnect(&mut self) -> Result<(), C::Error> {
        if !self.is_connected() {
            return Ok(());
        }
        let result = self.card.disconnect().await;
        self.link.apply(LinkCommand::Disconnect);
        result
    }

    pub async fn unmount(&mut self) -> UnmountReport<C::Error> {
        let phase = self.link.snapshot().phase;
        if matches!(phase, LinkPhase::Detached) {
            return UnmountReport::AlreadyUnmounted;
        }
        let unmount = self.unmount_volume().await.err();
        let disconnect = self.disconnect().await.err();
        log::info!(
            "sdsession: unmount from={} unmount_ok={} disconnect_ok={}",
            link_phase_label(phase),
            unmount.is_none() as u8,
            disconnect.is_none() as u8
        );
        if unmount.is_none() && disconnect.is_none() {
            UnmountReport::Unmounted
        } else {
            UnmountReport::Degraded {
                unmount,
                disconnect,
            }
        }
    }

    pub async fn remount(&mut self) -> Result<MountOutcome, MountError<C::Error>> {
        if self.is_mounted() {
            self.release().await;
        }
        self.ensure_mounted().await
    }

    /// Best-effort teardown used on every failing exit path.
    pub async fn release(&mut self) {
        if let UnmountReport::Degraded {
            unmount,
            disconnect,
        } = self.unmount().await
        {
            log::warn!(
                "sdsession: release_degraded unmount={:?} disconnect={:?}",
                unmount,
                disconnect
            );
        }
    }
}

/// Borrowed filesystem handle that only exists while the session is mounted.
pub struct MountedVolume<'a, C, V> {
    card: &'a mut C,
    volume: &'a mut V,
}

impl<C, V> MountedVolume<'_, C, V>
where
    C: BlockTransport,
    V: FatVolume<C>,
{
    pub async fn format(&mut self) -> Result<(), FsError> {
        self.volume.format(self.card).await
    }

    pub async fn create_new(&mut self, path: &str) -> Result<V::File, FsError> {
        self.volume.create_new(self.card, path).await
    }

    pub async fn create(&mut self, path: &str) -> Result<V::File, FsError> {
        self.volume.create(self.card, path).await
    }

    pub async fn open_read(&mut self, path: &str) -> Result<V::File, FsError> {
        self.volume.open_read(self.card, path).await
    }

    pub async fn write(&mut self, file: &mut V::File, data: &[u8]) -> Result<usize, FsError> {
        self.volume.write(self.card, file, data).await
    }

    pub async fn read(&mut self, file: &mut V::File, out: &mut [u8]) -> Result<usize, FsError> {
        self.volume.read(self.card, file, out).await
    }

    pub async fn close(&mut self, file: V::File) -> Result<(), FsError> {
        self.volume.close(self.card, file).await
    }

    pub async fn stat(&mut self, path: &str) -> Result<FileStat, FsError> {
        self.volume.stat(self.card, path).await
    }

    pub async fn remove(&mut self, path: &str) -> Result<(), FsError> {
        self.volume.remove(self.card, path).await
    }

    pub async fn list_dir(
        &mut self,
        path: &str,
        skip: usize,
        out: &mut [DirEntry],
    ) -> Result<usize, FsError> {
        self.volume.list_dir(self.card, path, skip, out).await
    }

    pub async fn free_space(&mut self) -> Result<FreeSpace, FsError> {
        self.volume.free_space(self.card).await
    }
}
