
use core::fmt::Write as _;

use heapless::String;

use crate::{
    card::BlockTransport,
    config::SdDiagConfig,
    session::{MountError, SdSession},
    volume::{fs_error_label, FatVolume, FsError},
};

pub const SESSION_NAME_MAX: usize = 32;

pub type SessionName = String<SESSION_NAME_MAX>;

#[derive(Debug, PartialEq, Eq)]
pub enum SessionError<E> {
    EmptyBuffer,
    NamespaceExhausted,
    Mount(MountError<E>),
    Create(FsError),
    Write(FsError),
    ShortWrite { written: usize, expected: usize },
    Close(FsError),
    NameOverflow,
}

impl<E> SessionError<E> {
    pub fn code(&self) -> i32 {
        match self {
            Self::EmptyBuffer => -1,
            Self::NamespaceExhausted => -2,
            Self::Write(_) | Self::ShortWrite { .. } => -3,
            Self::Close(_) => -4,
            Self::Mount(_) => -5,
            Self::Create(_) => -6,
            Self::NameOverflow => -7,
        }
    }
}

impl<E> From<MountError<E>> for SessionError<E> {
    fn from(value: MountError<E>) -> Self {
        Self::Mount(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionNaming {
    pub prefix: &'static str,
    pub ext: &'static str,
    pub slots: u16,
}

impl SessionNaming {
    pub fn from_config(config: &SdDiagConfig) -> Self {
        Self {
            prefix: config.session_prefix,
            ext: config.session_ext,
            slots: config.session_slots,
        }
    }

    pub fn name(&self, index: u16) -> Option<SessionName> {
        let mut name = SessionName::new();
        write!(name, "{}{:03}{}", self.prefix, index, self.ext).ok()?;
        Some(name)
    }
}

/// Sequential capture files: each call lands in the first free `session_NNN` slot.
pub struct SessionLog {
    naming: SessionNaming,
    last_name: Option<SessionName>,
}

impl SessionLog {
    pub fn new(naming: SessionNaming) -> Self {
        Self {
            naming,
            last_name: None,
        }
    }

    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    /// Persists `data` into a freshly allocated session file.
    ///
    /// The volume is remounted first so names created elsewhere are seen, and is
    /// left unmounted on every exit once the mount was attempted.
    pub async fn write_session<C, V>(
        &mut self,
        session: &mut SdSession<C, V>,
        data: &[u8],
    ) -> Result<SessionName, SessionError<C::Error>>
    where
        C: BlockTransport,
        V: FatVolume<C>,
    {
        if data.is_empty() {
            return Err(SessionError::EmptyBuffer);
        }
        session.remount().await?;
        let result = self.write_mounted(session, data).await;
        session.release().await;
        match &result {
            Ok(name) => log::info!("sdlog: session_written name={} bytes={}", name, data.len()),
            Err(err) => log::warn!("sdlog: session_failed code={} err={:?}", err.code(), err),
        }
        result
    }

    async fn write_mounted<C, V>(
        &mut self,
        session: &mut SdSession<C, V>,
        data: &[u8],
    ) -> Result<SessionName, SessionError<C::Error>>
    where
        C: BlockTransport,
        V: FatVolume<C>,
    {
        let Some(mut fs) = session.fs() else {
            return Err(SessionError::Create(FsError::NotReady));
        };

        let mut created = None;
        for index in 0..self.naming.slots {
            let name = self.naming.name(index).ok_or(SessionError::NameOverflow)?;
            let opened = fs.create_new(&name).await;
            match opened {
                Ok(file) => {
                    created = Some((name, file));
                    break;
                }
                Err(FsError::Exists) => continue,
                Err(err) => {
                    log::warn!("sdlog: create_error name={} fs={}", name, fs_error_label(err));
                    return Err(SessionError::Create(err));
                }
            }
        }
        let Some((name, mut file)) = created else {
            return Err(SessionError::NamespaceExhausted);
        };
        self.last_name = Some(name.clone());

        match fs.write(&mut file, data).await {
            Ok(written) if written == data.len() => {}
            Ok(written) => {
                let _ = fs.close(file).await;
                return Err(SessionError::ShortWrite {
                    written,
                    expected: data.len(),
                });
            }
            Err(err) => {
                let _ = fs.close(file).await;
                return Err(SessionError::Write(err));
            }
        }

        fs.close(file).await.map_err(SessionError::Close)?;
        Ok(name)
    }
}
