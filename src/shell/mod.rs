mod dump;
mod listing;
mod parser;
#[cfg(test)]
mod tests;

pub use dump::{write_hex_dump, write_text, DumpMode, DumpReport, TextStream};
pub use listing::{ListingReport, LS_STACK_MAX};
pub use parser::parse_shell_command;

use core::fmt::Write;

use heapless::String;

use crate::{
    bench::run_read_benchmark,
    buffers::{BufferError, ScratchBuffers},
    campaign::Diagnostics,
    capture::{SessionError, SessionLog, SessionName, SessionNaming},
    card::BlockTransport,
    config::SdDiagConfig,
    confirm::ConfirmGate,
    session::{MountOutcome, SdSession, UnmountReport},
    volume::{fs_error_label, write_free_space, FatVolume},
    SD_PATH_MAX,
};

pub type SdPath = String<SD_PATH_MAX>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShellCommand {
    Test,
    Erase,
    Mount,
    Umount,
    Ls { path: SdPath },
    Cat { path: SdPath },
    Hd { path: SdPath },
    Bench,
}

pub fn shell_command_label(command: &ShellCommand) -> &'static str {
    match command {
        ShellCommand::Test => "SDTEST",
        ShellCommand::Erase => "SDERASE",
        ShellCommand::Mount => "SDMOUNT",
        ShellCommand::Umount => "SDUMOUNT",
        ShellCommand::Ls { .. } => "SDLS",
        ShellCommand::Cat { .. } => "SDCAT",
        ShellCommand::Hd { .. } => "SDHD",
        ShellCommand::Bench => "SDBENCH",
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    Failed,
}

/// Everything the console needs to drive the card: the session, the scratch
/// pair, the capture allocator and the destructive-test gate.
pub struct SdService<C, V, G, const CAP: usize> {
    session: SdSession<C, V>,
    scratch: ScratchBuffers<CAP>,
    captures: SessionLog,
    config: SdDiagConfig,
    gate: G,
}

impl<C, V, G, const CAP: usize> SdService<C, V, G, CAP>
where
    C: BlockTransport,
    V: FatVolume<C>,
    G: ConfirmGate,
{
    pub fn new(card: C, volume: V, gate: G, config: SdDiagConfig) -> Result<Self, BufferError> {
        Ok(Self {
            session: SdSession::new(card, volume),
            scratch: ScratchBuffers::new(config.geometry)?,
            captures: SessionLog::new(SessionNaming::from_config(&config)),
            config,
            gate,
        })
    }

    pub fn session(&self) -> &SdSession<C, V> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SdSession<C, V> {
        &mut self.session
    }

    /// Persists a captured buffer into the next free session file.
    pub async fn write_capture(
        &mut self,
        data: &[u8],
    ) -> Result<SessionName, SessionError<C::Error>> {
        self.captures.write_session(&mut self.session, data).await
    }

    pub fn last_capture_name(&self) -> Option<&str> {
        self.captures.last_name()
    }

    pub async fn execute_line<W: Write>(&mut self, line: &[u8], out: &mut W) -> CommandStatus {
        match parse_shell_command(line) {
            Some(command) => self.execute(&command, out).await,
            None => {
                let _ = write!(out, "Unknown command\r\n");
                CommandStatus::Failed
            }
        }
    }

    pub async fn execute<W: Write>(
        &mut self,
        command: &ShellCommand,
        out: &mut W,
    ) -> CommandStatus {
        let status = match command {
            ShellCommand::Test => {
                let mut diag =
                    Diagnostics::new(&mut self.session, &mut self.scratch, &self.config);
                status_of(diag.run_nondestructive(out).await.is_ok())
            }
            ShellCommand::Erase => {
                let mut diag =
                    Diagnostics::new(&mut self.session, &mut self.scratch, &self.config);
                status_of(diag.run_destructive(&mut self.gate, out).await.is_ok())
            }
            ShellCommand::Mount => self.mount(out).await,
            ShellCommand::Umount => self.umount(out).await,
            ShellCommand::Ls { path } => self.ls(path, out).await,
            ShellCommand::Cat { path } => self.dump(path, DumpMode::Text, out).await,
            ShellCommand::Hd { path } => self.dump(path, DumpMode::Hex, out).await,
            ShellCommand::Bench => {
                let result =
                    run_read_benchmark(&mut self.session, &mut self.scratch, &self.config, out)
                        .await;
                status_of(result.is_ok())
            }
        };
        log::info!(
            "sdshell: command={} status={}",
            shell_command_label(command),
            if status == CommandStatus::Ok { "ok" } else { "failed" }
        );
        status
    }

    async fn mount<W: Write>(&mut self, out: &mut W) -> CommandStatus {
        match self.session.ensure_mounted().await {
            Ok(MountOutcome::AlreadyMounted) => {
                let _ = write!(out, "File System already mounted\r\n");
                CommandStatus::Ok
            }
            Ok(MountOutcome::Mounted) => {
                let _ = write!(out, "f_mount OK\r\n");
                CommandStatus::Ok
            }
            Err(err) => {
                let _ = write!(out, "mount error:{}\r\n", err.code());
                CommandStatus::Failed
            }
        }
    }

    async fn umount<W: Write>(&mut self, out: &mut W) -> CommandStatus {
        match self.session.unmount().await {
            UnmountReport::AlreadyUnmounted => {
                let _ = write!(out, "File System already unmounted\r\n");
                CommandStatus::Ok
            }
            UnmountReport::Unmounted => {
                let _ = write!(out, "Umount filesystem...\r\n");
                CommandStatus::Ok
            }
            UnmountReport::Degraded { unmount, disconnect } => {
                let _ = write!(
                    out,
                    "Umount filesystem... unmount={:?} disconnect={:?}\r\n",
                    unmount, disconnect
                );
                CommandStatus::Failed
            }
        }
    }

    /// Mounts on demand and leaves the volume mounted afterwards.
    async fn ls<W: Write>(&mut self, path: &str, out: &mut W) -> CommandStatus {
        if let Err(err) = self.session.ensure_mounted().await {
            let _ = write!(out, "mount error:{}\r\n", err.code());
            return CommandStatus::Failed;
        }
        let block_size = self.config.geometry.block_size;
        let Some(mut fs) = self.session.fs() else {
            return CommandStatus::Failed;
        };
        match fs.free_space().await {
            Ok(free) => {
                let _ = write_free_space(out, &free, block_size);
            }
            Err(err) => {
                let _ = write!(out, "FS: free space query failed err:{}\r\n", err.code());
                log::warn!("sdshell: free_space_error fs={}", fs_error_label(err));
                return CommandStatus::Failed;
            }
        }
        match listing::list_tree(&mut fs, path, out).await {
            Ok(report) => status_of(report.is_complete()),
            Err(_) => CommandStatus::Failed,
        }
    }

    async fn dump<W: Write>(&mut self, path: &str, mode: DumpMode, out: &mut W) -> CommandStatus {
        if let Err(err) = self.session.ensure_mounted().await {
            let _ = write!(out, "mount error:{}\r\n", err.code());
            return CommandStatus::Failed;
        }
        let max_bytes = self.config.dump_max_bytes;
        let result =
            dump::dump_file(&mut self.session, &mut self.scratch, path, mode, max_bytes, out).await;
        status_of(result.is_ok())
    }
}

fn status_of(ok: bool) -> CommandStatus {
    if ok {
        CommandStatus::Ok
    } else {
        CommandStatus::Failed
    }
}
