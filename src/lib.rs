#![cfg_attr(not(test), no_std)]

pub mod bench;
pub mod buffers;
pub mod campaign;
pub mod capture;
pub mod card;
pub mod config;
pub mod confirm;
pub mod session;
pub mod shell;
pub mod verify;
pub mod volume;

#[cfg(test)]
mod testing;

pub use bench::{run_read_benchmark, BenchError, BenchReport};
pub use buffers::{BurstGeometry, Scratch, ScratchBuffers, SCRATCH_SLACK};
pub use campaign::{CampaignFailure, CampaignStep, CampaignSummary, Diagnostics, StepError};
pub use capture::{SessionError, SessionLog, SessionName, SessionNaming};
pub use card::{BlockTransport, CardInfo, CardMode, SD_BLOCK_SIZE};
pub use config::SdDiagConfig;
pub use confirm::ConfirmGate;
pub use session::{MountError, MountOutcome, MountState, SdSession, UnmountReport};
pub use shell::{parse_shell_command, CommandStatus, SdService, ShellCommand};
pub use verify::{verify_range, BlockRange, RangeReport, VerifyError};
pub use volume::{DirEntry, FatVolume, FileStat, FreeSpace, FsError};

pub const SD_PATH_MAX: usize = 64;
pub const SD_NAME_MAX: usize = 96;
