use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CampaignStep {
    Confirm,
    Connect,
    AlignedRead,
    UnalignedRead { offset: usize },
    BurstCompare { offset: usize },
    AlignedWrite,
    UnalignedWrite,
    BadBlocks,
    Mount,
    Format,
    FreeSpace,
    CreateFile,
    WriteFile,
    CloseFile,
    StatFile,
    ReadBackFile,
    DeleteFile,
    UnmountVolume,
    Disconnect,
}

pub const NONDESTRUCTIVE_STEPS: &[CampaignStep] = &[
    CampaignStep::Connect,
    CampaignStep::AlignedRead,
    CampaignStep::UnalignedRead { offset: 1 },
    CampaignStep::UnalignedRead { offset: 2 },
    CampaignStep::UnalignedRead { offset: 3 },
    CampaignStep::BurstCompare { offset: 0 },
    CampaignStep::BurstCompare { offset: 1 },
    CampaignStep::Mount,
    CampaignStep::FreeSpace,
    CampaignStep::CreateFile,
    CampaignStep::WriteFile,
    CampaignStep::CloseFile,
    CampaignStep::StatFile,
    CampaignStep::ReadBackFile,
    CampaignStep::UnmountVolume,
    CampaignStep::Disconnect,
];

/// Runs after the operator confirmed; formats the card.
pub const DESTRUCTIVE_STEPS: &[CampaignStep] = &[
    CampaignStep::Connect,
    CampaignStep::AlignedRead,
    CampaignStep::UnalignedRead { offset: 1 },
    CampaignStep::UnalignedRead { offset: 2 },
    CampaignStep::UnalignedRead { offset: 3 },
    CampaignStep::BurstCompare { offset: 0 },
    CampaignStep::BurstCompare { offset: 1 },
    CampaignStep::AlignedWrite,
    CampaignStep::UnalignedWrite,
    CampaignStep::BadBlocks,
    CampaignStep::Mount,
    CampaignStep::Format,
    CampaignStep::FreeSpace,
    CampaignStep::CreateFile,
    CampaignStep::WriteFile,
    CampaignStep::CloseFile,
    CampaignStep::ReadBackFile,
    CampaignStep::DeleteFile,
    CampaignStep::UnmountVolume,
    CampaignStep::Disconnect,
];

pub fn campaign_step_label(step: CampaignStep) -> &'static str {
    match step {
        CampaignStep::Confirm => "confirm",
        CampaignStep::Connect => "connect",
        CampaignStep::AlignedRead => "aligned_read",
        CampaignStep::UnalignedRead { .. } => "unaligned_read",
        CampaignStep::BurstCompare { .. } => "burst_compare",
        CampaignStep::AlignedWrite => "aligned_write",
        CampaignStep::UnalignedWrite => "unaligned_write",
        CampaignStep::BadBlocks => "badblocks",
        CampaignStep::Mount => "mount",
        CampaignStep::Format => "format",
        CampaignStep::FreeSpace => "free_space",
        CampaignStep::CreateFile => "create_file",
        CampaignStep::WriteFile => "write_file",
        CampaignStep::CloseFile => "close_file",
        CampaignStep::StatFile => "stat_file",
        CampaignStep::ReadBackFile => "read_back_file",
        CampaignStep::DeleteFile => "delete_file",
        CampaignStep::UnmountVolume => "unmount_volume",
        CampaignStep::Disconnect => "disconnect",
    }
}

impl fmt::Display for CampaignStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Confirm => {
                f.write_str("Destructive test will format the card, confirm to continue")
            }
            Self::Connect => f.write_str("Trying to connect to the card"),
            Self::AlignedRead => f.write_str("Single aligned read"),
            Self::UnalignedRead { offset } => write!(f, "Single unaligned read (+{})", offset),
            Self::BurstCompare { offset: 0 } => f.write_str("Multiple aligned reads"),
            Self::BurstCompare { offset } => write!(f, "Multiple unaligned reads (+{})", offset),
            Self::AlignedWrite => f.write_str("Single aligned write"),
            Self::UnalignedWrite => f.write_str("Single unaligned write"),
            Self::BadBlocks => f.write_str("Running badblocks"),
            Self::Mount => f.write_str("Mount filesystem"),
            Self::Format => f.write_str("Formatting"),
            Self::FreeSpace => f.write_str("Query free space"),
            Self::CreateFile => f.write_str("Create test file"),
            Self::WriteFile => f.write_str("Write some data in it"),
            Self::CloseFile => f.write_str("Close test file"),
            Self::StatFile => f.write_str("Check file size"),
            Self::ReadBackFile => f.write_str("Check file content"),
            Self::DeleteFile => f.write_str("Delete test file"),
            Self::UnmountVolume => f.write_str("Umount filesystem"),
            Self::Disconnect => f.write_str("Disconnecting"),
        }
    }
}
