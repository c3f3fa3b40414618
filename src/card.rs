use core::fmt::{self, Debug, Write};

pub const SD_BLOCK_SIZE: usize = 512;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardMode {
    SdV11,
    SdV20,
    Mmc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CardInfo {
    pub capacity_blocks: u32,
    pub mode: CardMode,
    pub csd: [u32; 4],
    pub cid: [u32; 4],
}

impl CardInfo {
    pub fn capacity_mib(&self) -> u32 {
        self.capacity_blocks / 2048
    }
}

pub fn card_mode_label(mode: CardMode) -> &'static str {
    match mode {
        CardMode::SdV11 => "SDV11",
        CardMode::SdV20 => "SDV20",
        CardMode::Mmc => "MMC",
    }
}

pub fn write_csd<W: Write>(out: &mut W, info: &CardInfo) -> fmt::Result {
    write!(
        out,
        "CSD      : {:08X} {:08X} {:08X} {:08X}\r\n",
        info.csd[3], info.csd[2], info.csd[1], info.csd[0]
    )
}

pub fn write_card_info<W: Write>(out: &mut W, info: &CardInfo) -> fmt::Result {
    write_csd(out, info)?;
    write!(
        out,
        "CID      : {:08X} {:08X} {:08X} {:08X}\r\n",
        info.cid[3], info.cid[2], info.cid[1], info.cid[0]
    )?;
    write!(out, "Mode     : {}\r\n", card_mode_label(info.mode))?;
    write!(out, "Capacity : {}MB\r\n", info.capacity_mib())
}

/// Raw block access to the card.
///
/// `read_blocks`/`write_blocks` move `count` whole blocks; the buffer is exactly
/// `count * block_size` bytes and may start at any address.
#[allow(async_fn_in_trait)]
pub trait BlockTransport {
    type Error: Debug;

    fn is_card_present(&mut self) -> bool;

    async fn connect(&mut self) -> Result<(), Self::Error>;

    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    async fn read_blocks(
        &mut self,
        start: u32,
        out: &mut [u8],
        count: u32,
    ) -> Result<(), Self::Error>;

    async fn write_blocks(&mut self, start: u32, data: &[u8], count: u32)
        -> Result<(), Self::Error>;

    /// Populated after a successful `connect`.
    fn card_info(&self) -> Option<CardInfo>;
}
