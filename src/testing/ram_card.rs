use std::collections::HashMap;

use crate::card::{BlockTransport, CardInfo, CardMode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Access {
    Read { start: u32, count: u32 },
    Write { start: u32, count: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RamCardError {
    NotConnected,
    OutOfRange,
    LengthMismatch,
    Injected,
}

/// Sparse in-memory card with call counters, an access log and fault injection.
///
/// Blocks never written read back a position-dependent pattern so offset mixups
/// show up in comparisons.
pub(crate) struct RamCard {
    block_size: usize,
    capacity_blocks: u32,
    blocks: HashMap<u32, Vec<u8>>,
    pub(crate) present: bool,
    pub(crate) connected: bool,
    pub(crate) connects: u32,
    pub(crate) disconnects: u32,
    pub(crate) reads: u32,
    pub(crate) writes: u32,
    pub(crate) log: Vec<Access>,
    pub(crate) fail_connect: bool,
    pub(crate) fail_disconnect: bool,
    pub(crate) fail_read_call: Option<u32>,
    pub(crate) fail_write_call: Option<u32>,
    pub(crate) corrupt_read_call: Option<u32>,
    pub(crate) stuck_byte: Option<(u32, usize, u8)>,
}

impl RamCard {
    pub(crate) fn new(block_size: usize, capacity_blocks: u32) -> Self {
        Self {
            block_size,
            capacity_blocks,
            blocks: HashMap::new(),
            present: true,
            connected: false,
            connects: 0,
            disconnects: 0,
            reads: 0,
            writes: 0,
            log: Vec::new(),
            fail_connect: false,
            fail_disconnect: false,
            fail_read_call: None,
            fail_write_call: None,
            corrupt_read_call: None,
            stuck_byte: None,
        }
    }

    pub(crate) fn block(&self, lba: u32) -> Vec<u8> {
        match self.blocks.get(&lba) {
            Some(block) => block.clone(),
            None => (0..self.block_size)
                .map(|i| (lba as usize).wrapping_mul(7).wrapping_add(i) as u8)
                .collect(),
        }
    }

    fn check(&self, start: u32, len: usize, count: u32) -> Result<(), RamCardError> {
        if !self.connected {
            return Err(RamCardError::NotConnected);
        }
        if len != self.block_size * count as usize {
            return Err(RamCardError::LengthMismatch);
        }
        if start as u64 + count as u64 > self.capacity_blocks as u64 {
            return Err(RamCardError::OutOfRange);
        }
        Ok(())
    }
}

impl BlockTransport for RamCard {
    type Error = RamCardError;

    fn is_card_present(&mut self) -> bool {
        self.present
    }

    async fn connect(&mut self) -> Result<(), Self::Error> {
        self.connects += 1;
        if self.fail_connect {
            return Err(RamCardError::Injected);
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.disconnects += 1;
        self.connected = false;
        if self.fail_disconnect {
            return Err(RamCardError::Injected);
        }
        Ok(())
    }

    async fn read_blocks(
        &mut self,
        start: u32,
        out: &mut [u8],
        count: u32,
    ) -> Result<(), Self::Error> {
        self.reads += 1;
        if self.fail_read_call == Some(self.reads) {
            return Err(RamCardError::Injected);
        }
        self.check(start, out.len(), count)?;
        self.log.push(Access::Read { start, count });
        for (i, chunk) in out.chunks_mut(self.block_size).enumerate() {
            let lba = start + i as u32;
            chunk.copy_from_slice(&self.block(lba));
            if let Some((stuck_lba, offset, value)) = self.stuck_byte {
                if stuck_lba == lba {
                    chunk[offset] = value;
                }
            }
        }
        if self.corrupt_read_call == Some(self.reads) {
            out[0] ^= 0xFF;
        }
        Ok(())
    }

    async fn write_blocks(
        &mut self,
        start: u32,
        data: &[u8],
        count: u32,
    ) -> Result<(), Self::Error> {
        self.writes += 1;
        if self.fail_write_call == Some(self.writes) {
            return Err(RamCardError::Injected);
        }
        self.check(start, data.len(), count)?;
        self.log.push(Access::Write { start, count });
        for (i, chunk) in data.chunks(self.block_size).enumerate() {
            self.blocks.insert(start + i as u32, chunk.to_vec());
        }
        Ok(())
    }

    fn card_info(&self) -> Option<CardInfo> {
        if !self.connected {
            return None;
        }
        Some(CardInfo {
            capacity_blocks: self.capacity_blocks,
            mode: CardMode::SdV20,
            csd: [0x400E_0032, 0x5B59_0000, 0x3B37_7F80, 0x0A40_4000],
            cid: [0x0353_4453, 0x4331_3647, 0x8012_3456, 0x7800_C3E1],
        })
    }
}
