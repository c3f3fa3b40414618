pub const SCRATCH_SLACK: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BurstGeometry {
    pub block_size: usize,
    pub burst_blocks: u32,
}

impl BurstGeometry {
    pub const fn burst_bytes(&self) -> usize {
        self.block_size * self.burst_blocks as usize
    }

    pub const fn blocks_bytes(&self, blocks: u32) -> usize {
        self.block_size * blocks as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scratch {
    Primary,
    Secondary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferError {
    TooSmall { needed: usize, capacity: usize },
    OutOfBounds { offset: usize, blocks: u32 },
}

/// The input/output scratch pair shared by block checks and file I/O.
///
/// Both buffers hold one full burst plus [`SCRATCH_SLACK`] bytes so that a burst
/// can be placed at a small byte offset to exercise unaligned transfers. Contents
/// carry no meaning between operations.
pub struct ScratchBuffers<const CAP: usize> {
    primary: [u8; CAP],
    secondary: [u8; CAP],
    geometry: BurstGeometry,
}

impl<const CAP: usize> ScratchBuffers<CAP> {
    pub fn new(geometry: BurstGeometry) -> Result<Self, BufferError> {
        let needed = geometry.burst_bytes() + SCRATCH_SLACK;
        if geometry.block_size == 0 || geometry.burst_blocks == 0 || needed > CAP {
            return Err(BufferError::TooSmall {
                needed,
                capacity: CAP,
            });
        }
        Ok(Self {
            primary: [0; CAP],
            secondary: [0; CAP],
            geometry,
        })
    }

    pub fn geometry(&self) -> BurstGeometry {
        self.geometry
    }

    pub fn burst_bytes(&self) -> usize {
        self.geometry.burst_bytes()
    }

    pub fn fill(&mut self, which: Scratch, pattern: u8) {
        let len = self.geometry.burst_bytes();
        self.buffer_mut(which)[..len].fill(pattern);
    }

    pub fn fill_both(&mut self, pattern: u8) {
        self.fill(Scratch::Primary, pattern);
        self.fill(Scratch::Secondary, pattern);
    }

    /// `blocks` whole blocks of one buffer starting `offset` bytes in.
    pub fn view(&self, which: Scratch, offset: usize, blocks: u32) -> Result<&[u8], BufferError> {
        let range = self.span(offset, blocks)?;
        Ok(&self.buffer(which)[range])
    }

    pub fn view_mut(
        &mut self,
        which: Scratch,
        offset: usize,
        blocks: u32,
    ) -> Result<&mut [u8], BufferError> {
        let range = self.span(offset, blocks)?;
        Ok(&mut self.buffer_mut(which)[range])
    }

    /// Simultaneous views into both buffers, primary first.
    pub fn split_mut(
        &mut self,
        primary_offset: usize,
        secondary_offset: usize,
        blocks: u32,
    ) -> Result<(&mut [u8], &mut [u8]), BufferError> {
        let primary = self.span(primary_offset, blocks)?;
        let secondary = self.span(secondary_offset, blocks)?;
        Ok((
            &mut self.primary[primary],
            &mut self.secondary[secondary],
        ))
    }

    /// Whole-burst window of the primary buffer, used as a file I/O chunk.
    pub fn chunk_mut(&mut self) -> &mut [u8] {
        let len = self.geometry.burst_bytes();
        &mut self.primary[..len]
    }

    fn span(&self, offset: usize, blocks: u32) -> Result<core::ops::Range<usize>, BufferError> {
        if offset > SCRATCH_SLACK || blocks > self.geometry.burst_blocks {
            return Err(BufferError::OutOfBounds { offset, blocks });
        }
        let len = self.geometry.blocks_bytes(blocks);
        Ok(offset..offset + len)
    }

    fn buffer(&self, which: Scratch) -> &[u8; CAP] {
        match which {
            Scratch::Primary => &self.primary,
            Scratch::Secondary => &self.secondary,
        }
    }

    fn buffer_mut(&mut self, which: Scratch) -> &mut [u8; CAP] {
        match which {
            Scratch::Primary => &mut self.primary,
            Scratch::Secondary => &mut self.secondary,
        }
    }
}
