
use crate::{
    buffers::{BufferError, Scratch, ScratchBuffers},
    card::BlockTransport,
};

/// Half-open `[start, end)` sweep written and read back `burst` blocks at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockRange {
    pub start: u32,
    pub end: u32,
    pub burst: u32,
    pub pattern: u8,
}

impl BlockRange {
    pub fn blocks(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyError<E> {
    Read {
        lba: u32,
        error: E,
    },
    Write {
        lba: u32,
        error: E,
    },
    Mismatch {
        lba: u32,
        offset: usize,
        expected: u8,
        found: u8,
    },
    BurstTooLarge {
        requested: u32,
        max: u32,
    },
    EmptyRange,
    Buffer(BufferError),
}

impl<E> From<BufferError> for VerifyError<E> {
    fn from(value: BufferError) -> Self {
        Self::Buffer(value)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RangeReport {
    pub write_bursts: u32,
    pub verified_bursts: u32,
    pub blocks: u32,
}

fn first_mismatch<E>(
    lba: u32,
    block_size: usize,
    expected: &[u8],
    found: &[u8],
) -> Result<(), VerifyError<E>> {
    match expected.iter().zip(found.iter()).position(|(a, b)| a != b) {
        None => Ok(()),
        Some(idx) => Err(VerifyError::Mismatch {
            lba: lba + (idx / block_size) as u32,
            offset: idx % block_size,
            expected: expected[idx],
            found: found[idx],
        }),
    }
}

/// Pattern-fills `range` on the card and reads it back ("badblocks").
///
/// Destroys whatever was stored in the range. The final burst is shortened so no
/// block at or past `end` is touched.
pub async fn verify_range<C, const CAP: usize>(
    card: &mut C,
    scratch: &mut ScratchBuffers<CAP>,
    range: BlockRange,
) -> Result<RangeReport, VerifyError<C::Error>>
where
    C: BlockTransport,
{
    let geometry = scratch.geometry();
    if range.burst == 0 || range.burst > geometry.burst_blocks {
        return Err(VerifyError::BurstTooLarge {
            requested: range.burst,
            max: geometry.burst_blocks,
        });
    }
    if range.start >= range.end {
        return Err(VerifyError::EmptyRange);
    }

    let mut report = RangeReport {
        blocks: range.blocks(),
        ..RangeReport::default()
    };

    scratch.fill(Scratch::Secondary, range.pattern);
    let mut lba = range.start;
    while lba < range.end {
        let count = range.burst.min(range.end - lba);
        let data = scratch.view(Scratch::Secondary, 0, count)?;
        card.write_blocks(lba, data, count)
            .await
            .map_err(|error| VerifyError::Write { lba, error })?;
        report.write_bursts += 1;
        lba += count;
    }

    scratch.fill(Scratch::Primary, !range.pattern);
    let mut lba = range.start;
    while lba < range.end {
        let count = range.burst.min(range.end - lba);
        let (read, expected) = scratch.split_mut(0, 0, count)?;
        card.read_blocks(lba, read, count)
            .await
            .map_err(|error| VerifyError::Read { lba, error })?;
        first_mismatch(lba, geometry.block_size, expected, read)?;
        report.verified_bursts += 1;
        lba += count;
    }

    log::debug!(
        "sdverify: range_ok start={} end={} burst={} pattern=0x{:02x} bursts={}",
        range.start,
        range.end,
        range.burst,
        range.pattern,
        report.write_bursts
    );
    Ok(report)
}

/// Aligned single-block read into the secondary buffer; the data becomes the
/// reference for [`check_unaligned_read`].
pub async fn check_aligned_read<C, const CAP: usize>(
    card: &mut C,
    scratch: &mut ScratchBuffers<CAP>,
    lba: u32,
) -> Result<(), VerifyError<C::Error>>
where
    C: BlockTransport,
{
    let out = scratch.view_mut(Scratch::Secondary, 0, 1)?;
    card.read_blocks(lba, out, 1)
        .await
        .map_err(|error| VerifyError::Read { lba, error })
}

/// Reads `lba` into the primary buffer shifted by `offset` bytes and compares it
/// with the aligned reference left by [`check_aligned_read`].
pub async fn check_unaligned_read<C, const CAP: usize>(
    card: &mut C,
    scratch: &mut ScratchBuffers<CAP>,
    lba: u32,
    offset: usize,
) -> Result<(), VerifyError<C::Error>>
where
    C: BlockTransport,
{
    let block_size = scratch.geometry().block_size;
    let (read, reference) = scratch.split_mut(offset, 0, 1)?;
    read.fill(0);
    card.read_blocks(lba, read, 1)
        .await
        .map_err(|error| VerifyError::Read { lba, error })?;
    first_mismatch(lba, block_size, reference, read)
}

/// Captures one burst as reference, then re-reads it `repeats` times at the same
/// destination offset; every repetition must match.
pub async fn check_repeated_burst<C, const CAP: usize>(
    card: &mut C,
    scratch: &mut ScratchBuffers<CAP>,
    lba: u32,
    offset: usize,
    repeats: u32,
    fill: u8,
) -> Result<(), VerifyError<C::Error>>
where
    C: BlockTransport,
{
    let geometry = scratch.geometry();
    let burst = geometry.burst_blocks;
    scratch.fill_both(fill);
    {
        let reference = scratch.view_mut(Scratch::Primary, offset, burst)?;
        card.read_blocks(lba, reference, burst)
            .await
            .map_err(|error| VerifyError::Read { lba, error })?;
    }
    for _ in 0..repeats {
        let (reference, read) = scratch.split_mut(offset, offset, burst)?;
        card.read_blocks(lba, read, burst)
            .await
            .map_err(|error| VerifyError::Read { lba, error })?;
        first_mismatch(lba, geometry.block_size, reference, read)?;
    }
    Ok(())
}

/// Writes one `pattern` block from `offset` in the primary buffer, reads it back
/// into the cleared secondary buffer at the same offset and compares.
pub async fn check_write_readback<C, const CAP: usize>(
    card: &mut C,
    scratch: &mut ScratchBuffers<CAP>,
    lba: u32,
    offset: usize,
    pattern: u8,
) -> Result<(), VerifyError<C::Error>>
where
    C: BlockTransport,
{
    let block_size = scratch.geometry().block_size;
    scratch.fill(Scratch::Primary, pattern);
    scratch.fill(Scratch::Secondary, !pattern);
    let (written, read) = scratch.split_mut(offset, offset, 1)?;
    card.write_blocks(lba, written, 1)
        .await
        .map_err(|error| VerifyError::Write { lba, error })?;
    card.read_blocks(lba, read, 1)
        .await
        .map_err(|error| VerifyError::Read { lba, error })?;
    first_mismatch(lba, block_size, written, read)
}
