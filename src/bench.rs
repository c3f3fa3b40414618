use core::fmt::Write;

use embassy_time::{Duration, Instant};

use crate::{
    buffers::{BufferError, Scratch, ScratchBuffers},
    card::{write_card_info, BlockTransport},
    config::SdDiagConfig,
    session::{MountError, SdSession},
    volume::FatVolume,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BenchPhase {
    SingleAligned,
    BurstAligned,
    SingleUnaligned,
    BurstUnaligned,
}

pub const BENCH_PHASES: [BenchPhase; 4] = [
    BenchPhase::SingleAligned,
    BenchPhase::BurstAligned,
    BenchPhase::SingleUnaligned,
    BenchPhase::BurstUnaligned,
];

pub fn bench_phase_label(phase: BenchPhase) -> &'static str {
    match phase {
        BenchPhase::SingleAligned => "Single block aligned read",
        BenchPhase::BurstAligned => "Sequential blocks aligned read",
        BenchPhase::SingleUnaligned => "Single block unaligned read",
        BenchPhase::BurstUnaligned => "Sequential blocks unaligned read",
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum BenchError<E> {
    Mount(MountError<E>),
    NoCardInfo,
    Read { phase: BenchPhase, error: E },
    Buffer(BufferError),
}

impl<E> From<MountError<E>> for BenchError<E> {
    fn from(value: MountError<E>) -> Self {
        Self::Mount(value)
    }
}

impl<E> From<BufferError> for BenchError<E> {
    fn from(value: BufferError) -> Self {
        Self::Buffer(value)
    }
}

/// Blocks read per second for each phase, in [`BENCH_PHASES`] order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BenchReport {
    pub start_lba: u32,
    pub blocks_per_sec: [u32; 4],
}

/// Read-only throughput measurement in the middle of the card.
///
/// Leaves the transport as it found it: a card connected by the benchmark is
/// disconnected again on every exit.
pub async fn run_read_benchmark<C, V, W, const CAP: usize>(
    session: &mut SdSession<C, V>,
    scratch: &mut ScratchBuffers<CAP>,
    config: &SdDiagConfig,
    out: &mut W,
) -> Result<BenchReport, BenchError<C::Error>>
where
    C: BlockTransport,
    V: FatVolume<C>,
    W: Write,
{
    let was_connected = session.is_connected();
    if let Err(err) = session.connect().await {
        match err {
            MountError::CardNotPresent => {
                let _ = write!(out, "Card not inserted, aborting.\r\n");
            }
            _ => {
                let _ = write!(out, "Connecting... failed\r\n");
            }
        }
        return Err(err.into());
    }
    let _ = write!(out, "Connecting... OK\r\n\r\nCard Info\r\n");

    let result = measure_phases(session.card_mut(), scratch, config, out).await;

    if !was_connected {
        if let Err(err) = session.disconnect().await {
            log::warn!("sdbench: disconnect_error err={:?}", err);
        }
    }
    match &result {
        Ok(report) => log::info!(
            "sdbench: done start={} single={} burst={}",
            report.start_lba,
            report.blocks_per_sec[0],
            report.blocks_per_sec[1]
        ),
        Err(err) => log::warn!("sdbench: failed err={:?}", err),
    }
    result
}

async fn measure_phases<C, W, const CAP: usize>(
    card: &mut C,
    scratch: &mut ScratchBuffers<CAP>,
    config: &SdDiagConfig,
    out: &mut W,
) -> Result<BenchReport, BenchError<C::Error>>
where
    C: BlockTransport,
    W: Write,
{
    let info = card.card_info().ok_or(BenchError::NoCardInfo)?;
    let _ = write_card_info(out, &info);

    let window = Duration::from_millis(config.bench_window_ms.max(1));
    let burst = config.geometry.burst_blocks;
    let block_size = config.geometry.block_size as u32;
    let mut report = BenchReport {
        start_lba: info.capacity_blocks / 2,
        ..BenchReport::default()
    };

    for (idx, phase) in BENCH_PHASES.into_iter().enumerate() {
        let (offset, blocks) = match phase {
            BenchPhase::SingleAligned => (0, 1),
            BenchPhase::BurstAligned => (0, burst),
            BenchPhase::SingleUnaligned => (1, 1),
            BenchPhase::BurstUnaligned => (1, burst),
        };
        let _ = write!(out, "{} performance ({} blocks): ", bench_phase_label(phase), blocks);
        let buf = scratch.view_mut(Scratch::Primary, offset, blocks)?;
        let started = Instant::now();
        let mut total = 0u32;
        loop {
            if let Err(error) = card.read_blocks(report.start_lba, buf, blocks).await {
                let _ = write!(out, "failed\r\n");
                return Err(BenchError::Read { phase, error });
            }
            total += blocks;
            if started.elapsed() >= window {
                break;
            }
        }
        let elapsed_ms = started.elapsed().as_millis().max(1);
        let rate = (total as u64 * 1000 / elapsed_ms) as u32;
        report.blocks_per_sec[idx] = rate;
        let _ = write!(
            out,
            "{} blocks/S, {} bytes/S\r\n",
            rate,
            rate as u64 * block_size as u64
        );
    }
    Ok(report)
}
