mod ram_card;
mod ram_volume;

pub(crate) use ram_card::{Access, RamCard, RamCardError};
pub(crate) use ram_volume::RamVolume;

use crate::{buffers::BurstGeometry, config::SdDiagConfig, session::SdSession};

pub(crate) const TEST_BLOCK_SIZE: usize = 16;
pub(crate) const TEST_BURST_BLOCKS: u32 = 4;
pub(crate) const TEST_CAPACITY: usize = TEST_BLOCK_SIZE * TEST_BURST_BLOCKS as usize + 8;
pub(crate) const TEST_GEOMETRY: BurstGeometry = BurstGeometry {
    block_size: TEST_BLOCK_SIZE,
    burst_blocks: TEST_BURST_BLOCKS,
};

pub(crate) fn test_config() -> SdDiagConfig {
    let mut config = SdDiagConfig::DEFAULT;
    config.geometry = TEST_GEOMETRY;
    config.burst_repeats = 5;
    config.badblocks.start = 64;
    config.badblocks.end = 96;
    config.badblocks.burst = TEST_BURST_BLOCKS;
    config.bench_window_ms = 5;
    config.step_pause_ms = 0;
    config
}

pub(crate) fn test_session() -> SdSession<RamCard, RamVolume> {
    SdSession::new(RamCard::new(TEST_BLOCK_SIZE, 256), RamVolume::new())
}
