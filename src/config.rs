use crate::{buffers::BurstGeometry, card::SD_BLOCK_SIZE, verify::BlockRange};

pub const SD_BURST_BLOCKS: u32 = 8;
pub const SD_SCRATCH_CAPACITY: usize =
    SD_BLOCK_SIZE * SD_BURST_BLOCKS as usize + crate::buffers::SCRATCH_SLACK;
pub const SD_BURST_REPEATS: u32 = 1_000;
pub const SD_SESSION_SLOTS: u16 = 999;
pub const SD_DUMP_MAX_BYTES: u32 = 524_288;
pub const SD_BENCH_WINDOW_MS: u64 = 1_000;
pub const SD_STEP_PAUSE_MS: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SdDiagConfig {
    pub geometry: BurstGeometry,
    pub check_lba: u32,
    pub burst_repeats: u32,
    pub read_fill_pattern: u8,
    pub aligned_write_pattern: u8,
    pub unaligned_write_pattern: u8,
    pub badblocks: BlockRange,
    pub test_file: &'static str,
    pub test_payload: &'static [u8],
    pub session_prefix: &'static str,
    pub session_ext: &'static str,
    pub session_slots: u16,
    pub dump_max_bytes: u32,
    pub bench_window_ms: u64,
    pub step_pause_ms: u64,
}

impl SdDiagConfig {
    pub const DEFAULT: Self = Self {
        geometry: BurstGeometry {
            block_size: SD_BLOCK_SIZE,
            burst_blocks: SD_BURST_BLOCKS,
        },
        check_lba: 0,
        burst_repeats: SD_BURST_REPEATS,
        read_fill_pattern: 0x55,
        aligned_write_pattern: 0xAA,
        unaligned_write_pattern: 0xFF,
        badblocks: BlockRange {
            start: 0x10000,
            end: 0x11000,
            burst: SD_BURST_BLOCKS,
            pattern: 0xAA,
        },
        test_file: "/chtest.txt",
        test_payload: b"This is test file\r\n",
        session_prefix: "session_",
        session_ext: ".txt",
        session_slots: SD_SESSION_SLOTS,
        dump_max_bytes: SD_DUMP_MAX_BYTES,
        bench_window_ms: SD_BENCH_WINDOW_MS,
        step_pause_ms: SD_STEP_PAUSE_MS,
    };
}

impl Default for SdDiagConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
