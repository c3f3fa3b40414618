mod steps;

pub use steps::{campaign_step_label, CampaignStep, DESTRUCTIVE_STEPS, NONDESTRUCTIVE_STEPS};

use core::fmt::Write;

use embassy_time::Timer;

use crate::{
    buffers::ScratchBuffers,
    card::{write_csd, BlockTransport},
    config::SdDiagConfig,
    confirm::ConfirmGate,
    session::{MountError, MountedVolume, SdSession},
    verify::{
        check_aligned_read, check_repeated_burst, check_unaligned_read, check_write_readback,
        verify_range, VerifyError,
    },
    volume::{write_free_space, FatVolume, FreeSpace, FsError},
};

#[derive(Debug, PartialEq, Eq)]
pub enum StepError<E> {
    Declined,
    NotMounted,
    Mount(MountError<E>),
    Verify(VerifyError<E>),
    Fs(FsError),
    Disconnect(E),
    SizeMismatch { expected: u32, found: u32 },
    ContentMismatch { offset: usize },
}

impl<E> From<MountError<E>> for StepError<E> {
    fn from(value: MountError<E>) -> Self {
        Self::Mount(value)
    }
}

impl<E> From<VerifyError<E>> for StepError<E> {
    fn from(value: VerifyError<E>) -> Self {
        Self::Verify(value)
    }
}

impl<E> From<FsError> for StepError<E> {
    fn from(value: FsError) -> Self {
        Self::Fs(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CampaignSummary {
    pub passed: u32,
}

/// First failing step; `passed` counts the steps that completed before it.
#[derive(Debug, PartialEq, Eq)]
pub struct CampaignFailure<E> {
    pub step: CampaignStep,
    pub passed: u32,
    pub error: StepError<E>,
}

pub type CampaignResult<E> = Result<CampaignSummary, CampaignFailure<E>>;

/// Runs the card self-test sequences against one session.
pub struct Diagnostics<'a, C, V: FatVolume<C>, const CAP: usize>
where
    C: BlockTransport,
{
    session: &'a mut SdSession<C, V>,
    scratch: &'a mut ScratchBuffers<CAP>,
    config: &'a SdDiagConfig,
    open_file: Option<V::File>,
    free: Option<FreeSpace>,
}

impl<'a, C, V, const CAP: usize> Diagnostics<'a, C, V, CAP>
where
    C: BlockTransport,
    V: FatVolume<C>,
{
    pub fn new(
        session: &'a mut SdSession<C, V>,
        scratch: &'a mut ScratchBuffers<CAP>,
        config: &'a SdDiagConfig,
    ) -> Self {
        Self {
            session,
            scratch,
            config,
            open_file: None,
            free: None,
        }
    }

    pub async fn run_nondestructive<W: Write>(
        &mut self,
        out: &mut W,
    ) -> CampaignResult<C::Error> {
        self.run(NONDESTRUCTIVE_STEPS, 0, out).await
    }

    /// Asks `gate` first; a declined confirmation returns before any card access.
    pub async fn run_destructive<G, W>(
        &mut self,
        gate: &mut G,
        out: &mut W,
    ) -> CampaignResult<C::Error>
    where
        G: ConfirmGate,
        W: Write,
    {
        let _ = write!(out, "{}... ", CampaignStep::Confirm);
        if !gate.confirm().await {
            let _ = write!(out, "KO declined\r\n");
            log::warn!("sdcampaign: destructive_declined");
            return Err(CampaignFailure {
                step: CampaignStep::Confirm,
                passed: 0,
                error: StepError::Declined,
            });
        }
        let _ = write!(out, "OK\r\n");
        self.run(DESTRUCTIVE_STEPS, 1, out).await
    }

    async fn run<W: Write>(
        &mut self,
        steps: &[CampaignStep],
        mut passed: u32,
        out: &mut W,
    ) -> CampaignResult<C::Error> {
        for &step in steps {
            let _ = write!(out, "{}... ", step);
            self.pause().await;
            if let Err(error) = self.run_step(step).await {
                let _ = write!(out, "KO {:?}\r\n", error);
                log::warn!(
                    "sdcampaign: step_failed step={} passed={} err={:?}",
                    campaign_step_label(step),
                    passed,
                    error
                );
                self.abort().await;
                return Err(CampaignFailure {
                    step,
                    passed,
                    error,
                });
            }
            let _ = write!(out, "OK\r\n");
            self.report(step, out);
            passed += 1;
        }
        let _ = write!(
            out,
            "------------------------------------------------------\r\nAll tests passed successfully.\r\n"
        );
        log::info!("sdcampaign: done passed={}", passed);
        Ok(CampaignSummary { passed })
    }

    async fn pause(&self) {
        if self.config.step_pause_ms > 0 {
            Timer::after_millis(self.config.step_pause_ms).await;
        }
    }

    fn report<W: Write>(&self, step: CampaignStep, out: &mut W) {
        match step {
            CampaignStep::Connect => {
                if let Some(info) = self.session.card().card_info() {
                    let _ = write_csd(out, &info);
                }
            }
            CampaignStep::FreeSpace => {
                if let Some(free) = self.free {
                    let _ = write_free_space(out, &free, self.config.geometry.block_size);
                }
            }
            _ => {}
        }
    }

    async fn abort(&mut self) {
        if let Some(file) = self.open_file.take() {
            if let Some(mut fs) = self.session.fs() {
                let _ = fs.close(file).await;
            }
        }
        self.session.release().await;
    }

    async fn run_step(&mut self, step: CampaignStep) -> Result<(), StepError<C::Error>> {
        let config = self.config;
        match step {
            CampaignStep::Confirm => Ok(()),
            CampaignStep::Connect => Ok(self.session.connect().await?),
            CampaignStep::AlignedRead => {
                check_aligned_read(self.session.card_mut(), self.scratch, config.check_lba).await?;
                Ok(())
            }
            CampaignStep::UnalignedRead { offset } => {
                let card = self.session.card_mut();
                check_unaligned_read(card, self.scratch, config.check_lba, offset).await?;
                Ok(())
            }
            CampaignStep::BurstCompare { offset } => {
                check_repeated_burst(
                    self.session.card_mut(),
                    self.scratch,
                    config.check_lba,
                    offset,
                    config.burst_repeats,
                    config.read_fill_pattern,
                )
                .await?;
                Ok(())
            }
            CampaignStep::AlignedWrite => {
                check_write_readback(
                    self.session.card_mut(),
                    self.scratch,
                    config.check_lba,
                    0,
                    config.aligned_write_pattern,
                )
                .await?;
                Ok(())
            }
            CampaignStep::UnalignedWrite => {
                check_write_readback(
                    self.session.card_mut(),
                    self.scratch,
                    config.check_lba,
                    1,
                    config.unaligned_write_pattern,
                )
                .await?;
                Ok(())
            }
            CampaignStep::BadBlocks => {
                verify_range(self.session.card_mut(), self.scratch, config.badblocks).await?;
                Ok(())
            }
            CampaignStep::Mount => {
                self.session.ensure_mounted().await?;
                Ok(())
            }
            CampaignStep::Format => {
                let mut fs = self.session.fs().ok_or(StepError::NotMounted)?;
                Ok(fs.format().await?)
            }
            CampaignStep::FreeSpace => {
                let mut fs = self.session.fs().ok_or(StepError::NotMounted)?;
                self.free = Some(fs.free_space().await?);
                Ok(())
            }
            CampaignStep::CreateFile => {
                let mut fs = self.session.fs().ok_or(StepError::NotMounted)?;
                self.open_file = Some(fs.create(config.test_file).await?);
                Ok(())
            }
            CampaignStep::WriteFile => {
                let mut fs = self.session.fs().ok_or(StepError::NotMounted)?;
                let file = self
                    .open_file
                    .as_mut()
                    .ok_or(StepError::Fs(FsError::InvalidObject))?;
                let written = fs.write(file, config.test_payload).await?;
                if written != config.test_payload.len() {
                    return Err(StepError::SizeMismatch {
                        expected: config.test_payload.len() as u32,
                        found: written as u32,
                    });
                }
                Ok(())
            }
            CampaignStep::CloseFile => {
                let file = self
                    .open_file
                    .take()
                    .ok_or(StepError::Fs(FsError::InvalidObject))?;
                let mut fs = self.session.fs().ok_or(StepError::NotMounted)?;
                Ok(fs.close(file).await?)
            }
            CampaignStep::StatFile => {
                let mut fs = self.session.fs().ok_or(StepError::NotMounted)?;
                let stat = fs.stat(config.test_file).await?;
                if stat.size as usize != config.test_payload.len() {
                    return Err(StepError::SizeMismatch {
                        expected: config.test_payload.len() as u32,
                        found: stat.size,
                    });
                }
                Ok(())
            }
            CampaignStep::ReadBackFile => {
                let mut fs = self.session.fs().ok_or(StepError::NotMounted)?;
                let mut file = fs.open_read(config.test_file).await?;
                let chunk = self.scratch.chunk_mut();
                let compared = compare_file(&mut fs, &mut file, config.test_payload, chunk).await;
                let closed = fs.close(file).await;
                compared?;
                Ok(closed?)
            }
            CampaignStep::DeleteFile => {
                let mut fs = self.session.fs().ok_or(StepError::NotMounted)?;
                Ok(fs.remove(config.test_file).await?)
            }
            CampaignStep::UnmountVolume => Ok(self.session.unmount_volume().await?),
            CampaignStep::Disconnect => self
                .session
                .disconnect()
                .await
                .map_err(StepError::Disconnect),
        }
    }
}

async fn compare_file<C, V>(
    fs: &mut MountedVolume<'_, C, V>,
    file: &mut V::File,
    expected: &[u8],
    chunk: &mut [u8],
) -> Result<(), StepError<C::Error>>
where
    C: BlockTransport,
    V: FatVolume<C>,
{
    let mut offset = 0;
    loop {
        let read = fs.read(file, chunk).await?;
        if read == 0 {
            break;
        }
        let end = offset + read;
        if end > expected.len() {
            return Err(StepError::SizeMismatch {
                expected: expected.len() as u32,
                found: end as u32,
            });
        }
        if let Some(idx) = expected[offset..end]
            .iter()
            .zip(chunk[..read].iter())
            .position(|(a, b)| a != b)
        {
            return Err(StepError::ContentMismatch { offset: offset + idx });
        }
        offset = end;
    }
    if offset != expected.len() {
        return Err(StepError::SizeMismatch {
            expected: expected.len() as u32,
            found: offset as u32,
        });
    }
    Ok(())
}
