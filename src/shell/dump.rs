use core::fmt::{self, Write};

use crate::{
    buffers::ScratchBuffers,
    card::BlockTransport,
    session::{MountedVolume, SdSession},
    volume::{fs_error_label, FatVolume, FileStat, FsError},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpMode {
    Text,
    Hex,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DumpReport {
    pub size: u32,
    pub dumped: u32,
    pub truncated: bool,
}

/// One `%08x: ` line per 16 bytes: hex in pairs, an extra gap after the eighth
/// byte, then the printable column. Only the final line may be short.
pub fn write_hex_dump<W: Write>(out: &mut W, base: u32, bytes: &[u8]) -> fmt::Result {
    for (line_idx, line) in bytes.chunks(16).enumerate() {
        write!(out, "{:08x}: ", base as usize + line_idx * 16)?;
        for (i, byte) in line.iter().enumerate() {
            write!(out, "{:02x}", byte)?;
            if i & 1 == 1 {
                out.write_char(' ')?;
            }
            if i == 7 {
                out.write_char(' ')?;
            }
        }
        out.write_char(' ')?;
        for &byte in line {
            let shown = if (0x20..0x7f).contains(&byte) {
                byte as char
            } else {
                '.'
            };
            out.write_char(shown)?;
        }
        out.write_str("\r\n")?;
    }
    Ok(())
}

pub fn write_text<W: Write>(out: &mut W, bytes: &[u8]) -> fmt::Result {
    for chunk in bytes.utf8_chunks() {
        out.write_str(chunk.valid())?;
        if !chunk.invalid().is_empty() {
            out.write_char(char::REPLACEMENT_CHARACTER)?;
        }
    }
    Ok(())
}

fn utf8_width(lead: u8) -> usize {
    match lead {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 1,
    }
}

/// Start of a truncated multi-byte sequence at the end of `bytes`, or its length.
fn incomplete_tail_start(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let byte = bytes[len - back];
        if byte & 0xC0 != 0x80 {
            return if utf8_width(byte) > back { len - back } else { len };
        }
    }
    len
}

/// Lossy text output over consecutive reads. A character split between two
/// chunks is held back until the rest of it arrives.
#[derive(Debug, Default)]
pub struct TextStream {
    tail: [u8; 4],
    len: usize,
}

impl TextStream {
    pub fn write<W: Write>(&mut self, out: &mut W, mut bytes: &[u8]) -> fmt::Result {
        if self.len > 0 {
            let need = utf8_width(self.tail[0]);
            let take = (need - self.len).min(bytes.len());
            self.tail[self.len..self.len + take].copy_from_slice(&bytes[..take]);
            self.len += take;
            bytes = &bytes[take..];
            if self.len < need {
                return Ok(());
            }
            self.finish(out)?;
        }
        let split = incomplete_tail_start(bytes);
        write_text(out, &bytes[..split])?;
        let rest = &bytes[split..];
        self.tail[..rest.len()].copy_from_slice(rest);
        self.len = rest.len();
        Ok(())
    }

    /// Flushes a held partial character as U+FFFD.
    pub fn finish<W: Write>(&mut self, out: &mut W) -> fmt::Result {
        let held = self.len;
        self.len = 0;
        write_text(out, &self.tail[..held])
    }
}

async fn open_for_dump<C, V>(
    fs: &mut MountedVolume<'_, C, V>,
    path: &str,
) -> Result<(FileStat, V::File), FsError>
where
    C: BlockTransport,
    V: FatVolume<C>,
{
    let stat = fs.stat(path).await?;
    if stat.is_dir {
        return Err(FsError::Denied);
    }
    Ok((stat, fs.open_read(path).await?))
}

/// Streams `path` to `out` through the scratch chunk, stopping at `max_bytes`.
pub(super) async fn dump_file<C, V, W, const CAP: usize>(
    session: &mut SdSession<C, V>,
    scratch: &mut ScratchBuffers<CAP>,
    path: &str,
    mode: DumpMode,
    max_bytes: u32,
    out: &mut W,
) -> Result<DumpReport, FsError>
where
    C: BlockTransport,
    V: FatVolume<C>,
    W: Write,
{
    let mut fs = session.fs().ok_or(FsError::NotReady)?;
    let (stat, mut file) = match open_for_dump(&mut fs, path).await {
        Ok(opened) => opened,
        Err(err) => {
            let _ = write!(out, "Error to open file {}, err:{}\r\n", path, err.code());
            return Err(err);
        }
    };

    let truncated = stat.size > max_bytes;
    if truncated {
        let _ = write!(
            out,
            "Read file: {}, size={} is too big shall not exceed {}\r\n",
            path, stat.size, max_bytes
        );
    } else {
        let _ = write!(out, "Read file: {}, size={}\r\n", path, stat.size);
    }

    let limit = stat.size.min(max_bytes);
    let mut dumped = 0u32;
    let mut result = Ok(());
    let mut text = TextStream::default();
    while dumped < limit {
        let chunk = scratch.chunk_mut();
        let want = chunk.len().min((limit - dumped) as usize);
        let read = match fs.read(&mut file, &mut chunk[..want]).await {
            Ok(read) => read,
            Err(err) => {
                let _ = write!(out, "Error to read file, err:{}\r\n", err.code());
                log::warn!("sdshell: dump_read_error path={} fs={}", path, fs_error_label(err));
                result = Err(err);
                break;
            }
        };
        if read == 0 {
            break;
        }
        let _ = match mode {
            DumpMode::Hex => write_hex_dump(out, dumped, &chunk[..read]),
            DumpMode::Text => text.write(out, &chunk[..read]),
        };
        dumped += read as u32;
    }
    if mode == DumpMode::Text {
        let _ = text.finish(out);
        let _ = out.write_str("\r\n");
    }

    let closed = fs.close(file).await;
    result?;
    closed?;
    Ok(DumpReport {
        size: stat.size,
        dumped,
        truncated,
    })
}
