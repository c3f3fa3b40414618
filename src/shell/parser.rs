use super::{SdPath, ShellCommand};
use crate::SD_PATH_MAX;

pub fn parse_shell_command(line: &[u8]) -> Option<ShellCommand> {
    let trimmed = trim_ascii_whitespace(line);
    match trimmed {
        b"SDTEST" => return Some(ShellCommand::Test),
        b"SDERASE" => return Some(ShellCommand::Erase),
        b"SDMOUNT" => return Some(ShellCommand::Mount),
        b"SDUMOUNT" => return Some(ShellCommand::Umount),
        b"SDBENCH" => return Some(ShellCommand::Bench),
        _ => {}
    }
    if let Some(path) = parse_optional_path_command(trimmed, b"SDLS") {
        return Some(ShellCommand::Ls { path });
    }
    if let Some(path) = parse_single_path_command(trimmed, b"SDCAT") {
        return Some(ShellCommand::Cat { path });
    }
    if let Some(path) = parse_single_path_command(trimmed, b"SDHD") {
        return Some(ShellCommand::Hd { path });
    }
    None
}

fn strip_command<'a>(trimmed: &'a [u8], cmd: &[u8]) -> Option<&'a [u8]> {
    let rest = trimmed.strip_prefix(cmd)?;
    match rest.first() {
        None => Some(rest),
        Some(byte) if byte.is_ascii_whitespace() => Some(rest),
        Some(_) => None,
    }
}

fn parse_optional_path_command(trimmed: &[u8], cmd: &[u8]) -> Option<SdPath> {
    let rest = trim_ascii_whitespace(strip_command(trimmed, cmd)?);
    if rest.is_empty() {
        let mut path = SdPath::new();
        path.push('/').ok()?;
        return Some(path);
    }
    parse_sole_path(rest)
}

fn parse_single_path_command(trimmed: &[u8], cmd: &[u8]) -> Option<SdPath> {
    let rest = trim_ascii_whitespace(strip_command(trimmed, cmd)?);
    parse_sole_path(rest)
}

fn parse_sole_path(rest: &[u8]) -> Option<SdPath> {
    let (path, next_i) = parse_path_token(rest, 0)?;
    if next_i != rest.len() {
        return None;
    }
    Some(path)
}

fn parse_path_token(line: &[u8], start: usize) -> Option<(SdPath, usize)> {
    if start >= line.len() {
        return None;
    }
    let mut end = start;
    while end < line.len() && !line[end].is_ascii_whitespace() {
        end += 1;
    }
    let token = &line[start..end];
    if token.is_empty() || token.len() > SD_PATH_MAX {
        return None;
    }
    let token = core::str::from_utf8(token).ok()?;
    let mut path = SdPath::new();
    path.push_str(token).ok()?;
    Some((path, end))
}

pub(super) fn trim_ascii_whitespace(line: &[u8]) -> &[u8] {
    let mut start = 0usize;
    let mut end = line.len();
    while start < end && line[start].is_ascii_whitespace() {
        start += 1;
    }
    while end > start && line[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    &line[start..end]
}
