use core::fmt::Write;

use heapless::Vec;

use super::SdPath;
use crate::{
    card::BlockTransport,
    session::MountedVolume,
    volume::{fs_error_label, DirEntry, FatVolume, FsError},
};

/// Deepest directory nesting walked; anything below is reported as skipped.
pub const LS_STACK_MAX: usize = 16;
const LS_PAGE: usize = 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListingReport {
    pub files: u32,
    pub dirs: u32,
    pub skipped_dirs: u32,
}

impl ListingReport {
    pub fn is_complete(&self) -> bool {
        self.skipped_dirs == 0
    }
}

/// One open directory: its path and how many entries were already consumed.
struct Cursor {
    path: SdPath,
    skip: usize,
}

fn normalized_root(path: &str) -> Result<SdPath, FsError> {
    let mut root = SdPath::new();
    let trimmed = path.trim_end_matches('/');
    if !trimmed.is_empty() && !trimmed.starts_with('/') {
        root.push('/').map_err(|_| FsError::InvalidName)?;
    }
    root.push_str(trimmed).map_err(|_| FsError::InvalidName)?;
    Ok(root)
}

fn child_path(parent: &str, name: &str) -> Option<SdPath> {
    let mut child = SdPath::new();
    child.push_str(parent).ok()?;
    child.push('/').ok()?;
    child.push_str(name).ok()?;
    Some(child)
}

fn shown(path: &str) -> &str {
    if path.is_empty() {
        "."
    } else {
        path
    }
}

/// Prints every file under `path` as `<dir>/<name> <size> bytes`, the root shown
/// as `.`, walking depth first in listing order. Names starting with `.` are
/// skipped. Directories nested deeper than [`LS_STACK_MAX`] or whose path does
/// not fit are printed as skipped and counted in the report.
pub(super) async fn list_tree<C, V, W>(
    fs: &mut MountedVolume<'_, C, V>,
    path: &str,
    out: &mut W,
) -> Result<ListingReport, FsError>
where
    C: BlockTransport,
    V: FatVolume<C>,
    W: Write,
{
    let root = match normalized_root(path) {
        Ok(root) => root,
        Err(err) => {
            let _ = write!(out, "scan on dir={} failed err:{}\r\n", path, err.code());
            log::warn!("sdshell: ls_error dir={} fs={}", path, fs_error_label(err));
            return Err(err);
        }
    };

    let mut report = ListingReport {
        dirs: 1,
        ..ListingReport::default()
    };
    let mut stack: Vec<Cursor, LS_STACK_MAX> = Vec::new();
    let _ = stack.push(Cursor { path: root, skip: 0 });

    let mut entries = [DirEntry::EMPTY; LS_PAGE];
    while let Some(cursor) = stack.last() {
        let dir = shown(&cursor.path);
        let query = if cursor.path.is_empty() { "/" } else { cursor.path.as_str() };
        let count = match fs.list_dir(query, cursor.skip, &mut entries).await {
            Ok(count) => count,
            Err(err) => {
                let _ = write!(out, "scan on dir={} failed err:{}\r\n", dir, err.code());
                log::warn!("sdshell: ls_error dir={} fs={}", dir, fs_error_label(err));
                return Err(err);
            }
        };

        let mut consumed = 0;
        let mut descend = None;
        for entry in &entries[..count] {
            consumed += 1;
            if entry.name.starts_with('.') {
                continue;
            }
            if !entry.is_dir {
                let _ = write!(out, "{}/{} {} bytes\r\n", dir, entry.name, entry.size);
                report.files += 1;
                continue;
            }
            match child_path(&cursor.path, &entry.name) {
                Some(child) if !stack.is_full() => {
                    descend = Some(child);
                    break;
                }
                _ => {
                    let _ = write!(out, "scan on dir={}/{} skipped\r\n", dir, entry.name);
                    log::warn!("sdshell: ls_skip dir={} name={}", dir, entry.name);
                    report.skipped_dirs += 1;
                }
            }
        }

        let exhausted = descend.is_none() && count < LS_PAGE;
        if let Some(cursor) = stack.last_mut() {
            cursor.skip += consumed;
        }
        if let Some(child) = descend {
            report.dirs += 1;
            let _ = stack.push(Cursor { path: child, skip: 0 });
        } else if exhausted {
            stack.pop();
        }
    }
    Ok(report)
}
