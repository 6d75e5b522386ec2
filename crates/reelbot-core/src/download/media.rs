use std::{
    io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::Result;

/// Suffixes the downloader uses for in-progress files.
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp"];

/// A downloaded media file owned by the caller.
///
/// Call [`MediaFile::remove`] once the reply has been sent. A file that is dropped
/// without being removed is deleted best-effort on drop.
#[derive(Debug)]
pub struct MediaFile {
    path: PathBuf,
    removed: bool,
}

impl MediaFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub async fn remove(mut self) -> Result<()> {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for MediaFile {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn belongs_to(name: &str, id: &str) -> bool {
    name.strip_prefix(id)
        .is_some_and(|rest| rest.starts_with('.'))
}

fn is_partial(name: &str) -> bool {
    PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Most recently modified finished file in `dir` named `<id>.<ext>`.
///
/// Files from other attempts or requests never match because every attempt id is unique.
pub async fn find_output(dir: &Path, id: &str) -> io::Result<Option<PathBuf>> {
    let mut best: Option<(SystemTime, PathBuf)> = None;
    let mut rd = tokio::fs::read_dir(dir).await?;
    while let Some(ent) = rd.next_entry().await? {
        let name = ent.file_name().to_string_lossy().to_string();
        if !belongs_to(&name, id) || is_partial(&name) {
            continue;
        }
        let md = ent.metadata().await?;
        if !md.is_file() {
            continue;
        }
        let modified = md.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if best.as_ref().map(|(t, _)| modified >= *t).unwrap_or(true) {
            best = Some((modified, ent.path()));
        }
    }
    Ok(best.map(|(_, p)| p))
}

/// Remove every file (finished or partial) left behind by attempt `id`.
pub async fn remove_attempt_files(dir: &Path, id: &str) -> io::Result<usize> {
    let mut removed = 0;
    let mut rd = tokio::fs::read_dir(dir).await?;
    while let Some(ent) = rd.next_entry().await? {
        let name = ent.file_name().to_string_lossy().to_string();
        if belongs_to(&name, id) && tokio::fs::remove_file(ent.path()).await.is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}
