use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::OwnedMutexGuard;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Subtitles,
    Text,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Subtitles => "srt",
            ArtifactKind::Text => "txt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

/// `{video_id}_{language}`, the file stem and the lock key of one output.
pub fn output_stem(video_id: &str, language: &str) -> String {
    format!("{}_{}", video_id, language)
}

/// One async lock per output stem, so runs writing the same files take turns
/// while runs for other videos or languages proceed.
#[derive(Default)]
pub struct OutputLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl OutputLocks {
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // drop locks nobody holds or waits for
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Writes every artifact or none. Contents are staged in temporary files next
/// to their targets and only then moved into place; if a move fails, the
/// artifacts already moved are removed again.
pub fn write_artifacts(
    dir: &Path,
    stem: &str,
    contents: &[(ArtifactKind, String)],
) -> Result<Vec<Artifact>> {
    let mut staged = Vec::with_capacity(contents.len());

    for (kind, content) in contents {
        let path = dir.join(format!("{}.{}", stem, kind.extension()));
        let failed = |source| Error::Output {
            path: path.clone(),
            source,
        };

        let mut file = tempfile::Builder::new()
            .prefix(".subgrab-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(failed)?;
        file.write_all(content.as_bytes()).map_err(failed)?;
        file.as_file().sync_all().map_err(failed)?;

        staged.push((*kind, path, file));
    }

    let mut written: Vec<Artifact> = Vec::with_capacity(staged.len());
    for (kind, path, file) in staged {
        if let Err(e) = file.persist(&path) {
            for artifact in &written {
                if let Err(remove) = std::fs::remove_file(&artifact.path) {
                    log::warn!("could not remove {:?}: {}", artifact.path, remove);
                }
            }
            return Err(Error::Output {
                path,
                source: e.error,
            });
        }
        log::info!("saved {:?}", path);
        written.push(Artifact { kind, path });
    }

    Ok(written)
}
