use crate::checkpoint::format;
use crate::error::{FtError, Result};
use crate::types::{Rank, Round};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// File name prefix shared by every checkpoint this harness writes.
pub const FILE_PREFIX: &str = "ftreduce-checkpoint";

/// Persists and restores one participant's buffer, keyed by round.
///
/// Paths are a pure function of `(rank, round)`, so a relaunched process
/// with the same rank finds the files its previous incarnation wrote.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    rank: Rank,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, rank: Rank) -> Self {
        Self {
            dir: dir.into(),
            rank,
        }
    }

    /// Location of the snapshot for `round`.
    pub fn path_for(&self, round: Round) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}-{}-{round}", self.rank))
    }

    /// Whether a snapshot for `round` is present.
    pub fn exists(&self, round: Round) -> bool {
        self.path_for(round).is_file()
    }

    /// Persist `buffer` as the snapshot for `round`.
    ///
    /// The record is written to a temporary sibling, synced, then renamed over
    /// the final path: a reader never observes a partially written snapshot,
    /// and saving the same round twice overwrites the first one.
    pub async fn save(&self, buffer: &[f32], round: Round) -> Result<PathBuf> {
        let path = self.path_for(round);
        tracing::info!(rank = self.rank, round, path = %path.display(), "starting checkpoint");

        let record = format::encode(buffer);
        let tmp = path.with_extension("tmp");
        if let Err(e) = write_atomic(&tmp, &path, &record).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(FtError::CheckpointWrite {
                round,
                path,
                reason: e.to_string(),
            });
        }

        tracing::info!(rank = self.rank, round, bytes = record.len(), "done checkpoint");
        Ok(path)
    }

    /// Restore the snapshot for `round`, which must hold exactly
    /// `expected_elements` values.
    pub async fn load(&self, round: Round, expected_elements: usize) -> Result<Vec<f32>> {
        let path = self.path_for(round);
        let read_err = |reason: String| FtError::CheckpointRead {
            round,
            path: path.clone(),
            reason,
        };

        tracing::info!(rank = self.rank, round, path = %path.display(), "loading checkpoint");
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| read_err(e.to_string()))?;
        let values = format::decode(&bytes).map_err(|e| read_err(e.to_string()))?;
        if values.len() != expected_elements {
            return Err(read_err(format!(
                "snapshot holds {} elements, expected {expected_elements}",
                values.len()
            )));
        }

        tracing::info!(rank = self.rank, round, "done loading checkpoint");
        Ok(values)
    }
}

async fn write_atomic(tmp: &Path, path: &Path, record: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(tmp).await?;
    file.write_all(record).await?;
    file.sync_all().await?;
    tokio::fs::rename(tmp, path).await
}
