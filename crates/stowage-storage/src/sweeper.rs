use crate::traits::StorageResult;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Removes orphaned decoder output.
///
/// A request that dies between decoding and cleanup (client disconnect, process kill)
/// leaves its parts in the decode directory. The sweeper deletes regular files there
/// that have not been modified for `max_age`.
#[derive(Debug, Clone)]
pub struct ScratchSweeper {
    dir: PathBuf,
    max_age: Duration,
    interval: Duration,
}

/// Running sweeper task.
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.join.await {
            tracing::warn!(error = %e, "Scratch sweeper task ended abnormally");
        }
    }
}

impl ScratchSweeper {
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration, interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
            interval,
        }
    }

    /// Start the background sweep loop. The first sweep runs immediately.
    pub fn start(self: Arc<Self>) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let join = tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.sweep_once().await {
                            Ok(0) => {}
                            Ok(removed) => {
                                tracing::info!(
                                    removed,
                                    dir = %self.dir.display(),
                                    "Scratch sweep removed stale files"
                                );
                            }
                            Err(e) => tracing::error!(error = %e, "Scratch sweep failed"),
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }

            tracing::debug!("Scratch sweeper stopped");
        });

        SweeperHandle { shutdown_tx, join }
    }

    /// Delete every regular file older than `max_age`. Returns how many were removed.
    #[tracing::instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn sweep_once(&self) -> StorageResult<usize> {
        let now = SystemTime::now();
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                // Raced with request cleanup
                Err(_) => continue,
            };
            if !metadata.is_file() {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < self.max_age {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %entry.path().display(),
                        "Failed to remove stale scratch file"
                    );
                }
            }
        }

        Ok(removed)
    }
}
