//! [`SpotChecker`] – runs the full check pipeline for one spot or all spots.
//!
//! A check takes a fresh snapshot, renders the spot's memory into context,
//! asks the analyzer for a verdict and stores the result, which in turn
//! feeds the memory of the next check.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::{StreamExt, stream};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use twinsync_memory::{SpotStore, SpotSummary, StoreError, render_context};
use twinsync_types::{SpotError, SpotStatus, StoredCheck};

use crate::camera::SnapshotSource;
use crate::vision::SpotAnalyzer;

/// Default number of spots checked at once by [`SpotChecker::check_all`].
pub const DEFAULT_CHECK_ALL_CONCURRENCY: usize = 2;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Spot not found: {0}")]
    NotFound(i64),
    #[error("Spot is snoozed until {0}")]
    Snoozed(DateTime<Utc>),
    #[error("Failed to get camera snapshot")]
    SnapshotUnavailable,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CheckError> for SpotError {
    fn from(err: CheckError) -> Self {
        match err {
            CheckError::NotFound(id) => SpotError::NotFound(id),
            CheckError::Snoozed(until) => SpotError::Snoozed(until),
            CheckError::SnapshotUnavailable => SpotError::SnapshotUnavailable,
            CheckError::Store(e) => e.into(),
        }
    }
}

/// Result of one spot within a batch check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub spot_id: i64,
    pub spot_name: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Checked { status: SpotStatus, score: u8 },
    Failed { error: String },
}

/// Orchestrates camera, analyzer and store.
///
/// Cloning is cheap; clones share the same store and clients.
#[derive(Clone)]
pub struct SpotChecker {
    store: Arc<SpotStore>,
    camera: Arc<dyn SnapshotSource>,
    analyzer: Arc<dyn SpotAnalyzer>,
    concurrency: usize,
}

impl SpotChecker {
    pub fn new(
        store: Arc<SpotStore>,
        camera: Arc<dyn SnapshotSource>,
        analyzer: Arc<dyn SpotAnalyzer>,
    ) -> Self {
        Self {
            store,
            camera,
            analyzer,
            concurrency: DEFAULT_CHECK_ALL_CONCURRENCY,
        }
    }

    /// Number of spots checked at once by [`check_all`][Self::check_all];
    /// clamped to at least one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &Arc<SpotStore> {
        &self.store
    }

    pub fn camera(&self) -> &Arc<dyn SnapshotSource> {
        &self.camera
    }

    /// Run `f` against the store on the blocking thread pool.
    ///
    /// SQLite calls hold the store's connection lock; async callers go
    /// through here so they never block a runtime worker.
    pub async fn with_store<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&SpotStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| StoreError::Interrupted(e.to_string()))?
    }

    /// Check one spot now and return the stored check.
    ///
    /// # Errors
    ///
    /// [`CheckError::NotFound`] for an unknown id, [`CheckError::Snoozed`]
    /// while the spot is snoozed, [`CheckError::SnapshotUnavailable`] when the
    /// camera cannot be read.  Analysis failures are not errors; they are
    /// stored as unknown results.
    #[instrument(skip(self))]
    pub async fn check_spot(&self, spot_id: i64) -> Result<StoredCheck, CheckError> {
        let summary = self
            .with_store(move |store| store.get_spot(spot_id))
            .await?
            .ok_or(CheckError::NotFound(spot_id))?;
        if let Some(until) = summary.spot.snoozed_until.filter(|u| *u > Utc::now()) {
            return Err(CheckError::Snoozed(until));
        }
        self.run(summary).await
    }

    /// Check every spot that is not snoozed.
    ///
    /// Spots are processed `concurrency` at a time; outcomes keep the order of
    /// [`SpotStore::list_spots`].  A failure on one spot is reported in its
    /// outcome and does not stop the batch.
    #[instrument(skip(self))]
    pub async fn check_all(&self) -> Result<Vec<CheckOutcome>, CheckError> {
        let now = Utc::now();
        let due: Vec<SpotSummary> = self
            .with_store(|store| store.list_spots())
            .await?
            .into_iter()
            .filter(|s| !s.spot.is_snoozed_at(now))
            .collect();
        info!(spots = due.len(), concurrency = self.concurrency, "checking all spots");

        let outcomes: Vec<CheckOutcome> = stream::iter(due)
            .map(|summary| async move {
                let spot_id = summary.spot.id;
                let spot_name = summary.spot.name.clone();
                let outcome = match self.run(summary).await {
                    Ok(check) => Outcome::Checked {
                        status: check.record.status,
                        score: check.record.score,
                    },
                    Err(e) => Outcome::Failed {
                        error: e.to_string(),
                    },
                };
                CheckOutcome {
                    spot_id,
                    spot_name,
                    outcome,
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;
        Ok(outcomes)
    }

    async fn run(&self, summary: SpotSummary) -> Result<StoredCheck, CheckError> {
        let spot = summary.spot;
        let Some(image) = self.camera.snapshot(&spot.camera_entity_id).await else {
            warn!(spot_id = spot.id, camera = %spot.camera_entity_id, "no snapshot");
            return Err(CheckError::SnapshotUnavailable);
        };

        let context = render_context(summary.memory.as_ref());
        let record = self
            .analyzer
            .analyze(&image, &spot.description, spot.voice, &context)
            .await;
        let (spot_id, stored) = (spot.id, record.clone());
        let id = self
            .with_store(move |store| store.add_check(spot_id, &stored))
            .await?;
        info!(
            spot_id = spot.id,
            check_id = id,
            status = %record.status,
            score = record.score,
            "spot checked"
        );

        Ok(StoredCheck {
            id,
            spot_id: spot.id,
            record,
        })
    }
}
