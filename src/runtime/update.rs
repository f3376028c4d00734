//! Update orchestrator - check, download, extract and load in one operation.
//!
//! Stages run strictly in sequence. The first failing stage aborts the
//! pipeline and its error is passed through unchanged. Progress of the two
//! long-running stages is blended into a single 0-100 value: download
//! covers the lower half and extract the upper half.

use std::future::{Future, IntoFuture};
use std::sync::Arc;

use crate::api::types::{ApiError, DeployStage};
use crate::runtime::deferred::{Deferred, Promise};
use crate::runtime::deploy::Deploy;

/// Share of the combined progress covered by each stage
const STAGE_SHARE: f64 = 50.0;

/// Combined progress for the download and extract stages.
///
/// Emitted values are clamped to [0, 100] and never decrease.
#[derive(Debug, Default, Clone, Copy)]
pub struct UpdateProgress {
    /// Contribution of the download stage
    download: f64,
    /// Last emitted value
    emitted: f64,
}

impl UpdateProgress {
    /// Map download progress `p` (0-100) to `p / 2`.
    pub fn download_progress(&mut self, progress: f64) -> f64 {
        self.download = (progress / 2.0).clamp(0.0, STAGE_SHARE);
        self.emit(self.download)
    }

    /// The download finished: its half is complete.
    pub fn download_complete(&mut self) -> f64 {
        self.download = STAGE_SHARE;
        self.emit(self.download)
    }

    /// Map extract progress `q` (0-100) to the download contribution plus `q / 2`.
    pub fn extract_progress(&mut self, progress: f64) -> f64 {
        self.emit(self.download + progress / 2.0)
    }

    pub fn current(&self) -> f64 {
        self.emitted
    }

    fn emit(&mut self, value: f64) -> f64 {
        self.emitted = value.clamp(0.0, 100.0).max(self.emitted);
        self.emitted
    }
}

impl Deploy {
    /// Check for an update and, if there is one, download, extract and load it.
    ///
    /// Resolves `false` when no update is available. On success the app is
    /// redirected to the new version and the promise then resolves `true`;
    /// if the redirect unloads the running context the resolution is simply
    /// never observed.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn update(self: &Arc<Self>) -> Promise<bool> {
        let deferred = Deferred::new();
        let promise = deferred.promise();

        if !self.gateway().is_available() {
            deferred.reject(ApiError::PluginUnavailable);
            return promise;
        }

        let deploy = Arc::clone(self);
        tokio::spawn(async move {
            deploy.run_update(deferred).await;
        });

        promise
    }

    async fn run_update(&self, deferred: Deferred<bool>) {
        match self.update_pipeline(&deferred).await {
            Ok(true) => {
                log::info!("Deploy update extracted, loading new version");
                self.load();
                deferred.resolve(true);
            }
            Ok(false) => {
                deferred.resolve(false);
            }
            Err(e) => {
                log::warn!("Deploy update failed: {e}");
                deferred.reject(e);
            }
        }
    }

    /// Returns `Ok(true)` once an update has been extracted and is ready to load.
    async fn update_pipeline(&self, deferred: &Deferred<bool>) -> Result<bool, ApiError> {
        let has_update = self
            .within_stage_timeout(DeployStage::Check, self.check().into_future())
            .await?;
        if !has_update {
            log::info!("No deploy update available, nothing to load");
            return Ok(false);
        }

        let mut progress = UpdateProgress::default();

        let download = self.download();
        let downloaded = self
            .within_stage_timeout(DeployStage::Download, async {
                let mut updates = download.progress();
                while let Some(value) = updates.recv().await {
                    deferred.notify(progress.download_progress(value));
                }
                download.settled().await
            })
            .await?;
        if !downloaded {
            log::warn!("Deploy download reported no success, extracting anyway");
        }
        deferred.notify(progress.download_complete());

        let extract = self.extract();
        self.within_stage_timeout(DeployStage::Extract, async {
            let mut updates = extract.progress();
            while let Some(value) = updates.recv().await {
                deferred.notify(progress.extract_progress(value));
            }
            extract.settled().await
        })
        .await?;

        Ok(true)
    }

    async fn within_stage_timeout<T, F>(
        &self,
        stage: DeployStage,
        stage_future: F,
    ) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        match self.stage_timeout() {
            Some(limit) => tokio::time::timeout(limit, stage_future)
                .await
                .map_err(|_| {
                    log::warn!("Deploy {stage} timed out after {}ms", limit.as_millis());
                    ApiError::Timeout { stage }
                })?,
            None => stage_future.await,
        }
    }
}
