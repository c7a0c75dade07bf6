//! The per-video indexing pipeline.
//!
//! One task = one video. Entry takes the per-video advisory lock and the
//! state-machine guard, then runs the ten stages strictly sequentially,
//! each tracked by a job row. Scene rows are written only by the final
//! commit transaction, so an abandoned run leaves nothing partial behind.

pub mod error;
mod stages;

use std::sync::Arc;

use uuid::Uuid;

use scenedex_core::state::{JobStage, VideoState};
use scenedex_db::models::job::Job;
use scenedex_db::repositories::{JobRepo, QueueRepo, VideoRepo};
use scenedex_db::DbPool;
use scenedex_model_client::ModelClient;
use scenedex_storage::ObjectStorage;

use crate::config::WorkerConfig;
pub use error::StageError;

/// How a task delivery ended. All dispositions complete the queue task;
/// transient failures instead surface as `Err` and abandon it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The video reached `indexed`.
    Completed,
    /// The entry guard or lock found nothing to do (duplicate delivery).
    Noop,
    /// A fatal stage failure moved the video to `failed`.
    Failed,
}

/// Shared pipeline executor; one instance serves all runners.
pub struct Pipeline {
    pool: DbPool,
    storage: Arc<ObjectStorage>,
    models: ModelClient,
    config: WorkerConfig,
}

impl Pipeline {
    pub fn new(
        pool: DbPool,
        storage: Arc<ObjectStorage>,
        models: ModelClient,
        config: WorkerConfig,
    ) -> Self {
        Self {
            pool,
            storage,
            models,
            config,
        }
    }

    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub(crate) fn storage(&self) -> &ObjectStorage {
        &self.storage
    }

    pub(crate) fn models(&self) -> &ModelClient {
        &self.models
    }

    pub(crate) fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Process one task delivery for `video_id`.
    ///
    /// Returns `Err` only for transient failures; the caller leaves the
    /// task leased so the queue redelivers it.
    pub async fn process(&self, video_id: Uuid) -> Result<Disposition, StageError> {
        // The advisory lock lives on this connection for the whole run;
        // closing the connection would also release it.
        let mut lock_conn = self.pool.acquire().await.map_err(StageError::from)?;
        if !QueueRepo::try_lock_video(&mut lock_conn, video_id).await? {
            tracing::debug!(%video_id, "Another worker holds the video lock, skipping");
            return Ok(Disposition::Noop);
        }

        let result = self.process_locked(video_id).await;

        if let Err(e) = QueueRepo::unlock_video(&mut lock_conn, video_id).await {
            tracing::warn!(%video_id, error = %e, "Failed to release video lock");
        }
        result
    }

    async fn process_locked(&self, video_id: Uuid) -> Result<Disposition, StageError> {
        let Some(video) = VideoRepo::find_by_id(&self.pool, video_id).await? else {
            tracing::warn!(%video_id, "Queue task references a missing video");
            return Ok(Disposition::Noop);
        };

        // Entry guard: admit first delivery (validating) and redelivery of
        // an interrupted run (processing, not yet committed). Everything
        // else is a duplicate and a no-op.
        let admissible = matches!(
            video.state,
            VideoState::Validating | VideoState::Processing
        ) && video.indexed_at.is_none();
        if !admissible {
            tracing::info!(%video_id, state = %video.state, "Entry guard rejected task, nothing to do");
            return Ok(Disposition::Noop);
        }

        if video.state == VideoState::Validating {
            let mut conn = self.pool.acquire().await.map_err(StageError::from)?;
            VideoRepo::set_state(&mut conn, video_id, VideoState::Processing).await?;
        }

        match self.run_stages(&video).await {
            Ok(scene_count) => {
                tracing::info!(%video_id, scene_count, "Video indexed");
                Ok(Disposition::Completed)
            }
            Err(StageError::Fatal { reason, detail }) => {
                tracing::error!(%video_id, %reason, %detail, "Pipeline failed fatally");
                Ok(Disposition::Failed)
            }
            Err(transient) => Err(transient),
        }
    }

    /// Execute the ten stages in order. Returns the committed scene count.
    async fn run_stages(&self, video: &scenedex_db::models::video::Video) -> Result<usize, StageError> {
        let video_id = video.video_id;
        let scratch = tempfile::tempdir()
            .map_err(|e| StageError::transient(format!("scratch dir: {e}")))?;

        // 1. Validate: fetch the object and probe it.
        let job = self.begin(video_id, JobStage::UploadValidate).await?;
        let probe = stages::validate(self, video, scratch.path()).await;
        let media = self.settle(video_id, &job, probe).await?;

        // 2. Audio extract: mono 16 kHz WAV in local scratch.
        let job = self.begin(video_id, JobStage::AudioExtract).await?;
        let audio = stages::extract_audio(&media, scratch.path()).await;
        let audio_path = self.settle(video_id, &job, audio).await?;

        // 3. ASR.
        let job = self.begin(video_id, JobStage::Asr).await?;
        let asr = stages::transcribe(self, audio_path.as_deref()).await;
        let segments = self.settle(video_id, &job, asr).await?;

        // 4. Scene detect.
        let job = self.begin(video_id, JobStage::SceneDetect).await?;
        let detect = stages::detect_scenes(self, &media).await;
        let intervals = self.settle(video_id, &job, detect).await?;

        // 5. Align transcripts to scenes.
        let job = self.begin(video_id, JobStage::Align).await?;
        let aligned = Ok(stages::align(&intervals, &segments));
        let mut drafts = self.settle(video_id, &job, aligned).await?;

        // 6. Embed text.
        let job = self.begin(video_id, JobStage::EmbedText).await?;
        let embedded = stages::embed_text(self, &mut drafts).await;
        self.settle(video_id, &job, embedded).await?;

        // 7. Sample one representative frame per scene.
        let job = self.begin(video_id, JobStage::SampleFrames).await?;
        let sampled = stages::sample_frames(self, &job, &media, &mut drafts).await;
        self.settle(video_id, &job, sampled).await?;

        // 8. Embed vision.
        let job = self.begin(video_id, JobStage::EmbedVision).await?;
        let embedded = stages::embed_vision(self, &mut drafts).await;
        self.settle(video_id, &job, embedded).await?;

        // 9. Build and upload sidecars.
        let job = self.begin(video_id, JobStage::BuildSidecar).await?;
        let built = stages::build_sidecars(self, video, &mut drafts).await;
        self.settle(video_id, &job, built).await?;

        // 10. Commit everything in one transaction.
        let job = self.begin(video_id, JobStage::Commit).await?;
        let committed = stages::commit(self, video, &drafts).await;
        self.settle(video_id, &job, committed).await?;

        Ok(drafts.len())
    }

    /// Claim (or create) the stage's job row and mark it running.
    async fn begin(&self, video_id: Uuid, stage: JobStage) -> Result<Job, StageError> {
        let job = JobRepo::ensure_running(&self.pool, video_id, stage).await?;
        tracing::debug!(%video_id, stage = %stage, job_id = %job.job_id, "Stage started");
        Ok(job)
    }

    /// Record a stage outcome on its job row.
    ///
    /// Fatal failures also fail the video; transient failures leave the
    /// job running so a redelivered task reclaims the same row.
    async fn settle<T>(
        &self,
        video_id: Uuid,
        job: &Job,
        result: Result<T, StageError>,
    ) -> Result<T, StageError> {
        match result {
            Ok(value) => {
                JobRepo::mark_completed(&self.pool, job.job_id).await?;
                Ok(value)
            }
            Err(StageError::Fatal { reason, detail }) => {
                tracing::error!(
                    %video_id,
                    stage = %job.stage,
                    %reason,
                    %detail,
                    "Stage failed fatally"
                );
                JobRepo::mark_failed(&self.pool, job.job_id, &reason).await?;
                VideoRepo::mark_failed(&self.pool, video_id, &reason).await?;
                Err(StageError::Fatal { reason, detail })
            }
            Err(transient) => {
                tracing::warn!(
                    %video_id,
                    stage = %job.stage,
                    error = %transient,
                    "Stage failed transiently, leaving task for redelivery"
                );
                Err(transient)
            }
        }
    }
}
