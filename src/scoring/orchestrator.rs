use std::sync::Arc;

use anyhow::anyhow;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    db::{BillingOutcome, Database, Entry, MonthKey, QuotaRecord, QuotaStatus, ScoreRecord},
    photos::PhotoStore,
    settings::ScoringSettings,
};

use super::{
    clock::{Clock, SystemClock},
    comments::normalize_highlights,
    error::EvaluationError,
    gateway::{EvaluationGateway, ScoreBackend},
    hasher::{normalize_bytes, NormalizedPhoto},
    request::build_request,
    result::ScoreResult,
};

const ENABLE_LOGS: bool = true;
const LOG_SCOPE: &str = "evaluation";

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EvaluationPhase {
    Idle,
    Hashing,
    DedupCheck,
    QuotaCheck,
    Requesting,
    Persisting,
    Done,
}

impl EvaluationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationPhase::Idle => "idle",
            EvaluationPhase::Hashing => "hashing",
            EvaluationPhase::DedupCheck => "dedupCheck",
            EvaluationPhase::QuotaCheck => "quotaCheck",
            EvaluationPhase::Requesting => "requesting",
            EvaluationPhase::Persisting => "persisting",
            EvaluationPhase::Done => "done",
        }
    }
}

struct PhaseTracker<'a> {
    entry_id: &'a str,
    progress: Option<&'a watch::Sender<EvaluationPhase>>,
}

impl PhaseTracker<'_> {
    fn enter(&self, phase: EvaluationPhase) {
        log_debug!("entry {} -> {}", self.entry_id, phase.as_str());
        if let Some(progress) = self.progress {
            progress.send_replace(phase);
        }
    }
}

/// Runs one evaluation end to end: photo fingerprint, dedup, quota,
/// backend call and the single billing commit.
///
/// Nothing is persisted until the backend has answered; the score record and
/// the quota increment land in one transaction.
pub struct EvaluationOrchestrator<B = EvaluationGateway> {
    db: Database,
    photos: Arc<dyn PhotoStore>,
    backend: B,
    settings: ScoringSettings,
    clock: Arc<dyn Clock>,
}

impl<B: ScoreBackend> EvaluationOrchestrator<B> {
    pub fn new(
        db: Database,
        photos: Arc<dyn PhotoStore>,
        backend: B,
        settings: ScoringSettings,
    ) -> Self {
        Self {
            db,
            photos,
            backend,
            settings,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &ScoringSettings {
        &self.settings
    }

    pub async fn evaluate(
        &self,
        entry_id: &str,
        user_goal: Option<&str>,
    ) -> Result<ScoreRecord, EvaluationError> {
        self.evaluate_with(entry_id, user_goal, None, None).await
    }

    /// Same as `evaluate`, publishing each phase on `progress`. Cancelling
    /// `cancel` abandons the backend call; a cancelled evaluation never
    /// reaches the commit.
    pub async fn evaluate_with(
        &self,
        entry_id: &str,
        user_goal: Option<&str>,
        progress: Option<&watch::Sender<EvaluationPhase>>,
        cancel: Option<&CancellationToken>,
    ) -> Result<ScoreRecord, EvaluationError> {
        let tracker = PhaseTracker { entry_id, progress };

        let outcome = self.run(&tracker, user_goal, cancel).await;
        match &outcome {
            Ok(record) => {
                tracker.enter(EvaluationPhase::Done);
                log_info!(
                    "entry {} scored {} (confidence {:.2})",
                    entry_id,
                    record.total_score,
                    record.confidence
                );
            }
            Err(error @ EvaluationError::Storage(_)) => {
                log_error!("evaluation of entry {} failed: {}", entry_id, error);
                tracker.enter(EvaluationPhase::Idle);
            }
            Err(error) => {
                log_warn!("evaluation of entry {} stopped: {}", entry_id, error);
                tracker.enter(EvaluationPhase::Idle);
            }
        }
        outcome
    }

    async fn run(
        &self,
        tracker: &PhaseTracker<'_>,
        user_goal: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<ScoreRecord, EvaluationError> {
        let entry_id = tracker.entry_id;

        tracker.enter(EvaluationPhase::Hashing);
        let entry = self.load_entry(entry_id).await?;
        let photo = self
            .normalized_photo(&entry)
            .await?
            .ok_or(EvaluationError::MissingPhoto)?;

        tracker.enter(EvaluationPhase::DedupCheck);
        let previous_hash = self.db.get_scored_photo_hash(entry_id).await?;
        if previous_hash.as_deref() == Some(photo.hash.as_str()) {
            return Err(EvaluationError::DuplicateEvaluation);
        }

        tracker.enter(EvaluationPhase::QuotaCheck);
        let now = self.clock.now();
        let month_key = MonthKey::for_instant(now, self.settings.quota_offset());
        let limit = self.settings.monthly_limit;
        let quota = self.db.fetch_or_create_quota(&month_key, now).await?;
        if quota.usage_count >= limit {
            return Err(EvaluationError::QuotaExceeded(self.status_of(quota)));
        }

        tracker.enter(EvaluationPhase::Requesting);
        let request = build_request(&entry, &photo, user_goal);
        let result = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(EvaluationError::Cancelled),
                    result = self.backend.evaluate(&request) => result?,
                }
            }
            None => self.backend.evaluate(&request).await?,
        };

        tracker.enter(EvaluationPhase::Persisting);
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(EvaluationError::Cancelled);
        }
        let record = self.to_record(entry_id, result, photo.hash);

        match self.db.commit_evaluation(record, &month_key, limit).await? {
            BillingOutcome::Committed { record, quota } => {
                log_debug!(
                    "billed entry {} to {} ({}/{})",
                    entry_id,
                    quota.month_key,
                    quota.usage_count,
                    limit
                );
                Ok(record)
            }
            BillingOutcome::QuotaExhausted { quota } => {
                Err(EvaluationError::QuotaExceeded(self.status_of(quota)))
            }
        }
    }

    /// Whether the evaluate action should be offered: the entry has a
    /// readable photo whose fingerprint differs from the last scored one.
    pub async fn can_evaluate(&self, entry_id: &str) -> Result<bool, EvaluationError> {
        let entry = self.load_entry(entry_id).await?;
        let Some(photo) = self.normalized_photo(&entry).await? else {
            return Ok(false);
        };
        let previous_hash = self.db.get_scored_photo_hash(entry_id).await?;
        Ok(previous_hash.as_deref() != Some(photo.hash.as_str()))
    }

    /// Usage for the current month. Does not create the month's row.
    pub async fn quota_status(&self) -> Result<QuotaStatus, EvaluationError> {
        let month_key = MonthKey::for_instant(self.clock.now(), self.settings.quota_offset());
        let used = self
            .db
            .get_quota(&month_key)
            .await?
            .map(|quota| quota.usage_count)
            .unwrap_or(0);
        Ok(QuotaStatus {
            month_key,
            used,
            limit: self.settings.monthly_limit,
        })
    }

    async fn load_entry(&self, entry_id: &str) -> Result<Entry, EvaluationError> {
        self.db
            .get_entry(entry_id)
            .await?
            .ok_or_else(|| EvaluationError::EntryNotFound(entry_id.to_owned()))
    }

    /// Loads and normalizes the entry's photo off the async runtime.
    /// `None` when there is no photo or it cannot be read or decoded.
    async fn normalized_photo(
        &self,
        entry: &Entry,
    ) -> Result<Option<NormalizedPhoto>, EvaluationError> {
        let Some(photo_id) = entry.photo_id else {
            return Ok(None);
        };

        let photos = Arc::clone(&self.photos);
        let policy = self.settings.normalization_policy();
        let normalized = tokio::task::spawn_blocking(move || {
            photos
                .load_best(&photo_id)
                .map(|bytes| normalize_bytes(&bytes, policy))
        })
        .await
        .map_err(|e| anyhow!("photo normalization task failed: {e}"))?;

        match normalized {
            None => {
                log_warn!("photo {} for entry {} is not on disk", photo_id, entry.id);
                Ok(None)
            }
            Some(Err(error)) => {
                log_warn!(
                    "photo {} for entry {} could not be decoded: {:#}",
                    photo_id,
                    entry.id,
                    error
                );
                Ok(None)
            }
            Some(Ok(photo)) => Ok(Some(photo)),
        }
    }

    fn to_record(&self, entry_id: &str, result: ScoreResult, photo_hash: String) -> ScoreRecord {
        ScoreRecord {
            entry_id: entry_id.to_owned(),
            total_score: result.total_score,
            highlights: normalize_highlights(&result.scores, result.highlights),
            scores: result.scores,
            improvements: result.improvements,
            next_steps: result.next_steps,
            assumptions: result.assumptions,
            caution: result.caution,
            confidence: result.confidence,
            evaluated_at: self.clock.now(),
            photo_hash,
        }
    }

    fn status_of(&self, quota: QuotaRecord) -> QuotaStatus {
        QuotaStatus {
            month_key: quota.month_key,
            used: quota.usage_count,
            limit: self.settings.monthly_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use chrono::{TimeZone, Utc};
    use image::{DynamicImage, ImageBuffer, Rgb};
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;
    use crate::scoring::{clock::FixedClock, gateway::MockGateway};

    #[derive(Default)]
    struct MemoryPhotos(Mutex<HashMap<Uuid, Vec<u8>>>);

    impl MemoryPhotos {
        fn put(&self, bytes: Vec<u8>) -> Uuid {
            let id = Uuid::new_v4();
            self.0.lock().expect("photos").insert(id, bytes);
            id
        }
    }

    impl PhotoStore for MemoryPhotos {
        fn load_full(&self, photo_id: &Uuid) -> Option<Vec<u8>> {
            self.0.lock().expect("photos").get(photo_id).cloned()
        }

        fn load_thumbnail(&self, _photo_id: &Uuid) -> Option<Vec<u8>> {
            None
        }
    }

    fn png(shade: u8) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(32, 32, Rgb([shade, 90, 140])));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, image::ImageFormat::Png)
            .expect("png");
        bytes.into_inner()
    }

    async fn setup(dir: &TempDir) -> (EvaluationOrchestrator<MockGateway>, Arc<MemoryPhotos>, Database) {
        let db = Database::new(dir.path().join("score.db")).expect("db");
        let photos = Arc::new(MemoryPhotos::default());
        let orchestrator = EvaluationOrchestrator::new(
            db.clone(),
            photos.clone(),
            MockGateway::with_seed(11),
            ScoringSettings::default(),
        )
        .with_clock(Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 5, 10, 3, 0, 0).unwrap(),
        )));
        (orchestrator, photos, db)
    }

    #[tokio::test]
    async fn progress_ends_in_done_or_idle() {
        let dir = TempDir::new().expect("tempdir");
        let (orchestrator, photos, db) = setup(&dir).await;

        let mut entry = Entry::new("with photo");
        entry.photo_id = Some(photos.put(png(10)));
        db.insert_entry(&entry).await.expect("entry");

        let (tx, rx) = watch::channel(EvaluationPhase::Idle);
        orchestrator
            .evaluate_with(&entry.id, None, Some(&tx), None)
            .await
            .expect("evaluate");
        assert_eq!(*rx.borrow(), EvaluationPhase::Done);

        let error = orchestrator
            .evaluate_with(&entry.id, None, Some(&tx), None)
            .await
            .unwrap_err();
        assert!(matches!(error, EvaluationError::DuplicateEvaluation));
        assert_eq!(*rx.borrow(), EvaluationPhase::Idle);
    }

    #[tokio::test]
    async fn can_evaluate_tracks_photo_changes() {
        let dir = TempDir::new().expect("tempdir");
        let (orchestrator, photos, db) = setup(&dir).await;

        let entry = Entry::new("toggle");
        db.insert_entry(&entry).await.expect("entry");
        assert!(!orchestrator.can_evaluate(&entry.id).await.expect("no photo"));

        let first = photos.put(png(10));
        db.set_entry_photo(&entry.id, Some(first), Utc::now()).await.expect("photo");
        assert!(orchestrator.can_evaluate(&entry.id).await.expect("fresh photo"));

        orchestrator.evaluate(&entry.id, None).await.expect("evaluate");
        assert!(!orchestrator.can_evaluate(&entry.id).await.expect("scored"));

        let second = photos.put(png(200));
        db.set_entry_photo(&entry.id, Some(second), Utc::now()).await.expect("photo");
        assert!(orchestrator.can_evaluate(&entry.id).await.expect("changed"));
    }

    #[tokio::test]
    async fn quota_status_does_not_create_rows() {
        let dir = TempDir::new().expect("tempdir");
        let (orchestrator, _photos, db) = setup(&dir).await;

        let status = orchestrator.quota_status().await.expect("status");
        assert_eq!(status.month_key.as_str(), "2026-05");
        assert_eq!((status.used, status.limit, status.remaining()), (0, 3, 3));
        assert!(db.get_quota(&status.month_key).await.expect("quota").is_none());
    }

    #[tokio::test]
    async fn unknown_entry_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        let (orchestrator, _photos, _db) = setup(&dir).await;
        let error = orchestrator.evaluate("missing", None).await.unwrap_err();
        assert!(matches!(error, EvaluationError::EntryNotFound(id) if id == "missing"));
    }
}
