use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::scoring::NormalizationPolicy;

pub const API_KEY_ENV: &str = "NAILNOTE_SCORE_API_KEY";
pub const ENDPOINT_ENV: &str = "NAILNOTE_SCORE_ENDPOINT";
pub const MODEL_ENV: &str = "NAILNOTE_SCORE_MODEL";

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/responses";
const DEFAULT_MODEL: &str = "gpt-4.1-mini";
/// Japan Standard Time, the reference zone for monthly usage periods.
const DEFAULT_QUOTA_OFFSET_MINUTES: i32 = 9 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringSettings {
    pub endpoint: String,
    pub model: String,
    pub temperature: f64,
    pub api_key: Option<String>,
    pub monthly_limit: u32,
    pub quota_utc_offset_minutes: i32,
    pub request_timeout_secs: u64,
    pub resource_timeout_secs: u64,
    pub normalize_max_dimension: u32,
    pub normalize_jpeg_quality: u8,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            model: DEFAULT_MODEL.into(),
            temperature: 0.2,
            api_key: None,
            monthly_limit: 3,
            quota_utc_offset_minutes: DEFAULT_QUOTA_OFFSET_MINUTES,
            request_timeout_secs: 30,
            resource_timeout_secs: 60,
            normalize_max_dimension: 1024,
            normalize_jpeg_quality: 80,
        }
    }
}

impl ScoringSettings {
    /// Applies `NAILNOTE_SCORE_ENDPOINT` / `NAILNOTE_SCORE_MODEL` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(endpoint) = non_blank_env(ENDPOINT_ENV) {
            self.endpoint = endpoint;
        }
        if let Some(model) = non_blank_env(MODEL_ENV) {
            self.model = model;
        }
        self
    }

    /// The env var wins over the settings file. Blank values count as absent,
    /// and absence selects the mock gateway.
    pub fn resolve_api_key(&self) -> Option<String> {
        non_blank_env(API_KEY_ENV).or_else(|| {
            self.api_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_owned)
        })
    }

    pub fn quota_offset(&self) -> FixedOffset {
        let minutes = self.quota_utc_offset_minutes.clamp(-(24 * 60 - 1), 24 * 60 - 1);
        FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn resource_timeout(&self) -> Duration {
        Duration::from_secs(self.resource_timeout_secs)
    }

    pub fn normalization_policy(&self) -> NormalizationPolicy {
        NormalizationPolicy {
            max_dimension: self.normalize_max_dimension.max(1),
            jpeg_quality: self.normalize_jpeg_quality.clamp(1, 100),
        }
    }
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ScoringSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings from {}", path.display()))?
        } else {
            ScoringSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Snapshot of the file settings with environment overrides applied.
    pub fn scoring(&self) -> ScoringSettings {
        self.read().clone().with_env_overrides()
    }

    pub fn update_monthly_limit(&self, limit: u32) -> Result<()> {
        let mut guard = self.write();
        guard.monthly_limit = limit;
        self.persist(&guard)
    }

    pub fn update_api_key(&self, api_key: Option<String>) -> Result<()> {
        let mut guard = self.write();
        guard.api_key = api_key;
        self.persist(&guard)
    }

    fn read(&self) -> RwLockReadGuard<'_, ScoringSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, ScoringSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn persist(&self, data: &ScoringSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
