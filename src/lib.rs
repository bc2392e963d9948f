pub mod utils;

pub mod cli;
pub mod db;
pub mod photos;
pub mod scoring;
pub mod settings;

use std::{path::Path, sync::Arc};

use anyhow::Context;

use db::Database;
use photos::FsPhotoStore;
use scoring::{EvaluationGateway, EvaluationOrchestrator, InFlightEvaluations};
use settings::SettingsStore;

pub use utils::init_logging;

const DATABASE_FILE: &str = "nailnote.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

/// Everything a front end needs, opened from one data directory.
pub struct AppState {
    pub db: Database,
    pub photos: Arc<FsPhotoStore>,
    pub settings: SettingsStore,
    pub evaluations: EvaluationOrchestrator,
    pub in_flight: InFlightEvaluations,
}

impl AppState {
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let db = Database::new(data_dir.join(DATABASE_FILE))?;
        let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;
        let photos = Arc::new(FsPhotoStore::new(data_dir)?);

        let scoring = settings.scoring();
        let gateway = EvaluationGateway::new(scoring.clone())?;
        log::info!(
            "scoring strategy: {} (limit {}/month)",
            gateway.strategy().as_str(),
            scoring.monthly_limit
        );

        let evaluations = EvaluationOrchestrator::new(db.clone(), photos.clone(), gateway, scoring);

        Ok(Self {
            db,
            photos,
            settings,
            evaluations,
            in_flight: InFlightEvaluations::new(),
        })
    }
}
