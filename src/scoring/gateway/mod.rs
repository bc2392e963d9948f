//! Scoring backends.
//!
//! `EvaluationGateway` resolves the API credential on every call: with a key
//! it posts to the hosted model, without one it falls back to `MockGateway`.
//! A missing key is not an error.

pub mod mock;
pub mod remote;

use std::future::Future;

use crate::settings::ScoringSettings;

use super::{error::EvaluationError, request::EvaluationRequest, result::ScoreResult};

pub use mock::MockGateway;
pub use remote::{parse_response, RemoteGateway};

const ENABLE_LOGS: bool = true;
const LOG_SCOPE: &str = "gateway";

use crate::log_info;

/// Anything that can turn an evaluation request into a score.
pub trait ScoreBackend: Send + Sync {
    fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> impl Future<Output = Result<ScoreResult, EvaluationError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Remote,
    Mock,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Remote => "remote",
            Strategy::Mock => "mock",
        }
    }
}

pub struct EvaluationGateway {
    settings: ScoringSettings,
    remote: RemoteGateway,
    mock: MockGateway,
}

impl EvaluationGateway {
    pub fn new(settings: ScoringSettings) -> Result<Self, EvaluationError> {
        Ok(Self {
            remote: RemoteGateway::new(&settings)?,
            mock: MockGateway::new(),
            settings,
        })
    }

    /// Replaces the mock generator, e.g. with a seeded one.
    pub fn with_mock(mut self, mock: MockGateway) -> Self {
        self.mock = mock;
        self
    }

    pub fn strategy(&self) -> Strategy {
        if self.settings.resolve_api_key().is_some() {
            Strategy::Remote
        } else {
            Strategy::Mock
        }
    }
}

impl ScoreBackend for EvaluationGateway {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<ScoreResult, EvaluationError> {
        match self.settings.resolve_api_key() {
            Some(api_key) => {
                log_info!(
                    "scoring entry {} via {}",
                    request.entry_id,
                    self.remote.endpoint()
                );
                self.remote.evaluate(request, &api_key).await
            }
            None => {
                log_info!("no API key configured, mock scoring entry {}", request.entry_id);
                Ok(self.mock.generate(request))
            }
        }
    }
}

impl ScoreBackend for MockGateway {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<ScoreResult, EvaluationError> {
        Ok(self.generate(request))
    }
}
