pub mod clock;
pub mod comments;
pub mod error;
pub mod gateway;
pub mod hasher;
pub mod in_flight;
pub mod orchestrator;
pub mod request;
pub mod result;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::EvaluationError;
pub use gateway::{EvaluationGateway, MockGateway, RemoteGateway, ScoreBackend, Strategy};
pub use hasher::{content_hash, normalize_bytes, normalize_image, NormalizationPolicy, NormalizedPhoto};
pub use in_flight::{InFlightEvaluations, InFlightTicket};
pub use orchestrator::{EvaluationOrchestrator, EvaluationPhase};
pub use request::{build_prompt, build_request, EvaluationRequest};
pub use result::ScoreResult;
