use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT},
    Client,
};
use serde_json::Value;

use crate::{
    scoring::{
        error::EvaluationError,
        request::{build_body, EvaluationRequest},
        result::{ScorePayload, ScoreResult},
    },
    settings::ScoringSettings,
};

const ENABLE_LOGS: bool = true;
const LOG_SCOPE: &str = "gateway";

use crate::{log_debug, log_warn};

const USER_AGENT_VALUE: &str = concat!("nailnote-score/", env!("CARGO_PKG_VERSION"));
const ERROR_SNIPPET_LEN: usize = 200;

/// HTTP client for the hosted scoring model.
pub struct RemoteGateway {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f64,
}

impl RemoteGateway {
    pub fn new(settings: &ScoringSettings) -> Result<Self, EvaluationError> {
        Self::with_timeouts(settings, settings.request_timeout(), settings.resource_timeout())
    }

    pub fn with_timeouts(
        settings: &ScoringSettings,
        request_timeout: Duration,
        resource_timeout: Duration,
    ) -> Result<Self, EvaluationError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(default_headers)
            .connect_timeout(request_timeout)
            .read_timeout(request_timeout)
            .timeout(resource_timeout)
            .build()
            .map_err(|e| {
                EvaluationError::ServiceUnavailable(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn evaluate(
        &self,
        request: &EvaluationRequest,
        api_key: &str,
    ) -> Result<ScoreResult, EvaluationError> {
        let body = build_body(request, &self.model, self.temperature);
        log_debug!(
            "POST {} for entry {} (model {}, {} prompt bytes)",
            self.endpoint,
            request.entry_id,
            self.model,
            body.input.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(ERROR_SNIPPET_LEN).collect();
            log_warn!("scoring endpoint answered {} for entry {}", status, request.entry_id);
            return Err(EvaluationError::ServiceUnavailable(format!(
                "HTTP {status}: {snippet}"
            )));
        }

        let text = response.text().await?;
        parse_response(&text)
    }
}

/// Decodes and range-checks a response body.
///
/// Accepts either a bare score object or a Responses API envelope whose
/// `output_text` carries the score object, optionally inside a code fence.
pub fn parse_response(text: &str) -> Result<ScoreResult, EvaluationError> {
    let value: Value = serde_json::from_str(text).map_err(malformed)?;
    let payload: ScorePayload = if value.get("total_score").is_some() {
        serde_json::from_value(value).map_err(malformed)?
    } else {
        let inner = output_text(&value).ok_or_else(|| {
            EvaluationError::InvalidResponse("response carried no output_text".into())
        })?;
        serde_json::from_str(strip_code_fence(inner)).map_err(malformed)?
    };
    payload.validate().map_err(EvaluationError::InvalidResponse)
}

fn malformed(error: serde_json::Error) -> EvaluationError {
    EvaluationError::InvalidResponse(format!("malformed JSON: {error}"))
}

fn output_text(envelope: &Value) -> Option<&str> {
    if let Some(text) = envelope.get("output_text").and_then(Value::as_str) {
        return Some(text);
    }
    envelope
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .find(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .and_then(|part| part.get("text"))
        .and_then(Value::as_str)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json) along with the opening fence.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> EvaluationRequest {
        EvaluationRequest {
            entry_id: "entry-1".into(),
            design_tag: "French".into(),
            products: vec!["Base gel".into()],
            user_goal: None,
            photo_jpeg: vec![0xFF, 0xD8, 0xFF],
        }
    }

    fn gateway(server: &MockServer) -> RemoteGateway {
        let settings = ScoringSettings {
            endpoint: format!("{}/v1/score", server.uri()),
            model: "model-a".into(),
            ..ScoringSettings::default()
        };
        RemoteGateway::new(&settings).expect("client")
    }

    fn valid_body() -> serde_json::Value {
        serde_json::json!({
            "total_score": 78,
            "scores": {
                "finish_quality": 80, "edge_and_cuticle": 72, "thickness_balance": 75,
                "design_balance": 88, "durability_prediction": 70
            },
            "highlights": ["Finish: even"],
            "improvements": ["Cap the free edge"],
            "next_steps": [],
            "caution": null,
            "confidence": 0.64,
            "assumptions": []
        })
    }

    #[tokio::test]
    async fn posts_prompt_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/score"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(serde_json::json!({ "model": "model-a" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(valid_body()))
            .expect(1)
            .mount(&server)
            .await;

        let result = gateway(&server)
            .evaluate(&request(), "sk-test")
            .await
            .expect("evaluate");
        assert_eq!(result.total_score, 78);
        assert_eq!(result.scores.design_balance, 88);
        assert_eq!(result.improvements, vec!["Cap the free edge"]);
    }

    fn envelope(text: String) -> serde_json::Value {
        serde_json::json!({
            "id": "resp_1",
            "object": "response",
            "output": [
                { "type": "reasoning", "summary": [] },
                {
                    "type": "message",
                    "role": "assistant",
                    "content": [{ "type": "output_text", "text": text, "annotations": [] }]
                }
            ]
        })
    }

    #[tokio::test]
    async fn responses_envelope_is_unwrapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(envelope(valid_body().to_string())),
            )
            .mount(&server)
            .await;

        let result = gateway(&server)
            .evaluate(&request(), "sk-test")
            .await
            .expect("evaluate");
        assert_eq!(result.total_score, 78);
        assert_eq!(result.scores.edge_and_cuticle, 72);
    }

    #[tokio::test]
    async fn fenced_output_text_is_unwrapped() {
        let server = MockServer::start().await;
        let fenced = format!("```json\n{}\n```\n", valid_body());
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(fenced)))
            .mount(&server)
            .await;

        let result = gateway(&server)
            .evaluate(&request(), "sk-test")
            .await
            .expect("evaluate");
        assert_eq!(result.total_score, 78);
    }

    #[test]
    fn top_level_output_text_is_accepted() {
        let body = serde_json::json!({ "output_text": valid_body().to_string(), "output": [] });
        let result = parse_response(&body.to_string()).expect("parse");
        assert_eq!(result.scores.design_balance, 88);
    }

    #[test]
    fn envelope_without_text_is_invalid_response() {
        let body = serde_json::json!({ "output": [{ "type": "message", "content": [] }] });
        match parse_response(&body.to_string()) {
            Err(EvaluationError::InvalidResponse(message)) => {
                assert!(message.contains("output_text"), "{message}")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn envelope_with_out_of_range_score_is_invalid_response() {
        let mut inner = valid_body();
        inner["total_score"] = serde_json::json!(120);
        let body = envelope(inner.to_string());
        assert!(matches!(
            parse_response(&body.to_string()),
            Err(EvaluationError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn non_success_status_is_service_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let error = gateway(&server)
            .evaluate(&request(), "sk-test")
            .await
            .unwrap_err();
        match error {
            EvaluationError::ServiceUnavailable(message) => assert!(message.contains("503")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"total_score\": \"high\"}"))
            .mount(&server)
            .await;

        let error = gateway(&server)
            .evaluate(&request(), "sk-test")
            .await
            .unwrap_err();
        assert!(matches!(error, EvaluationError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn out_of_range_score_is_invalid_response() {
        let server = MockServer::start().await;
        let mut body = valid_body();
        body["scores"]["finish_quality"] = serde_json::json!(140);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let error = gateway(&server)
            .evaluate(&request(), "sk-test")
            .await
            .unwrap_err();
        assert!(matches!(error, EvaluationError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out_as_service_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(valid_body())
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let settings = ScoringSettings {
            endpoint: server.uri(),
            ..ScoringSettings::default()
        };
        let gateway = RemoteGateway::with_timeouts(
            &settings,
            Duration::from_millis(200),
            Duration::from_millis(300),
        )
        .expect("client");

        let error = gateway.evaluate(&request(), "sk-test").await.unwrap_err();
        assert!(matches!(error, EvaluationError::ServiceUnavailable(_)));
    }
}
