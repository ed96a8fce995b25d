//! HTTP client for the congestion prediction service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use super::{PredictionProvider, PredictionRequest, PredictionResult};
use crate::error::{NavError, Upstream};

#[derive(Debug, Clone)]
pub struct HttpPredictionProvider {
    client: Client,
    endpoint: Url,
}

impl HttpPredictionProvider {
    /// `base_url` is the service root; requests go to `{base_url}/predict`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, String> {
        let endpoint = predict_url(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| err.to_string())?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn predict_url(base_url: &str) -> Result<Url, String> {
    let joined = format!("{}/predict", base_url.trim_end_matches('/'));
    Url::parse(&joined).map_err(|err| format!("invalid prediction URL {joined:?}: {err}"))
}

/// Error body of the prediction service (`{"detail": "..."}`).
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

fn describe_error(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail {
        serde_json::Value::String(message) => Some(message),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl PredictionProvider for HttpPredictionProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult, NavError> {
        debug!(
            route_id = %request.route_id,
            bottleneck = request.bottleneck_location.as_deref().unwrap_or("-"),
            "requesting congestion prediction"
        );
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|err| NavError::upstream(Upstream::Prediction, err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| NavError::upstream(Upstream::Prediction, err.to_string()))?;

        if !status.is_success() {
            let reason = match describe_error(&body) {
                Some(detail) => format!("status {status}: {detail}"),
                None => format!("status {status}"),
            };
            return Err(NavError::upstream(Upstream::Prediction, reason));
        }

        serde_json::from_str(&body).map_err(|err| {
            NavError::upstream(Upstream::Prediction, format!("malformed response: {err}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_predict() {
        let provider =
            HttpPredictionProvider::new("http://localhost:8000/", Duration::from_secs(1))
                .expect("client");
        assert_eq!(provider.endpoint().as_str(), "http://localhost:8000/predict");
    }

    #[test]
    fn rejects_unparseable_base() {
        assert!(HttpPredictionProvider::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn error_detail_is_extracted() {
        assert_eq!(
            describe_error(r#"{"detail": "Prediction failed: model not loaded"}"#),
            Some("Prediction failed: model not loaded".to_string())
        );
        assert_eq!(describe_error("<html>oops</html>"), None);
        assert!(describe_error(r#"{"detail": [{"loc": ["body"]}]}"#)
            .expect("structured detail")
            .contains("loc"));
    }
}
