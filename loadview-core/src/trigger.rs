use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::Request;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameters of a remote test run, as the runner expects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequest {
    /// Endpoint the runner should load.
    pub url: String,
    /// Opaque JSON text posted to `url` with every request.
    pub payload: String,
    pub total_requests: u64,
    pub concurrency: u64,
}

/// Sends the one-shot start command to the test runner.
#[derive(Debug, Clone)]
pub struct TriggerClient {
    inner: Client<HttpConnector, Full<Bytes>>,
    endpoint: Url,
    timeout: Duration,
}

impl TriggerClient {
    pub fn new(endpoint: Url) -> Self {
        let inner = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            inner,
            endpoint,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn send(&self, req: &TestRequest) -> Result<()> {
        let body = serde_json::to_vec(req).map_err(Error::TriggerEncode)?;
        let uri: hyper::Uri = self
            .endpoint
            .as_str()
            .parse()
            .map_err(|_| Error::InvalidUrl(self.endpoint.to_string()))?;

        let http_req = Request::builder()
            .method(http::Method::POST)
            .uri(uri)
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(http::header::CONTENT_LENGTH, body.len())
            .body(Full::new(Bytes::from(body)))?;

        let res = match tokio::time::timeout(self.timeout, self.inner.request(http_req)).await {
            Ok(res) => res?,
            Err(_) => return Err(Error::TriggerTimeout(self.timeout)),
        };

        let status = res.status();
        // The runner's reply carries nothing we use; drain it so the
        // connection can go back to the pool.
        let _ = res.into_body().collect().await;

        if !status.is_success() {
            return Err(Error::TriggerRejected(status));
        }

        tracing::info!(
            endpoint = %self.endpoint,
            target = %req.url,
            total_requests = req.total_requests,
            concurrency = req.concurrency,
            "start command sent"
        );
        Ok(())
    }

    /// Sends without waiting for the outcome; failures are only logged.
    pub fn fire(&self, req: TestRequest) -> tokio::task::JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(err) = client.send(&req).await {
                tracing::warn!(
                    endpoint = %client.endpoint,
                    kind = %err.kind(),
                    error = %err,
                    "start command failed"
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_runner_field_names() {
        let req = TestRequest {
            url: "http://127.0.0.1:5000/test".to_string(),
            payload: "{}".to_string(),
            total_requests: 100,
            concurrency: 10,
        };
        let v = match serde_json::to_value(&req) {
            Ok(v) => v,
            Err(err) => panic!("to_value failed: {err}"),
        };
        assert_eq!(
            v,
            serde_json::json!({
                "url": "http://127.0.0.1:5000/test",
                "payload": "{}",
                "totalRequests": 100,
                "concurrency": 10
            })
        );
    }
}
