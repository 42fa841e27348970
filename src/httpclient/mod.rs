//! Target HTTP client (C8's external collaborator, `spec.md` §1/§6).
//!
//! A narrow async trait so the Run Executor never constructs a `reqwest`
//! client itself; the default implementation wraps `reqwest` the way the
//! teacher's `cli/legacy_execute.rs` issues requests, except 4xx/5xx is
//! returned as an ordinary `TargetResponse`, never surfaced as an `Err` —
//! `spec.md` §4.7 step 5 requires status classification to happen in one
//! place (the executor), not in the transport layer.

use crate::error::Error;
use crate::model::HttpMethod;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TargetResponse {
    pub status: u16,
    pub body: Value,
}

#[async_trait]
pub trait TargetHttpClient: Send + Sync {
    async fn call(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &IndexMap<String, Value>,
        query: &IndexMap<String, Value>,
        body: Option<&Value>,
    ) -> Result<TargetResponse, Error>;
}

pub struct ReqwestTargetClient {
    client: reqwest::Client,
}

impl ReqwestTargetClient {
    /// `spec.md` §6 calls for "a reasonably generous timeout" on outbound
    /// target calls, distinct from the LLM chat timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for ReqwestTargetClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TargetHttpClient for ReqwestTargetClient {
    async fn call(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &IndexMap<String, Value>,
        query: &IndexMap<String, Value>,
        body: Option<&Value>,
    ) -> Result<TargetResponse, Error> {
        let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|e| Error::transport_error(e.to_string()))?;
        let mut builder = self.client.request(reqwest_method, url);

        for (key, value) in query {
            if let Some(s) = value.as_str() {
                builder = builder.query(&[(key, s)]);
            } else {
                builder = builder.query(&[(key, value.to_string())]);
            }
        }
        for (key, value) in headers {
            let header_value = value.as_str().map_or_else(|| value.to_string(), str::to_string);
            builder = builder.header(key, header_value);
        }
        if let Some(b) = body {
            builder = builder.json(b);
        }

        let response = builder.send().await.map_err(|e| Error::transport_error(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok(TargetResponse { status, body })
    }
}
