// src/upload/transport.rs
//! HTTP transport for upload payloads

use crate::utils::errors::{MonitorError, Result};
use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::debug;

/// Sends a JSON body to an endpoint and reports the response status
pub trait Transport: Send + Sync {
    fn post_json(&self, endpoint: &str, body: Vec<u8>) -> BoxFuture<'static, Result<u16>>;
}

/// Plain-HTTP transport over the hyper legacy client
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();

        Self { client, timeout }
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, endpoint: &str, body: Vec<u8>) -> BoxFuture<'static, Result<u16>> {
        let client = self.client.clone();
        let timeout = self.timeout;
        let endpoint = endpoint.to_string();

        Box::pin(async move {
            let request = Request::builder()
                .method(Method::POST)
                .uri(&endpoint)
                .header(CONTENT_TYPE, "application/json")
                .body(Full::new(Bytes::from(body)))
                .map_err(|e| MonitorError::UploadFailed(format!("Request build error: {}", e)))?;

            let response = tokio::time::timeout(timeout, client.request(request))
                .await
                .map_err(|_| {
                    MonitorError::UploadFailed(format!("Request timed out after {:?}", timeout))
                })?
                .map_err(|e| MonitorError::UploadFailed(format!("Request failed: {}", e)))?;

            let status = response.status().as_u16();

            // drain so the connection can return to the pool
            if let Err(e) = response.into_body().collect().await {
                debug!("Failed to read upload response body: {}", e);
            }

            Ok(status)
        })
    }
}
