//! # HTTP Transport
//!
//! [`RemoteTransport`] over `reqwest`. The request timeout is applied per
//! call; the open (connect) timeout is a client setting, so one client is
//! kept per distinct open timeout and reused across calls.

use async_trait::async_trait;
use reqwest::Client;
use resource_graph::{RemoteRequest, RemoteResponse, RemoteTransport, TransportError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Default)]
pub struct HttpTransport {
    clients: Mutex<HashMap<Duration, Client>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self, open_timeout: Duration) -> Result<Client, TransportError> {
        let mut clients = self
            .clients
            .lock()
            .map_err(|_| TransportError::Request("HTTP client cache poisoned".to_string()))?;
        if let Some(client) = clients.get(&open_timeout) {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .connect_timeout(open_timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        clients.insert(open_timeout, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl RemoteTransport for HttpTransport {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn get(&self, request: &RemoteRequest) -> Result<RemoteResponse, TransportError> {
        let client = self.client(request.open_timeout)?;
        let mut builder = client.get(request.full_url()).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let failed = |e: reqwest::Error| {
            if e.is_timeout() {
                TransportError::Timeout(request.timeout)
            } else {
                TransportError::Request(e.to_string())
            }
        };
        let response = builder.send().await.map_err(failed)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(failed)?;
        debug!(status, bytes = body.len(), "Response received");
        Ok(RemoteResponse::new(status, body))
    }
}
