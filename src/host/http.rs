//! reqwest-backed [`Transport`].

use super::Transport;
use anyhow::{Context, Result, bail};
use futures::future::BoxFuture;
use std::time::Duration;
use tracing::debug;

/// HTTP client with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("osmflux/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
        })
    }
}

impl Transport for HttpTransport {
    fn get_bytes<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            debug!("GET {}", url);

            let response =
                self.client.get(url).send().await.with_context(|| format!("GET {url} failed"))?;

            let status = response.status();
            if !status.is_success() {
                bail!("GET {url} returned HTTP {status}");
            }

            let body = response.bytes().await.context("Failed to read response body")?;
            Ok(body.to_vec())
        })
    }
}
