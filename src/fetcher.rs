use crate::config::Config;
use crate::util::{RelayError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::{header, Request, Response, Uri};
use hyper::client::HttpConnector;
use hyper::{body::to_bytes, Body, Client as HyperClient};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use std::time::Duration;

/// static identity presented to the origin on every fetch
const USER_AGENT: &str = concat!("imgrelay/", env!("CARGO_PKG_VERSION"), " (edge image cache)");

/// origin access behind a trait so handler tests can stub the upstream.
///
/// always issues a GET, even for an inbound HEAD: the full resource is
/// fetched so it can be cached for subsequent GETs.
#[async_trait]
pub trait OriginFetch: Send + Sync {
    async fn fetch(&self, origin_url: &str) -> Result<Response<Bytes>>;
}

#[derive(Clone)]
pub struct OriginFetcher {
    client: HyperClient<HttpsConnector<HttpConnector>>,
    timeout_seconds: u64,
}

impl OriginFetcher {
    pub fn new(config: &Config) -> Self {
        // https connector with native trust roots; the origin object store
        // only speaks https but plain http is tolerated for local testing
        let https = HttpsConnectorBuilder::new()
            .with_native_roots()
            .https_or_http()
            .enable_http1()
            .build();

        Self {
            client: HyperClient::builder().build(https),
            timeout_seconds: config.fetch_timeout_seconds,
        }
    }
}

#[async_trait]
impl OriginFetch for OriginFetcher {
    async fn fetch(&self, origin_url: &str) -> Result<Response<Bytes>> {
        // validate the decoded string before handing it to hyper; the
        // classifier only substring-checked it
        let parsed = url::Url::parse(origin_url)?;
        let target_uri: Uri = parsed.as_str().parse()?;

        let request = Request::get(target_uri)
            .header(header::USER_AGENT, USER_AGENT)
            .body(Body::empty())?;

        log::debug!("fetching from origin: {}", origin_url);

        let response = tokio::time::timeout(
            Duration::from_secs(self.timeout_seconds),
            self.client.request(request),
        )
        .await
        .map_err(|_| RelayError::UpstreamTimeout(self.timeout_seconds))??;

        if !response.status().is_success() {
            return Err(RelayError::UpstreamStatus(response.status()));
        }

        let (parts, body) = response.into_parts();
        let body_bytes = to_bytes(body).await?;

        Ok(Response::from_parts(parts, body_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[tokio::test]
    async fn unparseable_origin_urls_fail_before_any_network_io() {
        let fetcher = OriginFetcher::new(&Config::parse_from(["imgrelay"]));
        let result = fetcher.fetch("prod-files-secure but not a url").await;
        assert!(matches!(result, Err(RelayError::UrlParse(_))));
    }

    #[test]
    fn user_agent_names_the_proxy_and_version() {
        assert!(USER_AGENT.starts_with("imgrelay/"));
        assert!(USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
