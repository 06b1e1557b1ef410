use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, trace};

use super::BulkResponse;
use crate::backends::Sink;
use crate::signing::{AwsCredentials, SignedRequest};

/// 📡 Where the bulk requests go and who's signing them.
///
/// `region` and `service` are fallbacks: when the endpoint is a regular
/// `search-<domain>.<region>.es.amazonaws.com` hostname, the hostname wins.
#[derive(Debug, Deserialize, Clone)]
pub struct OpenSearchSinkConfig {
    /// 📡 Bare host (`search-logs.us-east-1.es.amazonaws.com`, https assumed) or a full URL.
    pub endpoint: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    /// 🔒 Static AWS credentials. Redacted in Debug output.
    pub credentials: AwsCredentials,
    /// ⏱️ If the domain can't shake hands in 10 seconds, it's not having a good day.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// ⏱️ Whole-request timeout. Unset means "wait for the platform to give up first".
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// 🧭 The endpoint, normalized: a scheme and an authority (`host[:port]`).
///
/// The authority is what goes in the `Host` header, so it's also what gets signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OpenSearchEndpoint {
    scheme: String,
    authority: String,
}

impl OpenSearchEndpoint {
    pub(crate) fn parse(endpoint: &str) -> Result<Self> {
        let endpoint = endpoint.trim();
        // -- the scheme is decided on the raw input. only a bare host gets https and its slash trimmed.
        let with_scheme = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            let bare = endpoint.trim_end_matches('/');
            anyhow::ensure!(
                is_bare_authority(bare),
                "💀 '{endpoint}' is not an endpoint we can aim at. Expected a hostname, host:port, or an http(s) URL."
            );
            format!("https://{bare}")
        };
        let url = Url::parse(&with_scheme).with_context(|| {
            format!("💀 '{endpoint}' is not an endpoint we can aim at. Expected a hostname or an http(s) URL.")
        })?;
        anyhow::ensure!(
            matches!(url.scheme(), "http" | "https"),
            "💀 '{endpoint}' speaks {}. We only do http and https.",
            url.scheme()
        );
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .with_context(|| format!("💀 '{endpoint}' has no host. A URL with no host is just a vibe."))?;
        // -- Url drops the port when it's the scheme default, which is what the Host header does too
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Ok(Self {
            scheme: url.scheme().to_string(),
            authority,
        })
    }

    pub(crate) fn authority(&self) -> &str {
        &self.authority
    }

    pub(crate) fn url_for(&self, path: &str) -> String {
        format!("{}://{}{}", self.scheme, self.authority, path)
    }
}

// -- `host` or `host:port`, nothing else. IPv6 literals need the URL form.
fn is_bare_authority(bare: &str) -> bool {
    let (host, port) = match bare.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (bare, None),
    };
    let host_ok = !host.is_empty() && !host.contains(|c: char| matches!(c, '/' | '@' | '?' | '#'));
    let port_ok = port.is_none_or(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
    host_ok && port_ok
}

/// 📡 The sink side of the OpenSearch backend: pure I/O, zero buffering.
///
/// Takes a request the signer already finished, sends it verbatim, waits for the whole
/// body, hands the classification back. No retries. One POST is one POST.
#[derive(Debug)]
pub(crate) struct OpenSearchSink {
    client: reqwest::Client,
    endpoint: OpenSearchEndpoint,
}

impl OpenSearchSink {
    /// 🚀 Build the HTTP client. No connectivity ping: a ping would need its own signature,
    /// and the first line's POST tells us the same thing.
    pub(crate) fn new(config: &OpenSearchSinkConfig, endpoint: OpenSearchEndpoint) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .context("💀 The HTTP client refused to be born. The TLS stack wept. Probably a missing cert store or a cursed system OpenSSL.")?;

        debug!("📡 OpenSearch sink ready, aiming at {}", endpoint.url_for(""));
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Sink for OpenSearchSink {
    async fn send(&mut self, request: SignedRequest) -> Result<BulkResponse> {
        let url = self.endpoint.url_for(&request.path);
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .with_context(|| format!("💀 '{}' is not an HTTP method. Not even a creative one.", request.method))?;

        trace!("📡 {} {} with {} bytes", request.method, url, request.body.len());
        let mut builder = self.client.request(method, &url);
        // -- the signed headers go out exactly as signed. touch one and the signature is confetti.
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .body(request.body)
            .send()
            .await
            .with_context(|| format!("💀 The POST to {url} never came back. Check connectivity, DNS, and whether the domain still exists."))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("💀 {url} answered with {status} and then hung up mid-sentence."))?;

        Ok(BulkResponse::classify(status, &body))
    }

    async fn close(&mut self) -> Result<()> {
        debug!("🗑️ OpenSearch sink closing. No buffer to flush, just a connection pool to release.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_a_bare_host_gets_https_and_no_port() {
        let endpoint = OpenSearchEndpoint::parse("search-logs-abc.us-east-1.es.amazonaws.com").unwrap();
        assert_eq!(endpoint.authority(), "search-logs-abc.us-east-1.es.amazonaws.com");
        assert_eq!(
            endpoint.url_for("/_bulk"),
            "https://search-logs-abc.us-east-1.es.amazonaws.com/_bulk"
        );
    }

    #[test]
    fn the_one_where_a_local_url_keeps_its_port_and_scheme() {
        let endpoint = OpenSearchEndpoint::parse("http://127.0.0.1:9200/").unwrap();
        assert_eq!(endpoint.authority(), "127.0.0.1:9200");
        assert_eq!(endpoint.url_for("/_bulk"), "http://127.0.0.1:9200/_bulk");
    }

    #[test]
    fn the_one_where_the_default_port_is_left_out_of_the_host_header() {
        let endpoint = OpenSearchEndpoint::parse("https://search-x.eu-west-1.es.amazonaws.com:443").unwrap();
        assert_eq!(endpoint.authority(), "search-x.eu-west-1.es.amazonaws.com");
    }

    #[test]
    fn the_one_where_garbage_is_not_an_endpoint() {
        assert!(OpenSearchEndpoint::parse("http://").is_err());
        assert!(OpenSearchEndpoint::parse("::::").is_err());
    }

    #[test]
    fn the_one_where_a_scheme_with_nothing_after_it_is_not_mistaken_for_a_host() {
        // -- these used to come out as `https://http:` with a host named "http"
        for endpoint in ["http://", "https://", "http:", "http:/", "  http://  ", "", "/", "host:", "host:port"] {
            assert!(
                OpenSearchEndpoint::parse(endpoint).is_err(),
                "'{endpoint}' should not parse"
            );
        }
        assert!(OpenSearchEndpoint::parse("ftp://search-x.eu-west-1.es.amazonaws.com").is_err());
    }

    #[test]
    fn the_one_where_trailing_slashes_and_whitespace_are_forgiven() {
        let endpoint = OpenSearchEndpoint::parse("  search-logs.us-east-1.es.amazonaws.com/ ").unwrap();
        assert_eq!(endpoint.authority(), "search-logs.us-east-1.es.amazonaws.com");
        assert_eq!(
            endpoint.url_for("/_bulk"),
            "https://search-logs.us-east-1.es.amazonaws.com/_bulk"
        );

        let endpoint = OpenSearchEndpoint::parse("localhost:9200").unwrap();
        assert_eq!(endpoint.url_for("/_bulk"), "https://localhost:9200/_bulk");
    }

    #[test]
    fn the_one_where_timeouts_default_sensibly() {
        let config: OpenSearchSinkConfig = serde_json::from_value(serde_json::json!({
            "endpoint": "localhost:9200",
            "credentials": {"access_key_id": "AKID", "secret_access_key": "shh"}
        }))
        .unwrap();
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.request_timeout_secs, None);
        assert_eq!(config.region, None);
    }
}
