use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use reqwest::{Client, StatusCode, Url};
use tokio_util::io::StreamReader;
use tracing::debug;

use super::sigv4::{self, SigningKey, UNSIGNED_PAYLOAD};
use super::{ObjectReader, ObjectStore};
use crate::manifest::S3Credentials;

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3Config {
    pub credentials: S3Credentials,
    /// Refuse anything but HTTPS
    pub require_tls: bool,
}

/// Object reader for S3-compatible stores using path-style GET requests
pub struct S3Client {
    client: Client,
    base: Url,
    signing_key: SigningKey,
    session_token: Option<String>,
}

impl S3Client {
    /// Create a client for `config`.
    ///
    /// The endpoint may be a bare `host[:port]`, in which case HTTPS is
    /// assumed, or a full `http(s)://` URL.
    pub fn new(config: &S3Config) -> Result<Self> {
        let creds = &config.credentials;
        let base = endpoint_url(&creds.endpoint)?;

        if config.require_tls && base.scheme() != "https" {
            bail!("endpoint {} must use HTTPS", creds.endpoint);
        }

        let client = Client::builder()
            .https_only(config.require_tls)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base,
            signing_key: SigningKey::new(&creds.access_key, &creds.secret_key, creds.region()),
            session_token: creds.session_token().map(str::to_string),
        })
    }

    /// The request URL and the canonical path it is signed with.
    ///
    /// URL parsing collapses `.` and `..` segments (percent-encoded or
    /// not), so a key containing them would be sent to a different path
    /// than the one signed. Such keys are refused.
    fn object_url(&self, bucket: &str, key: &str) -> Result<(Url, String)> {
        let prefix = self.base.path().trim_end_matches('/');
        let path = sigv4::encode_path(&format!("{prefix}/{bucket}/{key}"));
        let mut url = self.base.clone();
        url.set_path(&path);
        if url.path() != path {
            bail!("object key {key} in bucket {bucket} has `.` or `..` segments and cannot be requested");
        }
        Ok((url, path))
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader> {
        let (url, canonical_uri) = self.object_url(bucket, key)?;
        let host = host_header(&url)?;

        let now = Utc::now();
        let amz_date = sigv4::amz_date(now);

        let mut signed: Vec<(&str, &str)> = vec![
            ("host", host.as_str()),
            ("x-amz-content-sha256", UNSIGNED_PAYLOAD),
            ("x-amz-date", amz_date.as_str()),
        ];
        if let Some(token) = &self.session_token {
            signed.push(("x-amz-security-token", token.as_str()));
        }
        let authorization =
            self.signing_key
                .authorization("GET", &canonical_uri, &signed, UNSIGNED_PAYLOAD, now);

        debug!(bucket, key, %url, "fetching object");

        let mut request = self
            .client
            .get(url)
            .header("x-amz-content-sha256", UNSIGNED_PAYLOAD)
            .header("x-amz-date", &amz_date)
            .header("authorization", authorization);
        if let Some(token) = &self.session_token {
            request = request.header("x-amz-security-token", token);
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("request for {bucket}/{key} failed"))?;

        match resp.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => bail!("object {key} not found in bucket {bucket}"),
            status => bail!("object store returned {status} for {bucket}/{key}"),
        }

        let stream = resp.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::new(StreamReader::new(Box::pin(stream))))
    }
}

fn endpoint_url(endpoint: &str) -> Result<Url> {
    if endpoint.is_empty() {
        bail!("object store endpoint is empty");
    }
    let with_scheme = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    };
    Url::parse(&with_scheme).with_context(|| format!("invalid endpoint {endpoint}"))
}

/// The `Host` header reqwest will send for `url`.
fn host_header(url: &Url) -> Result<String> {
    let host = url.host_str().context("endpoint has no host")?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
