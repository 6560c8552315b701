use std::time::Duration;

use clap::Parser;

use crate::io::S3Config;
use crate::manifest::S3Credentials;
use crate::server::BasicAuth;

#[derive(Parser, Debug)]
#[command(name = "zipstream")]
#[command(version)]
#[command(about = "Stream ZIP archives assembled from S3 objects", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipstream --port 8080                       listen on port 8080\n  \
  PORT=8080 BASIC_AUTH_USERNAME=u BASIC_AUTH_PASSWORD=p zipstream\n  \
  zipstream --direct-endpoint s3.example.com --direct-bucket files")]
pub struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 4008)]
    pub port: u16,

    /// Basic auth user for the manifest endpoints (auth is off unless
    /// both user and password are set)
    #[arg(long, env = "BASIC_AUTH_USERNAME", default_value = "")]
    pub username: String,

    /// Basic auth password for the manifest endpoints
    #[arg(long, env = "BASIC_AUTH_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Seconds a download link stays valid
    #[arg(long, env = "LINK_TTL_SECS", default_value_t = 60)]
    pub link_ttl: u64,

    /// Seconds allowed for reading a request body
    #[arg(long, env = "READ_TIMEOUT_SECS", default_value_t = 10)]
    pub read_timeout: u64,

    /// Log filter, e.g. `info` or `zipstream=debug`
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Endpoint of a store to use for every request instead of manifest
    /// credentials
    #[arg(long, env = "DIRECT_S3_ENDPOINT")]
    pub direct_endpoint: Option<String>,

    /// Bucket read by the direct client
    #[arg(long, env = "DIRECT_S3_BUCKET")]
    pub direct_bucket: Option<String>,

    #[arg(long, env = "DIRECT_S3_ACCESS_KEY", default_value = "", hide_env_values = true)]
    pub direct_access_key: String,

    #[arg(long, env = "DIRECT_S3_SECRET_KEY", default_value = "", hide_env_values = true)]
    pub direct_secret_key: String,

    #[arg(long, env = "DIRECT_S3_SESSION_TOKEN", default_value = "", hide_env_values = true)]
    pub direct_session_token: String,

    #[arg(long, env = "DIRECT_S3_REGION", default_value = "")]
    pub direct_region: String,

    /// Allow the direct client to use plain HTTP
    #[arg(long, env = "DIRECT_S3_INSECURE")]
    pub direct_insecure: bool,
}

impl Cli {
    pub fn basic_auth(&self) -> Option<BasicAuth> {
        BasicAuth::new(&self.username, &self.password)
    }

    pub fn link_ttl(&self) -> Duration {
        Duration::from_secs(self.link_ttl)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    /// Settings for the direct client, if endpoint and bucket are both set.
    pub fn direct_store(&self) -> Option<S3Config> {
        let endpoint = self.direct_endpoint.as_deref().filter(|e| !e.is_empty())?;
        let bucket = self.direct_bucket.as_deref().filter(|b| !b.is_empty())?;

        Some(S3Config {
            credentials: S3Credentials {
                access_key: self.direct_access_key.clone(),
                secret_key: self.direct_secret_key.clone(),
                session_token: self.direct_session_token.clone(),
                bucket: bucket.to_string(),
                endpoint: endpoint.to_string(),
                region: self.direct_region.clone(),
            },
            require_tls: !self.direct_insecure,
        })
    }
}
