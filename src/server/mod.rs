//! HTTP front end.
//!
//! Routes:
//!
//! - `POST /download`: stream an archive for the manifest in the body
//! - `POST /create_download_link`: register the manifest, return a link id
//! - `GET /download_link/{link_id}`: stream the archive for a registered link
//!
//! The two `POST` routes sit behind [`BasicAuth`] when it is configured.

mod auth;
mod error;
mod handlers;

pub use auth::{BasicAuth, REALM};
pub use error::ApiError;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::http::Method;
use axum::routing::{get, post};
use axum::{Router, middleware};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::RequestBodyTimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::io::{ObjectStore, S3Client, S3Config};
use crate::manifest::{S3Credentials, StoreAccess};
use crate::registry::LinkRegistry;

/// Builds object store clients from manifest credentials
pub trait StoreConnector: Send + Sync {
    fn connect(&self, credentials: &S3Credentials) -> Result<Arc<dyn ObjectStore>>;
}

/// Connects to S3-compatible endpoints over HTTPS
pub struct S3Connector;

impl StoreConnector for S3Connector {
    fn connect(&self, credentials: &S3Credentials) -> Result<Arc<dyn ObjectStore>> {
        let client = S3Client::new(&S3Config {
            credentials: credentials.clone(),
            require_tls: true,
        })?;
        Ok(Arc::new(client))
    }
}

/// A store bound at startup together with its bucket
#[derive(Clone)]
pub struct DirectStore {
    pub store: Arc<dyn ObjectStore>,
    pub bucket: String,
}

/// Picks the store a manifest's members are read from
#[derive(Clone)]
pub struct StoreResolver {
    direct: Option<DirectStore>,
    connector: Arc<dyn StoreConnector>,
}

impl StoreResolver {
    pub fn new(direct: Option<DirectStore>, connector: Arc<dyn StoreConnector>) -> Self {
        Self { direct, connector }
    }

    pub fn has_direct(&self) -> bool {
        self.direct.is_some()
    }

    /// The store and bucket to read from for `access`.
    pub fn open(&self, access: &StoreAccess) -> Result<(Arc<dyn ObjectStore>, String)> {
        match (access, &self.direct) {
            (_, Some(direct)) => Ok((Arc::clone(&direct.store), direct.bucket.clone())),
            (StoreAccess::Credentials(creds), None) => {
                Ok((self.connector.connect(creds)?, creds.bucket.clone()))
            }
            (StoreAccess::Direct, None) => anyhow::bail!("no direct object store is configured"),
        }
    }
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub links: LinkRegistry,
    pub stores: StoreResolver,
}

/// Router settings that are not part of the handler state
#[derive(Clone, Default)]
pub struct RouterConfig {
    pub auth: Option<BasicAuth>,
    /// Limit on how long reading a request body may take
    pub read_timeout: Option<Duration>,
}

/// Build the application router.
///
/// `POST /download` and `POST /create_download_link` sit behind basic auth
/// when `config.auth` is set; `GET /download_link/:link_id` never does.
/// Every route gets request tracing and permissive CORS, and request bodies
/// are cut off after `config.read_timeout`.
///
/// # Arguments
///
/// * `state` - Link registry and store resolver shared by all handlers
/// * `config` - Auth and timeout settings
///
/// # Returns
///
/// A router ready for `axum::serve`.
pub fn router(state: AppState, config: RouterConfig) -> Router {
    let mut manifest_routes: Router<AppState> = Router::new()
        .route("/download", post(handlers::download))
        .route("/create_download_link", post(handlers::create_link));
    if let Some(auth) = config.auth {
        manifest_routes = manifest_routes.route_layer(middleware::from_fn_with_state(
            Arc::new(auth),
            auth::require_basic_auth,
        ));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::OPTIONS,
        ]);

    let router: Router<AppState> = Router::new()
        .merge(manifest_routes)
        .route("/download_link/:link_id", get(handlers::download_link))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        );

    let router = match config.read_timeout {
        Some(timeout) => router.layer(RequestBodyTimeoutLayer::new(timeout)),
        None => router,
    };
    router.with_state(state)
}
