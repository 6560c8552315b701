mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{BUCKET, ScriptedStore, read_archive};
use zipstream::io::ObjectStore;
use zipstream::manifest::S3Credentials;
use zipstream::registry::LinkRegistry;
use zipstream::server::{
    AppState, BasicAuth, DirectStore, RouterConfig, StoreConnector, StoreResolver, router,
};

const LIMIT: usize = 16 * 1024 * 1024;

/// Hands out the shared test store and records the credentials it saw.
struct TestConnector {
    store: Arc<ScriptedStore>,
    seen: Mutex<Vec<S3Credentials>>,
}

impl StoreConnector for TestConnector {
    fn connect(&self, credentials: &S3Credentials) -> Result<Arc<dyn ObjectStore>> {
        self.seen.lock().unwrap().push(credentials.clone());
        if credentials.endpoint == "bad endpoint" {
            anyhow::bail!("invalid endpoint");
        }
        Ok(self.store.clone())
    }
}

fn scenario_store() -> ScriptedStore {
    ScriptedStore::new()
        .with_object("a.txt", b"alpha")
        .with_object("b.bin", [0u8, 1, 2, 3, 255])
}

fn scenario_manifest() -> Value {
    json!({
        "s3Creds": {
            "accessKey": "AK",
            "secretKey": "SK",
            "bucket": BUCKET,
            "endpoint": "s3.example.com"
        },
        "zipFilename": "bundle.zip",
        "entries": [
            { "s3Path": "a.txt", "zipPath": "docs/a.txt" },
            { "s3Path": "b.bin", "zipPath": "b.bin" }
        ]
    })
}

struct Harness {
    app: Router,
    connector: Arc<TestConnector>,
}

fn harness(store: ScriptedStore, config: RouterConfig) -> Harness {
    let connector = Arc::new(TestConnector {
        store: Arc::new(store),
        seen: Mutex::new(Vec::new()),
    });
    let state = AppState {
        links: LinkRegistry::new(Duration::from_secs(60)),
        stores: StoreResolver::new(None, connector.clone()),
    };
    Harness {
        app: router(state, config),
        connector,
    }
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), LIMIT).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn assert_scenario_archive(archive: &[u8]) {
    let members = read_archive(archive).unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].name, "docs/a.txt");
    assert_eq!(members[0].data, b"alpha");
    assert_eq!(members[1].name, "b.bin");
    assert_eq!(members[1].data, [0u8, 1, 2, 3, 255]);
}

#[tokio::test]
async fn test_download_streams_archive() {
    let h = harness(scenario_store(), RouterConfig::default());

    let response = h
        .app
        .oneshot(post_json("/download", &scenario_manifest()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"bundle.zip\""
    );

    let archive = to_bytes(response.into_body(), LIMIT).await.unwrap();
    assert_scenario_archive(&archive);

    let seen = h.connector.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].access_key, "AK");
    assert_eq!(seen[0].bucket, BUCKET);
}

#[tokio::test]
async fn test_default_archive_name() {
    let h = harness(scenario_store(), RouterConfig::default());
    let mut manifest = scenario_manifest();
    manifest.as_object_mut().unwrap().remove("zipFilename");

    let response = h
        .app
        .oneshot(post_json("/download", &manifest))
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"archive.zip\""
    );
}

#[tokio::test]
async fn test_link_round_trip() {
    let h = harness(scenario_store(), RouterConfig::default());

    let response = h
        .app
        .clone()
        .oneshot(post_json("/create_download_link", &scenario_manifest()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    let link_id = body["link_id"].as_str().unwrap().to_string();
    assert_eq!(link_id.len(), 36);

    // The link can be used more than once while it is alive.
    for _ in 0..2 {
        let response = h
            .app
            .clone()
            .oneshot(
                Request::get(format!("/download_link/{link_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"bundle.zip\""
        );
        let archive = to_bytes(response.into_body(), LIMIT).await.unwrap();
        assert_scenario_archive(&archive);
    }
}

#[tokio::test]
async fn test_unknown_link() {
    let h = harness(scenario_store(), RouterConfig::default());

    let response = h
        .app
        .oneshot(
            Request::get("/download_link/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        json!({ "status": "error", "error": "link not found" })
    );
    assert!(h.connector.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_body() {
    let h = harness(scenario_store(), RouterConfig::default());

    for body in ["", "not json", "[1, 2]"] {
        let response = h
            .app
            .clone()
            .oneshot(Request::post("/download").body(Body::from(body)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "status": "error", "error": "invalid body" })
        );
    }
}

#[tokio::test]
async fn test_no_valid_entries() {
    let h = harness(scenario_store(), RouterConfig::default());
    let manifest = json!({
        "s3Creds": { "bucket": BUCKET, "endpoint": "s3.example.com" },
        "entries": [
            { "s3Path": "a.txt", "zipPath": "../../etc/passwd" },
            { "s3Path": "b.bin", "zipPath": "/abs/b.bin" },
            { "s3Path": "c", "zipPath": "./" }
        ]
    });

    let response = h
        .app
        .clone()
        .oneshot(post_json("/download", &manifest))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "status": "error", "error": "invalid entries" })
    );

    // A link is still handed out; using it reports the same problem.
    let response = h
        .app
        .clone()
        .oneshot(post_json("/create_download_link", &manifest))
        .await
        .unwrap();
    let link_id = json_body(response).await["link_id"]
        .as_str()
        .unwrap()
        .to_string();
    let response = h
        .app
        .oneshot(
            Request::get(format!("/download_link/{link_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_entries_are_dropped() {
    let h = harness(scenario_store(), RouterConfig::default());
    let mut manifest = scenario_manifest();
    manifest["entries"]
        .as_array_mut()
        .unwrap()
        .insert(1, json!({ "s3Path": "a.txt", "zipPath": "../../etc/passwd" }));

    let response = h
        .app
        .oneshot(post_json("/download", &manifest))
        .await
        .unwrap();
    let archive = to_bytes(response.into_body(), LIMIT).await.unwrap();
    assert_scenario_archive(&archive);
}

#[tokio::test]
async fn test_bad_credentials_rejected_before_streaming() {
    let h = harness(scenario_store(), RouterConfig::default());
    let mut manifest = scenario_manifest();
    manifest["s3Creds"]["endpoint"] = json!("bad endpoint");

    let response = h
        .app
        .oneshot(post_json("/download", &manifest))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "status": "error", "error": "invalid credentials" })
    );
}

#[tokio::test]
async fn test_failure_mid_stream_breaks_body() {
    let store = scenario_store().fail_fetch("b.bin");
    let h = harness(store, RouterConfig::default());

    let response = h
        .app
        .oneshot(post_json("/download", &scenario_manifest()))
        .await
        .unwrap();

    // Headers were already committed.
    assert_eq!(response.status(), StatusCode::OK);
    assert!(to_bytes(response.into_body(), LIMIT).await.is_err());
}

#[tokio::test]
async fn test_direct_store_overrides_credentials() {
    let direct = Arc::new(
        ScriptedStore::new()
            .with_object("a.txt", b"alpha")
            .with_object("b.bin", [0u8, 1, 2, 3, 255]),
    );
    let connector = Arc::new(TestConnector {
        store: Arc::new(ScriptedStore::new()),
        seen: Mutex::new(Vec::new()),
    });
    let state = AppState {
        links: LinkRegistry::default(),
        stores: StoreResolver::new(
            Some(DirectStore {
                store: direct.clone(),
                bucket: BUCKET.to_string(),
            }),
            connector.clone(),
        ),
    };
    let app = router(state, RouterConfig::default());

    let mut manifest = scenario_manifest();
    manifest["s3Creds"] = json!({ "bucket": "elsewhere", "endpoint": "bad endpoint" });

    let response = app
        .oneshot(post_json("/download", &manifest))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let archive = to_bytes(response.into_body(), LIMIT).await.unwrap();
    assert_scenario_archive(&archive);

    assert!(connector.seen.lock().unwrap().is_empty());
    assert_eq!(direct.fetched(), ["a.txt", "b.bin"]);
}

#[tokio::test]
async fn test_basic_auth_guards_manifest_routes() {
    let config = RouterConfig {
        auth: BasicAuth::new("admin", "secret"),
        read_timeout: None,
    };
    let h = harness(scenario_store(), config);

    let response = h
        .app
        .clone()
        .oneshot(post_json("/download", &scenario_manifest()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        "Basic realm=\"zipstream\""
    );

    let mut request = post_json("/create_download_link", &scenario_manifest());
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Basic {}", STANDARD.encode("admin:secret"))
            .parse()
            .unwrap(),
    );
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let link_id = json_body(response).await["link_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Link downloads carry no credentials.
    let response = h
        .app
        .oneshot(
            Request::get(format!("/download_link/{link_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cors_preflight() {
    let h = harness(scenario_store(), RouterConfig::default());

    let response = h
        .app
        .oneshot(
            Request::options("/download")
                .header(header::ORIGIN, "https://app.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
