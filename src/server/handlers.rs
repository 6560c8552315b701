use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use super::{ApiError, AppState};
use crate::io::ChannelSink;
use crate::manifest::{DEFAULT_ARCHIVE_NAME, Manifest, StoreAccess};
use crate::zip::ArchiveAssembler;

/// `POST /download`
pub async fn download(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let manifest = parse_manifest(&state, &body)?;
    stream_archive(&state, &manifest)
}

/// `POST /create_download_link`
pub async fn create_link(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let manifest = parse_manifest(&state, &body)?;
    let members = manifest.members.len();
    let link_id = state.links.register(manifest);
    info!(%link_id, members, "created download link");
    Ok(Json(json!({ "status": "ok", "link_id": link_id })))
}

/// `GET /download_link/{link_id}`
pub async fn download_link(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> Result<Response, ApiError> {
    let manifest = state.links.resolve(&link_id).ok_or_else(|| {
        debug!(%link_id, "unknown download link");
        ApiError::LinkNotFound
    })?;
    stream_archive(&state, &manifest)
}

fn parse_manifest(state: &AppState, body: &[u8]) -> Result<Manifest, ApiError> {
    let manifest = Manifest::from_json(body).map_err(|err| {
        warn!(error = %err, "rejected manifest");
        ApiError::InvalidBody(err.to_string())
    })?;

    if state.stores.has_direct() {
        Ok(manifest.into_direct())
    } else {
        Ok(manifest)
    }
}

/// Validate, commit to a 200 response, and start producing the archive.
///
/// Everything that can be reported with a status code is checked before
/// the response is returned. The archive itself is written by a spawned
/// task; if it fails, the body stream ends in an error so the connection
/// is dropped rather than completed.
///
/// # Arguments
///
/// * `state` - Shared state; supplies the object store for `manifest`
/// * `manifest` - The archive to build
///
/// # Returns
///
/// A streaming `200` response with `application/zip` and an attachment
/// disposition, or:
///
/// * [`ApiError::InvalidEntries`] if no member survived validation
/// * [`ApiError::InvalidCredentials`] if no store client could be built
fn stream_archive(state: &AppState, manifest: &Manifest) -> Result<Response, ApiError> {
    let assembler =
        ArchiveAssembler::new(manifest.members.clone()).map_err(|_| ApiError::InvalidEntries)?;

    let (store, bucket) = state.stores.open(&manifest.access).map_err(|err| {
        warn!(error = %format!("{err:#}"), "cannot open object store");
        ApiError::InvalidCredentials(err.to_string())
    })?;
    match &manifest.access {
        StoreAccess::Direct => debug!(%bucket, "streaming with the direct client"),
        StoreAccess::Credentials(_) => debug!(%bucket, "streaming with manifest credentials"),
    }

    let (mut sink, rx) = ChannelSink::channel();
    let filename = manifest.filename.clone();

    tokio::spawn(async move {
        match assembler.assemble(store.as_ref(), &bucket, &mut sink).await {
            Ok(summary) => {
                info!(%filename, members = summary.members, bytes = summary.bytes, "archive sent");
            }
            Err(err) => {
                let err = anyhow::Error::from(err);
                error!(
                    %filename,
                    error = %format!("{err:#}"),
                    "archive failed mid-stream, dropping connection"
                );
                sink.abort(std::io::Error::other(format!("{err:#}"))).await;
            }
        }
    });

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
        (header::CONTENT_DISPOSITION, content_disposition(&manifest.filename)),
    ];
    Ok((
        StatusCode::OK,
        headers,
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response())
}

/// `attachment; filename="..."` with characters that would break the
/// quoted string removed.
fn content_disposition(filename: &str) -> HeaderValue {
    let cleaned: String = filename
        .chars()
        .filter(|c| !matches!(c, '"' | '\\') && !c.is_control())
        .collect();
    let cleaned = if cleaned.is_empty() {
        DEFAULT_ARCHIVE_NAME
    } else {
        cleaned.as_str()
    };

    HeaderValue::from_bytes(format!("attachment; filename=\"{cleaned}\"").as_bytes())
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"archive.zip\""))
}
