use serde::Deserialize;
use tracing::debug;

use super::{DEFAULT_ARCHIVE_NAME, Manifest, MemberEntry, S3Credentials, StoreAccess};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CredentialsPayload {
    #[serde(alias = "AccessKey")]
    access_key: String,
    #[serde(alias = "SecretKey")]
    secret_key: String,
    #[serde(alias = "SessionToken")]
    session_token: String,
    #[serde(alias = "Bucket")]
    bucket: String,
    #[serde(alias = "Endpoint")]
    endpoint: String,
    #[serde(alias = "Region")]
    region: String,
}

#[derive(Debug, Deserialize)]
struct EntryPayload {
    #[serde(rename = "s3Path", alias = "S3Path", default)]
    s3_path: String,
    #[serde(rename = "zipPath", alias = "ZipPath", default)]
    zip_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestPayload {
    #[serde(default, alias = "S3Creds")]
    s3_creds: CredentialsPayload,
    #[serde(default, alias = "ZipFilename")]
    zip_filename: Option<String>,
    #[serde(default, alias = "Entries")]
    entries: Vec<EntryPayload>,
}

impl From<CredentialsPayload> for S3Credentials {
    fn from(payload: CredentialsPayload) -> Self {
        Self {
            access_key: payload.access_key,
            secret_key: payload.secret_key,
            session_token: payload.session_token,
            bucket: payload.bucket,
            endpoint: payload.endpoint,
            region: payload.region,
        }
    }
}

impl Manifest {
    /// Parse a manifest from a request body.
    ///
    /// Entries whose archive path does not validate are dropped without
    /// error; only malformed JSON fails. The result may therefore contain no
    /// members at all.
    pub fn from_json(body: &[u8]) -> serde_json::Result<Self> {
        let payload: ManifestPayload = serde_json::from_slice(body)?;

        let filename = payload
            .zip_filename
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_ARCHIVE_NAME.to_string());

        let members = payload
            .entries
            .into_iter()
            .filter_map(|entry| match MemberEntry::new(entry.s3_path, &entry.zip_path) {
                Ok(member) => Some(member),
                Err(err) => {
                    debug!(error = %err, "dropping manifest entry");
                    None
                }
            })
            .collect();

        Ok(Self {
            filename,
            access: StoreAccess::Credentials(payload.s3_creds.into()),
            members,
        })
    }
}
