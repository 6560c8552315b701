//! Download manifests.
//!
//! A [`Manifest`] describes one archive: the file name the client sees, how
//! to reach the object store, and the ordered list of members. Members are
//! validated on construction by [`MemberEntry::new`]; manifests arrive as
//! JSON through [`Manifest::from_json`].

mod entry;
mod payload;

pub use entry::{MemberEntry, PathError, clean_path};

use std::fmt;

/// File name used when a manifest does not name its archive.
pub const DEFAULT_ARCHIVE_NAME: &str = "archive.zip";

/// Region used for request signing when credentials do not name one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Static credentials for an S3-compatible store.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct S3Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: String,
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
}

impl S3Credentials {
    pub fn region(&self) -> &str {
        if self.region.is_empty() {
            DEFAULT_REGION
        } else {
            &self.region
        }
    }

    pub fn session_token(&self) -> Option<&str> {
        (!self.session_token.is_empty()).then_some(self.session_token.as_str())
    }
}

impl fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("session_token", &self.session_token().map(|_| "<redacted>"))
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region())
            .finish()
    }
}

/// How the archive's members are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAccess {
    /// Use the client configured when the server started.
    Direct,
    /// Build a client from credentials carried by the manifest.
    Credentials(S3Credentials),
}

/// A complete archive request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub filename: String,
    pub access: StoreAccess,
    pub members: Vec<MemberEntry>,
}

impl Manifest {
    /// Replace any caller-supplied credentials with the direct client.
    pub fn into_direct(self) -> Self {
        Self {
            access: StoreAccess::Direct,
            ..self
        }
    }
}
