use thiserror::Error;

/// Reasons an archive path is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path is absolute or climbs above the archive root.
    #[error("archive path must be relative and stay inside the archive: {0}")]
    InvalidPath(String),

    /// The path cleans to nothing, leaving no file component.
    #[error("archive path must name a file: {0}")]
    MissingFilename(String),
}

/// One object from the store mapped to one file inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    source_path: String,
    archive_path: String,
}

impl MemberEntry {
    /// Validate `archive_path` and pair it with `source_path`.
    ///
    /// The archive path is cleaned lexically first, so `a//b/./c` becomes
    /// `a/b/c` and `a/x/../b` becomes `a/b`. The source path is opaque and
    /// kept as given.
    pub fn new(
        source_path: impl Into<String>,
        archive_path: &str,
    ) -> Result<Self, PathError> {
        let cleaned = clean_path(archive_path);

        if cleaned.starts_with('/') || cleaned == ".." || cleaned.starts_with("../") {
            return Err(PathError::InvalidPath(archive_path.to_string()));
        }

        let filename = cleaned.rsplit('/').next().unwrap_or_default();
        if filename.is_empty() || filename == "." {
            return Err(PathError::MissingFilename(archive_path.to_string()));
        }

        Ok(Self {
            source_path: source_path.into(),
            archive_path: cleaned,
        })
    }

    /// Key of the object in the remote store.
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// Normalized path of the file inside the archive.
    pub fn archive_path(&self) -> &str {
        &self.archive_path
    }
}

/// Lexically clean a `/`-separated path.
///
/// Repeated separators collapse, `.` segments vanish and `..` removes the
/// segment before it. A `..` at the top of a rooted path is dropped; at the
/// top of a relative path it is kept. The empty path cleans to `.`.
pub fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
