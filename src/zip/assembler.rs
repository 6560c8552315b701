use std::io;

use chrono::Local;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use super::writer::ZipStreamWriter;
use crate::io::{ArchiveSink, ObjectReader, ObjectStore};
use crate::manifest::MemberEntry;

/// Size of the buffer each member is copied through.
pub const COPY_BUFFER_SIZE: usize = 32 * 1024;

/// Ways building an archive can fail
#[derive(Debug, Error)]
pub enum AssembleError {
    /// There was nothing to put in the archive.
    #[error("manifest has no valid entries")]
    EmptyManifest,

    /// A member could not be opened in the object store.
    #[error("failed to fetch {source_path}")]
    Fetch {
        source_path: String,
        #[source]
        source: anyhow::Error,
    },

    /// Reading a member or writing it into the archive failed.
    #[error("failed to copy {source_path} into the archive")]
    Copy {
        source_path: String,
        #[source]
        source: io::Error,
    },

    /// The first member failed, so no member was completely written.
    #[error("no member could be written")]
    AllMembersFailed(#[source] Box<AssembleError>),

    /// Writing the central directory failed.
    #[error("failed to finish the archive")]
    Finish(#[source] io::Error),
}

/// Outcome of a completed archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssembleSummary {
    pub members: usize,
    pub bytes: u64,
}

/// Builds one archive from an ordered list of members.
///
/// Members are fetched and written strictly one after another, so the
/// archive lists them in manifest order and at most one copy buffer of
/// member data is in flight. The first failure aborts the whole archive:
/// later members are never fetched and no central directory is written.
#[derive(Debug, Clone)]
pub struct ArchiveAssembler {
    members: Vec<MemberEntry>,
}

impl ArchiveAssembler {
    pub fn new(members: Vec<MemberEntry>) -> Result<Self, AssembleError> {
        if members.is_empty() {
            return Err(AssembleError::EmptyManifest);
        }
        Ok(Self { members })
    }

    pub fn members(&self) -> &[MemberEntry] {
        &self.members
    }

    /// Stream the archive into `sink`, reading members from `bucket`.
    ///
    /// After each member the writer is flushed and, when the sink offers
    /// [`FlushableSink`](crate::io::FlushableSink), so is the transport.
    /// Bytes already handed to the sink stay there on failure.
    ///
    /// # Arguments
    ///
    /// * `store` - Where member objects are read from
    /// * `bucket` - Bucket holding every member
    /// * `sink` - Destination for the archive bytes
    ///
    /// # Returns
    ///
    /// The number of members and archive bytes written. On failure:
    ///
    /// * [`AssembleError::AllMembersFailed`] if the first member failed
    ///   before it was completely written and flushed
    /// * the member's own [`AssembleError::Fetch`] or
    ///   [`AssembleError::Copy`] for any later member
    /// * [`AssembleError::Finish`] if the central directory could not be
    ///   written
    pub async fn assemble<S>(
        &self,
        store: &dyn ObjectStore,
        bucket: &str,
        sink: &mut S,
    ) -> Result<AssembleSummary, AssembleError>
    where
        S: ArchiveSink + ?Sized,
    {
        let mut writer = ZipStreamWriter::new(sink);
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        // Members written and flushed through to the sink
        let mut written = 0usize;

        for member in &self.members {
            if let Err(err) = write_member(&mut writer, store, bucket, member, &mut buf).await {
                return Err(if written == 0 {
                    AssembleError::AllMembersFailed(Box::new(err))
                } else {
                    err
                });
            }
            written += 1;
        }

        let members = written;
        let bytes = writer.bytes_written();
        let sink = writer.finish().await.map_err(AssembleError::Finish)?;
        if let Some(transport) = sink.as_flushable() {
            transport.flush().await.map_err(AssembleError::Finish)?;
        }

        info!(members, bytes, "archive complete");
        Ok(AssembleSummary { members, bytes })
    }
}

async fn write_member<W: ArchiveSink>(
    writer: &mut ZipStreamWriter<W>,
    store: &dyn ObjectStore,
    bucket: &str,
    member: &MemberEntry,
    buf: &mut [u8],
) -> Result<(), AssembleError> {
    let source_path = member.source_path();
    let copy_error = |source: io::Error| AssembleError::Copy {
        source_path: source_path.to_string(),
        source,
    };

    // Dropped on every return path, which closes the object stream.
    let mut object: ObjectReader = store
        .get_object(bucket, source_path)
        .await
        .map_err(|source| AssembleError::Fetch {
            source_path: source_path.to_string(),
            source,
        })?;
    debug!(source_path, archive_path = member.archive_path(), "streaming member");

    writer
        .start_entry(member.archive_path(), Local::now())
        .await
        .map_err(copy_error)?;

    loop {
        let n = object.read(buf).await.map_err(copy_error)?;
        if n == 0 {
            break;
        }
        writer.write_data(&buf[..n]).await.map_err(copy_error)?;
    }
    writer.finish_entry().await.map_err(copy_error)?;

    writer.flush().await.map_err(copy_error)?;
    if let Some(transport) = writer.get_mut().as_flushable() {
        transport.flush().await.map_err(copy_error)?;
    }
    Ok(())
}
