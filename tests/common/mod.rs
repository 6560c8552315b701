//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use anyhow::{Result, bail};
use async_trait::async_trait;
use byteorder::{LittleEndian, ReadBytesExt};
use flate2::Crc;
use tokio::io::{AsyncRead, ReadBuf};

use zipstream::io::{ArchiveSink, FlushableSink, MemoryStore, ObjectReader, ObjectStore};
use zipstream::zip::{
    CDFH_SIGNATURE, CDFH_SIZE, CompressionMethod, EndOfCentralDirectory, FLAG_DATA_DESCRIPTOR,
    LFH_SIGNATURE, LFH_SIZE,
};

pub const BUCKET: &str = "bucket";

/// One member as read back out of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadMember {
    pub name: String,
    pub data: Vec<u8>,
}

/// Read a complete (non-ZIP64) archive the way most unzip tools do:
/// locate the end record, walk the central directory, and follow each
/// record to its local header. Sizes and CRCs are cross-checked.
pub fn read_archive(archive: &[u8]) -> Result<Vec<ReadMember>> {
    if archive.len() < EndOfCentralDirectory::SIZE {
        bail!("archive shorter than an end record");
    }
    let eocd = archive.len() - EndOfCentralDirectory::SIZE;
    let mut r = Cursor::new(&archive[eocd..]);
    if r.read_u32::<LittleEndian>()? != EndOfCentralDirectory::SIGNATURE {
        bail!("missing end of central directory");
    }
    r.set_position(10);
    let entries = r.read_u16::<LittleEndian>()?;
    let cd_size = r.read_u32::<LittleEndian>()? as usize;
    let cd_offset = r.read_u32::<LittleEndian>()? as usize;
    if cd_offset + cd_size != eocd {
        bail!("central directory does not end at the end record");
    }

    let mut members = Vec::new();
    let mut r = Cursor::new(&archive[cd_offset..eocd]);
    for _ in 0..entries {
        let start = r.position();
        if r.read_u32::<LittleEndian>()? != CDFH_SIGNATURE {
            bail!("bad central directory signature");
        }
        r.set_position(start + 8);
        let flags = r.read_u16::<LittleEndian>()?;
        let method = r.read_u16::<LittleEndian>()?;
        r.set_position(start + 16);
        let crc32 = r.read_u32::<LittleEndian>()?;
        let compressed = r.read_u32::<LittleEndian>()? as usize;
        let size = r.read_u32::<LittleEndian>()? as usize;
        let name_len = r.read_u16::<LittleEndian>()? as u64;
        let extra_len = r.read_u16::<LittleEndian>()? as u64;
        let comment_len = r.read_u16::<LittleEndian>()? as u64;
        r.set_position(start + 42);
        let lfh_offset = r.read_u32::<LittleEndian>()? as usize;

        let name_start = cd_offset + start as usize + CDFH_SIZE;
        let name = archive[name_start..name_start + name_len as usize].to_vec();
        r.set_position(start + CDFH_SIZE as u64 + name_len + extra_len + comment_len);

        if method != CompressionMethod::Stored.as_u16() || compressed != size {
            bail!("member is not stored");
        }
        if flags & FLAG_DATA_DESCRIPTOR == 0 {
            bail!("member has no data descriptor flag");
        }

        let mut l = Cursor::new(&archive[lfh_offset..]);
        if l.read_u32::<LittleEndian>()? != LFH_SIGNATURE {
            bail!("bad local header signature");
        }
        l.set_position(26);
        let local_name_len = l.read_u16::<LittleEndian>()? as usize;
        let local_extra_len = l.read_u16::<LittleEndian>()? as usize;
        let data_start = lfh_offset + LFH_SIZE + local_name_len + local_extra_len;
        let data = archive[data_start..data_start + size].to_vec();

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != crc32 {
            bail!("crc mismatch");
        }

        members.push(ReadMember {
            name: String::from_utf8(name)?,
            data,
        });
    }
    Ok(members)
}

/// Memory store that can be told to fail fetches or reads, and remembers
/// which keys were requested.
pub struct ScriptedStore {
    inner: MemoryStore,
    fail_fetch: HashSet<String>,
    fail_read: HashSet<String>,
    fetched: Mutex<Vec<String>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_fetch: HashSet::new(),
            fail_read: HashSet::new(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn with_object(self, key: &str, data: impl AsRef<[u8]>) -> Self {
        self.inner.insert(BUCKET, key, data.as_ref().to_vec());
        self
    }

    /// Make `get_object` fail for `key`.
    pub fn fail_fetch(mut self, key: &str) -> Self {
        self.fail_fetch.insert(key.to_string());
        self
    }

    /// Let `key` open, but fail after its first bytes.
    pub fn fail_read(mut self, key: &str) -> Self {
        self.fail_read.insert(key.to_string());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for ScriptedStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader> {
        self.fetched.lock().unwrap().push(key.to_string());
        if self.fail_fetch.contains(key) {
            bail!("access denied for {key}");
        }
        let reader = self.inner.get_object(bucket, key).await?;
        if self.fail_read.contains(key) {
            let head = tokio::io::AsyncReadExt::take(reader, 3);
            return Ok(Box::new(tokio::io::AsyncReadExt::chain(head, BrokenReader)));
        }
        Ok(reader)
    }
}

/// Reader whose every read fails.
pub struct BrokenReader;

impl AsyncRead for BrokenReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by store",
        )))
    }
}

/// Sink that keeps everything and counts transport flushes.
#[derive(Default)]
pub struct RecordingSink {
    pub data: Vec<u8>,
    pub flushes: usize,
    /// Bytes that had reached the sink at each flush
    pub flushed_at: Vec<usize>,
}

#[async_trait]
impl ArchiveSink for RecordingSink {
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.data.extend_from_slice(buf);
        Ok(())
    }

    fn as_flushable(&mut self) -> Option<&mut dyn FlushableSink> {
        Some(self)
    }
}

#[async_trait]
impl FlushableSink for RecordingSink {
    async fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        self.flushed_at.push(self.data.len());
        Ok(())
    }
}

/// Sink that accepts a fixed number of writes and then reports the client
/// as gone.
pub struct ClosingSink {
    pub data: Vec<u8>,
    writes_left: usize,
}

impl ClosingSink {
    pub fn after_writes(writes: usize) -> Self {
        Self {
            data: Vec::new(),
            writes_left: writes,
        }
    }
}

#[async_trait]
impl ArchiveSink for ClosingSink {
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.writes_left == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client gone"));
        }
        self.writes_left -= 1;
        self.data.extend_from_slice(buf);
        Ok(())
    }
}

/// Deterministic filler so large members are not all one byte.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
