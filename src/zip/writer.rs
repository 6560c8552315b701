use std::io;
use std::mem;

use chrono::{DateTime, Local};
use flate2::Crc;

use super::structures::*;
use crate::io::ArchiveSink;

/// Bytes the writer holds before passing them to its sink.
pub const WRITE_BUFFER_SIZE: usize = 32 * 1024;

struct OpenEntry {
    header: EntryHeader,
    lfh_offset: u64,
    crc: Crc,
    size: u64,
}

/// Single-pass ZIP writer.
///
/// Entries are stored uncompressed and their CRC and size go into a data
/// descriptor after the data, so nothing has to be known up front and
/// nothing is ever rewritten. Output is buffered up to
/// [`WRITE_BUFFER_SIZE`] bytes; call [`flush`](Self::flush) to hand
/// buffered bytes to the sink earlier.
///
/// ## Example
///
/// ```no_run
/// # async fn demo() -> std::io::Result<()> {
/// use zipstream::zip::ZipStreamWriter;
///
/// let mut writer = ZipStreamWriter::new(Vec::new());
/// writer.start_entry("hello.txt", chrono::Local::now()).await?;
/// writer.write_data(b"Hello, World!").await?;
/// let archive: Vec<u8> = writer.finish().await?;
/// # Ok(())
/// # }
/// ```
pub struct ZipStreamWriter<W: ArchiveSink> {
    sink: W,
    buf: Vec<u8>,
    /// Archive bytes produced so far, buffered or not
    offset: u64,
    current: Option<OpenEntry>,
    records: Vec<CentralRecord>,
}

impl<W: ArchiveSink> ZipStreamWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            buf: Vec::with_capacity(WRITE_BUFFER_SIZE),
            offset: 0,
            current: None,
            records: Vec::new(),
        }
    }

    /// Access the sink, e.g. to query its flush capability.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Total archive bytes produced, including any still buffered.
    pub fn bytes_written(&self) -> u64 {
        self.offset
    }

    /// Number of entries completed so far.
    pub fn entry_count(&self) -> usize {
        self.records.len()
    }

    /// Begin a new stored entry, closing the previous one if still open.
    pub async fn start_entry(&mut self, name: &str, modified: DateTime<Local>) -> io::Result<()> {
        if name.len() > u16::MAX as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "entry name longer than 65535 bytes",
            ));
        }
        self.finish_entry().await?;

        let header = EntryHeader {
            file_name: name.to_string(),
            method: CompressionMethod::Stored,
            modified: DosDateTime::from_naive(modified.naive_local()),
            unix_mtime: modified.timestamp().clamp(0, u32::MAX as i64) as u32,
        };

        let mut encoded = Vec::with_capacity(LFH_SIZE + name.len() + 9);
        header.write_local(&mut encoded)?;

        self.current = Some(OpenEntry {
            header,
            lfh_offset: self.offset,
            crc: Crc::new(),
            size: 0,
        });
        self.push(&encoded).await
    }

    /// Append bytes to the open entry.
    pub async fn write_data(&mut self, data: &[u8]) -> io::Result<()> {
        let entry = self.current.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "no entry has been started")
        })?;
        entry.crc.update(data);
        entry.size += data.len() as u64;
        self.push(data).await
    }

    /// Close the open entry, if any, by writing its data descriptor.
    pub async fn finish_entry(&mut self) -> io::Result<()> {
        let Some(entry) = self.current.take() else {
            return Ok(());
        };

        let crc32 = entry.crc.sum();
        let mut descriptor = Vec::with_capacity(DataDescriptor::ZIP64_SIZE);
        DataDescriptor {
            crc32,
            size: entry.size,
        }
        .write(&mut descriptor)?;

        self.records.push(CentralRecord {
            header: entry.header,
            crc32,
            size: entry.size,
            lfh_offset: entry.lfh_offset,
        });
        self.push(&descriptor).await
    }

    /// Pass every buffered byte on to the sink.
    pub async fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let buf = mem::take(&mut self.buf);
        let result = self.sink.write_all(&buf).await;
        self.buf = buf;
        self.buf.clear();
        result
    }

    /// Write the central directory and end records, flush, and return the
    /// sink. Until this runs the output is not a readable archive.
    pub async fn finish(mut self) -> io::Result<W> {
        self.finish_entry().await?;

        let cd_offset = self.offset;
        let mut directory = Vec::new();
        for record in &self.records {
            record.write(&mut directory)?;
        }
        let cd_size = directory.len() as u64;

        EndOfCentralDirectory {
            total_entries: self.records.len() as u64,
            cd_size,
            cd_offset,
        }
        .write(&mut directory)?;

        self.push(&directory).await?;
        self.flush().await?;
        Ok(self.sink)
    }

    async fn push(&mut self, data: &[u8]) -> io::Result<()> {
        self.offset += data.len() as u64;
        if self.buf.len() + data.len() <= WRITE_BUFFER_SIZE {
            self.buf.extend_from_slice(data);
            return Ok(());
        }

        self.flush().await?;
        if data.len() >= WRITE_BUFFER_SIZE {
            self.sink.write_all(data).await
        } else {
            self.buf.extend_from_slice(data);
            Ok(())
        }
    }
}
