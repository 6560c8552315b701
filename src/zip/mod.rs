//! Streaming ZIP archive creation.
//!
//! ## Architecture
//!
//! - [`structures`]: byte layout of the ZIP records we emit
//! - [`writer`]: a single-pass writer that never seeks or rewrites
//! - [`assembler`]: turns a list of store objects into one archive
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and file data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Because the writer streams, each local header goes out before its data
//! has been seen. General purpose flag bit 3 tells readers that the CRC and
//! sizes follow the data in a data descriptor; the central directory then
//! repeats them. Readers that start from the EOCD, as most do, see a normal
//! archive.
//!
//! ## Supported Features
//!
//! - STORED (no compression) entries
//! - ZIP64 records for entries, offsets or directories past 4 GiB
//! - UTF-8 file names
//! - Extended timestamp extra field with the Unix modification time

mod assembler;
mod structures;
mod writer;

pub use assembler::{ArchiveAssembler, AssembleError, AssembleSummary, COPY_BUFFER_SIZE};
pub use structures::*;
pub use writer::{WRITE_BUFFER_SIZE, ZipStreamWriter};
