//! # zipstream
//!
//! An HTTP service that builds ZIP archives on the fly from objects held in
//! S3-compatible storage.
//!
//! A client posts a manifest naming the objects to include and the path
//! each one should have inside the archive. Members are fetched one after
//! another and written straight into the response, so nothing is staged on
//! disk and memory stays bounded no matter how large the archive gets.
//!
//! ## Features
//!
//! - Streaming ZIP output with data descriptors and ZIP64 for large members
//! - Short-lived download links that replay a manifest with a plain `GET`
//! - Optional basic auth on the manifest endpoints
//! - A server-configured store that overrides per-request credentials
//!
//! ## Example
//!
//! ```no_run
//! use zipstream::io::MemoryStore;
//! use zipstream::manifest::MemberEntry;
//! use zipstream::zip::ArchiveAssembler;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = MemoryStore::new().with_object("bucket", "docs/a.txt", "hello");
//!
//!     let assembler = ArchiveAssembler::new(vec![MemberEntry::new("docs/a.txt", "a.txt")?])?;
//!
//!     let mut archive: Vec<u8> = Vec::new();
//!     assembler.assemble(&store, "bucket", &mut archive).await?;
//!     println!("{} bytes", archive.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod io;
pub mod manifest;
pub mod registry;
pub mod server;
pub mod zip;

pub use cli::Cli;
pub use manifest::{Manifest, MemberEntry};
pub use registry::LinkRegistry;
pub use zip::{ArchiveAssembler, AssembleError, ZipStreamWriter};
