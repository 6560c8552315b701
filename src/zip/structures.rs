use std::io;

use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{Datelike, NaiveDateTime, Timelike};

/// ZIP compression methods. Archives are written without compression,
/// so stored is the only one produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
}

impl CompressionMethod {
    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
        }
    }
}

/// Sizes, counts and offsets at or above this need ZIP64 records.
pub const ZIP64_THRESHOLD: u64 = 0xFFFF_FFFF;
const ZIP64_COUNT_THRESHOLD: u64 = 0xFFFF;

/// Version 2.0: the baseline for stored entries with data descriptors.
pub const VERSION_DEFAULT: u16 = 20;
/// Version 4.5: ZIP64 format extensions.
pub const VERSION_ZIP64: u16 = 45;
/// "Made by" host system: Unix, in the high byte.
const HOST_UNIX: u16 = 3 << 8;

/// Sizes and CRC live in a data descriptor after the data.
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// File name is UTF-8.
pub const FLAG_UTF8: u16 = 1 << 11;

const EXTRA_ZIP64: u16 = 0x0001;
const EXTRA_EXTENDED_TIMESTAMP: u16 = 0x5455;

/// Regular file, mode 0644, in the Unix part of the external attributes.
const UNIX_FILE_ATTRIBUTES: u32 = 0o100644 << 16;

/// Local File Header (LFH) - 30 bytes plus name and extra field
pub const LFH_SIGNATURE: u32 = 0x0403_4b50;
pub const LFH_SIZE: usize = 30;

/// Central Directory File Header (CDFH) - 46 bytes plus variable fields
pub const CDFH_SIGNATURE: u32 = 0x0201_4b50;
pub const CDFH_SIZE: usize = 46;

/// MS-DOS date and time as stored in ZIP headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// Encode a calendar time. DOS dates cover 1980 to 2107; anything
    /// outside is clamped to the nearest end. Seconds are halved.
    pub fn from_naive(value: NaiveDateTime) -> Self {
        let year = value.year();
        if year < 1980 {
            return Self {
                time: 0,
                date: (1 << 5) | 1,
            };
        }
        if year > 2107 {
            return Self {
                time: (23 << 11) | (59 << 5) | 29,
                date: (127 << 9) | (12 << 5) | 31,
            };
        }

        let date = (((year - 1980) as u16) << 9) | ((value.month() as u16) << 5) | value.day() as u16;
        let time = ((value.hour() as u16) << 11)
            | ((value.minute() as u16) << 5)
            | (value.second() as u16 / 2);
        Self { time, date }
    }
}

/// Header metadata shared by the local header and the central directory
#[derive(Debug, Clone)]
pub struct EntryHeader {
    pub file_name: String,
    pub method: CompressionMethod,
    pub modified: DosDateTime,
    /// Seconds since the Unix epoch, for the extended timestamp field
    pub unix_mtime: u32,
}

impl EntryHeader {
    pub fn flags(&self) -> u16 {
        if self.file_name.is_ascii() {
            FLAG_DATA_DESCRIPTOR
        } else {
            FLAG_DATA_DESCRIPTOR | FLAG_UTF8
        }
    }

    fn extended_timestamp(&self, out: &mut Vec<u8>) -> io::Result<()> {
        out.write_u16::<LittleEndian>(EXTRA_EXTENDED_TIMESTAMP)?;
        out.write_u16::<LittleEndian>(5)?;
        // Only the modification time is present.
        out.write_u8(1)?;
        out.write_u32::<LittleEndian>(self.unix_mtime)
    }

    /// Encode the local file header. CRC and sizes are zero; they follow
    /// the data in a [`DataDescriptor`].
    pub fn write_local(&self, out: &mut Vec<u8>) -> io::Result<()> {
        let mut extra = Vec::with_capacity(9);
        self.extended_timestamp(&mut extra)?;

        out.write_u32::<LittleEndian>(LFH_SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION_DEFAULT)?;
        out.write_u16::<LittleEndian>(self.flags())?;
        out.write_u16::<LittleEndian>(self.method.as_u16())?;
        out.write_u16::<LittleEndian>(self.modified.time)?;
        out.write_u16::<LittleEndian>(self.modified.date)?;
        out.write_u32::<LittleEndian>(0)?; // crc32
        out.write_u32::<LittleEndian>(0)?; // compressed size
        out.write_u32::<LittleEndian>(0)?; // uncompressed size
        out.write_u16::<LittleEndian>(self.file_name.len() as u16)?;
        out.write_u16::<LittleEndian>(extra.len() as u16)?;
        out.extend_from_slice(self.file_name.as_bytes());
        out.extend_from_slice(&extra);
        Ok(())
    }
}

/// Trailer written after an entry's data
#[derive(Debug, Clone, Copy)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub size: u64,
}

impl DataDescriptor {
    pub const SIGNATURE: u32 = 0x0807_4b50;
    pub const SIZE: usize = 16;
    pub const ZIP64_SIZE: usize = 24;

    pub fn is_zip64(&self) -> bool {
        self.size >= ZIP64_THRESHOLD
    }

    pub fn write(&self, out: &mut Vec<u8>) -> io::Result<()> {
        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        if self.is_zip64() {
            out.write_u64::<LittleEndian>(self.size)?;
            out.write_u64::<LittleEndian>(self.size)?;
        } else {
            out.write_u32::<LittleEndian>(self.size as u32)?;
            out.write_u32::<LittleEndian>(self.size as u32)?;
        }
        Ok(())
    }
}

/// Everything the central directory needs to know about one written entry
#[derive(Debug, Clone)]
pub struct CentralRecord {
    pub header: EntryHeader,
    pub crc32: u32,
    /// Stored entries: compressed and uncompressed sizes are equal
    pub size: u64,
    pub lfh_offset: u64,
}

impl CentralRecord {
    fn needs_zip64(&self) -> bool {
        self.size >= ZIP64_THRESHOLD || self.lfh_offset >= ZIP64_THRESHOLD
    }

    pub fn write(&self, out: &mut Vec<u8>) -> io::Result<()> {
        let mut extra = Vec::new();
        let (size32, offset32) = if self.needs_zip64() {
            // Only the overflowing fields appear, in this fixed order.
            let mut fields = Vec::with_capacity(24);
            let size32 = if self.size >= ZIP64_THRESHOLD {
                fields.write_u64::<LittleEndian>(self.size)?;
                fields.write_u64::<LittleEndian>(self.size)?;
                u32::MAX
            } else {
                self.size as u32
            };
            let offset32 = if self.lfh_offset >= ZIP64_THRESHOLD {
                fields.write_u64::<LittleEndian>(self.lfh_offset)?;
                u32::MAX
            } else {
                self.lfh_offset as u32
            };
            extra.write_u16::<LittleEndian>(EXTRA_ZIP64)?;
            extra.write_u16::<LittleEndian>(fields.len() as u16)?;
            extra.extend_from_slice(&fields);
            (size32, offset32)
        } else {
            (self.size as u32, self.lfh_offset as u32)
        };
        self.header.extended_timestamp(&mut extra)?;

        let version_needed = if self.needs_zip64() {
            VERSION_ZIP64
        } else {
            VERSION_DEFAULT
        };

        out.write_u32::<LittleEndian>(CDFH_SIGNATURE)?;
        out.write_u16::<LittleEndian>(HOST_UNIX | version_needed)?;
        out.write_u16::<LittleEndian>(version_needed)?;
        out.write_u16::<LittleEndian>(self.header.flags())?;
        out.write_u16::<LittleEndian>(self.header.method.as_u16())?;
        out.write_u16::<LittleEndian>(self.header.modified.time)?;
        out.write_u16::<LittleEndian>(self.header.modified.date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(size32)?;
        out.write_u32::<LittleEndian>(size32)?;
        out.write_u16::<LittleEndian>(self.header.file_name.len() as u16)?;
        out.write_u16::<LittleEndian>(extra.len() as u16)?;
        out.write_u16::<LittleEndian>(0)?; // comment length
        out.write_u16::<LittleEndian>(0)?; // disk number start
        out.write_u16::<LittleEndian>(0)?; // internal attributes
        out.write_u32::<LittleEndian>(UNIX_FILE_ATTRIBUTES)?;
        out.write_u32::<LittleEndian>(offset32)?;
        out.extend_from_slice(self.header.file_name.as_bytes());
        out.extend_from_slice(&extra);
        Ok(())
    }
}

/// Location and size of the central directory, written at the very end
/// (22 bytes)
#[derive(Debug, Clone, Copy)]
pub struct EndOfCentralDirectory {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x0605_4b50;
    pub const SIZE: usize = 22;

    pub fn is_zip64(&self) -> bool {
        self.total_entries >= ZIP64_COUNT_THRESHOLD
            || self.cd_size >= ZIP64_THRESHOLD
            || self.cd_offset >= ZIP64_THRESHOLD
    }

    /// Encode the trailer. When ZIP64 is needed this is the ZIP64 record,
    /// its locator and then the classic record with saturated fields.
    pub fn write(&self, out: &mut Vec<u8>) -> io::Result<()> {
        if self.is_zip64() {
            Zip64EndOfCentralDirectory {
                total_entries: self.total_entries,
                cd_size: self.cd_size,
                cd_offset: self.cd_offset,
            }
            .write(out)?;
            Zip64EndLocator {
                eocd64_offset: self.cd_offset + self.cd_size,
            }
            .write(out)?;
        }

        let entries16 = self.total_entries.min(ZIP64_COUNT_THRESHOLD) as u16;
        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(0)?; // this disk
        out.write_u16::<LittleEndian>(0)?; // disk with central directory
        out.write_u16::<LittleEndian>(entries16)?;
        out.write_u16::<LittleEndian>(entries16)?;
        out.write_u32::<LittleEndian>(self.cd_size.min(ZIP64_THRESHOLD) as u32)?;
        out.write_u32::<LittleEndian>(self.cd_offset.min(ZIP64_THRESHOLD) as u32)?;
        out.write_u16::<LittleEndian>(0) // comment length
    }
}

/// ZIP64 End of Central Directory record (56 bytes)
#[derive(Debug, Clone, Copy)]
pub struct Zip64EndOfCentralDirectory {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x0606_4b50;
    pub const SIZE: usize = 56;

    pub fn write(&self, out: &mut Vec<u8>) -> io::Result<()> {
        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        // Size of the record after this field
        out.write_u64::<LittleEndian>((Self::SIZE - 12) as u64)?;
        out.write_u16::<LittleEndian>(HOST_UNIX | VERSION_ZIP64)?;
        out.write_u16::<LittleEndian>(VERSION_ZIP64)?;
        out.write_u32::<LittleEndian>(0)?; // this disk
        out.write_u32::<LittleEndian>(0)?; // disk with central directory
        out.write_u64::<LittleEndian>(self.total_entries)?;
        out.write_u64::<LittleEndian>(self.total_entries)?;
        out.write_u64::<LittleEndian>(self.cd_size)?;
        out.write_u64::<LittleEndian>(self.cd_offset)
    }
}

/// ZIP64 End of Central Directory Locator (20 bytes)
#[derive(Debug, Clone, Copy)]
pub struct Zip64EndLocator {
    /// Offset of the ZIP64 end record
    pub eocd64_offset: u64,
}

impl Zip64EndLocator {
    pub const SIGNATURE: u32 = 0x0706_4b50;
    pub const SIZE: usize = 20;

    pub fn write(&self, out: &mut Vec<u8>) -> io::Result<()> {
        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        out.write_u32::<LittleEndian>(0)?; // disk with ZIP64 EOCD
        out.write_u64::<LittleEndian>(self.eocd64_offset)?;
        out.write_u32::<LittleEndian>(1) // total disks
    }
}
