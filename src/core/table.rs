// Table file opening/writing with header validation, read-only mmap, and file locking.
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use libc::{EACCES, EPERM};
use memmap2::Mmap;

use crate::core::error::{Error, ErrorKind, io_error_kind};
use crate::core::format;
use crate::core::frame::{self, RECORD_HEADER_LEN, RecordHeader};

const MAGIC: [u8; 4] = *b"WTSC";
const ENDIANNESS_LE: u8 = 1;
pub const HEADER_SIZE: usize = 64;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TableHeader {
    pub version: u32,
    pub record_count: u64,
    pub region_len: u64,
}

impl TableHeader {
    fn new(record_count: u64, region_len: u64) -> Self {
        Self {
            version: format::TABLE_FORMAT_VERSION,
            record_count,
            region_len,
        }
    }

    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8] = ENDIANNESS_LE;
        write_u64(&mut buf, 16, self.record_count);
        write_u64(&mut buf, 24, self.region_len);
        buf
    }

    fn decode(buf: &[u8], path: &Path) -> Result<Self, Error> {
        if buf.len() < HEADER_SIZE {
            return Err(corrupt("table header too small", path));
        }
        if buf[0..4] != MAGIC {
            return Err(corrupt("bad table magic", path));
        }
        let version = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        if !format::is_supported(version) {
            return Err(format::table_version_error(version, path));
        }
        if buf[8] != ENDIANNESS_LE {
            return Err(corrupt("unsupported endianness", path));
        }
        Ok(Self {
            version,
            record_count: read_u64(buf, 16),
            region_len: read_u64(buf, 24),
        })
    }

    fn validate(&self, actual_file_size: u64, path: &Path) -> Result<(), Error> {
        let end = (HEADER_SIZE as u64).checked_add(self.region_len);
        match end {
            Some(end) if end <= actual_file_size => Ok(()),
            _ => Err(corrupt("record region exceeds file", path)),
        }
    }
}

/// A table file opened for reading. Holds a shared lock until dropped.
pub struct TableFile {
    path: PathBuf,
    file: File,
    mmap: Mmap,
    header: TableHeader,
}

impl TableFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(|err| Error::new(io_error_kind(&err)).with_path(&path).with_source(err))?;

        FileExt::lock_shared(&file).map_err(|err| {
            Error::new(lock_error_kind(&err))
                .with_path(&path)
                .with_source(err)
        })?;

        let actual_size = file
            .metadata()
            .map(|meta| meta.len())
            .map_err(|err| Error::new(ErrorKind::Io).with_path(&path).with_source(err))?;
        if actual_size < HEADER_SIZE as u64 {
            return Err(corrupt("table header too small", &path));
        }

        let mmap = unsafe {
            Mmap::map(&file)
                .map_err(|err| Error::new(ErrorKind::Io).with_path(&path).with_source(err))?
        };

        // Dropping `file` on an error path closes the descriptor and releases the lock.
        let header = TableHeader::decode(&mmap[..HEADER_SIZE], &path)?;
        header.validate(actual_size, &path)?;

        Ok(Self {
            path,
            file,
            mmap,
            header,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> TableHeader {
        self.header
    }

    /// The record region: everything after the header, bounded by `region_len`.
    pub fn region(&self) -> &[u8] {
        let end = HEADER_SIZE + self.header.region_len as usize;
        &self.mmap[HEADER_SIZE..end]
    }

    pub fn read_all(&self) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, Error> {
        let mut records = BTreeMap::new();
        let mut offset = 0;
        let mut previous: Option<Vec<u8>> = None;
        while let Some((record, next_off)) = read_record_at(self.region(), offset)
            .map_err(|err| err.with_path(&self.path))?
        {
            check_ascending(previous.as_deref(), record.key).map_err(|err| err.with_path(&self.path))?;
            previous = Some(record.key.to_vec());
            records.insert(record.key.to_vec(), record.value.to_vec());
            offset = next_off;
        }
        Ok(records)
    }
}

impl Drop for TableFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[derive(Debug, PartialEq)]
pub struct RecordRef<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
}

/// Reads the record at `offset` in the region; `None` once the region is exhausted.
pub fn read_record_at(region: &[u8], offset: usize) -> Result<Option<(RecordRef<'_>, usize)>, Error> {
    if offset >= region.len() {
        return Ok(None);
    }
    let remaining = region.len() - offset;
    let header = RecordHeader::decode(&region[offset..])?;
    header.validate(remaining)?;

    let key_start = offset + RECORD_HEADER_LEN;
    let key_end = key_start + header.key_len as usize;
    let value_end = key_end + header.value_len as usize;
    let total = frame::record_total_len(header.key_len as usize, header.value_len as usize)
        .ok_or_else(|| Error::new(ErrorKind::Decode).with_message("record length overflow"))?;

    Ok(Some((
        RecordRef {
            key: &region[key_start..key_end],
            value: &region[key_end..value_end],
        },
        offset + total,
    )))
}

pub fn check_ascending(previous: Option<&[u8]>, key: &[u8]) -> Result<(), Error> {
    match previous {
        Some(prev) if prev >= key => {
            Err(Error::new(ErrorKind::Decode).with_message("table keys out of order"))
        }
        _ => Ok(()),
    }
}

/// Rewrites a table file with `records` in key order: temp file, fsync, rename.
pub fn write_table(path: &Path, records: &BTreeMap<Vec<u8>, Vec<u8>>) -> Result<(), Error> {
    let existing = match File::open(path) {
        Ok(file) => {
            FileExt::try_lock_exclusive(&file).map_err(|err| {
                Error::new(lock_error_kind(&err))
                    .with_path(path)
                    .with_source(err)
            })?;
            Some(file)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => {
            return Err(Error::new(io_error_kind(&err)).with_path(path).with_source(err));
        }
    };

    let tmp_path = temp_path(path);
    let result = write_table_to(&tmp_path, records).and_then(|_| {
        fs::rename(&tmp_path, path)
            .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    if let Some(file) = existing {
        let _ = FileExt::unlock(&file);
    }
    result
}

fn write_table_to(path: &Path, records: &BTreeMap<Vec<u8>, Vec<u8>>) -> Result<(), Error> {
    let mut region = Vec::new();
    for (key, value) in records {
        region.extend_from_slice(&frame::encode_record(key, value)?);
    }
    let header = TableHeader::new(records.len() as u64, region.len() as u64);

    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)
        .map_err(|err| Error::new(io_error_kind(&err)).with_path(path).with_source(err))?;
    let mut writer = BufWriter::new(&file);
    writer
        .write_all(&header.encode())
        .and_then(|_| writer.write_all(&region))
        .and_then(|_| writer.flush())
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
    drop(writer);
    file.sync_all()
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn lock_error_kind(err: &io::Error) -> ErrorKind {
    let errno = err.raw_os_error().unwrap_or_default();
    if errno == EACCES || errno == EPERM {
        return ErrorKind::Permission;
    }
    match err.kind() {
        io::ErrorKind::WouldBlock => ErrorKind::Busy,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

fn corrupt(message: &str, path: &Path) -> Error {
    Error::new(ErrorKind::Decode)
        .with_message(message.to_string())
        .with_path(path)
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(out)
}

fn write_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}
