use crate::error::{PersistenceError, Result};
use byteorder::{ByteOrder, LittleEndian};
use crc64fast::Digest;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// File header: `[magic "BUSL"][version u32][reserved u64]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub reserved: u64,
}

impl LogHeader {
    pub const SIZE: usize = 4 + 4 + 8;
    pub const MAGIC: [u8; 4] = *b"BUSL";
    pub const VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            reserved: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        LittleEndian::write_u32(&mut buf[4..8], self.version);
        LittleEndian::write_u64(&mut buf[8..16], self.reserved);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(PersistenceError::InvalidFormat(format!(
                "header needs {} bytes, found {}",
                Self::SIZE,
                buf.len()
            )));
        }
        if buf[0..4] != Self::MAGIC {
            return Err(PersistenceError::InvalidMagic);
        }
        let version = LittleEndian::read_u32(&buf[4..8]);
        if version != Self::VERSION {
            return Err(PersistenceError::UnsupportedVersion(version));
        }
        Ok(Self {
            magic: Self::MAGIC,
            version,
            reserved: LittleEndian::read_u64(&buf[8..16]),
        })
    }
}

impl Default for LogHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-entry frame: `[record_id u64][payload_len u32][crc64 u64]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntryHeader {
    pub record_id: u64,
    pub payload_len: u32,
    pub checksum: u64,
}

impl LogEntryHeader {
    pub const SIZE: usize = 8 + 4 + 8; // 20 bytes

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact(&mut buf)?;
        Ok(Self::from_bytes(&buf))
    }

    fn from_bytes(buf: &[u8]) -> Self {
        Self {
            record_id: LittleEndian::read_u64(&buf[0..8]),
            payload_len: LittleEndian::read_u32(&buf[8..12]),
            checksum: LittleEndian::read_u64(&buf[12..20]),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_u64(&mut buf[0..8], self.record_id);
        LittleEndian::write_u32(&mut buf[8..12], self.payload_len);
        LittleEndian::write_u64(&mut buf[12..20], self.checksum);
        buf
    }
}

/// A file shorter than a header whose bytes match the start of one: the
/// process died while creating the log.
fn is_torn_header(buf: &[u8]) -> bool {
    buf.len() < LogHeader::SIZE && LogHeader::new().to_bytes().starts_with(buf)
}

pub fn entry_checksum(record_id: u64, payload: &[u8]) -> u64 {
    let mut digest = Digest::new();
    digest.write(&record_id.to_le_bytes());
    digest.write(&(payload.len() as u32).to_le_bytes());
    digest.write(payload);
    digest.sum64()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub header: LogEntryHeader,
    /// Byte offset of the entry frame within the file.
    pub offset: u64,
    pub payload: Vec<u8>,
}

/// Result of reading a whole log file.
#[derive(Debug, Default)]
pub struct LogScan {
    pub entries: Vec<LogEntry>,
    /// Length of the file up to the end of the last intact entry.
    pub valid_len: u64,
    /// Bytes after `valid_len` belonging to an incomplete final entry.
    pub torn_bytes: u64,
    pub existed: bool,
}

/// Reads the whole log.
///
/// An entry cut short by end-of-file, or a checksum failure on the very last
/// entry, is a torn tail from a crash mid-append: it is reported in
/// `torn_bytes` and dropped. A partially written file header counts the same
/// way and leaves `valid_len` at 0. Anything damaged before the tail fails
/// closed with [`PersistenceError::Corrupted`].
pub fn scan(path: impl AsRef<Path>) -> Result<LogScan> {
    let path = path.as_ref();
    let mut buffer = Vec::new();
    match File::open(path) {
        Ok(file) => {
            BufReader::new(file).read_to_end(&mut buffer)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LogScan::default()),
        Err(e) => return Err(e.into()),
    }

    if is_torn_header(&buffer) {
        return Ok(LogScan {
            torn_bytes: buffer.len() as u64,
            existed: true,
            ..LogScan::default()
        });
    }
    LogHeader::from_bytes(&buffer)?;

    let mut entries = Vec::new();
    let mut offset = LogHeader::SIZE;
    let total = buffer.len();

    while offset < total {
        if total - offset < LogEntryHeader::SIZE {
            break;
        }
        let header = LogEntryHeader::from_bytes(&buffer[offset..offset + LogEntryHeader::SIZE]);
        let payload_start = offset + LogEntryHeader::SIZE;
        let payload_end = payload_start + header.payload_len as usize;
        if payload_end > total {
            break;
        }

        let payload = &buffer[payload_start..payload_end];
        let found = entry_checksum(header.record_id, payload);
        if found != header.checksum {
            if payload_end == total {
                break;
            }
            return Err(PersistenceError::Corrupted { offset: offset as u64 });
        }

        entries.push(LogEntry {
            header,
            offset: offset as u64,
            payload: payload.to_vec(),
        });
        offset = payload_end;
    }

    Ok(LogScan {
        entries,
        valid_len: offset as u64,
        torn_bytes: (total - offset) as u64,
        existed: true,
    })
}

/// Appends entries to the log, one fsync per entry.
pub struct LogWriter {
    file: File,
    len: u64,
    entries: u64,
    // Set when a failed append could not be rolled back.
    poisoned: bool,
}

impl LogWriter {
    /// Opens (or creates) the log, discarding any torn tail.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let scan = scan(path.as_ref())?;
        Self::resume(path, &scan)
    }

    /// Opens the log at the position described by a prior [`scan`].
    pub fn resume(path: impl AsRef<Path>, scan: &LogScan) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path.as_ref())?;

        let len = if scan.valid_len == 0 {
            file.set_len(0)?;
            file.write_all(&LogHeader::new().to_bytes())?;
            file.sync_all()?;
            LogHeader::SIZE as u64
        } else {
            if scan.torn_bytes > 0 {
                file.set_len(scan.valid_len)?;
                file.sync_all()?;
            }
            scan.valid_len
        };
        file.seek(SeekFrom::Start(len))?;

        Ok(Self {
            file,
            len,
            entries: scan.entries.len() as u64,
            poisoned: false,
        })
    }

    /// Writes one framed entry and syncs it to disk.
    ///
    /// On failure the file is cut back to its previous length so a later
    /// append cannot land behind a half-written frame. If that cut fails the
    /// writer refuses every further append until the log is reopened.
    pub fn append(&mut self, record_id: u64, payload: &[u8]) -> Result<u64> {
        if self.poisoned {
            return Err(PersistenceError::WriterPoisoned);
        }
        let header = LogEntryHeader {
            record_id,
            payload_len: payload.len() as u32,
            checksum: entry_checksum(record_id, payload),
        };
        let mut frame = Vec::with_capacity(LogEntryHeader::SIZE + payload.len());
        frame.extend_from_slice(&header.to_bytes());
        frame.extend_from_slice(payload);

        let offset = self.len;
        if let Err(e) = self.write_frame(&frame) {
            if self.rollback(offset).is_err() {
                self.poisoned = true;
            }
            return Err(e.into());
        }

        self.len += frame.len() as u64;
        self.entries += 1;
        Ok(offset)
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.file.write_all(frame)?;
        self.file.sync_data()
    }

    fn rollback(&mut self, offset: u64) -> io::Result<()> {
        self.file.set_len(offset)?;
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Bytes in the file, header included.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn entry_count(&self) -> u64 {
        self.entries
    }
}

/// Streaming reader; yields per-entry errors instead of stopping early on
/// checksum failures, which is what the forensic CLI wants.
///
/// A torn tail ends the stream quietly, under the same rule as [`scan`].
pub struct LogReader {
    reader: BufReader<File>,
    offset: u64,
    finished: bool,
}

impl LogReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::with_capacity(LogHeader::SIZE);
        reader.by_ref().take(LogHeader::SIZE as u64).read_to_end(&mut buf)?;
        let finished = is_torn_header(&buf);
        if !finished {
            LogHeader::from_bytes(&buf)?;
        }
        Ok(Self {
            reader,
            offset: LogHeader::SIZE as u64,
            finished,
        })
    }

    fn torn_tail(&mut self) -> Option<Result<LogEntry>> {
        self.finished = true;
        None
    }

    fn at_end(&mut self) -> Result<bool> {
        Ok(self.reader.fill_buf()?.is_empty())
    }
}

impl Iterator for LogReader {
    type Item = Result<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let offset = self.offset;
        let header = match LogEntryHeader::read_from(&mut self.reader) {
            Ok(h) => h,
            Err(PersistenceError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return self.torn_tail()
            }
            Err(e) => return Some(Err(e)),
        };

        let mut payload = vec![0u8; header.payload_len as usize];
        match self.reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return self.torn_tail(),
            Err(e) => return Some(Err(e.into())),
        }
        self.offset += (LogEntryHeader::SIZE + payload.len()) as u64;

        let found = entry_checksum(header.record_id, &payload);
        if found != header.checksum {
            return match self.at_end() {
                Ok(true) => self.torn_tail(),
                Ok(false) => Some(Err(PersistenceError::ChecksumMismatch {
                    expected: header.checksum,
                    found,
                })),
                Err(e) => Some(Err(e)),
            };
        }

        Some(Ok(LogEntry { header, offset, payload }))
    }
}

pub fn read_stream(path: impl AsRef<Path>) -> Result<LogReader> {
    LogReader::open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_entry_header_serialization() {
        let payload = b"hello world";
        let header = LogEntryHeader {
            record_id: 1,
            payload_len: payload.len() as u32,
            checksum: entry_checksum(1, payload),
        };

        let bytes = header.to_bytes();
        let mut reader = &bytes[..];
        let decoded = LogEntryHeader::read_from(&mut reader).unwrap();

        assert_eq!(header, decoded);
    }

    #[test]
    fn test_new_log_has_header_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locations.log");

        let writer = LogWriter::open(&path).unwrap();
        assert_eq!(writer.len(), LogHeader::SIZE as u64);
        assert_eq!(writer.entry_count(), 0);

        let scan = scan(&path).unwrap();
        assert!(scan.existed);
        assert!(scan.entries.is_empty());
        assert_eq!(scan.valid_len, LogHeader::SIZE as u64);
    }

    #[test]
    fn test_append_and_scan() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locations.log");

        {
            let mut writer = LogWriter::open(&path).unwrap();
            for i in 1..=3u64 {
                writer.append(i, format!("payload-{i}").as_bytes()).unwrap();
            }
            assert_eq!(writer.entry_count(), 3);
        }

        let scan = scan(&path).unwrap();
        assert_eq!(scan.entries.len(), 3);
        assert_eq!(scan.torn_bytes, 0);
        assert_eq!(scan.entries[2].header.record_id, 3);
        assert_eq!(scan.entries[2].payload, b"payload-3");

        // Reopen continues where it left off.
        let writer = LogWriter::open(&path).unwrap();
        assert_eq!(writer.entry_count(), 3);
        assert_eq!(writer.len(), scan.valid_len);
    }

    #[test]
    fn test_missing_file_scans_empty() {
        let dir = tempdir().unwrap();
        let scan = scan(dir.path().join("nope.log")).unwrap();
        assert!(!scan.existed);
        assert!(scan.entries.is_empty());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locations.log");
        std::fs::write(&path, b"NOPE\x01\0\0\0\0\0\0\0\0\0\0\0").unwrap();
        assert!(matches!(scan(&path), Err(PersistenceError::InvalidMagic)));
        assert!(matches!(LogWriter::open(&path), Err(PersistenceError::InvalidMagic)));
    }

    #[test]
    fn test_reader_reports_checksum_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locations.log");
        {
            let mut writer = LogWriter::open(&path).unwrap();
            writer.append(1, b"first").unwrap();
            writer.append(2, b"second").unwrap();
        }
        let mut bytes = std::fs::read(&path).unwrap();
        // Flip a payload byte of the first entry.
        let first_payload = LogHeader::SIZE + LogEntryHeader::SIZE;
        bytes[first_payload] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let results: Vec<_> = read_stream(&path).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(PersistenceError::ChecksumMismatch { .. })));
        assert!(results[1].is_ok());
    }

    #[test]
    fn test_reader_stops_at_torn_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locations.log");
        {
            let mut writer = LogWriter::open(&path).unwrap();
            for i in 1..=3u64 {
                writer.append(i, format!("payload-{i}").as_bytes()).unwrap();
            }
        }
        let intact = std::fs::read(&path).unwrap();

        // Last payload cut short.
        std::fs::write(&path, &intact[..intact.len() - 2]).unwrap();
        let ids: Vec<u64> = read_stream(&path)
            .unwrap()
            .map(|r| r.unwrap().header.record_id)
            .collect();
        assert_eq!(ids, vec![1, 2]);

        // Last checksum broken.
        let mut flipped = intact.clone();
        let last = flipped.len() - 1;
        flipped[last] ^= 0xFF;
        std::fs::write(&path, &flipped).unwrap();
        let results: Vec<_> = read_stream(&path).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn test_reader_accepts_torn_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locations.log");
        std::fs::write(&path, &LogHeader::new().to_bytes()[..7]).unwrap();
        assert_eq!(read_stream(&path).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_rollback_poisons_writer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locations.log");
        let mut writer = LogWriter::open(&path).unwrap();
        writer.append(1, b"first").unwrap();

        // A read-only handle fails both the write and the truncate.
        writer.file = File::open(&path).unwrap();
        assert!(matches!(writer.append(2, b"second"), Err(PersistenceError::IoError(_))));
        assert!(writer.is_poisoned());
        assert!(matches!(writer.append(2, b"second"), Err(PersistenceError::WriterPoisoned)));

        // Reopening starts clean from what is on disk.
        let mut reopened = LogWriter::open(&path).unwrap();
        assert!(!reopened.is_poisoned());
        assert_eq!(reopened.entry_count(), 1);
        reopened.append(2, b"second").unwrap();
        assert_eq!(scan(&path).unwrap().entries.len(), 2);
    }
}
