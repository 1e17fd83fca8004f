//! On-disk format codecs.
//!
//! An experience file is a signature followed by a flat run of 24-byte
//! records. Version 2 is current; version 1 files are readable and get
//! rewritten in version 2 form after a successful load.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};

use crate::entry::{ExpEntry, ENTRY_SIZE};
use crate::error::ExperienceError;

/// Current on-disk signature (26 bytes, no terminator).
pub const SIGNATURE_V2: &[u8] = b"SugaR Experience version 2";
/// Legacy signature.
pub const SIGNATURE_V1: &[u8] = b"SugaR";

pub const CURRENT_VERSION: u32 = 2;

/// Write buffer size for entry output. Tiny in debug builds so chunking
/// paths are exercised by the tests.
pub const WRITE_BUFFER_SIZE: usize = if cfg!(debug_assertions) {
    1024
} else {
    16 * 1024 * 1024
};

/// A versioned reader over an experience file.
///
/// `check_signature` validates the signature bytes and that the remaining
/// length is an exact multiple of the record size, recording the entry
/// count; on a mismatch the stream is rewound so the next reader can try.
pub trait ExperienceReader {
    fn version(&self) -> u32;

    fn entries_count(&self) -> usize;

    fn check_signature<R: Read + Seek>(&mut self, input: &mut R, input_len: u64)
        -> io::Result<bool>;

    fn read_one<R: Read>(&mut self, input: &mut R) -> io::Result<ExpEntry>;
}

fn check_signature_set_count<R: Read + Seek>(
    input: &mut R,
    input_len: u64,
    signature: &[u8],
    entries_count: &mut usize,
) -> io::Result<bool> {
    *entries_count = 0;

    let sig_len = signature.len() as u64;
    if input_len < sig_len {
        return Ok(false);
    }

    let data_len = input_len - sig_len;
    if data_len % ENTRY_SIZE as u64 != 0 {
        return Ok(false);
    }

    input.seek(SeekFrom::Start(0))?;
    let mut buf = vec![0u8; signature.len()];
    if input.read_exact(&mut buf).is_err() {
        input.seek(SeekFrom::Start(0))?;
        return Ok(false);
    }

    if buf != signature {
        input.seek(SeekFrom::Start(0))?;
        return Ok(false);
    }

    *entries_count = (data_len / ENTRY_SIZE as u64) as usize;
    Ok(true)
}

/// Reader for the current (version 2) format.
#[derive(Default)]
pub struct V2Reader {
    entries_count: usize,
}

impl ExperienceReader for V2Reader {
    fn version(&self) -> u32 {
        2
    }

    fn entries_count(&self) -> usize {
        self.entries_count
    }

    fn check_signature<R: Read + Seek>(
        &mut self,
        input: &mut R,
        input_len: u64,
    ) -> io::Result<bool> {
        check_signature_set_count(input, input_len, SIGNATURE_V2, &mut self.entries_count)
    }

    fn read_one<R: Read>(&mut self, input: &mut R) -> io::Result<ExpEntry> {
        let mut buf = [0u8; ENTRY_SIZE];
        input.read_exact(&mut buf)?;
        Ok(ExpEntry::from_bytes(&buf))
    }
}

/// Reader for the legacy (version 1) format. Records map across with
/// `count = 1`.
#[derive(Default)]
pub struct V1Reader {
    entries_count: usize,
}

impl ExperienceReader for V1Reader {
    fn version(&self) -> u32 {
        1
    }

    fn entries_count(&self) -> usize {
        self.entries_count
    }

    fn check_signature<R: Read + Seek>(
        &mut self,
        input: &mut R,
        input_len: u64,
    ) -> io::Result<bool> {
        check_signature_set_count(input, input_len, SIGNATURE_V1, &mut self.entries_count)
    }

    fn read_one<R: Read>(&mut self, input: &mut R) -> io::Result<ExpEntry> {
        let mut buf = [0u8; ENTRY_SIZE];
        input.read_exact(&mut buf)?;
        Ok(ExpEntry::from_v1_bytes(&buf))
    }
}

/// Detected format of an experience file.
pub enum DetectedReader {
    V2(V2Reader),
    V1(V1Reader),
}

impl DetectedReader {
    pub fn version(&self) -> u32 {
        match self {
            DetectedReader::V2(r) => r.version(),
            DetectedReader::V1(r) => r.version(),
        }
    }

    pub fn entries_count(&self) -> usize {
        match self {
            DetectedReader::V2(r) => r.entries_count(),
            DetectedReader::V1(r) => r.entries_count(),
        }
    }

    pub fn read_one<R: Read>(&mut self, input: &mut R) -> io::Result<ExpEntry> {
        match self {
            DetectedReader::V2(r) => r.read_one(input),
            DetectedReader::V1(r) => r.read_one(input),
        }
    }
}

/// Try readers newest-first and return the one whose signature matches.
/// The stream is left positioned just past the matched signature.
pub fn detect_reader<R: Read + Seek>(
    input: &mut R,
    input_len: u64,
) -> io::Result<Option<DetectedReader>> {
    let mut v2 = V2Reader::default();
    if v2.check_signature(input, input_len)? {
        return Ok(Some(DetectedReader::V2(v2)));
    }

    let mut v1 = V1Reader::default();
    if v1.check_signature(input, input_len)? {
        return Ok(Some(DetectedReader::V1(v1)));
    }

    Ok(None)
}

/// Open an experience file and identify its format version. The
/// returned stream is positioned at the first record.
pub fn open_and_detect(path: &str) -> Result<(BufReader<File>, DetectedReader), ExperienceError> {
    let file = File::open(path).map_err(|_| ExperienceError::CannotOpen(path.to_string()))?;
    let len = file.metadata()?.len();

    if len == 0 {
        return Err(ExperienceError::EmptyFile(path.to_string()));
    }

    let mut input = BufReader::new(file);
    match detect_reader(&mut input, len)? {
        Some(reader) => Ok((input, reader)),
        None => Err(ExperienceError::InvalidFormat(path.to_string())),
    }
}

/// Buffered entry writer. Entries accumulate in memory and flush to the
/// underlying stream in `WRITE_BUFFER_SIZE` chunks.
pub struct EntryWriter<W: Write> {
    inner: W,
    buf: Vec<u8>,
}

impl<W: Write> EntryWriter<W> {
    pub fn new(inner: W) -> EntryWriter<W> {
        EntryWriter {
            inner,
            buf: Vec::with_capacity(WRITE_BUFFER_SIZE),
        }
    }

    pub fn push(&mut self, entry: &ExpEntry) -> io::Result<()> {
        self.buf.extend_from_slice(&entry.to_bytes());
        self.flush_if_full()
    }

    /// Append pre-encoded record bytes (used by the importer's per-game
    /// buffers).
    pub fn push_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.buf.extend_from_slice(bytes);
        self.flush_if_full()
    }

    fn flush_if_full(&mut self) -> io::Result<()> {
        if self.buf.len() >= WRITE_BUFFER_SIZE {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
        }
        self.inner.flush()
    }
}

/// Write the current signature iff the (append-mode) file is still empty.
pub fn write_signature_if_new<W: Write>(out: &mut W, current_len: u64) -> io::Result<bool> {
    if current_len == 0 {
        out.write_all(SIGNATURE_V2)?;
        return Ok(true);
    }
    Ok(false)
}
