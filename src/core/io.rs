//! Input and output plumbing
//!
//! Input tables may be plain text, gzip or bzip2 compressed. Large plain
//! files are memory-mapped. Output files are written to a temporary file
//! next to the destination and persisted only once complete, so a failed
//! conversion never leaves a partial table behind.

use bzip2::read::BzDecoder;
use flate2::read::MultiGzDecoder;
use memmap2::Mmap;
use std::fs::{File, Permissions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Default buffer size for readers and writers (128KB)
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

/// Threshold for memory-mapping plain input files (100MB)
pub const MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Compression format of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Plain,
    Gzip,
    Bzip2,
}

/// Detect compression by extension first, then by magic bytes
pub fn detect_compression<P: AsRef<Path>>(path: P) -> io::Result<Compression> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("gz") => return Ok(Compression::Gzip),
        Some("bz2") => return Ok(Compression::Bzip2),
        _ => {}
    }

    let mut magic = [0u8; 3];
    let mut file = File::open(path)?;
    let mut filled = 0;
    while filled < magic.len() {
        let n = file.read(&mut magic[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    // gzip: 1f 8b, bzip2: "BZh"
    if filled >= 2 && magic[0] == 0x1f && magic[1] == 0x8b {
        Ok(Compression::Gzip)
    } else if filled >= 3 && &magic == b"BZh" {
        Ok(Compression::Bzip2)
    } else {
        Ok(Compression::Plain)
    }
}

/// Memory-mapped file reader
pub struct MappedReader {
    mmap: Mmap,
    position: usize,
}

impl MappedReader {
    pub fn new(file: &File) -> io::Result<Self> {
        // SAFETY: input tables are not modified while a run reads them
        let mmap = unsafe { Mmap::map(file)? };
        Ok(Self { mmap, position: 0 })
    }
}

impl Read for MappedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.mmap[self.position..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }
}

impl BufRead for MappedReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(&self.mmap[self.position..])
    }

    fn consume(&mut self, amt: usize) {
        self.position = (self.position + amt).min(self.mmap.len());
    }
}

/// Reader over an input table, whatever its encoding
pub enum InputReader {
    Buffered(BufReader<File>),
    Mapped(MappedReader),
    Gzip(BufReader<MultiGzDecoder<File>>),
    Bzip2(BufReader<BzDecoder<File>>),
}

impl InputReader {
    /// Open an input table, choosing decompression and buffering automatically
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let compression = detect_compression(path)?;
        let file = File::open(path)?;

        Ok(match compression {
            Compression::Gzip => InputReader::Gzip(BufReader::with_capacity(
                DEFAULT_BUFFER_SIZE,
                MultiGzDecoder::new(file),
            )),
            Compression::Bzip2 => InputReader::Bzip2(BufReader::with_capacity(
                DEFAULT_BUFFER_SIZE,
                BzDecoder::new(file),
            )),
            Compression::Plain if file.metadata()?.len() >= MMAP_THRESHOLD => {
                InputReader::Mapped(MappedReader::new(&file)?)
            }
            Compression::Plain => {
                InputReader::Buffered(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file))
            }
        })
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, InputReader::Mapped(_))
    }
}

impl Read for InputReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            InputReader::Buffered(r) => r.read(buf),
            InputReader::Mapped(r) => r.read(buf),
            InputReader::Gzip(r) => r.read(buf),
            InputReader::Bzip2(r) => r.read(buf),
        }
    }
}

impl BufRead for InputReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            InputReader::Buffered(r) => r.fill_buf(),
            InputReader::Mapped(r) => r.fill_buf(),
            InputReader::Gzip(r) => r.fill_buf(),
            InputReader::Bzip2(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            InputReader::Buffered(r) => r.consume(amt),
            InputReader::Mapped(r) => r.consume(amt),
            InputReader::Gzip(r) => r.consume(amt),
            InputReader::Bzip2(r) => r.consume(amt),
        }
    }
}

/// Byte line iterator that reuses its buffer
///
/// Strips the trailing `\n` / `\r\n`.
pub struct ByteLineIterator<R: BufRead> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: BufRead> ByteLineIterator<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(4096),
        }
    }

    /// Next line as bytes, `None` at EOF
    pub fn next_line(&mut self) -> Option<io::Result<&[u8]>> {
        self.buffer.clear();
        match self.reader.read_until(b'\n', &mut self.buffer) {
            Ok(0) => None,
            Ok(_) => {
                if self.buffer.last() == Some(&b'\n') {
                    self.buffer.pop();
                    if self.buffer.last() == Some(&b'\r') {
                        self.buffer.pop();
                    }
                }
                Some(Ok(&self.buffer))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Write a file atomically
///
/// The closure writes into a temporary file created in the destination
/// directory; the file is renamed over `path` only if the closure succeeds.
/// Parent directories are created as needed.
pub fn write_atomic<P, F>(path: P, write: F) -> io::Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> io::Result<()>,
{
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    // Temp files are created 0600; keep the replaced file's mode instead
    let permissions = match std::fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => default_permissions(),
    };

    let mut temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, &mut temp);
        write(&mut writer)?;
        writer.flush()?;
    }
    if let Some(permissions) = permissions {
        temp.as_file().set_permissions(permissions)?;
    }
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Mode for newly created outputs: rw-r--r--
#[cfg(unix)]
fn default_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<Permissions> {
    None
}
