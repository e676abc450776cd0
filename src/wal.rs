use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Commit;

/// Write one record as `[u32 len][bincode Commit][u32 crc32]`, little-endian.
fn write_record(writer: &mut impl Write, commit: &Commit) -> io::Result<()> {
    let payload =
        bincode::serialize(commit).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "record too large"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())
}

/// Fill `buf` completely, or report a clean/torn end of file as `Ok(false)`.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Next intact record and its encoded size, or `None` at end of file or the
/// first torn/corrupt record.
fn read_record(reader: &mut impl Read) -> io::Result<Option<(Commit, u64)>> {
    let mut word = [0u8; 4];
    if !read_full(reader, &mut word)? {
        return Ok(None);
    }
    let mut payload = vec![0u8; u32::from_le_bytes(word) as usize];
    if !read_full(reader, &mut payload)? || !read_full(reader, &mut word)? {
        return Ok(None);
    }
    if u32::from_le_bytes(word) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    Ok(bincode::deserialize(&payload)
        .ok()
        .map(|commit| (commit, payload.len() as u64 + 8)))
}

/// Append-only booking journal. Each record is one committed unit of work,
/// so a crash mid-append loses the whole unit rather than half of it.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    records_since_compact: u64,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            records_since_compact: 0,
        })
    }

    /// Buffer a record. Durable only after [`Wal::flush_sync`].
    pub fn append_buffered(&mut self, commit: &Commit) -> io::Result<()> {
        write_record(&mut self.writer, commit)?;
        self.records_since_compact += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    #[cfg(test)]
    pub fn append(&mut self, commit: &Commit) -> io::Result<()> {
        self.append_buffered(commit)?;
        self.flush_sync()
    }

    pub fn records_since_compact(&self) -> u64 {
        self.records_since_compact
    }

    /// Replace the journal with `snapshot`: write a temp file, fsync, rename over, reopen.
    pub fn rewrite(&mut self, snapshot: &[Commit]) -> io::Result<()> {
        let tmp = self.path.with_extension("wal.tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            for commit in snapshot {
                write_record(&mut out, commit)?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.records_since_compact = 0;
        Ok(())
    }

    /// All intact records from disk, plus the byte length they occupy.
    /// A missing file is an empty journal.
    pub fn replay(path: &Path) -> io::Result<(Vec<Commit>, u64)> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut commits = Vec::new();
        let mut intact = 0u64;
        while let Some((commit, size)) = read_record(&mut reader)? {
            commits.push(commit);
            intact += size;
        }
        Ok((commits, intact))
    }

    /// Replay, then cut any torn or corrupt tail so new appends follow the
    /// last intact record.
    pub fn recover(path: &Path) -> io::Result<Vec<Commit>> {
        let (commits, intact) = Self::replay(path)?;
        let on_disk = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(commits),
            Err(e) => return Err(e),
        };
        if on_disk > intact {
            tracing::warn!(
                dropped_bytes = on_disk - intact,
                records = commits.len(),
                "truncating journal tail"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(intact)?;
            file.sync_all()?;
        }
        Ok(commits)
    }
}
