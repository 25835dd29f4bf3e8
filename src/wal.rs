use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::limits::MAX_FRAME_LEN;
use crate::model::Event;

/// Append-only log of calendar events.
///
/// Each frame is `[u32 le: len][bincode: Event][u32 le: crc32 of payload]`.
/// Reading stops at the first short or corrupt frame; opening the log cuts
/// that tail off so later appends stay readable. A batch that fails midway is
/// rolled back to the last synced length for the same reason.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    staging_path: PathBuf,
    /// File length as of the last successful `flush_sync`.
    durable_len: u64,
    /// Frames buffered since then, with their encoded size.
    pending_frames: u64,
    pending_len: u64,
    appends_since_compact: u64,
}

/// What survived of a log on disk.
#[derive(Debug, Default)]
pub struct Replay {
    pub events: Vec<Event>,
    /// Bytes after the last intact frame.
    pub torn_bytes: u64,
}

enum Frame {
    Entry(Vec<u8>),
    End,
    Torn,
}

/// Returns the number of bytes the frame occupies.
fn write_frame(writer: &mut impl Write, event: &Event) -> io::Result<u64> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(8 + payload.len() as u64)
}

/// Read into `buf` until it is full or the input ends. Returns bytes read.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_frame(reader: &mut impl Read) -> io::Result<Frame> {
    let mut word = [0u8; 4];
    match fill(reader, &mut word)? {
        0 => return Ok(Frame::End),
        4 => {}
        _ => return Ok(Frame::Torn),
    }
    let len = u32::from_le_bytes(word) as usize;
    if len > MAX_FRAME_LEN {
        return Ok(Frame::Torn);
    }

    let mut payload = vec![0u8; len];
    if fill(reader, &mut payload)? < len || fill(reader, &mut word)? < 4 {
        return Ok(Frame::Torn);
    }
    if u32::from_le_bytes(word) != crc32fast::hash(&payload) {
        return Ok(Frame::Torn);
    }
    Ok(Frame::Entry(payload))
}

impl Wal {
    /// Recover the log at `path` (creating it if missing), drop any torn
    /// tail, and open it for appends.
    pub fn open(path: &Path) -> io::Result<(Self, Replay)> {
        let replay = Self::read(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut durable_len = file.metadata()?.len();
        if replay.torn_bytes > 0 {
            durable_len -= replay.torn_bytes;
            file.set_len(durable_len)?;
            file.sync_all()?;
        }
        let wal = Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            staging_path: path.with_extension("wal.tmp"),
            durable_len,
            pending_frames: 0,
            pending_len: 0,
            appends_since_compact: 0,
        };
        Ok((wal, replay))
    }

    /// Read every intact event without touching the file.
    pub fn read(path: &Path) -> io::Result<Replay> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e),
        };
        let total = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut replay = Replay::default();
        let mut intact: u64 = 0;

        loop {
            match read_frame(&mut reader)? {
                Frame::End => break,
                Frame::Torn => {
                    tracing::warn!("wal {}: torn or corrupt frame at byte {intact}", path.display());
                    break;
                }
                Frame::Entry(payload) => match bincode::deserialize::<Event>(&payload) {
                    Ok(event) => {
                        intact += 8 + payload.len() as u64;
                        replay.events.push(event);
                    }
                    Err(e) => {
                        tracing::warn!("wal {}: undecodable event at byte {intact}: {e}", path.display());
                        break;
                    }
                },
            }
        }

        replay.torn_bytes = total - intact;
        Ok(replay)
    }

    /// Append a single event and fsync. Tests only; the store goes through
    /// `append_buffered` + `flush_sync` for group commit.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer one event. Nothing is durable until `flush_sync`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        self.pending_len += write_frame(&mut self.writer, event)?;
        self.pending_frames += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.durable_len += self.pending_len;
        self.appends_since_compact += self.pending_frames;
        self.pending_len = 0;
        self.pending_frames = 0;
        Ok(())
    }

    /// Throw away everything written since the last successful `flush_sync`,
    /// buffered or already on disk, so no partial frame stays in the log.
    pub fn rollback(&mut self) -> io::Result<()> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        // Drop the unflushed buffer without writing it.
        let _ = stale.into_parts();
        let file = self.writer.get_ref();
        file.set_len(self.durable_len)?;
        file.sync_all()?;
        self.pending_len = 0;
        self.pending_frames = 0;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Write `events` to the staging file beside the log and fsync it.
    /// Returns the staged file's length.
    pub fn stage_snapshot(&self, events: &[Event]) -> io::Result<u64> {
        let mut writer = BufWriter::new(File::create(&self.staging_path)?);
        let mut len = 0;
        for event in events {
            len += write_frame(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(len)
    }

    /// Rename the staged snapshot of `staged_len` bytes over the log and
    /// continue appending to it.
    pub fn install_snapshot(&mut self, staged_len: u64) -> io::Result<()> {
        self.flush_sync()?;
        fs::rename(&self.staging_path, &self.path)?;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.durable_len = staged_len;
        self.appends_since_compact = 0;
        Ok(())
    }

    /// Replace the log's contents with `events`.
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        let staged_len = self.stage_snapshot(events)?;
        self.install_snapshot(staged_len)
    }
}
